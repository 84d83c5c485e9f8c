pub mod config;
pub mod deploy;
pub mod http;
pub mod webhook;
