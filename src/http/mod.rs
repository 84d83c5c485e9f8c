pub mod handler;
pub mod server;

pub use handler::AppState;
