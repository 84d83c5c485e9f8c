pub mod event;
pub mod secrets;
pub mod signature;

pub use event::WebhookEvent;
pub use secrets::{EnvSecrets, Secret, SecretSource, Secrets};
pub use signature::{sign, verify, VerifyError};
