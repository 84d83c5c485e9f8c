pub mod dispatcher;
pub mod runner;

pub use dispatcher::{DeployOutcome, DeployStatus, Dispatcher, TRACKED_REF};
pub use runner::{Invocation, ProcessOutput, ProcessRunner, SystemRunner};
