//! Worker process management - launching and stopping the child.

mod terminate;
mod worker;

pub use terminate::{Termination, terminate};
pub use worker::WorkerCommand;
