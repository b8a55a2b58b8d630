pub mod binding;
pub mod context;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod ingest;
pub mod intake;
pub mod media;
pub mod registry;
pub mod task;

pub use controller::Controller;
pub use dispatcher::{ActionDispatcher, CloseOutcome};
pub use error::ControllerError;
pub use ingest::{Phase, ProgressEvent};
