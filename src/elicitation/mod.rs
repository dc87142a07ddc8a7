//! Elicitation: tools pausing mid-execution to ask the user for input.

pub mod options;
pub mod registry;

pub use options::extract_options;
pub use registry::{ElicitationOutcome, ElicitationRegistry, ElicitationRequest, WaitHandle};
