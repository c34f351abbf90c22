//! Workflow pipelines orchestrating stateless services.

pub mod list_keys;
pub mod sign;
pub mod verify;

pub use list_keys::ListKeysWorkflow;
pub use sign::{SignRequest, SignWorkflow};
pub use verify::VerifyWorkflow;
