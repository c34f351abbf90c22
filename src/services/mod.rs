//! Service layer module root.
//! Timestamp acquisition and validation.

pub mod timestamp;
pub mod timestamp_validator;

pub use timestamp::TimestampClient;
pub use timestamp_validator::TimestampValidator;
