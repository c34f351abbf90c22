pub mod algorithm;
pub mod certificate;
pub mod constants;
pub mod envelope;
pub mod include_policy;
pub mod pem;
pub mod status;
pub mod timestamp;
pub mod types;
