//! Infrastructure layer for cross-cutting concerns.
//!
//! - Error taxonomy and result type
//! - User-profile configuration and store location
//! - Input reading from files and standard input

pub mod config;
pub mod error;
pub mod input;
