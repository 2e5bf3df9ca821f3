//! Error types: wire kinds and domain-level errors.

pub mod domain;
pub mod error_code;

pub use domain::{DomainError, MoveViolation};
pub use error_code::ErrorKind;
