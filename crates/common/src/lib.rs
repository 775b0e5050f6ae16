//! Common types, protocol definitions, and errors shared across `companion` crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
