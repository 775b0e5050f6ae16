//! User profiles with field-level encryption.
//!
//! Which fields are ciphertext is decided here, by schema convention: every
//! PII field of [`common::protocol::ProfileUpdate`] goes through the
//! [`crate::crypto::FieldCipher`] on write and back on read. Stored values
//! carry no marker of their own.

pub mod store;

pub use store::{ProfileError, ProfileStore};
