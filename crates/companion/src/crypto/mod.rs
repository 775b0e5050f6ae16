//! AES-256-GCM field encryption for profile data at rest.
//!
//! This module is intentionally free of HTTP and storage dependencies.
//!
//! # Stored format
//!
//! ```text
//! base64( iv[16] || tag[16] || ciphertext )
//! ```
//!
//! Standard alphabet with padding, no newlines, no version prefix. Which
//! columns hold ciphertext is a schema convention of the caller.
//!
//! # Degraded mode
//!
//! Without a usable key every operation passes values through unchanged.
//! Decryption failures are likewise returned as the stored string by
//! [`FieldCipher::decrypt_field`]; [`FieldCipher::try_decrypt_field`] exposes
//! the tagged result.

pub mod cipher;
pub mod key;

pub use cipher::{CipherError, FieldCipher};
pub use key::FieldKey;
