//! Phone-login session tokens.
//!
//! After a one-time code is verified the caller receives a bearer token
//! signed with `SESSION_SECRET`. Tokens are stateless; revocation before
//! expiry is not supported.

pub mod token;

pub use token::{unix_now, Claims, SessionSigner, TokenError};
