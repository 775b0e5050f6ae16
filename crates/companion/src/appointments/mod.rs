//! Per-user appointments.
//!
//! Every operation is scoped to the caller: an id owned by another user is
//! reported exactly like an id that does not exist.

pub mod store;

pub use store::AppointmentStore;
