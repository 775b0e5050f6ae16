//! Geo-aware ranking of located entities.
//!
//! [`distance::rank_by_distance`] is pure: no I/O, no shared state. Input validation
//! (finite numbers, coordinate ranges, radius bounds) happens when a
//! [`GeoQuery`] is built, before ranking.

pub mod distance;
pub mod query;

pub use distance::{Coordinates, Located, LocatedEntity, Ranked};
pub use query::{GeoError, GeoQuery, RadiusBounds};
