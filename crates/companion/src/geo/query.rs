//! Validated radius queries.

use thiserror::Error;

use super::distance::{rank_by_distance, Coordinates, Located, Ranked};

/// Errors raised while validating a geo query.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    /// A coordinate or radius is NaN or infinite.
    #[error("{0} must be a finite number")]
    NonFinite(&'static str),

    #[error("lat must be within [-90, 90], got {0}")]
    LatitudeOutOfRange(f64),

    #[error("lng must be within [-180, 180], got {0}")]
    LongitudeOutOfRange(f64),

    #[error("radiusKm must be within [{min}, {max}], got {radius}")]
    RadiusOutOfRange { radius: f64, min: f64, max: f64 },

    /// Only part of the `lat`/`lng`/`radiusKm` triple was supplied.
    #[error("lat, lng and radiusKm must be supplied together")]
    Incomplete,
}

/// Accepted search radius range in kilometres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusBounds {
    pub min_km: f64,
    pub max_km: f64,
}

impl Default for RadiusBounds {
    fn default() -> Self {
        Self {
            min_km: 0.1,
            max_km: 100.0,
        }
    }
}

/// An anchor point and radius that passed validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoQuery {
    anchor: Coordinates,
    radius_km: f64,
}

impl GeoQuery {
    /// Validate a query.
    ///
    /// # Errors
    ///
    /// Returns a [`GeoError`] for non-finite input, out-of-range coordinates,
    /// or a radius outside `bounds`.
    pub fn new(lat: f64, lng: f64, radius_km: f64, bounds: RadiusBounds) -> Result<Self, GeoError> {
        if !lat.is_finite() {
            return Err(GeoError::NonFinite("lat"));
        }
        if !lng.is_finite() {
            return Err(GeoError::NonFinite("lng"));
        }
        if !radius_km.is_finite() {
            return Err(GeoError::NonFinite("radiusKm"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::LongitudeOutOfRange(lng));
        }
        if radius_km <= 0.0 || radius_km < bounds.min_km || radius_km > bounds.max_km {
            return Err(GeoError::RadiusOutOfRange {
                radius: radius_km,
                min: bounds.min_km,
                max: bounds.max_km,
            });
        }
        Ok(Self {
            anchor: Coordinates::new(lat, lng),
            radius_km,
        })
    }

    /// Build a query from optional request parameters.
    ///
    /// `Ok(None)` when none of the three is present.
    ///
    /// # Errors
    ///
    /// [`GeoError::Incomplete`] when only some are present, otherwise as
    /// [`GeoQuery::new`].
    pub fn from_parts(
        lat: Option<f64>,
        lng: Option<f64>,
        radius_km: Option<f64>,
        bounds: RadiusBounds,
    ) -> Result<Option<Self>, GeoError> {
        match (lat, lng, radius_km) {
            (None, None, None) => Ok(None),
            (Some(lat), Some(lng), Some(r)) => Self::new(lat, lng, r, bounds).map(Some),
            _ => Err(GeoError::Incomplete),
        }
    }

    pub fn anchor(&self) -> Coordinates {
        self.anchor
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Rank `candidates` against this query.
    pub fn rank<T, I>(&self, candidates: I) -> Vec<Ranked<T>>
    where
        T: Located,
        I: IntoIterator<Item = T>,
    {
        rank_by_distance(self.anchor, self.radius_km, candidates)
    }
}
