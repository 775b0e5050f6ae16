//! Haversine distance and radius-limited ranking.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Anything that may carry a position.
///
/// Entities missing either latitude or longitude return `None` and are
/// never matched by [`rank_by_distance`].
pub trait Located {
    fn coordinates(&self) -> Option<Coordinates>;
}

/// Generic directory entry with optional coordinates and passthrough attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedEntity {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    /// Any other fields, serialised back unchanged.
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl Located for LocatedEntity {
    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.lat?, self.lng?))
    }
}

/// An entity annotated with its distance from the query anchor.
///
/// Serialises as the entity's own JSON object plus a `distanceKm` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranked<T> {
    #[serde(flatten)]
    pub entity: T,
    #[serde(rename = "distanceKm")]
    pub distance_km: f64,
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let central_angle = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * central_angle
}

/// Keep the candidates within `radius_km` of `anchor` (inclusive), annotated
/// with their distance and sorted nearest first.
///
/// The sort is stable: equal distances keep their input order. Candidates
/// without coordinates are dropped.
///
/// Preconditions: `anchor` is finite and `radius_km > 0`. Validation is the
/// caller's job (see [`super::GeoQuery`]); values are never coerced here.
pub fn rank_by_distance<T, I>(anchor: Coordinates, radius_km: f64, candidates: I) -> Vec<Ranked<T>>
where
    T: Located,
    I: IntoIterator<Item = T>,
{
    debug_assert!(anchor.lat.is_finite() && anchor.lng.is_finite());
    debug_assert!(radius_km > 0.0);

    let mut ranked: Vec<Ranked<T>> = candidates
        .into_iter()
        .filter_map(|entity| {
            let distance_km = haversine_km(anchor, entity.coordinates()?);
            (distance_km <= radius_km).then_some(Ranked {
                entity,
                distance_km,
            })
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Kilometres per degree of longitude on the equator.
    const KM_PER_DEG: f64 = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;

    fn entity(id: &str, lat: Option<f64>, lng: Option<f64>) -> LocatedEntity {
        LocatedEntity {
            id: id.into(),
            name: format!("entity {id}"),
            lat,
            lng,
            attributes: serde_json::Map::new(),
        }
    }

    fn on_equator(id: &str, km_east: f64) -> LocatedEntity {
        entity(id, Some(0.0), Some(km_east / KM_PER_DEG))
    }

    #[test]
    fn same_point_is_zero() {
        let p = Coordinates::new(26.8467, 80.9462);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn one_degree_on_equator() {
        let d = haversine_km(Coordinates::new(0.0, 0.0), Coordinates::new(0.0, 1.0));
        assert!((d - KM_PER_DEG).abs() < 1e-9, "got {d}");
    }

    #[test]
    fn orders_nearest_first() {
        let anchor = Coordinates::new(0.0, 0.0);
        let out = rank_by_distance(
            anchor,
            10.0,
            vec![on_equator("five", 5.0), on_equator("one", 1.0), on_equator("three", 3.0)],
        );
        let ids: Vec<&str> = out.iter().map(|r| r.entity.id.as_str()).collect();
        assert_eq!(ids, ["one", "three", "five"]);
        assert!(out.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
    }

    #[test]
    fn boundary_is_inclusive() {
        let anchor = Coordinates::new(0.0, 0.0);
        let candidate = entity("edge", Some(0.5), Some(0.5));
        let exact = haversine_km(anchor, candidate.coordinates().unwrap());

        let out = rank_by_distance(anchor, exact, vec![candidate.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].distance_km, exact);

        let out = rank_by_distance(anchor, exact * (1.0 - 1e-9), vec![candidate]);
        assert!(out.is_empty());
    }

    #[test]
    fn missing_coordinates_never_match() {
        let anchor = Coordinates::new(0.0, 0.0);
        let out = rank_by_distance(
            anchor,
            20_000.0,
            vec![
                entity("no-lat", None, Some(0.0)),
                entity("no-lng", Some(0.0), None),
                entity("none", None, None),
                on_equator("ok", 1.0),
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity.id, "ok");
    }

    #[test]
    fn ties_keep_input_order() {
        let anchor = Coordinates::new(0.0, 0.0);
        let out = rank_by_distance(
            anchor,
            5.0,
            vec![on_equator("first", 2.0), on_equator("second", 2.0)],
        );
        assert_eq!(out[0].entity.id, "first");
        assert_eq!(out[1].entity.id, "second");
    }

    #[test]
    fn lucknow_radius_excludes_agra() {
        let lucknow = Coordinates::new(26.8467, 80.9462);
        let out = rank_by_distance(
            lucknow,
            1.0,
            vec![
                entity("agra", Some(27.1767), Some(78.0081)),
                entity("here", Some(26.8467), Some(80.9462)),
            ],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity.id, "here");
        assert!(out[0].distance_km.abs() < 1e-9);

        let agra = haversine_km(lucknow, Coordinates::new(27.1767, 78.0081));
        assert!(agra > 250.0 && agra < 350.0, "got {agra}");
    }

    #[test]
    fn ranked_serialises_flat_with_distance() {
        let mut e = entity("7", Some(0.0), Some(0.0));
        e.attributes.insert("beds".into(), json!(120));
        let out = rank_by_distance(Coordinates::new(0.0, 0.0), 1.0, vec![e]);
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v[0]["id"], "7");
        assert_eq!(v[0]["beds"], 120);
        assert_eq!(v[0]["distanceKm"], 0.0);
    }
}
