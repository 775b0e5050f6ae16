//! Mixed hospital and NGO results around one point.

use serde::Serialize;
use tracing::warn;

use super::{DirectorySnapshot, Hospital, Ngo};
use crate::geo::{GeoQuery, LocatedEntity, Ranked};

/// Value of the `category` attribute on each result.
pub const HOSPITAL: &str = "hospital";
pub const NGO: &str = "ngo";

/// Every directory entry within the query radius, nearest first, capped at
/// `limit`. Ids are prefixed with the category (`hospital-3`, `ngo-10`) so
/// they stay unique across both lists.
pub fn nearby(snapshot: &DirectorySnapshot, query: &GeoQuery, limit: usize) -> Vec<Ranked<LocatedEntity>> {
    let hospitals = snapshot.hospitals.iter().filter_map(hospital_entity);
    let ngos = snapshot.ngos.iter().filter_map(ngo_entity);
    let mut ranked = query.rank(hospitals.chain(ngos));
    ranked.truncate(limit);
    ranked
}

fn hospital_entity(h: &Hospital) -> Option<LocatedEntity> {
    to_entity(HOSPITAL, h.id, &h.name, h.lat, h.lng, h)
}

fn ngo_entity(n: &Ngo) -> Option<LocatedEntity> {
    to_entity(NGO, n.id, &n.name, n.lat, n.lng, n)
}

/// Entries without a position are skipped before serialising.
fn to_entity<T: Serialize>(
    category: &str,
    id: i64,
    name: &str,
    lat: Option<f64>,
    lng: Option<f64>,
    entry: &T,
) -> Option<LocatedEntity> {
    lat.zip(lng)?;
    let mut attributes = match serde_json::to_value(entry) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => return None,
        Err(e) => {
            warn!(category, id, error = %e, "directory entry not serialisable");
            return None;
        }
    };
    for key in ["id", "name", "lat", "lng"] {
        attributes.remove(key);
    }
    attributes.retain(|_, v| !v.is_null());
    attributes.insert("category".into(), category.into());
    Some(LocatedEntity {
        id: format!("{category}-{id}"),
        name: name.to_owned(),
        lat,
        lng,
        attributes,
    })
}
