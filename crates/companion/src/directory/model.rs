//! Directory entries and text filters.

use common::protocol::NgoCreate;
use serde::{Deserialize, Serialize};

use super::cache::{valid_position, DirectoryError};
use crate::geo::{Coordinates, GeoQuery, Located, Ranked};

/// A hospital as listed by `GET /api/hospitals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub beds: Option<u32>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

/// A non-governmental organisation in the NGO hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ngo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl Located for Hospital {
    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.lat?, self.lng?))
    }
}

impl Located for Ngo {
    fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.lat?, self.lng?))
    }
}

/// Either a plain list or a distance-ranked list.
///
/// Serialises untagged, so the JSON is always an array; ranked entries carry
/// an extra `distanceKm`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Plain(Vec<T>),
    Ranked(Vec<Ranked<T>>),
}

impl<T> Listing<T> {
    pub fn len(&self) -> usize {
        match self {
            Listing::Plain(v) => v.len(),
            Listing::Ranked(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn truncate(&mut self, limit: usize) {
        match self {
            Listing::Plain(v) => v.truncate(limit),
            Listing::Ranked(v) => v.truncate(limit),
        }
    }
}

/// Text filters for hospital search. All matches are case-insensitive
/// substring matches.
#[derive(Debug, Clone, Default)]
pub struct HospitalFilter {
    /// Matches name or address.
    pub search: Option<String>,
    pub city: Option<String>,
    pub kind: Option<String>,
    pub limit: usize,
}

impl HospitalFilter {
    fn matches(&self, h: &Hospital) -> bool {
        let search_ok = match &self.search {
            Some(term) => {
                contains_ci(Some(&h.name), term) || contains_ci(h.address.as_deref(), term)
            }
            None => true,
        };
        search_ok
            && self
                .city
                .as_deref()
                .map_or(true, |c| contains_ci(h.city.as_deref(), c))
            && self
                .kind
                .as_deref()
                .map_or(true, |k| contains_ci(h.kind.as_deref(), k))
    }
}

/// Filter, optionally rank by distance, then cap at `filter.limit`.
pub fn search_hospitals(
    hospitals: &[Hospital],
    filter: &HospitalFilter,
    geo: Option<&GeoQuery>,
) -> Listing<Hospital> {
    let matched = hospitals.iter().filter(|h| filter.matches(h)).cloned();
    let mut listing = match geo {
        Some(q) => Listing::Ranked(q.rank(matched)),
        None => Listing::Plain(matched.collect()),
    };
    listing.truncate(filter.limit);
    listing
}

/// NGOs in `city` (if given), optionally ranked by distance, capped at `limit`.
pub fn search_ngos(
    ngos: &[Ngo],
    city: Option<&str>,
    geo: Option<&GeoQuery>,
    limit: usize,
) -> Listing<Ngo> {
    let matched = ngos
        .iter()
        .filter(|n| city.map_or(true, |c| contains_ci(n.city.as_deref(), c)))
        .cloned();
    let mut listing = match geo {
        Some(q) => Listing::Ranked(q.rank(matched)),
        None => Listing::Plain(matched.collect()),
    };
    listing.truncate(limit);
    listing
}

/// Validate a user-submitted NGO and give it `id`.
///
/// Text fields are trimmed and blanks dropped. Coordinates must come as a
/// valid pair or not at all.
///
/// # Errors
///
/// [`DirectoryError::InvalidSubmission`] for a blank name or bad coordinates.
pub fn ngo_from_request(id: i64, req: NgoCreate) -> Result<Ngo, DirectoryError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(DirectoryError::InvalidSubmission("name must not be empty"));
    }
    match (req.lat, req.lng) {
        (None, None) => {}
        (Some(lat), Some(lng)) if valid_position(Some(lat), Some(lng)) => {}
        (Some(_), Some(_)) => {
            return Err(DirectoryError::InvalidSubmission("lat/lng out of range"));
        }
        _ => {
            return Err(DirectoryError::InvalidSubmission(
                "lat and lng must be supplied together",
            ));
        }
    }
    Ok(Ngo {
        id,
        name: name.to_owned(),
        description: trimmed(req.description),
        contact: trimmed(req.contact),
        website: trimmed(req.website),
        city: trimmed(req.city),
        tags: trimmed(req.tags),
        lat: req.lat,
        lng: req.lng,
    })
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::RadiusBounds;

    fn hospital(id: i64, name: &str, city: &str, kind: &str, at: Option<(f64, f64)>) -> Hospital {
        Hospital {
            id,
            name: name.into(),
            address: Some(format!("{id} Hazratganj Road")),
            city: Some(city.into()),
            state: Some("Uttar Pradesh".into()),
            contact: None,
            kind: Some(kind.into()),
            beds: Some(100),
            lat: at.map(|p| p.0),
            lng: at.map(|p| p.1),
        }
    }

    fn fixtures() -> Vec<Hospital> {
        vec![
            hospital(1, "Civil Hospital", "Lucknow", "Government", Some((26.8500, 80.9500))),
            hospital(2, "Balrampur Hospital", "Lucknow", "Government", Some((26.8467, 80.9462))),
            hospital(3, "City Care Clinic", "Agra", "Private", Some((27.1767, 78.0081))),
            hospital(4, "Unmapped Nursing Home", "Lucknow", "Private", None),
        ]
    }

    fn all(limit: usize) -> HospitalFilter {
        HospitalFilter {
            limit,
            ..Default::default()
        }
    }

    #[test]
    fn plain_listing_keeps_order() {
        let out = search_hospitals(&fixtures(), &all(50), None);
        match out {
            Listing::Plain(v) => {
                assert_eq!(v.iter().map(|h| h.id).collect::<Vec<_>>(), [1, 2, 3, 4])
            }
            Listing::Ranked(_) => panic!("expected plain listing"),
        }
    }

    #[test]
    fn text_filters_are_case_insensitive() {
        let filter = HospitalFilter {
            search: Some("HOSPITAL".into()),
            city: Some("lucknow".into()),
            kind: Some("govern".into()),
            limit: 50,
        };
        let out = search_hospitals(&fixtures(), &filter, None);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn search_matches_address() {
        let filter = HospitalFilter {
            search: Some("3 hazratganj".into()),
            limit: 50,
            ..Default::default()
        };
        let out = search_hospitals(&fixtures(), &filter, None);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn geo_ranks_and_drops_unmapped() {
        let q = GeoQuery::new(26.8467, 80.9462, 5.0, RadiusBounds::default()).unwrap();
        let out = search_hospitals(&fixtures(), &all(50), Some(&q));
        match out {
            Listing::Ranked(v) => {
                assert_eq!(v.iter().map(|r| r.entity.id).collect::<Vec<_>>(), [2, 1]);
                assert!(v[0].distance_km < 1e-9);
            }
            Listing::Plain(_) => panic!("expected ranked listing"),
        }
    }

    #[test]
    fn limit_applies_after_ranking() {
        let q = GeoQuery::new(26.8467, 80.9462, 5.0, RadiusBounds::default()).unwrap();
        let out = search_hospitals(&fixtures(), &all(1), Some(&q));
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["id"], 2);
        assert!(json[0].get("distanceKm").is_some());
    }

    #[test]
    fn plain_listing_has_no_distance() {
        let json = serde_json::to_value(search_hospitals(&fixtures(), &all(1), None)).unwrap();
        assert!(json[0].get("distanceKm").is_none());
        assert_eq!(json[0]["type"], "Government");
    }

    #[test]
    fn ngo_city_filter() {
        let ngos = vec![
            Ngo {
                id: 1,
                name: "Sahayata Trust".into(),
                description: None,
                contact: None,
                website: None,
                city: Some("Lucknow".into()),
                tags: Some("blood-donation".into()),
                lat: None,
                lng: None,
            },
            Ngo {
                id: 2,
                name: "Seva Foundation".into(),
                description: None,
                contact: None,
                website: None,
                city: Some("Kanpur".into()),
                tags: None,
                lat: None,
                lng: None,
            },
        ];
        assert_eq!(search_ngos(&ngos, Some("kanpur"), None, 200).len(), 1);
        assert_eq!(search_ngos(&ngos, None, None, 200).len(), 2);
        assert_eq!(search_ngos(&ngos, None, None, 1).len(), 1);
    }

    #[test]
    fn submission_is_trimmed() {
        let ngo = ngo_from_request(
            42,
            NgoCreate {
                name: "  Seva Foundation ".into(),
                city: Some("Kanpur".into()),
                website: Some("   ".into()),
                lat: Some(26.4499),
                lng: Some(80.3319),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ngo.id, 42);
        assert_eq!(ngo.name, "Seva Foundation");
        assert_eq!(ngo.website, None);
        assert_eq!(ngo.coordinates(), Some(Coordinates::new(26.4499, 80.3319)));
    }

    #[test]
    fn submission_rejects_blank_name_and_bad_coordinates() {
        let blank = NgoCreate {
            name: " ".into(),
            ..Default::default()
        };
        assert!(ngo_from_request(1, blank).is_err());

        let half = NgoCreate {
            name: "Seva".into(),
            lat: Some(26.4),
            ..Default::default()
        };
        assert!(ngo_from_request(1, half).is_err());

        let off_planet = NgoCreate {
            name: "Seva".into(),
            lat: Some(95.0),
            lng: Some(80.0),
            ..Default::default()
        };
        assert!(ngo_from_request(1, off_planet).is_err());
    }
}
