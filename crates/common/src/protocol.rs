//! Request and response types exchanged over the public HTTP API.
//!
//! Directory entries themselves (hospitals, NGOs) are defined next to the
//! directory cache in the service crate; this module holds the envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Request body for `POST /api/auth/request-otp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRequest {
    /// Phone number the code is issued for.
    pub phone: String,
}

/// Response body for `POST /api/auth/request-otp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpResponse {
    pub success: bool,
    /// The issued code. Only present when the service runs with code echo
    /// enabled (development without an SMS gateway).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Seconds until the code expires.
    pub expires_in: u64,
}

/// Request body for `POST /api/auth/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub phone: String,
    pub code: String,
}

/// Response body for `POST /api/auth/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token to present in the `Authorization` header.
    pub token: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
}

/// Response body for `GET /api/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub sub: String,
    pub role: String,
    /// Expiry as seconds since the Unix epoch.
    pub exp: u64,
}

// ---------------------------------------------------------------------------
// Directory queries
// ---------------------------------------------------------------------------

/// Query string for `GET /api/hospitals`.
///
/// `lat`, `lng` and `radiusKm` form the geo triple: either all three are
/// supplied or none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HospitalQuery {
    pub search: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<usize>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(rename = "radiusKm")]
    pub radius_km: Option<f64>,
}

/// Query string for `GET /api/ngos`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NgoQuery {
    pub city: Option<String>,
    pub limit: Option<usize>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(rename = "radiusKm")]
    pub radius_km: Option<f64>,
}

/// Query string for `GET /api/nearby`. All three geo parameters are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(rename = "radiusKm")]
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

/// Request body for `POST /api/ngos`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NgoCreate {
    pub name: String,
    pub description: Option<String>,
    pub contact: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub tags: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Request body for `PUT /api/profile`. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
    /// Replaces the stored list; an empty list clears it.
    pub allergies: Option<Vec<String>>,
}

/// Decrypted profile as returned by `GET /api/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub blood_group: Option<String>,
    pub emergency_contact: Option<String>,
    pub allergies: Option<Vec<String>>,
    /// Last write, seconds since the Unix epoch.
    pub updated_at: u64,
}

/// Response body for `GET /api/profile/emergency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyCard {
    pub id: String,
    pub name: String,
    pub blood_group: String,
    pub emergency_contact: String,
    pub profile_url: String,
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

/// Request body for `POST /api/appointments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentCreate {
    pub provider: String,
    pub reason: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Defaults to [`AppointmentStatus::Scheduled`].
    pub status: Option<AppointmentStatus>,
}

/// Request body for `PATCH /api/appointments/:id`. Absent fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentUpdate {
    pub provider: Option<String>,
    pub reason: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
}

/// An appointment owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub user_id: String,
    pub provider: String,
    pub reason: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Health metrics
// ---------------------------------------------------------------------------

/// Request body for `POST /api/metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricCreate {
    /// Free-form kind, e.g. `"bp"`, `"hr"`, `"glucose"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
}

/// Query string for `GET /api/metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub limit: Option<usize>,
}

/// One recorded reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: i64,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Response body for `GET /api/ai/timeline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineResponse {
    pub summary: String,
    /// The readings the summary was built from, newest first.
    pub metrics: Vec<Metric>,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error response body returned on any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"bad_request"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether a usable field-encryption key is configured.
    pub encryption_enabled: bool,
    /// Number of hospitals in the current directory snapshot.
    pub hospitals_loaded: usize,
    /// Number of NGOs in the current directory snapshot.
    pub ngos_loaded: usize,
    /// Fields written without encryption because no key was configured.
    pub plaintext_writes: u64,
    /// Stored fields that failed authenticated decryption and were returned as-is.
    pub decrypt_failures: u64,
}
