//! Axum request handlers for all service endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::{
    Appointment, AppointmentCreate, AppointmentUpdate, EmergencyCard, ErrorResponse,
    HealthResponse, HospitalQuery, MeResponse, Metric, MetricCreate, MetricQuery, NearbyQuery,
    NgoCreate, NgoQuery, OtpRequest, OtpResponse, ProfileResponse, ProfileUpdate,
    TimelineResponse, TokenResponse, VerifyRequest,
};
use serde::Serialize;
use tracing::{debug, info};

use super::{error::ApiError, extract::AuthUser, state::AppState};
use crate::directory::{
    nearby, search_hospitals, search_ngos, Hospital, HospitalFilter, Listing, Ngo,
};
use crate::geo::{Coordinates, GeoQuery, LocatedEntity, Ranked};
use crate::metrics::timeline;
use crate::otp::normalize_phone;

/// Page size when `limit` is not given.
pub const DEFAULT_LIMIT: usize = 50;
/// Largest accepted `limit`.
pub const MAX_LIMIT: usize = 200;

/// `GET /health`: liveness and readiness check.
///
/// Returns `200 OK` once the directory holds at least one entry, `503`
/// otherwise. Encryption being off does not make the service unready; it is
/// reported in `encryption_enabled` and the degraded-path counters.
pub async fn health(State(state): State<AppState>) -> Response {
    let stats = state.cipher.stats();
    let (status_code, status_str) = if state.directory.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    let body = HealthResponse {
        status: status_str.into(),
        encryption_enabled: state.cipher.is_enabled(),
        hospitals_loaded: state.directory.hospital_count(),
        ngos_loaded: state.directory.ngo_count(),
        plaintext_writes: stats.plaintext_writes,
        decrypt_failures: stats.decrypt_failures,
    };
    (status_code, Json(body)).into_response()
}

/// `POST /api/auth/request-otp`: issue a one-time code for a phone number.
pub async fn request_otp(
    State(state): State<AppState>,
    body: Result<Json<OtpRequest>, JsonRejection>,
) -> Result<Json<OtpResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let code = state.otp.issue(&req.phone).await?;
    info!("one-time code issued");

    Ok(Json(OtpResponse {
        success: true,
        code: state.otp_echo_code.then_some(code),
        expires_in: state.otp.ttl().as_secs(),
    }))
}

/// `POST /api/auth/verify`: exchange a valid code for a session token.
///
/// The token subject is the normalised phone number.
pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let phone = normalize_phone(&req.phone)?;
    state.otp.verify(&phone, &req.code).await?;
    let token = state.sessions.issue(&phone)?;
    info!("session issued");

    Ok(Json(TokenResponse {
        token,
        expires_in: state.sessions.ttl().as_secs(),
    }))
}

/// `GET /api/me`
pub async fn me(AuthUser(claims): AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        sub: claims.sub,
        role: claims.role,
        exp: claims.exp,
    })
}

/// `GET /api/hospitals`: text search with optional distance ranking.
pub async fn list_hospitals(
    _user: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<HospitalQuery>, QueryRejection>,
) -> Result<Json<Listing<Hospital>>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let limit = check_limit(q.limit, DEFAULT_LIMIT)?;
    let geo = GeoQuery::from_parts(q.lat, q.lng, q.radius_km, state.radius_bounds)?;
    let filter = HospitalFilter {
        search: non_blank(q.search),
        city: non_blank(q.city),
        kind: non_blank(q.kind),
        limit,
    };

    let snapshot = state.directory.snapshot();
    let listing = search_hospitals(&snapshot.hospitals, &filter, geo.as_ref());
    if listing.is_empty() {
        debug!(ranked = geo.is_some(), "hospital search matched nothing");
    } else {
        debug!(results = listing.len(), ranked = geo.is_some(), "hospital search");
    }
    Ok(Json(listing))
}

/// `GET /api/hospitals/:id`
pub async fn get_hospital(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Hospital>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.directory.hospital(id)?))
}

/// `GET /api/ngos`: NGO listing with optional distance ranking.
///
/// At most [`MAX_LIMIT`] entries unless a smaller `limit` is given.
pub async fn list_ngos(
    _user: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<NgoQuery>, QueryRejection>,
) -> Result<Json<Listing<Ngo>>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let limit = check_limit(q.limit, MAX_LIMIT)?;
    let geo = GeoQuery::from_parts(q.lat, q.lng, q.radius_km, state.radius_bounds)?;
    let city = non_blank(q.city);

    let snapshot = state.directory.snapshot();
    Ok(Json(search_ngos(&snapshot.ngos, city.as_deref(), geo.as_ref(), limit)))
}

/// `POST /api/ngos`: add an NGO to the hub.
pub async fn create_ngo(
    _user: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<NgoCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<Ngo>), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let ngo = state.ngo_submissions.submit(req).await?;
    Ok((StatusCode::CREATED, Json(ngo)))
}

/// Response body for `GET /api/nearby`.
#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub anchor: Coordinates,
    #[serde(rename = "radiusKm")]
    pub radius_km: f64,
    pub results: Vec<Ranked<LocatedEntity>>,
}

/// `GET /api/nearby`: hospitals and NGOs around a point, nearest first.
pub async fn nearby_entities(
    _user: AuthUser,
    State(state): State<AppState>,
    query: Result<Query<NearbyQuery>, QueryRejection>,
) -> Result<Json<NearbyResponse>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let limit = check_limit(q.limit, DEFAULT_LIMIT)?;
    let geo = GeoQuery::from_parts(q.lat, q.lng, q.radius_km, state.radius_bounds)?
        .ok_or_else(|| ApiError::bad_request("lat, lng and radiusKm are required"))?;

    let snapshot = state.directory.snapshot();
    Ok(Json(NearbyResponse {
        anchor: geo.anchor(),
        radius_km: geo.radius_km(),
        results: nearby(&snapshot, &geo, limit),
    }))
}

/// `GET /api/ngos/:id`
pub async fn get_ngo(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Ngo>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.directory.ngo(id)?))
}

/// `GET /api/profile`: the caller's decrypted profile, or `null`.
pub async fn get_profile(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
) -> Json<Option<ProfileResponse>> {
    Json(state.profiles.get(&claims.sub).await)
}

/// `PUT /api/profile`: encrypt and store the supplied fields.
pub async fn put_profile(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    body: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let Json(update) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let profile = state.profiles.upsert(&claims.sub, update).await?;
    Ok(Json(profile))
}

/// `GET /api/profile/emergency`
pub async fn emergency_card(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
) -> Json<EmergencyCard> {
    Json(
        state
            .profiles
            .emergency_card(&claims.sub, &state.frontend_origin)
            .await,
    )
}

/// `GET /api/appointments`: the caller's appointments, latest first.
pub async fn list_appointments(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Appointment>> {
    Json(state.appointments.list(&claims.sub).await)
}

/// `POST /api/appointments`
pub async fn create_appointment(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    body: Result<Json<AppointmentCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let appointment = state.appointments.create(&claims.sub, req).await?;
    info!(appointment_id = appointment.id, "appointment created");
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `PATCH /api/appointments/:id`
pub async fn update_appointment(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<AppointmentUpdate>, JsonRejection>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id)?;
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    Ok(Json(state.appointments.update(&claims.sub, id, req).await?))
}

/// `DELETE /api/appointments/:id`
pub async fn delete_appointment(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.appointments.delete(&claims.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/metrics`: the caller's readings, newest first.
pub async fn list_metrics(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    query: Result<Query<MetricQuery>, QueryRejection>,
) -> Result<Json<Vec<Metric>>, ApiError> {
    let Query(q) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let limit = check_limit(q.limit, DEFAULT_LIMIT)?;
    let kind = non_blank(q.kind);
    Ok(Json(
        state
            .metrics
            .list(&claims.sub, kind.as_deref().map(str::trim), limit)
            .await,
    ))
}

/// `POST /api/metrics`
pub async fn create_metric(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    body: Result<Json<MetricCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<Metric>), ApiError> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let metric = state.metrics.record(&claims.sub, req).await?;
    Ok((StatusCode::CREATED, Json(metric)))
}

/// `DELETE /api/metrics/:id`
pub async fn delete_metric(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.metrics.delete(&claims.sub, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/ai/timeline`: summary of the caller's recent readings.
pub async fn metrics_timeline(
    AuthUser(claims): AuthUser,
    State(state): State<AppState>,
) -> Json<TimelineResponse> {
    Json(timeline::timeline(&state.metrics, &claims.sub).await)
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}

fn check_limit(limit: Option<usize>, default: usize) -> Result<usize, ApiError> {
    let limit = limit.unwrap_or(default);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    Ok(limit)
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request("id must be an integer"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
