use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::registry::{EventRecord, SerialNumber};
use crate::server::{AppState, auth::Caller, errors::ApiError, extract::ApiJson};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeRequest {
    pub serial_number: String,
    pub issuer_id: String,
    pub timestamp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatusResponse {
    pub serial_number: SerialNumber,
    pub revoked: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationDetailsResponse {
    pub serial_number: SerialNumber,
    pub issuer_id: String,
    pub timestamp: u64,
}

pub async fn revoke_certificate(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<RevokeRequest>,
) -> Result<(StatusCode, Json<EventRecord>), ApiError> {
    let serial: SerialNumber = request.serial_number.parse()?;
    let event = state
        .registry
        .revoke_certificate(&caller, serial, request.issuer_id, request.timestamp)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn revocation_status(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<RevocationStatusResponse>, ApiError> {
    let serial_number: SerialNumber = serial.parse()?;
    let revoked = state.registry.is_revoked(&serial_number).await?;
    Ok(Json(RevocationStatusResponse {
        serial_number,
        revoked,
    }))
}

pub async fn revocation_details(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> Result<Json<RevocationDetailsResponse>, ApiError> {
    let serial_number: SerialNumber = serial.parse()?;
    let record = state
        .registry
        .revocation_details(&serial_number)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Certificate {serial_number} is not revoked")))?;

    Ok(Json(RevocationDetailsResponse {
        serial_number,
        issuer_id: record.issuer_id,
        timestamp: record.timestamp,
    }))
}
