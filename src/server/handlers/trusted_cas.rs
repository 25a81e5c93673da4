use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::registry::Identity;
use crate::server::{AppState, auth::Caller, errors::ApiError, extract::ApiJson};

#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub owner: Identity,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedCasResponse {
    pub trusted_cas: Vec<Identity>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrustStatusResponse {
    pub identity: Identity,
    pub trusted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddTrustedCaRequest {
    pub identity: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddTrustedCaResponse {
    pub identity: Identity,
    pub added: bool,
}

pub async fn get_owner(State(state): State<AppState>) -> Json<OwnerResponse> {
    Json(OwnerResponse {
        owner: state.registry.owner().clone(),
    })
}

pub async fn list_trusted_cas(
    State(state): State<AppState>,
) -> Result<Json<TrustedCasResponse>, ApiError> {
    let trusted_cas = state.registry.trusted_cas().await?;
    Ok(Json(TrustedCasResponse { trusted_cas }))
}

pub async fn trust_status(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<TrustStatusResponse>, ApiError> {
    let identity = Identity::new(identity)?;
    let trusted = state.registry.is_trusted_ca(&identity).await?;
    Ok(Json(TrustStatusResponse { identity, trusted }))
}

/// Grants trust to a CA. Responds with 201 when the CA is newly trusted and
/// 200 when it was trusted already.
pub async fn add_trusted_ca(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(request): ApiJson<AddTrustedCaRequest>,
) -> Result<(StatusCode, Json<AddTrustedCaResponse>), ApiError> {
    let identity = Identity::new(request.identity)?;
    let added = state
        .registry
        .add_trusted_ca(&caller, identity.clone())
        .await?;

    let status = if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(AddTrustedCaResponse { identity, added })))
}
