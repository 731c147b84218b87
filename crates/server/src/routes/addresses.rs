//! Address route handlers.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tracing::instrument;

use clementine_core::AddressId;

use crate::error::Result;
use crate::models::{Address, AddressPatch, ListResponse, NewAddress};
use crate::services::AddressService;
use crate::state::AppState;

/// List addresses matching the query-string filters.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Address>>> {
    let addresses = AddressService::from_state(&state).list(&params).await?;
    Ok(Json(addresses))
}

/// Create an address.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    Json(data): Json<NewAddress>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = AddressService::from_state(&state).create(&data).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// Get a single address.
#[instrument(skip_all, fields(address_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    let address = AddressService::from_state(&state).get(id).await?;
    Ok(Json(address))
}

/// Partially update an address.
#[instrument(skip_all, fields(address_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
    Json(patch): Json<AddressPatch>,
) -> Result<Json<Address>> {
    let address = AddressService::from_state(&state).update(id, &patch).await?;
    Ok(Json(address))
}

/// Make an address its user's only primary address.
#[instrument(skip_all, fields(address_id = %id))]
pub async fn set_primary(
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    let address = AddressService::from_state(&state).set_primary(id).await?;
    Ok(Json(address))
}

/// Delete an address.
#[instrument(skip_all, fields(address_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressService::from_state(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
