//! User route handlers.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tracing::instrument;

use clementine_core::UserId;

use crate::error::Result;
use crate::models::{Address, ListResponse, NewUser, Order, User, UserPatch};
use crate::services::{AddressService, OrderService, UserService};
use crate::state::AppState;

/// List users matching the query-string filters.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<User>>> {
    let users = UserService::from_state(&state).list(&params).await?;
    Ok(Json(users))
}

/// Create a user.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    Json(data): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    let user = UserService::from_state(&state).create(&data).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a single user.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn show(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<Json<User>> {
    let user = UserService::from_state(&state).get(id).await?;
    Ok(Json(user))
}

/// Partially update a user.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>> {
    let user = UserService::from_state(&state).update(id, &patch).await?;
    Ok(Json(user))
}

/// Delete a user.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn destroy(State(state): State<AppState>, Path(id): Path<UserId>) -> Result<StatusCode> {
    UserService::from_state(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List one user's addresses.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn addresses(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Address>>> {
    let addresses = AddressService::from_state(&state)
        .list_for_user(id, &params)
        .await?;
    Ok(Json(addresses))
}

/// List one user's orders, newest first.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn orders(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Order>>> {
    let orders = OrderService::from_state(&state)
        .list_for_user(id, &params)
        .await?;
    Ok(Json(orders))
}
