//! Order route handlers.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::instrument;

use clementine_core::OrderId;

use crate::error::Result;
use crate::models::{ListResponse, NewOrder, Order, OrderItem, OrderPatch, OrderWithItems};
use crate::services::OrderService;
use crate::state::AppState;

/// Body for `PUT /orders/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// List orders matching the query-string filters, newest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Order>>> {
    let orders = OrderService::from_state(&state).list(&params).await?;
    Ok(Json(orders))
}

/// Create an order. Line prices are snapshotted from current product
/// prices; the total is computed server-side.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    Json(data): Json<NewOrder>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let order = OrderService::from_state(&state).create(&data).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Get a single order together with its items.
#[instrument(skip_all, fields(order_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderWithItems>> {
    let order = OrderService::from_state(&state).get(id).await?;
    Ok(Json(order))
}

/// List an order's line items.
#[instrument(skip_all, fields(order_id = %id))]
pub async fn items(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Vec<OrderItem>>> {
    let items = OrderService::from_state(&state).items(id).await?;
    Ok(Json(items))
}

/// Apply a partial update to an order. Only the status is mutable; item
/// lines and totals never change after creation.
#[instrument(skip_all, fields(order_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(patch): Json<OrderPatch>,
) -> Result<Json<Order>> {
    let order = OrderService::from_state(&state).update(id, &patch).await?;
    Ok(Json(order))
}

/// Replace an order's status.
#[instrument(skip_all, fields(order_id = %id))]
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Order>> {
    let order = OrderService::from_state(&state)
        .update_status(id, &body.status)
        .await?;
    Ok(Json(order))
}

/// Delete an order, cascading to its items.
#[instrument(skip_all, fields(order_id = %id))]
pub async fn destroy(State(state): State<AppState>, Path(id): Path<OrderId>) -> Result<StatusCode> {
    OrderService::from_state(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
