//! Product route handlers.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use tracing::instrument;

use clementine_core::ProductId;

use crate::error::Result;
use crate::models::{ListResponse, NewProduct, Product, ProductPatch};
use crate::services::ProductService;
use crate::state::AppState;

/// List products matching the query-string filters.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Product>>> {
    let products = ProductService::from_state(&state).list(&params).await?;
    Ok(Json(products))
}

/// Create a product.
#[instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    Json(data): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = ProductService::from_state(&state).create(&data).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a single product.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = ProductService::from_state(&state).get(id).await?;
    Ok(Json(product))
}

/// Partially update a product.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>> {
    let product = ProductService::from_state(&state).update(id, &patch).await?;
    Ok(Json(product))
}

/// Delete a product.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn destroy(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductService::from_state(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
