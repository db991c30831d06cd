//! # Catalog Routes
//!
//! Read-only endpoints for the product browser, plus the health probe.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use techshop_core::validation::{validate_category_id, validate_product_id, validate_search_query};
use techshop_core::{filter_by_name, group_by_category, Category, CategoryGroup, Product};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub migrations_applied: usize,
    pub migrations_total: usize,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = state.db.health_check().await;
    let (total, applied) = match state.db.migration_status().await {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "Migration status unavailable");
            (0, 0)
        }
    };

    let healthy = database && total > 0 && total == applied;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if healthy { "ok" } else { "degraded" },
            database,
            migrations_applied: applied,
            migrations_total: total,
        }),
    )
}

/// `GET /categories`
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.catalog.list_categories().await?))
}

/// `GET /products?search=&category=`
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let mut products = state.catalog.list_products().await?;

    if let Some(category) = query.category.as_deref() {
        validate_category_id(category)?;
        products.retain(|p| p.category_id.as_deref() == Some(category));
    }
    if let Some(search) = query.search.as_deref() {
        let search = validate_search_query(search)?;
        products = filter_by_name(&products, &search);
    }

    debug!(count = products.len(), "Listed products");
    Ok(Json(products))
}

/// `GET /products/{id}`
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    validate_product_id(&product_id)?;

    match state.catalog.get_product(&product_id).await? {
        Some(product) if product.is_active => Ok(Json(product)),
        _ => Err(ApiError::not_found("Product", &product_id)),
    }
}

/// `GET /catalog?search=`: active products grouped by category.
pub async fn grouped(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<CategoryGroup>>, ApiError> {
    let mut products = state.catalog.list_products().await?;
    if let Some(search) = query.search.as_deref() {
        let search = validate_search_query(search)?;
        products = filter_by_name(&products, &search);
    }
    let categories = state.catalog.list_categories().await?;

    Ok(Json(group_by_category(&products, &categories)))
}
