//! API route handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::filter::{apply_filters, sort_products, FilterState, PriceRange, SortKey};
use crate::types::{ErrorResponse, HealthResponse, Marketplace, NormalizedProduct, ProductsResponse};

/// Application state shared across handlers.
pub struct AppState {
    pub products: Vec<NormalizedProduct>,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Query parameters of `GET /products`
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub marketplace: Option<String>,
    pub brand: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
    /// Comma-separated spec filter tokens
    pub specs: Option<String>,
    pub sort: Option<String>,
}

impl ProductsQuery {
    fn marketplace(&self) -> Result<Marketplace, ApiError> {
        match self.marketplace.as_deref() {
            Some(m) => m.parse().map_err(|e| ApiError::bad_request(format!("{}", e))),
            None => Ok(Marketplace::default()),
        }
    }

    fn sort_key(&self) -> Result<SortKey, ApiError> {
        match self.sort.as_deref() {
            Some(s) => s.parse().map_err(|e| ApiError::bad_request(format!("{}", e))),
            None => Ok(SortKey::default()),
        }
    }

    fn filter_state(&self) -> Result<FilterState, ApiError> {
        let state = FilterState {
            marketplace: self.marketplace()?,
            brand: self.brand.clone(),
            search_text: self.search.clone(),
            price_range: PriceRange {
                min: self.min_price,
                max: self.max_price,
            },
            min_rating: self.min_rating,
            selected_specs: Vec::new(),
        };

        let tokens = self.specs.as_deref().unwrap_or_default().split(',');
        state
            .with_spec_tokens(tokens)
            .map_err(|e| ApiError::bad_request(format!("{}", e)))
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/products", get(products))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Filtered, sorted product listing.
pub async fn products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<ProductsResponse>, ApiError> {
    let filter_state = query.filter_state()?;
    let sort_key = query.sort_key()?;

    let mut products = apply_filters(&state.products, &filter_state);
    sort_products(&mut products, sort_key, filter_state.marketplace);

    tracing::debug!(
        "Serving {} of {} products (sort: {})",
        products.len(),
        state.products.len(),
        sort_key.as_str()
    );

    Ok(Json(ProductsResponse {
        count: products.len(),
        products,
    }))
}
