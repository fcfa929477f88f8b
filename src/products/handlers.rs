use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{error::ProductError, state::AppState};

use super::dto::{LookupQuery, SearchQuery, SeedQuery, SeedResponse, ServiceHealth};
use super::repo_types::Product;
use super::services::ProductPage;
use super::validators::{validate_barcode, validate_category};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(search_products))
        .route("/products/health/", get(health))
        .route("/products/:barcode", get(get_product))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/products/seed/:category", post(seed_products))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
    Query(q): Query<LookupQuery>,
) -> Result<Json<Product>, ProductError> {
    validate_barcode(&barcode)?;
    let product = state.products.get_or_fetch(&barcode, q.force_refresh).await?;
    Ok(Json(product))
}

#[instrument(skip(state))]
pub async fn search_products(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ProductPage>, ProductError> {
    let (filter, page) = q.into_request(&state.config.pagination)?;
    let result = state.products.search(filter, page).await?;
    Ok(Json(result))
}

#[instrument(skip(state))]
pub async fn seed_products(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<SeedQuery>,
) -> Result<Json<SeedResponse>, ProductError> {
    let category = validate_category(&category)?;
    let limit = q.limit(state.config.seed_max_limit)?;

    let report = state.products.seed(&category, limit).await?;
    info!(%category, added = report.added, updated = report.updated, "seed request done");
    Ok(Json(SeedResponse::from(report)))
}

pub async fn health() -> Json<ServiceHealth> {
    Json(ServiceHealth {
        status: "healthy",
        timestamp: OffsetDateTime::now_utc(),
        service: "product-service",
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::app::build_app;
    use crate::openfoodfacts::{fake::FakeFoodSource, RawProduct};
    use crate::products::memory::InMemoryProductRepository;
    use crate::state::AppState;

    fn app() -> (axum::Router, Arc<InMemoryProductRepository>, Arc<FakeFoodSource>) {
        let repo = Arc::new(InMemoryProductRepository::new());
        let source = Arc::new(FakeFoodSource::new());
        let state = AppState::fake(repo.clone(), source.clone());
        (build_app(state), repo, source)
    }

    async fn call(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    fn oreo() -> RawProduct {
        RawProduct(json!({
            "code": "7622300336738",
            "product_name": "Oreo",
            "brands": "Mondelez",
            "categories": "Snacks, Biscuits",
            "nutriments": {"sugars_100g": 38}
        }))
    }

    #[tokio::test]
    async fn lookup_fetches_then_serves_from_cache() {
        let (app, _repo, source) = app();
        source.put("7622300336738", oreo());

        let (status, body) = call(&app, "GET", "/api/v1/products/7622300336738").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Oreo");
        assert_eq!(body["normalized_nutrition"]["sugar_100g"], 38.0);

        let (status, _) = call(&app, "GET", "/api/v1/products/7622300336738").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.lookups(), 1);

        let (status, _) = call(&app, "GET", "/api/v1/products/7622300336738?force_refresh=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(source.lookups(), 2);
    }

    #[tokio::test]
    async fn unknown_barcode_is_404() {
        let (app, _repo, _source) = app();
        let (status, body) = call(&app, "GET", "/api/v1/products/0000000000000").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Product with barcode 0000000000000 not found");
    }

    #[tokio::test]
    async fn malformed_barcode_is_400_without_external_call() {
        let (app, _repo, source) = app();
        let (status, _) = call(&app, "GET", "/api/v1/products/abc%20def").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(source.lookups(), 0);
    }

    #[tokio::test]
    async fn upstream_failure_is_generic_500() {
        let (app, _repo, source) = app();
        source.go_offline();
        let (status, body) = call(&app, "GET", "/api/v1/products/7622300336738").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal server error");
    }

    #[tokio::test]
    async fn search_without_criteria_never_reaches_storage() {
        let (app, repo, _source) = app();
        let (status, body) = call(&app, "GET", "/api/v1/products").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "At least one of 'q' or 'category' parameters is required");
        assert_eq!(repo.searches(), 0);
    }

    #[tokio::test]
    async fn search_out_of_range_page_size_is_400() {
        let (app, repo, _source) = app();
        let (status, _) = call(&app, "GET", "/api/v1/products?q=oreo&page_size=500").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(repo.searches(), 0);
    }

    #[tokio::test]
    async fn search_returns_page_envelope() {
        let (app, _repo, source) = app();
        source.put("7622300336738", oreo());
        call(&app, "GET", "/api/v1/products/7622300336738").await;

        let (status, body) = call(&app, "GET", "/api/v1/products?q=mondelez&category=biscuit").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["page"], 1);
        assert_eq!(body["page_size"], 10);
        assert_eq!(body["total_pages"], 1);
        assert_eq!(body["items"][0]["barcode"], "7622300336738");
    }

    #[tokio::test]
    async fn seed_reports_counts() {
        let (app, _repo, source) = app();
        source.set_listing(vec![oreo(), RawProduct(json!({"product_name": "anonymous"}))]);

        let (status, body) = call(&app, "POST", "/api/v1/products/seed/biscuits?limit=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Seeded 1 new products, updated 0 existing ones");
        assert_eq!(body["data"]["total_processed"], 2);
        assert_eq!(body["data"]["added"], 1);
        assert_eq!(body["data"]["skipped"], 1);
        assert_eq!(body["data"]["errors"], 0);
    }

    #[tokio::test]
    async fn seed_validates_inputs() {
        let (app, _repo, source) = app();
        let (status, _) = call(&app, "POST", "/api/v1/products/seed/x").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "POST", "/api/v1/products/seed/snacks?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, "POST", "/api/v1/products/seed/snacks?limit=1001").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(source.listings(), 0);
    }

    #[tokio::test]
    async fn health_endpoints() {
        let (app, _repo, _source) = app();
        let (status, body) = call(&app, "GET", "/api/v1/products/health/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "product-service");

        let (status, body) = call(&app, "GET", "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["environment"], "test");

        let (status, body) = call(&app, "GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["api"], "/api/v1");
    }
}
