use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::openfoodfacts::FetchError;
use crate::products::repo::StoreError;

#[derive(Error, Debug)]
pub enum ProductError {
    #[error("Product with barcode {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl ProductError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProductError::NotFound(_) => StatusCode::NOT_FOUND,
            ProductError::Validation(_) => StatusCode::BAD_REQUEST,
            ProductError::Fetch(_) | ProductError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
