mod client;
#[cfg(test)]
pub mod fake;
mod parse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::OpenFoodFactsClient;
pub use parse::{parse_lookup, parse_product, ParseError};

/// One product object exactly as Open Food Facts returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProduct(pub serde_json::Value);

impl RawProduct {
    pub fn barcode(&self) -> Option<&str> {
        self.non_blank("code")
    }

    pub fn display_name(&self) -> Option<&str> {
        self.non_blank("product_name")
    }

    fn non_blank(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to food database failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("food database answered with status {0}")]
    Status(u16),
    #[error("food database payload unusable: {0}")]
    InvalidPayload(#[from] ParseError),
}

/// The external product database this service caches.
#[async_trait]
pub trait FoodDataSource: Send + Sync {
    /// `Ok(None)` when the database has no product under `barcode`.
    async fn get_product(&self, barcode: &str) -> Result<Option<RawProduct>, FetchError>;

    /// Up to `page_size` products of `category` and the database's total
    /// count for it.
    async fn search_products(
        &self,
        category: &str,
        page_size: u32,
    ) -> Result<(Vec<RawProduct>, u64), FetchError>;
}
