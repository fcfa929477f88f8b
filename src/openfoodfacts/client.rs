use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{FetchError, FoodDataSource, RawProduct};

const USER_AGENT: &str = concat!("pickbetter/", env!("CARGO_PKG_VERSION"), " (product cache)");

#[derive(Debug, Deserialize)]
struct ProductEnvelope {
    #[serde(default)]
    status: i64,
    product: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    products: Vec<serde_json::Value>,
}

#[derive(Clone)]
pub struct OpenFoodFactsClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn product_url(&self, barcode: &str) -> String {
        format!("{}/product/{}", self.base_url, barcode)
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.base_url)
    }
}

#[async_trait]
impl FoodDataSource for OpenFoodFactsClient {
    #[instrument(skip(self))]
    async fn get_product(&self, barcode: &str) -> Result<Option<RawProduct>, FetchError> {
        let res = self.http.get(self.product_url(barcode)).send().await?;

        // v2 answers unknown barcodes with 404 and a status-0 body.
        if res.status() == StatusCode::NOT_FOUND {
            debug!("barcode unknown to food database");
            return Ok(None);
        }
        if !res.status().is_success() {
            return Err(FetchError::Status(res.status().as_u16()));
        }

        let body: ProductEnvelope = res.json().await?;
        match (body.status, body.product) {
            (1, Some(product)) => Ok(Some(RawProduct(product))),
            _ => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn search_products(
        &self,
        category: &str,
        page_size: u32,
    ) -> Result<(Vec<RawProduct>, u64), FetchError> {
        let page_size = page_size.to_string();
        let res = self
            .http
            .get(self.search_url())
            .query(&[
                ("categories_tags_en", category),
                ("page_size", page_size.as_str()),
                ("page", "1"),
            ])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(FetchError::Status(res.status().as_u16()));
        }

        let body: SearchEnvelope = res.json().await?;
        debug!(returned = body.products.len(), total = body.count, "category listing fetched");
        Ok((body.products.into_iter().map(RawProduct).collect(), body.count))
    }
}
