use serde::{Deserialize, Serialize};

use super::services::SeedReport;

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub status: &'static str,
    pub message: String,
    pub data: SeedReport,
}

impl From<SeedReport> for SeedResponse {
    fn from(data: SeedReport) -> Self {
        Self {
            status: "success",
            message: format!(
                "Seeded {} new products, updated {} existing ones",
                data.added, data.updated
            ),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub status: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: time::OffsetDateTime,
    pub service: &'static str,
}
