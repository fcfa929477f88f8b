use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct OpenFoodFactsConfig {
    pub api_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub openfoodfacts: OpenFoodFactsConfig,
    /// Days a stored product is served without asking Open Food Facts again.
    pub product_cache_days: i64,
    pub pagination: PaginationConfig,
    pub seed_max_limit: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let openfoodfacts = OpenFoodFactsConfig {
            api_url: std::env::var("OPENFOODFACTS_API_URL")
                .unwrap_or_else(|_| "https://world.openfoodfacts.org/api/v2".into()),
            timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 10)?,
        };
        let pagination = PaginationConfig {
            default_page_size: parse_or("DEFAULT_PAGE_SIZE", 10)?,
            max_page_size: parse_or("MAX_PAGE_SIZE", 100)?,
        };
        anyhow::ensure!(
            pagination.default_page_size >= 1
                && pagination.default_page_size <= pagination.max_page_size,
            "DEFAULT_PAGE_SIZE must be between 1 and MAX_PAGE_SIZE"
        );

        let product_cache_days = cache_days(parse_or("PRODUCT_CACHE_DAYS", 30)?)?;

        Ok(Self {
            app_env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_or("APP_PORT", 8080)?,
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            openfoodfacts,
            product_cache_days,
            pagination,
            seed_max_limit: parse_or("SEED_MAX_LIMIT", 1000)?,
        })
    }
}

/// Upper bound for `PRODUCT_CACHE_DAYS`, about a hundred years.
pub const MAX_PRODUCT_CACHE_DAYS: i64 = 36_500;

fn cache_days(days: i64) -> anyhow::Result<i64> {
    anyhow::ensure!(
        (0..=MAX_PRODUCT_CACHE_DAYS).contains(&days),
        "PRODUCT_CACHE_DAYS must be between 0 and {MAX_PRODUCT_CACHE_DAYS}, got {days}"
    );
    Ok(days)
}

/// Reads `key` from the environment, falling back to `default` when unset.
/// A value that is set but unparsable is an error rather than a silent default.
fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key} value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}
