use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::freshness::is_fresh;
use super::repo::{PageRequest, ProductRepository, SearchFilter, UpsertOutcome};
use super::repo_types::Product;
use crate::error::ProductError;
use crate::openfoodfacts::{parse_lookup, parse_product, FetchError, FoodDataSource};

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub total_processed: usize,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub fn total_pages(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

/// Cache-first product lookup, local search and bulk seeding.
#[derive(Clone)]
pub struct ProductService {
    repo: Arc<dyn ProductRepository>,
    source: Arc<dyn FoodDataSource>,
    cache_days: i64,
    seed_max_limit: u32,
}

impl ProductService {
    pub fn new(
        repo: Arc<dyn ProductRepository>,
        source: Arc<dyn FoodDataSource>,
        cache_days: i64,
        seed_max_limit: u32,
    ) -> Self {
        Self {
            repo,
            source,
            cache_days,
            seed_max_limit,
        }
    }

    /// Serves a fresh stored copy when there is one, otherwise refreshes from
    /// the food database and stores the result.
    ///
    /// When the food database no longer knows the barcode this returns
    /// `NotFound` even if a stale copy is still stored.
    #[instrument(skip(self))]
    pub async fn get_or_fetch(&self, barcode: &str, force_refresh: bool) -> Result<Product, ProductError> {
        if !force_refresh {
            if let Some(stored) = self.repo.find_by_barcode(barcode).await? {
                if is_fresh(Some(stored.last_updated), self.cache_days) {
                    debug!("serving cached product");
                    return Ok(stored);
                }
                debug!(last_updated = %stored.last_updated, "cached product is stale");
            }
        }

        let Some(raw) = self.source.get_product(barcode).await? else {
            info!("barcode not found in food database");
            return Err(ProductError::NotFound(barcode.to_string()));
        };

        let incoming = parse_lookup(&raw, barcode).map_err(FetchError::from)?;
        let saved = self.repo.upsert(incoming).await?;
        info!(
            id = %saved.product.id,
            outcome = ?saved.outcome,
            name = %saved.product.name,
            "product refreshed"
        );
        Ok(saved.product)
    }

    #[instrument(skip(self))]
    pub async fn search(&self, filter: SearchFilter, page: PageRequest) -> Result<ProductPage, ProductError> {
        let (items, total) = self.repo.search(&filter, page).await?;
        Ok(ProductPage {
            items,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages: total_pages(total, page.page_size),
        })
    }

    /// Pulls up to `limit` products of `category` from the food database and
    /// merges them into the store in one batch. Records without a barcode or
    /// name are skipped; records that fail to parse or save are counted as
    /// errors without affecting the rest.
    #[instrument(skip(self))]
    pub async fn seed(&self, category: &str, limit: u32) -> Result<SeedReport, ProductError> {
        let page_size = limit.min(self.seed_max_limit);
        info!(page_size, "seeding products");

        let (mut records, available) = self.source.search_products(category, page_size).await?;
        records.truncate(page_size as usize);
        debug!(received = records.len(), available, "category listing received");

        let mut report = SeedReport {
            total_processed: records.len(),
            ..SeedReport::default()
        };

        let mut batch = Vec::with_capacity(records.len());
        for raw in &records {
            if raw.barcode().is_none() || raw.display_name().is_none() {
                report.skipped += 1;
                continue;
            }
            match parse_product(raw) {
                Ok(p) => batch.push(p),
                Err(e) => {
                    warn!(barcode = ?raw.barcode(), error = %e, "skipping unparsable product");
                    report.errors += 1;
                }
            }
        }

        for result in self.repo.upsert_batch(batch).await? {
            match result {
                Ok(done) if done.outcome == UpsertOutcome::Inserted => report.added += 1,
                Ok(_) => report.updated += 1,
                Err(e) => {
                    warn!(error = %e, "product not saved");
                    report.errors += 1;
                }
            }
        }

        info!(
            total = report.total_processed,
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors,
            "seeding finished"
        );
        Ok(report)
    }
}
