use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::reconcile::{merge_product, new_product};
use super::repo::{PageRequest, ProductRepository, SearchFilter, StoreError, UpsertOutcome, Upserted};
use super::repo_types::{NewProduct, Product};

/// Process-local stand-in for the Postgres repository, with the same merge
/// rules and transaction shape.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: Mutex<Vec<Product>>,
    failing_barcodes: Mutex<HashSet<String>>,
    reads: Mutex<usize>,
    searches: Mutex<usize>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, product: Product) {
        self.products.lock().unwrap().push(product);
    }

    /// Writes for this barcode fail as if the database rejected them.
    pub fn fail_writes_for(&self, barcode: &str) {
        self.failing_barcodes.lock().unwrap().insert(barcode.to_string());
    }

    pub fn all(&self) -> Vec<Product> {
        self.products.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }

    pub fn searches(&self) -> usize {
        *self.searches.lock().unwrap()
    }

    fn apply(&self, rows: &mut Vec<Product>, incoming: NewProduct) -> Result<Upserted, StoreError> {
        if self.failing_barcodes.lock().unwrap().contains(&incoming.barcode) {
            return Err(StoreError::Database(sqlx::Error::Protocol(format!(
                "simulated write failure for {}",
                incoming.barcode
            ))));
        }
        let now = OffsetDateTime::now_utc();
        if let Some(existing) = rows.iter_mut().find(|p| p.barcode == incoming.barcode) {
            merge_product(existing, incoming, now);
            return Ok(Upserted {
                product: existing.clone(),
                outcome: UpsertOutcome::Updated,
            });
        }
        let fresh = new_product(incoming, now);
        rows.push(fresh.clone());
        Ok(Upserted {
            product: fresh,
            outcome: UpsertOutcome::Inserted,
        })
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        *self.reads.lock().unwrap() += 1;
        let rows = self.products.lock().unwrap();
        Ok(rows.iter().find(|p| p.barcode == barcode).cloned())
    }

    async fn upsert(&self, incoming: NewProduct) -> Result<Upserted, StoreError> {
        let mut rows = self.products.lock().unwrap();
        let mut staged = rows.clone();
        let done = self.apply(&mut staged, incoming)?;
        *rows = staged;
        Ok(done)
    }

    async fn upsert_batch(
        &self,
        batch: Vec<NewProduct>,
    ) -> Result<Vec<Result<Upserted, StoreError>>, StoreError> {
        let mut rows = self.products.lock().unwrap();
        let mut staged = rows.clone();
        let results = batch
            .into_iter()
            .map(|incoming| self.apply(&mut staged, incoming))
            .collect();
        *rows = staged;
        Ok(results)
    }

    async fn search(
        &self,
        filter: &SearchFilter,
        page: PageRequest,
    ) -> Result<(Vec<Product>, u64), StoreError> {
        *self.searches.lock().unwrap() += 1;
        let rows = self.products.lock().unwrap();
        let mut hits: Vec<Product> = rows
            .iter()
            .filter(|p| {
                filter.query.as_deref().map_or(true, |q| {
                    contains_ci(Some(&p.name), q)
                        || contains_ci(p.brand.as_deref(), q)
                        || contains_ci(p.category.as_deref(), q)
                })
            })
            .filter(|p| {
                filter
                    .category
                    .as_deref()
                    .map_or(true, |c| contains_ci(p.category.as_deref(), c))
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let total = hits.len() as u64;
        let items = hits
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();
        Ok((items, total))
    }
}
