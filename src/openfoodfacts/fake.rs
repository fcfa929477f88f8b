use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{FetchError, FoodDataSource, RawProduct};

/// Scripted food database: answers from what the test put in and counts calls.
#[derive(Default)]
pub struct FakeFoodSource {
    products: Mutex<HashMap<String, RawProduct>>,
    listing: Mutex<Vec<RawProduct>>,
    offline: AtomicBool,
    lookups: AtomicUsize,
    listings: AtomicUsize,
}

impl FakeFoodSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, barcode: &str, raw: RawProduct) {
        self.products.lock().unwrap().insert(barcode.to_string(), raw);
    }

    pub fn remove(&self, barcode: &str) {
        self.products.lock().unwrap().remove(barcode);
    }

    pub fn set_listing(&self, raws: Vec<RawProduct>) {
        *self.listing.lock().unwrap() = raws;
    }

    /// Every call fails as if the network were down.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FoodDataSource for FakeFoodSource {
    async fn get_product(&self, barcode: &str) -> Result<Option<RawProduct>, FetchError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Status(503));
        }
        Ok(self.products.lock().unwrap().get(barcode).cloned())
    }

    async fn search_products(
        &self,
        _category: &str,
        page_size: u32,
    ) -> Result<(Vec<RawProduct>, u64), FetchError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Status(503));
        }
        let all = self.listing.lock().unwrap().clone();
        let total = all.len() as u64;
        Ok((all.into_iter().take(page_size as usize).collect(), total))
    }
}
