use crate::config::PaginationConfig;
use crate::error::ProductError;

use super::dto::{SearchQuery, SeedQuery};
use super::repo::{PageRequest, SearchFilter};

const MAX_BARCODE_LEN: usize = 50;
const MIN_QUERY_LEN: usize = 2;
const MIN_CATEGORY_LEN: usize = 2;
const DEFAULT_SEED_LIMIT: u32 = 100;

pub fn validate_barcode(barcode: &str) -> Result<(), ProductError> {
    if barcode.is_empty() || barcode.len() > MAX_BARCODE_LEN {
        return Err(ProductError::Validation(format!(
            "Barcode must be between 1 and {MAX_BARCODE_LEN} characters"
        )));
    }
    if !barcode.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ProductError::Validation(
            "Barcode may only contain letters, digits and '-'".into(),
        ));
    }
    Ok(())
}

impl SearchQuery {
    /// Checks the raw query string and turns it into a storage filter and page.
    pub fn into_request(
        self,
        pagination: &PaginationConfig,
    ) -> Result<(SearchFilter, PageRequest), ProductError> {
        let query = trimmed(self.q);
        let category = trimmed(self.category);

        if query.is_none() && category.is_none() {
            return Err(ProductError::Validation(
                "At least one of 'q' or 'category' parameters is required".into(),
            ));
        }
        if let Some(q) = &query {
            if q.chars().count() < MIN_QUERY_LEN {
                return Err(ProductError::Validation(format!(
                    "'q' must be at least {MIN_QUERY_LEN} characters long"
                )));
            }
        }

        let page = in_range(self.page, 1, i64::from(u32::MAX), "page")?.unwrap_or(1);
        let page_size = in_range(
            self.page_size,
            1,
            i64::from(pagination.max_page_size),
            "page_size",
        )?
        .unwrap_or(pagination.default_page_size);

        Ok((SearchFilter { query, category }, PageRequest { page, page_size }))
    }
}

impl SeedQuery {
    pub fn limit(&self, max: u32) -> Result<u32, ProductError> {
        Ok(in_range(self.limit, 1, i64::from(max), "limit")?.unwrap_or(DEFAULT_SEED_LIMIT.min(max)))
    }
}

pub fn validate_category(category: &str) -> Result<String, ProductError> {
    let category = category.trim();
    if category.chars().count() < MIN_CATEGORY_LEN {
        return Err(ProductError::Validation(format!(
            "Category must be at least {MIN_CATEGORY_LEN} characters long"
        )));
    }
    Ok(category.to_string())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn in_range(value: Option<i64>, min: i64, max: i64, name: &str) -> Result<Option<u32>, ProductError> {
    match value {
        None => Ok(None),
        Some(v) if (min..=max).contains(&v) => Ok(u32::try_from(v).ok()),
        Some(_) => Err(ProductError::Validation(format!(
            "'{name}' must be between {min} and {max}"
        ))),
    }
}
