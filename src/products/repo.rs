use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Connection, PgConnection, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use super::reconcile::{merge_product, new_product};
use super::repo_types::{NewProduct, NormalizedNutrition, NutritionRow, Product, ProductRow};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("product {0} disappeared while being upserted")]
    Conflict(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone)]
pub struct Upserted {
    pub product: Product,
    pub outcome: UpsertOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Matched against name, brand and category.
    pub query: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError>;

    /// Merge-or-insert one product in its own transaction.
    async fn upsert(&self, incoming: NewProduct) -> Result<Upserted, StoreError>;

    /// Merge-or-insert every entry inside one transaction. A failing entry is
    /// rolled back on its own and reported in its slot; the outer `Err` is
    /// reserved for failures of the batch transaction itself.
    async fn upsert_batch(
        &self,
        batch: Vec<NewProduct>,
    ) -> Result<Vec<Result<Upserted, StoreError>>, StoreError>;

    /// Returns one page of matches and the total match count.
    async fn search(
        &self,
        filter: &SearchFilter,
        page: PageRequest,
    ) -> Result<(Vec<Product>, u64), StoreError>;
}

const PRODUCT_COLUMNS: &str = "id, barcode, name, brand, category, package_size, serving_size, \
     servings_per_package, image_url, ingredients_text, ingredients_list, allergens, is_vegan, \
     is_vegetarian, is_gluten_free, data_source, data_quality_score, raw_data, created_at, \
     updated_at, last_updated";

const NUTRITION_COLUMNS: &str = "id, product_id, calories_100g, carbs_100g, sugar_100g, \
     fiber_100g, protein_100g, fat_100g, saturated_fat_100g, trans_fat_100g, sodium_100g, \
     salt_100g, general_health_score, nutri_grade";

#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn find_by_barcode(&self, barcode: &str) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        load_product(&mut conn, barcode, false).await
    }

    async fn upsert(&self, incoming: NewProduct) -> Result<Upserted, StoreError> {
        let mut tx = self.pool.begin().await?;
        let done = upsert_in(&mut tx, incoming).await?;
        tx.commit().await?;
        Ok(done)
    }

    async fn upsert_batch(
        &self,
        batch: Vec<NewProduct>,
    ) -> Result<Vec<Result<Upserted, StoreError>>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(batch.len());

        for incoming in batch {
            let barcode = incoming.barcode.clone();
            let mut savepoint = Connection::begin(&mut *tx).await?;
            match upsert_in(&mut savepoint, incoming).await {
                Ok(done) => {
                    savepoint.commit().await?;
                    results.push(Ok(done));
                }
                Err(e) => {
                    warn!(%barcode, error = %e, "batch entry rolled back");
                    savepoint.rollback().await?;
                    results.push(Err(e));
                }
            }
        }

        tx.commit().await?;
        Ok(results)
    }

    async fn search(
        &self,
        filter: &SearchFilter,
        page: PageRequest,
    ) -> Result<(Vec<Product>, u64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY name ASC, id ASC LIMIT ")
            .push_bind(i64::from(page.page_size))
            .push(" OFFSET ")
            .push_bind(page.offset());
        let rows: Vec<ProductRow> = select.build_query_as().fetch_all(&self.pool).await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut nutrition: HashMap<Uuid, NutritionRow> = if ids.is_empty() {
            HashMap::new()
        } else {
            sqlx::query_as::<_, NutritionRow>(&format!(
                "SELECT {NUTRITION_COLUMNS} FROM normalized_nutrition WHERE product_id = ANY($1)"
            ))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|n| (n.product_id, n))
            .collect()
        };

        let items = rows
            .into_iter()
            .map(|r| {
                let n = nutrition.remove(&r.id);
                Product::from((r, n))
            })
            .collect();
        Ok((items, u64::try_from(total).unwrap_or(0)))
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &SearchFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = filter.query.as_deref() {
        let pattern = like_pattern(q);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR brand ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR category ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(c) = filter.category.as_deref() {
        qb.push(" AND category ILIKE ").push_bind(like_pattern(c));
    }
}

/// Substring pattern for ILIKE with the user's `%`, `_` and `\` taken literally.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

async fn load_product(
    conn: &mut PgConnection,
    barcode: &str,
    for_update: bool,
) -> Result<Option<Product>, StoreError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE barcode = $1{lock}"
    ))
    .bind(barcode)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let nutrition = sqlx::query_as::<_, NutritionRow>(&format!(
        "SELECT {NUTRITION_COLUMNS} FROM normalized_nutrition WHERE product_id = $1"
    ))
    .bind(row.id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(Some(Product::from((row, nutrition))))
}

async fn upsert_in(conn: &mut PgConnection, incoming: NewProduct) -> Result<Upserted, StoreError> {
    let now = OffsetDateTime::now_utc();
    let barcode = incoming.barcode.clone();

    if let Some(mut existing) = load_product(conn, &barcode, true).await? {
        merge_product(&mut existing, incoming, now);
        update_product(conn, &existing).await?;
        return Ok(Upserted {
            product: existing,
            outcome: UpsertOutcome::Updated,
        });
    }

    let fresh = new_product(incoming.clone(), now);
    if insert_product(conn, &fresh).await? {
        debug!(%barcode, id = %fresh.id, "product inserted");
        return Ok(Upserted {
            product: fresh,
            outcome: UpsertOutcome::Inserted,
        });
    }

    // Lost an insert race for this barcode; fold into the winner's row.
    let mut existing = load_product(conn, &barcode, true)
        .await?
        .ok_or_else(|| StoreError::Conflict(barcode.clone()))?;
    merge_product(&mut existing, incoming, now);
    update_product(conn, &existing).await?;
    Ok(Upserted {
        product: existing,
        outcome: UpsertOutcome::Updated,
    })
}

async fn insert_product(conn: &mut PgConnection, p: &Product) -> Result<bool, StoreError> {
    let done = sqlx::query(&format!(
        r#"
        INSERT INTO products ({PRODUCT_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
        ON CONFLICT (barcode) DO NOTHING
        "#
    ))
    .bind(p.id)
    .bind(&p.barcode)
    .bind(&p.name)
    .bind(&p.brand)
    .bind(&p.category)
    .bind(p.package_size)
    .bind(p.serving_size)
    .bind(p.servings_per_package)
    .bind(&p.image_url)
    .bind(&p.ingredients_text)
    .bind(&p.ingredients_list)
    .bind(&p.allergens)
    .bind(p.is_vegan)
    .bind(p.is_vegetarian)
    .bind(p.is_gluten_free)
    .bind(&p.data_source)
    .bind(p.data_quality_score)
    .bind(&p.raw_data)
    .bind(p.created_at)
    .bind(p.updated_at)
    .bind(p.last_updated)
    .execute(&mut *conn)
    .await?;

    if done.rows_affected() == 0 {
        return Ok(false);
    }
    if let Some(n) = &p.normalized_nutrition {
        save_nutrition(conn, n).await?;
    }
    Ok(true)
}

async fn update_product(conn: &mut PgConnection, p: &Product) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE products
           SET barcode = $2, name = $3, brand = $4, category = $5, package_size = $6,
               serving_size = $7, servings_per_package = $8, image_url = $9,
               ingredients_text = $10, ingredients_list = $11, allergens = $12,
               is_vegan = $13, is_vegetarian = $14, is_gluten_free = $15,
               data_source = $16, data_quality_score = $17, raw_data = $18,
               updated_at = $19, last_updated = $20
         WHERE id = $1
        "#,
    )
    .bind(p.id)
    .bind(&p.barcode)
    .bind(&p.name)
    .bind(&p.brand)
    .bind(&p.category)
    .bind(p.package_size)
    .bind(p.serving_size)
    .bind(p.servings_per_package)
    .bind(&p.image_url)
    .bind(&p.ingredients_text)
    .bind(&p.ingredients_list)
    .bind(&p.allergens)
    .bind(p.is_vegan)
    .bind(p.is_vegetarian)
    .bind(p.is_gluten_free)
    .bind(&p.data_source)
    .bind(p.data_quality_score)
    .bind(&p.raw_data)
    .bind(p.updated_at)
    .bind(p.last_updated)
    .execute(&mut *conn)
    .await?;

    if let Some(n) = &p.normalized_nutrition {
        save_nutrition(conn, n).await?;
    }
    Ok(())
}

async fn save_nutrition(conn: &mut PgConnection, n: &NormalizedNutrition) -> Result<(), StoreError> {
    sqlx::query(&format!(
        r#"
        INSERT INTO normalized_nutrition ({NUTRITION_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        ON CONFLICT (product_id) DO UPDATE
           SET calories_100g = EXCLUDED.calories_100g,
               carbs_100g = EXCLUDED.carbs_100g,
               sugar_100g = EXCLUDED.sugar_100g,
               fiber_100g = EXCLUDED.fiber_100g,
               protein_100g = EXCLUDED.protein_100g,
               fat_100g = EXCLUDED.fat_100g,
               saturated_fat_100g = EXCLUDED.saturated_fat_100g,
               trans_fat_100g = EXCLUDED.trans_fat_100g,
               sodium_100g = EXCLUDED.sodium_100g,
               salt_100g = EXCLUDED.salt_100g,
               general_health_score = EXCLUDED.general_health_score,
               nutri_grade = EXCLUDED.nutri_grade
        "#
    ))
    .bind(n.id)
    .bind(n.product_id)
    .bind(n.calories_100g)
    .bind(n.carbs_100g)
    .bind(n.sugar_100g)
    .bind(n.fiber_100g)
    .bind(n.protein_100g)
    .bind(n.fat_100g)
    .bind(n.saturated_fat_100g)
    .bind(n.trans_fat_100g)
    .bind(n.sodium_100g)
    .bind(n.salt_100g)
    .bind(n.general_health_score)
    .bind(&n.nutri_grade)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
