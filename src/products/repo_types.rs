use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const DEFAULT_DATA_SOURCE: &str = "openfoodfacts";

#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub barcode: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub package_size: Option<f64>,
    pub serving_size: Option<f64>,
    pub servings_per_package: Option<f64>,
    pub image_url: Option<String>,
    pub ingredients_text: Option<String>,
    pub ingredients_list: Option<serde_json::Value>,
    pub allergens: Option<Vec<String>>,
    pub is_vegan: Option<bool>,
    pub is_vegetarian: Option<bool>,
    pub is_gluten_free: Option<bool>,
    pub data_source: String,
    pub data_quality_score: Option<f64>,
    pub raw_data: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_updated: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct NutritionRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub calories_100g: Option<f64>,
    pub carbs_100g: Option<f64>,
    pub sugar_100g: Option<f64>,
    pub fiber_100g: Option<f64>,
    pub protein_100g: Option<f64>,
    pub fat_100g: Option<f64>,
    pub saturated_fat_100g: Option<f64>,
    pub trans_fat_100g: Option<f64>,
    pub sodium_100g: Option<f64>,
    pub salt_100g: Option<f64>,
    pub general_health_score: Option<f64>,
    pub nutri_grade: Option<String>,
}

/// A stored product together with its nutrition sub-record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub barcode: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub package_size: Option<f64>,
    pub serving_size: Option<f64>,
    pub servings_per_package: Option<f64>,
    pub image_url: Option<String>,
    pub ingredients_text: Option<String>,
    pub ingredients_list: Option<serde_json::Value>,
    pub allergens: Option<Vec<String>>,
    pub is_vegan: Option<bool>,
    pub is_vegetarian: Option<bool>,
    pub is_gluten_free: Option<bool>,
    pub data_source: String,
    pub data_quality_score: Option<f64>,
    pub raw_data: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub normalized_nutrition: Option<NormalizedNutrition>,
}

/// Per-100g values. Sodium is in milligrams, salt in grams.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedNutrition {
    #[serde(skip_serializing)]
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub product_id: Uuid,
    pub calories_100g: Option<f64>,
    pub carbs_100g: Option<f64>,
    pub sugar_100g: Option<f64>,
    pub fiber_100g: Option<f64>,
    pub protein_100g: Option<f64>,
    pub fat_100g: Option<f64>,
    pub saturated_fat_100g: Option<f64>,
    pub trans_fat_100g: Option<f64>,
    pub sodium_100g: Option<f64>,
    pub salt_100g: Option<f64>,
    pub general_health_score: Option<f64>,
    pub nutri_grade: Option<String>,
}

/// A normalized product as produced from an external payload, before it is
/// reconciled with whatever is stored under the same barcode.
///
/// `None` means "not supplied by the source"; merging never clears a stored
/// value with it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewProduct {
    pub barcode: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub package_size: Option<f64>,
    pub serving_size: Option<f64>,
    pub servings_per_package: Option<f64>,
    pub image_url: Option<String>,
    pub ingredients_text: Option<String>,
    pub ingredients_list: Option<serde_json::Value>,
    pub allergens: Option<Vec<String>>,
    pub is_vegan: Option<bool>,
    pub is_vegetarian: Option<bool>,
    pub is_gluten_free: Option<bool>,
    pub data_source: String,
    pub data_quality_score: Option<f64>,
    pub raw_data: Option<serde_json::Value>,
    pub nutrition: Option<NewNutrition>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewNutrition {
    pub calories_100g: Option<f64>,
    pub carbs_100g: Option<f64>,
    pub sugar_100g: Option<f64>,
    pub fiber_100g: Option<f64>,
    pub protein_100g: Option<f64>,
    pub fat_100g: Option<f64>,
    pub saturated_fat_100g: Option<f64>,
    pub trans_fat_100g: Option<f64>,
    pub sodium_100g: Option<f64>,
    pub salt_100g: Option<f64>,
    pub general_health_score: Option<f64>,
    pub nutri_grade: Option<String>,
}

impl NewNutrition {
    pub fn is_empty(&self) -> bool {
        *self == NewNutrition::default()
    }
}

impl From<NutritionRow> for NormalizedNutrition {
    fn from(r: NutritionRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            calories_100g: r.calories_100g,
            carbs_100g: r.carbs_100g,
            sugar_100g: r.sugar_100g,
            fiber_100g: r.fiber_100g,
            protein_100g: r.protein_100g,
            fat_100g: r.fat_100g,
            saturated_fat_100g: r.saturated_fat_100g,
            trans_fat_100g: r.trans_fat_100g,
            sodium_100g: r.sodium_100g,
            salt_100g: r.salt_100g,
            general_health_score: r.general_health_score,
            nutri_grade: r.nutri_grade,
        }
    }
}

impl From<(ProductRow, Option<NutritionRow>)> for Product {
    fn from((r, nutrition): (ProductRow, Option<NutritionRow>)) -> Self {
        Self {
            id: r.id,
            barcode: r.barcode,
            name: r.name,
            brand: r.brand,
            category: r.category,
            package_size: r.package_size,
            serving_size: r.serving_size,
            servings_per_package: r.servings_per_package,
            image_url: r.image_url,
            ingredients_text: r.ingredients_text,
            ingredients_list: r.ingredients_list,
            allergens: r.allergens,
            is_vegan: r.is_vegan,
            is_vegetarian: r.is_vegetarian,
            is_gluten_free: r.is_gluten_free,
            data_source: r.data_source,
            data_quality_score: r.data_quality_score,
            raw_data: r.raw_data,
            created_at: r.created_at,
            updated_at: r.updated_at,
            last_updated: r.last_updated,
            normalized_nutrition: nutrition.map(NormalizedNutrition::from),
        }
    }
}
