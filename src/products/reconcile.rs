use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::{NewNutrition, NewProduct, NormalizedNutrition, Product};

/// Builds the record stored for a barcode seen for the first time.
pub fn new_product(incoming: NewProduct, now: OffsetDateTime) -> Product {
    let now = truncate_to_micros(now);
    let id = Uuid::new_v4();
    let normalized_nutrition = incoming.nutrition.map(|n| new_nutrition(id, n));
    Product {
        id,
        barcode: incoming.barcode,
        name: incoming.name,
        brand: incoming.brand,
        category: incoming.category,
        package_size: incoming.package_size,
        serving_size: incoming.serving_size,
        servings_per_package: incoming.servings_per_package,
        image_url: incoming.image_url,
        ingredients_text: incoming.ingredients_text,
        ingredients_list: incoming.ingredients_list,
        allergens: incoming.allergens,
        is_vegan: incoming.is_vegan,
        is_vegetarian: incoming.is_vegetarian,
        is_gluten_free: incoming.is_gluten_free,
        data_source: incoming.data_source,
        data_quality_score: incoming.data_quality_score,
        raw_data: incoming.raw_data,
        created_at: now,
        updated_at: now,
        last_updated: now,
        normalized_nutrition,
    }
}

/// Folds freshly fetched data into an existing record in place.
///
/// Identity (`id`, `created_at`, nutrition `id`) is kept. Every value the
/// source supplied overwrites the stored one; values it left out stay as
/// they were.
pub fn merge_product(existing: &mut Product, incoming: NewProduct, now: OffsetDateTime) {
    existing.barcode = incoming.barcode;
    existing.name = incoming.name;
    existing.data_source = incoming.data_source;
    overwrite(&mut existing.brand, incoming.brand);
    overwrite(&mut existing.category, incoming.category);
    overwrite(&mut existing.package_size, incoming.package_size);
    overwrite(&mut existing.serving_size, incoming.serving_size);
    overwrite(&mut existing.servings_per_package, incoming.servings_per_package);
    overwrite(&mut existing.image_url, incoming.image_url);
    overwrite(&mut existing.ingredients_text, incoming.ingredients_text);
    overwrite(&mut existing.ingredients_list, incoming.ingredients_list);
    overwrite(&mut existing.allergens, incoming.allergens);
    overwrite(&mut existing.is_vegan, incoming.is_vegan);
    overwrite(&mut existing.is_vegetarian, incoming.is_vegetarian);
    overwrite(&mut existing.is_gluten_free, incoming.is_gluten_free);
    overwrite(&mut existing.data_quality_score, incoming.data_quality_score);
    overwrite(&mut existing.raw_data, incoming.raw_data);

    if let Some(n) = incoming.nutrition {
        match existing.normalized_nutrition.as_mut() {
            Some(current) => merge_nutrition(current, n),
            None => existing.normalized_nutrition = Some(new_nutrition(existing.id, n)),
        }
    }

    let stamp = advance(existing.last_updated, now);
    existing.last_updated = stamp;
    existing.updated_at = stamp;
}

fn merge_nutrition(current: &mut NormalizedNutrition, n: NewNutrition) {
    overwrite(&mut current.calories_100g, n.calories_100g);
    overwrite(&mut current.carbs_100g, n.carbs_100g);
    overwrite(&mut current.sugar_100g, n.sugar_100g);
    overwrite(&mut current.fiber_100g, n.fiber_100g);
    overwrite(&mut current.protein_100g, n.protein_100g);
    overwrite(&mut current.fat_100g, n.fat_100g);
    overwrite(&mut current.saturated_fat_100g, n.saturated_fat_100g);
    overwrite(&mut current.trans_fat_100g, n.trans_fat_100g);
    overwrite(&mut current.sodium_100g, n.sodium_100g);
    overwrite(&mut current.salt_100g, n.salt_100g);
    overwrite(&mut current.general_health_score, n.general_health_score);
    overwrite(&mut current.nutri_grade, n.nutri_grade);
}

fn new_nutrition(product_id: Uuid, n: NewNutrition) -> NormalizedNutrition {
    NormalizedNutrition {
        id: Uuid::new_v4(),
        product_id,
        calories_100g: n.calories_100g,
        carbs_100g: n.carbs_100g,
        sugar_100g: n.sugar_100g,
        fiber_100g: n.fiber_100g,
        protein_100g: n.protein_100g,
        fat_100g: n.fat_100g,
        saturated_fat_100g: n.saturated_fat_100g,
        trans_fat_100g: n.trans_fat_100g,
        sodium_100g: n.sodium_100g,
        salt_100g: n.salt_100g,
        general_health_score: n.general_health_score,
        nutri_grade: n.nutri_grade,
    }
}

fn overwrite<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

// Postgres keeps microseconds; a refresh within the same microsecond (or a
// clock step backwards) must still move last_updated forward.
fn advance(previous: OffsetDateTime, now: OffsetDateTime) -> OffsetDateTime {
    let now = truncate_to_micros(now);
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Drops sub-microsecond precision so in-memory values equal what the
/// database hands back.
pub fn truncate_to_micros(ts: OffsetDateTime) -> OffsetDateTime {
    let nanos = ts.nanosecond();
    ts.replace_nanosecond(nanos - nanos % 1_000).unwrap_or(ts)
}
