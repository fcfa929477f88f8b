//! Open Food Facts product objects → [`NewProduct`].

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::RawProduct;
use crate::products::repo_types::{NewNutrition, NewProduct, DEFAULT_DATA_SOURCE};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("product payload is missing `{0}`")]
    MissingField(&'static str),
    #[error("product payload is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OffProduct {
    code: Option<String>,
    product_name: Option<String>,
    brands: Option<String>,
    categories: Option<String>,
    quantity: Option<String>,
    product_quantity: Option<Value>,
    serving_size: Option<String>,
    serving_quantity: Option<Value>,
    image_url: Option<String>,
    image_front_url: Option<String>,
    ingredients_text: Option<String>,
    ingredients: Option<Vec<Value>>,
    allergens_tags: Option<Vec<String>>,
    ingredients_analysis_tags: Option<Vec<String>>,
    labels_tags: Option<Vec<String>>,
    nutriments: Option<Map<String, Value>>,
    nutriscore_grade: Option<String>,
    nutriscore_score: Option<Value>,
    completeness: Option<Value>,
}

pub fn parse_product(raw: &RawProduct) -> Result<NewProduct, ParseError> {
    let off: OffProduct = serde_json::from_value(raw.0.clone())?;
    let barcode = non_blank(off.code.clone()).ok_or(ParseError::MissingField("code"))?;
    normalize(raw, off, barcode)
}

/// Parses the answer to a lookup of `requested`. The product is keyed on the
/// barcode that was asked for, whatever `code` the payload carries.
pub fn parse_lookup(raw: &RawProduct, requested: &str) -> Result<NewProduct, ParseError> {
    let off: OffProduct = serde_json::from_value(raw.0.clone())?;
    normalize(raw, off, requested.to_string())
}

fn normalize(raw: &RawProduct, off: OffProduct, barcode: String) -> Result<NewProduct, ParseError> {
    let name = non_blank(off.product_name).ok_or(ParseError::MissingField("product_name"))?;
    let brand = off.brands.as_deref().and_then(first_entry);
    let category = off.categories.as_deref().and_then(last_entry);
    let image_url = non_blank(off.image_url).or_else(|| non_blank(off.image_front_url));
    let ingredients_text = non_blank(off.ingredients_text);

    let package_size = off
        .product_quantity
        .as_ref()
        .and_then(number)
        .or_else(|| off.quantity.as_deref().and_then(parse_quantity))
        .filter(|v| *v > 0.0);
    let serving_size = off
        .serving_quantity
        .as_ref()
        .and_then(number)
        .or_else(|| off.serving_size.as_deref().and_then(parse_quantity))
        .filter(|v| *v > 0.0);
    let servings_per_package = match (package_size, serving_size) {
        (Some(pkg), Some(serving)) => Some(round_to(pkg / serving, 2)),
        _ => None,
    };

    let allergens: Option<Vec<String>> = off
        .allergens_tags
        .map(|tags| tags.iter().map(|t| strip_lang(t).to_string()).collect());
    let analysis = off.ingredients_analysis_tags.unwrap_or_default();
    let is_vegan = tri_state(&analysis, "en:vegan", "en:non-vegan");
    let is_vegetarian = tri_state(&analysis, "en:vegetarian", "en:non-vegetarian");
    let is_gluten_free = off.labels_tags.as_ref().and_then(|labels| {
        labels
            .iter()
            .any(|l| l == "en:no-gluten" || l == "en:gluten-free")
            .then_some(true)
    });

    let nutrition = nutrition(
        off.nutriments.as_ref(),
        off.nutriscore_score.as_ref().and_then(number),
        off.nutriscore_grade.as_deref(),
    );

    let data_quality_score = off
        .completeness
        .as_ref()
        .and_then(number)
        .map(|c| round_to(c.clamp(0.0, 1.0), 2))
        .or_else(|| {
            let present = [
                brand.is_some(),
                category.is_some(),
                image_url.is_some(),
                ingredients_text.is_some(),
                package_size.is_some(),
                nutrition.is_some(),
            ];
            let hits = present.iter().filter(|p| **p).count() + 1;
            Some(round_to(hits as f64 / (present.len() + 1) as f64, 2))
        });

    Ok(NewProduct {
        barcode,
        name,
        brand,
        category,
        package_size,
        serving_size,
        servings_per_package,
        image_url,
        ingredients_text,
        ingredients_list: off.ingredients.map(Value::Array),
        allergens,
        is_vegan,
        is_vegetarian,
        is_gluten_free,
        data_source: DEFAULT_DATA_SOURCE.to_string(),
        data_quality_score,
        raw_data: Some(raw.0.clone()),
        nutrition,
    })
}

fn nutrition(
    nutriments: Option<&Map<String, Value>>,
    score: Option<f64>,
    grade: Option<&str>,
) -> Option<NewNutrition> {
    let get = |key: &str| nutriments.and_then(|m| m.get(key)).and_then(number);

    let calories = get("energy-kcal_100g").or_else(|| get("energy_100g").map(|kj| round_to(kj / 4.184, 1)));
    let n = NewNutrition {
        calories_100g: calories,
        carbs_100g: get("carbohydrates_100g"),
        sugar_100g: get("sugars_100g"),
        fiber_100g: get("fiber_100g"),
        protein_100g: get("proteins_100g"),
        fat_100g: get("fat_100g"),
        saturated_fat_100g: get("saturated-fat_100g"),
        trans_fat_100g: get("trans-fat_100g"),
        sodium_100g: get("sodium_100g").map(|g| round_to(g * 1000.0, 1)),
        salt_100g: get("salt_100g"),
        general_health_score: score.map(health_score),
        nutri_grade: grade.and_then(letter_grade).or_else(|| score.map(grade_from_score)),
    };
    (!n.is_empty()).then_some(n)
}

/// Nutri-Score points run from -15 (best) to 40 (worst); mapped onto 100..0.
fn health_score(points: f64) -> f64 {
    round_to(((40.0 - points) / 55.0 * 100.0).clamp(0.0, 100.0), 1)
}

fn grade_from_score(points: f64) -> String {
    let letter = match points {
        p if p <= -1.0 => "A",
        p if p <= 2.0 => "B",
        p if p <= 10.0 => "C",
        p if p <= 18.0 => "D",
        _ => "E",
    };
    letter.to_string()
}

fn letter_grade(raw: &str) -> Option<String> {
    let g = raw.trim().to_ascii_uppercase();
    matches!(g.as_str(), "A" | "B" | "C" | "D" | "E").then_some(g)
}

fn tri_state(tags: &[String], yes: &str, no: &str) -> Option<bool> {
    if tags.iter().any(|t| t == yes) {
        Some(true)
    } else if tags.iter().any(|t| t == no) {
        Some(false)
    } else {
        None
    }
}

fn strip_lang(tag: &str) -> &str {
    match tag.split_once(':') {
        Some((lang, rest)) if lang.len() == 2 => rest,
        _ => tag,
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn first_entry(list: &str) -> Option<String> {
    list.split(',').map(str::trim).find(|s| !s.is_empty()).map(str::to_string)
}

// Open Food Facts lists categories from generic to specific.
fn last_entry(list: &str) -> Option<String> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty()).last().map(str::to_string)
}

/// Numbers arrive as JSON numbers or as strings, sometimes with a decimal comma.
fn number(v: &Value) -> Option<f64> {
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Free-text quantity (`"500 g"`, `"2 x 125g"`, `"1,5 L"`) in grams or millilitres.
fn parse_quantity(text: &str) -> Option<f64> {
    lazy_static! {
        static ref QTY_RE: Regex =
            Regex::new(r"(?i)^\s*(?:(\d+)\s*[x×*]\s*)?(\d+(?:[.,]\d+)?)\s*(kg|mg|g|cl|dl|ml|l|oz)?\b")
                .unwrap();
    }
    let caps = QTY_RE.captures(text)?;
    let count: f64 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(1.0);
    let amount: f64 = caps.get(2)?.as_str().replace(',', ".").parse().ok()?;
    let factor = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("kg") | Some("l") => 1000.0,
        Some("dl") => 100.0,
        Some("cl") => 10.0,
        Some("mg") => 0.001,
        Some("oz") => 28.3495,
        _ => 1.0,
    };
    Some(round_to(count * amount * factor, 3))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
