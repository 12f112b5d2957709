use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::models::Product;

/// JSON body for product create/update. Multipart forms are decoded into
/// [`crate::extract::ProductForm`] instead.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductPayload {
    pub name: Option<String>,
    pub price: Option<i64>,
    /// Absent leaves the category unchanged; `null` removes it.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i64>, nullable)]
    pub category_id: Option<Option<i64>>,
    /// Path of an already uploaded image.
    pub image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductList {
    pub items: Vec<Product>,
}

/// Keeps an explicit `null` apart from a missing field.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}
