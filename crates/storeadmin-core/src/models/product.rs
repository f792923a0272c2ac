use serde::{Deserialize, Serialize};

use super::Category;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub category: Option<Category>,
}

impl Product {
    pub fn price_display(&self) -> String {
        format!("${:.2}", self.price)
    }

    pub fn category_name(&self) -> &str {
        self.category.as_ref().map(|c| c.name.as_str()).unwrap_or("-")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProduct {
    pub title: String,
    pub price: f64,
    pub description: String,
    #[serde(rename = "categoryId")]
    pub category_id: i64,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "categoryId", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

/// Query filters for the product list endpoint
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub title: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub category_id: Option<i64>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl ProductFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref title) = self.title {
            pairs.push(("title", title.clone()));
        }
        if let Some(min) = self.price_min {
            pairs.push(("price_min", min.to_string()));
        }
        if let Some(max) = self.price_max {
            pairs.push(("price_max", max.to_string()));
        }
        if let Some(id) = self.category_id {
            pairs.push(("categoryId", id.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}
