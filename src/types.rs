//! Product records flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::extractor::SourceName;
use crate::normalizer::Specs;

/// Price per marketplace. `-1` marks a listing that is known but unpriced.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Prices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_com: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon_uk: Option<f64>,
}

impl Prices {
    /// Price for the given marketplace
    pub fn get(&self, marketplace: Marketplace) -> Option<f64> {
        match marketplace {
            Marketplace::AmazonCom => self.amazon_com,
            Marketplace::AmazonUk => self.amazon_uk,
        }
    }

    /// Merge another price table into this one, `other` wins per key
    pub fn merge(&mut self, other: &Prices) {
        if other.amazon_com.is_some() {
            self.amazon_com = other.amazon_com;
        }
        if other.amazon_uk.is_some() {
            self.amazon_uk = other.amazon_uk;
        }
    }
}

/// Purchase URL per marketplace
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MarketplaceUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub com: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uk: Option<String>,
}

impl MarketplaceUrls {
    /// URL for the given marketplace, empty strings count as missing
    pub fn get(&self, marketplace: Marketplace) -> Option<&str> {
        let url = match marketplace {
            Marketplace::AmazonCom => self.com.as_deref(),
            Marketplace::AmazonUk => self.uk.as_deref(),
        };
        url.filter(|u| !u.is_empty())
    }

    pub fn merge(&mut self, other: &MarketplaceUrls) {
        if other.com.is_some() {
            self.com = other.com.clone();
        }
        if other.uk.is_some() {
            self.uk = other.uk.clone();
        }
    }
}

/// Supported marketplaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marketplace {
    #[default]
    AmazonCom,
    AmazonUk,
}

impl std::str::FromStr for Marketplace {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amazon_com" | "com" | "us" => Ok(Marketplace::AmazonCom),
            "amazon_uk" | "uk" => Ok(Marketplace::AmazonUk),
            other => anyhow::bail!("Unknown marketplace: {}", other),
        }
    }
}

/// Scraped or seed product record.
///
/// Fields the pipeline does not know about are kept in `extra` so a record
/// that cannot be processed is written back exactly as it was read.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub brand: String,
    /// Full listing title
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub price: Prices,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_specs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub popularity: u32,
    #[serde(default)]
    pub amazon_url: MarketplaceUrls,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which source, pattern and confidence produced a final value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceUsage {
    pub source: SourceName,
    pub confidence: f64,
    pub pattern: String,
}

/// Debug information attached to every processed product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    pub processing_timestamp: DateTime<Utc>,
    /// group -> attribute -> usage
    pub sources_used: BTreeMap<String, BTreeMap<String, SourceUsage>>,
}

/// Raw product enriched with canonical specifications
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedProduct {
    #[serde(flatten)]
    pub product: RawProduct,
    pub specs: Specs,
    pub clean_model_name: String,
    pub extraction_metadata: ExtractionMetadata,
}

/// One entry of a processed catalog: either fully processed, or the
/// original record passed through after a processing failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ProductRecord {
    Normalized(Box<NormalizedProduct>),
    Raw(RawProduct),
}

impl ProductRecord {
    pub fn popularity(&self) -> u32 {
        match self {
            ProductRecord::Normalized(p) => p.product.popularity,
            ProductRecord::Raw(p) => p.popularity,
        }
    }

    pub fn as_normalized(&self) -> Option<&NormalizedProduct> {
        match self {
            ProductRecord::Normalized(p) => Some(p),
            ProductRecord::Raw(_) => None,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Filtered product listing response
#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub count: usize,
    pub products: Vec<NormalizedProduct>,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
