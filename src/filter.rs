//! Filter and sort engine over processed products.
//!
//! Every active filter must pass (AND). Spec tokens use the
//! `category:property[:value]` syntax, plus `resolution:<value>`.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

use crate::types::{Marketplace, NormalizedProduct};

const SPEC_CATEGORIES: &[&str] = &[
    "video",
    "physical",
    "connectivity",
    "features",
    "storage",
    "additional",
];

/// Price bounds; `None` or `0` leaves a bound open
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceRange {
    fn active(bound: Option<f64>) -> Option<f64> {
        bound.filter(|b| *b != 0.0)
    }

    pub fn is_active(&self) -> bool {
        Self::active(self.min).is_some() || Self::active(self.max).is_some()
    }

    /// Products without a price pass
    pub fn contains(&self, price: Option<f64>) -> bool {
        let Some(price) = price else {
            return true;
        };
        if Self::active(self.min).is_some_and(|min| price < min) {
            return false;
        }
        if Self::active(self.max).is_some_and(|max| price > max) {
            return false;
        }
        true
    }
}

/// One specification filter token
#[derive(Debug, Clone, PartialEq)]
pub enum SpecFilter {
    /// `resolution:<value>`
    Resolution(String),
    /// `category:property`, truthy check
    Present { category: String, property: String },
    /// `category:property:N`, numeric at-least check
    AtLeast {
        category: String,
        property: String,
        threshold: f64,
    },
    /// `category:property:text`, case-insensitive equality
    Equals {
        category: String,
        property: String,
        value: String,
    },
}

impl FromStr for SpecFilter {
    type Err = anyhow::Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = token.trim().splitn(3, ':').collect();
        let category = parts.first().copied().unwrap_or_default();
        let property = parts.get(1).copied().unwrap_or_default();

        if category.is_empty() || property.is_empty() {
            bail!("Invalid spec filter '{}', expected category:property[:value]", token);
        }

        if category == "resolution" {
            return Ok(SpecFilter::Resolution(property.to_string()));
        }

        let category = category.to_string();
        let property = property.to_string();
        Ok(match parts.get(2).filter(|v| !v.is_empty()) {
            None => SpecFilter::Present { category, property },
            Some(value) => match value.parse::<f64>() {
                Ok(threshold) => SpecFilter::AtLeast {
                    category,
                    property,
                    threshold,
                },
                Err(_) => SpecFilter::Equals {
                    category,
                    property,
                    value: value.to_string(),
                },
            },
        })
    }
}

impl SpecFilter {
    pub fn matches(&self, product: &NormalizedProduct) -> bool {
        if let SpecFilter::Resolution(resolution) = self {
            return product.specs.video.resolution == *resolution
                || product.product.resolution.as_deref() == Some(resolution.as_str());
        }

        let Ok(specs) = serde_json::to_value(&product.specs) else {
            return false;
        };

        match self {
            SpecFilter::Present { category, property } => {
                lookup(&specs, category, property).is_some_and(truthy)
            }
            SpecFilter::AtLeast {
                category,
                property,
                threshold,
            } => lookup(&specs, category, property)
                .and_then(Value::as_f64)
                .is_some_and(|v| v >= *threshold),
            SpecFilter::Equals {
                category,
                property,
                value,
            } => lookup(&specs, category, property)
                .and_then(Value::as_str)
                .is_some_and(|v| v.eq_ignore_ascii_case(value)),
            SpecFilter::Resolution(_) => false,
        }
    }
}

fn lookup<'a>(specs: &'a Value, category: &str, property: &str) -> Option<&'a Value> {
    specs.get(category)?.get(property)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => false,
    }
}

/// Complete filter selection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub marketplace: Marketplace,
    pub brand: Option<String>,
    pub search_text: Option<String>,
    pub price_range: PriceRange,
    pub min_rating: Option<f64>,
    pub selected_specs: Vec<SpecFilter>,
}

impl FilterState {
    /// Parse spec tokens, rejecting malformed ones
    pub fn with_spec_tokens<S: AsRef<str>>(
        mut self,
        tokens: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        for token in tokens {
            let token = token.as_ref().trim();
            if !token.is_empty() {
                self.selected_specs.push(token.parse()?);
            }
        }
        Ok(self)
    }

    pub fn matches(&self, product: &NormalizedProduct) -> bool {
        self.matches_marketplace(product)
            && self.matches_brand(product)
            && self.matches_search(product)
            && self.matches_price(product)
            && self.matches_rating(product)
            && self.selected_specs.iter().all(|spec| spec.matches(product))
    }

    fn matches_marketplace(&self, product: &NormalizedProduct) -> bool {
        let p = &product.product;
        p.price.get(self.marketplace).is_some_and(|price| price != -1.0)
            && p.amazon_url.get(self.marketplace).is_some()
    }

    fn matches_brand(&self, product: &NormalizedProduct) -> bool {
        match self.brand.as_deref().filter(|b| !b.is_empty()) {
            Some(brand) => product.product.brand == brand,
            None => true,
        }
    }

    fn matches_search(&self, product: &NormalizedProduct) -> bool {
        match self.search_text.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => search_matches(product, &term.to_lowercase()),
            None => true,
        }
    }

    fn matches_price(&self, product: &NormalizedProduct) -> bool {
        !self.price_range.is_active()
            || self
                .price_range
                .contains(product.product.price.get(self.marketplace))
    }

    fn matches_rating(&self, product: &NormalizedProduct) -> bool {
        self.min_rating.map_or(true, |min| product.product.rating >= min)
    }
}

fn search_matches(product: &NormalizedProduct, term: &str) -> bool {
    let contains = |text: &str| text.to_lowercase().contains(term);
    let p = &product.product;

    if contains(&p.brand) || contains(&p.model) {
        return true;
    }
    if p.features.iter().any(|f| contains(f)) {
        return true;
    }

    if let Ok(Value::Object(groups)) = serde_json::to_value(&product.specs) {
        for category in SPEC_CATEGORIES {
            let Some(Value::Object(group)) = groups.get(*category) else {
                continue;
            };
            for (key, value) in group {
                if contains(key) || value.as_str().is_some_and(|v| contains(v)) {
                    return true;
                }
            }
        }
    }

    p.resolution.as_deref().is_some_and(|r| contains(r))
}

/// Keep only products passing every active filter
pub fn apply_filters(products: &[NormalizedProduct], state: &FilterState) -> Vec<NormalizedProduct> {
    products
        .iter()
        .filter(|p| state.matches(p))
        .cloned()
        .collect()
}

/// Sort orders
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    PriceLow,
    PriceHigh,
    Rating,
    Newest,
    #[default]
    Popularity,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::PriceLow => "price-low",
            SortKey::PriceHigh => "price-high",
            SortKey::Rating => "rating",
            SortKey::Newest => "newest",
            SortKey::Popularity => "popularity",
        }
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "price-low" => Ok(SortKey::PriceLow),
            "price-high" => Ok(SortKey::PriceHigh),
            "rating" => Ok(SortKey::Rating),
            "newest" => Ok(SortKey::Newest),
            "popularity" | "" => Ok(SortKey::Popularity),
            other => bail!("Unknown sort key: {}", other),
        }
    }
}

/// Missing keys sort after present ones regardless of direction
fn present_first<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn listed_price(product: &NormalizedProduct, marketplace: Marketplace) -> Option<f64> {
    product.product.price.get(marketplace).filter(|p| *p >= 0.0)
}

fn release_date(product: &NormalizedProduct) -> Option<NaiveDate> {
    let date = product.product.release_date.as_deref()?;
    NaiveDate::parse_from_str(date.get(..10).unwrap_or(date), "%Y-%m-%d").ok()
}

/// Stable sort in place
pub fn sort_products(products: &mut [NormalizedProduct], key: SortKey, marketplace: Marketplace) {
    match key {
        SortKey::PriceLow => products.sort_by(|a, b| {
            present_first(listed_price(a, marketplace), listed_price(b, marketplace), |a, b| {
                a.total_cmp(&b)
            })
        }),
        SortKey::PriceHigh => products.sort_by(|a, b| {
            present_first(listed_price(a, marketplace), listed_price(b, marketplace), |a, b| {
                b.total_cmp(&a)
            })
        }),
        SortKey::Rating => products.sort_by(|a, b| b.product.rating.total_cmp(&a.product.rating)),
        SortKey::Newest => products.sort_by(|a, b| {
            present_first(release_date(a), release_date(b), |a, b| b.cmp(&a))
        }),
        SortKey::Popularity => {
            products.sort_by(|a, b| b.product.popularity.cmp(&a.product.popularity))
        }
    }
}
