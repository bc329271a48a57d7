//! JSON catalog files: loading, saving, backups and merging scraped records.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::types::{NormalizedProduct, ProductRecord, RawProduct};

/// Popularity 0-100: half from rating, half from review volume capped at 10k
pub fn popularity_score(rating: f64, review_count: u32) -> u32 {
    let rating_score = (rating / 5.0) * 50.0;
    let review_score = (review_count.min(10_000) as f64 / 10_000.0) * 50.0;
    (rating_score + review_score).round().max(0.0) as u32
}

fn read_array(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array", path.display()))
}

/// Deserialize each element on its own so one bad record does not sink the file
fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let values = read_array(path)?;
    let total = values.len();

    let records: Vec<T> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping record {} in {}: {}", index, path.display(), e);
                None
            }
        })
        .collect();

    info!("Loaded {}/{} records from {}", records.len(), total, path.display());
    Ok(records)
}

/// Scraped or seed products
pub fn load_raw_products(path: &Path) -> Result<Vec<RawProduct>> {
    read_records(path)
}

/// Processed catalog
pub fn load_catalog(path: &Path) -> Result<Vec<ProductRecord>> {
    read_records(path)
}

/// Fully processed entries of a catalog
pub fn normalized_products(records: Vec<ProductRecord>) -> Vec<NormalizedProduct> {
    records
        .into_iter()
        .filter_map(|record| match record {
            ProductRecord::Normalized(product) => Some(*product),
            ProductRecord::Raw(_) => None,
        })
        .collect()
}

fn write_sorted<T: Serialize>(path: &Path, items: &mut [T], popularity: impl Fn(&T) -> u32) -> Result<()> {
    items.sort_by_key(|item| std::cmp::Reverse(popularity(item)));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(&*items)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Saved {} records to {}", items.len(), path.display());
    Ok(())
}

/// Write a processed catalog, most popular first
pub fn save_catalog(path: &Path, records: &mut [ProductRecord]) -> Result<()> {
    write_sorted(path, records, ProductRecord::popularity)
}

/// Write raw products, most popular first
pub fn save_raw_products(path: &Path, products: &mut [RawProduct]) -> Result<()> {
    write_sorted(path, products, |p| p.popularity)
}

/// Copy `path` to `backup_path` if it exists. Returns whether a copy was made.
pub fn backup(path: &Path, backup_path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }

    if let Some(parent) = backup_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(path, backup_path).with_context(|| {
        format!("Failed to back up {} to {}", path.display(), backup_path.display())
    })?;

    info!("Backed up {} to {}", path.display(), backup_path.display());
    Ok(true)
}

fn merge_into(existing: &mut RawProduct, update: &RawProduct) {
    existing.price.merge(&update.price);
    existing.amazon_url.merge(&update.amazon_url);

    if update.rating > 0.0 {
        existing.rating = update.rating;
    }
    if update.review_count > 0 {
        existing.review_count = update.review_count;
    }
    if !update.image.is_empty() {
        existing.image = update.image.clone();
    }
    if !update.features.is_empty() {
        existing.features = update.features.clone();
    }

    existing.popularity = popularity_score(existing.rating, existing.review_count);
}

/// Merge freshly scraped records into the current catalog by id.
///
/// Known ids are updated in place; unknown ids are appended in order.
pub fn merge_products(current: Vec<RawProduct>, incoming: Vec<RawProduct>) -> Vec<RawProduct> {
    let mut merged = current;
    let mut index: HashMap<u64, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id, i))
        .collect();

    let mut updated = 0;
    let mut added = 0;
    for product in incoming {
        match index.get(&product.id) {
            Some(&i) => {
                merge_into(&mut merged[i], &product);
                updated += 1;
            }
            None => {
                index.insert(product.id, merged.len());
                merged.push(product);
                added += 1;
            }
        }
    }

    info!("Merged catalog: {} updated, {} added", updated, added);
    merged
}
