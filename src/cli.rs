//! CLI commands for dashcam-finder.
//!
//! Supports batch processing of scraped listings, catalog merging, offline
//! filtering and API server mode.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::catalog::{
    backup, load_catalog, load_raw_products, merge_products, normalized_products, save_catalog,
    save_raw_products,
};
use crate::config::AppConfig;
use crate::filter::{apply_filters, sort_products, FilterState, PriceRange, SortKey};
use crate::processor::ProductProcessor;
use crate::types::{Marketplace, NormalizedProduct};

#[derive(Parser)]
#[command(name = "dashcam-finder")]
#[command(version, about = "Dash cam specification extraction and comparison", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Processed catalog to serve
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Extract and normalize specifications for raw product listings
    Process {
        /// Path to raw products JSON array
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output path for the processed catalog
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge freshly scraped products into an existing raw catalog
    Merge {
        /// Current raw catalog
        #[arg(value_name = "CURRENT")]
        current: PathBuf,

        /// Newly scraped products
        #[arg(value_name = "INCOMING")]
        incoming: PathBuf,

        /// Output path (defaults to CURRENT)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Filter and sort a processed catalog
    Filter {
        /// Path to processed catalog JSON
        #[arg(value_name = "CATALOG")]
        catalog: PathBuf,

        /// Marketplace (amazon_com, amazon_uk)
        #[arg(short, long, default_value = "amazon_com")]
        marketplace: String,

        /// Exact brand name
        #[arg(short, long)]
        brand: Option<String>,

        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        #[arg(long)]
        min_rating: Option<f64>,

        /// Spec filter token, e.g. connectivity:wifi or physical:fov:150 (repeatable)
        #[arg(long = "spec", value_name = "TOKEN")]
        specs: Vec<String>,

        /// Sort key (price-low, price-high, rating, newest, popularity)
        #[arg(long, default_value = "popularity")]
        sort: String,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

/// Process raw listings into a catalog file.
pub async fn run_process(input: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let output = output.unwrap_or_else(|| PathBuf::from(&config.data.products_file));

    let raws = load_raw_products(&input)?;
    eprintln!("Processing {} products from {}", raws.len(), input.display());

    let processor = ProductProcessor::new(config.extraction.known_brands)?;
    let mut records = processor.process_all(&raws);

    let normalized = records.iter().filter(|r| r.as_normalized().is_some()).count();
    save_catalog(&output, &mut records)?;

    eprintln!(
        "Wrote {} records ({} normalized) to {}",
        records.len(),
        normalized,
        output.display()
    );
    Ok(())
}

/// Merge scraped products into the current raw catalog.
pub async fn run_merge(
    current: PathBuf,
    incoming: PathBuf,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    let output = output.unwrap_or_else(|| current.clone());

    let existing = load_raw_products(&current)?;
    let scraped = load_raw_products(&incoming)?;
    eprintln!(
        "Merging {} scraped products into {} existing",
        scraped.len(),
        existing.len()
    );

    if backup(&output, Path::new(&config.data.backup_file))? {
        eprintln!("Backup written to {}", config.data.backup_file);
    }

    let mut merged = merge_products(existing, scraped);
    save_raw_products(&output, &mut merged)?;

    eprintln!("Wrote {} products to {}", merged.len(), output.display());
    Ok(())
}

/// Filter and sort a processed catalog.
#[allow(clippy::too_many_arguments)]
pub async fn run_filter(
    catalog: PathBuf,
    marketplace: String,
    brand: Option<String>,
    search: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    min_rating: Option<f64>,
    specs: Vec<String>,
    sort: String,
    format: String,
) -> anyhow::Result<()> {
    let marketplace: Marketplace = marketplace.parse()?;
    let sort_key: SortKey = sort.parse()?;

    let state = FilterState {
        marketplace,
        brand,
        search_text: search,
        price_range: PriceRange {
            min: min_price,
            max: max_price,
        },
        min_rating,
        selected_specs: Vec::new(),
    }
    .with_spec_tokens(&specs)
    .context("Invalid --spec token")?;

    let products = normalized_products(load_catalog(&catalog)?);
    let mut filtered = apply_filters(&products, &state);
    sort_products(&mut filtered, sort_key, marketplace);

    eprintln!("{} of {} products match", filtered.len(), products.len());

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        "table" => {
            print_table(&filtered, marketplace);
        }
        _ => {
            anyhow::bail!("Unknown format: {}. Use 'json' or 'table'", format);
        }
    }

    Ok(())
}

fn print_table(products: &[NormalizedProduct], marketplace: Marketplace) {
    println!(
        "{:>4}  {:<12} {:<20} {:>9} {:>6} {:>6} {:>5} {:>3}",
        "Pop", "Brand", "Model", "Price", "Rating", "Res", "FOV", "Ch"
    );
    println!("{}", "-".repeat(76));

    for p in products {
        let price = p
            .product
            .price
            .get(marketplace)
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {:<12} {:<20} {:>9} {:>6.1} {:>6} {:>5} {:>3}",
            p.product.popularity,
            truncate(&p.product.brand, 12),
            truncate(&p.clean_model_name, 20),
            price,
            p.product.rating,
            p.specs.video.resolution,
            p.specs.physical.fov,
            p.specs.physical.channels
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        text.chars().take(width - 1).chain(std::iter::once('…')).collect()
    }
}
