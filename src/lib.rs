//! Dash cam specification extraction, normalization and comparison.
//!
//! Raw listings go through [`processor::ProductProcessor`], which aggregates
//! the listing's text and vendor fields, extracts every attribute with a
//! source and confidence, and normalizes the result into [`normalizer::Specs`].
//! [`filter`] then narrows and orders processed products.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod extractor;
pub mod filter;
pub mod normalizer;
pub mod processor;
pub mod routes;
pub mod types;

pub use extractor::{SpecField, SpecificationExtractor};
pub use filter::{apply_filters, sort_products, FilterState, SortKey, SpecFilter};
pub use normalizer::{normalize_specs, Specs};
pub use processor::ProductProcessor;
pub use types::{Marketplace, NormalizedProduct, ProductRecord, RawProduct};
