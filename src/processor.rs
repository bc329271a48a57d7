//! Product processing: extraction, normalization and metadata for one listing
//! at a time.

use anyhow::{Context, Result};
use chrono::Utc;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::extractor::SpecificationExtractor;
use crate::normalizer::normalize_specs;
use crate::types::{ExtractionMetadata, NormalizedProduct, ProductRecord, RawProduct};

/// Turns raw listings into normalized catalog entries
#[derive(Debug, Clone)]
pub struct ProductProcessor {
    extractor: SpecificationExtractor,
    known_brands: Vec<(String, Regex)>,
    model_identifier: Regex,
}

impl ProductProcessor {
    pub fn new(known_brands: Vec<String>) -> Result<Self> {
        let model_identifier = Regex::new(r"^([\w\d]+(?:[-\s][\w\d]+)?)")
            .context("Invalid model identifier pattern")?;

        let known_brands = known_brands
            .into_iter()
            .map(|brand| {
                let matcher = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&brand)))
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("Invalid brand pattern for {}", brand))?;
                Ok((brand, matcher))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            extractor: SpecificationExtractor::new()?,
            known_brands,
            model_identifier,
        })
    }

    /// Process one listing.
    ///
    /// Returns `None` for error pages. Any other failure is logged and the
    /// original record is passed through unchanged.
    pub fn process(&self, raw: &RawProduct) -> Option<ProductRecord> {
        match self.try_process(raw) {
            Ok(Some(product)) => Some(ProductRecord::Normalized(Box::new(product))),
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to process product {}: {:#}", raw.id, e);
                Some(ProductRecord::Raw(raw.clone()))
            }
        }
    }

    /// Strict variant of [`process`](Self::process) that surfaces errors
    pub fn try_process(&self, raw: &RawProduct) -> Result<Option<NormalizedProduct>> {
        let Some(raw_specs) = self.extractor.extract(raw)? else {
            debug!("Dropping error page {}: {}", raw.id, raw.model);
            return Ok(None);
        };

        let mut product = raw.clone();
        if product.brand.trim().is_empty() {
            product.brand = self.infer_brand(&product.model);
        }

        let specs = normalize_specs(&raw_specs);
        let clean_model_name = self.clean_model_name(&product.brand, &product.model);
        let extraction_metadata = ExtractionMetadata {
            processing_timestamp: Utc::now(),
            sources_used: raw_specs.sources_used(),
        };

        debug!(
            "Processed {} {} ({}, {}°)",
            product.brand, clean_model_name, specs.video.resolution, specs.physical.fov
        );

        Ok(Some(NormalizedProduct {
            product,
            specs,
            clean_model_name,
            extraction_metadata,
        }))
    }

    /// Process a batch, dropping error pages
    pub fn process_all(&self, raws: &[RawProduct]) -> Vec<ProductRecord> {
        let records: Vec<ProductRecord> = raws.iter().filter_map(|raw| self.process(raw)).collect();

        let passed_through = records
            .iter()
            .filter(|r| matches!(r, ProductRecord::Raw(_)))
            .count();
        info!(
            "Processed {} products: {} normalized, {} passed through, {} rejected",
            raws.len(),
            records.len() - passed_through,
            passed_through,
            raws.len() - records.len()
        );

        records
    }

    /// Brand from the known-brand list (whole words only), else the first
    /// word of the title
    pub fn infer_brand(&self, title: &str) -> String {
        self.known_brands
            .iter()
            .find(|(_, matcher)| matcher.is_match(title))
            .map(|(brand, _)| brand.clone())
            .or_else(|| title.split_whitespace().next().map(str::to_string))
            .unwrap_or_default()
    }

    /// Short display name: the title without its leading brand, cut down to
    /// the model identifier
    pub fn clean_model_name(&self, brand: &str, model: &str) -> String {
        let stripped = strip_brand(brand, model);
        if stripped.trim().is_empty() {
            return model.to_string();
        }

        if let Some(m) = self.model_identifier.captures(stripped).and_then(|c| c.get(1)) {
            return m.as_str().trim().to_string();
        }

        let first_words = stripped.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
        if first_words.is_empty() {
            stripped.to_string()
        } else {
            first_words
        }
    }
}

fn strip_brand<'a>(brand: &str, model: &'a str) -> &'a str {
    if brand.is_empty() {
        return model;
    }
    let has_prefix = model
        .get(..brand.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(brand));
    match model.get(brand.len()..) {
        Some(rest) if has_prefix && rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::extractor::SourceName;
    use serde_json::json;

    const REDTIGER_TITLE: &str = "REDTIGER F7NP Front Rear, 4K/2.5K Full HD Dash Camera for Cars, \
        Included 32GB Card, Built-in Wi-Fi GPS, 3.16\" IPS Screen, Night Vision, \
        170°Wide Angle, WDR, 24H Parking Mode";

    fn processor() -> ProductProcessor {
        ProductProcessor::new(vec![
            "Garmin".to_string(),
            "REDTIGER".to_string(),
            "VIOFO".to_string(),
        ])
        .unwrap()
    }

    fn redtiger() -> RawProduct {
        RawProduct {
            id: 1234,
            brand: "REDTIGER".to_string(),
            model: REDTIGER_TITLE.to_string(),
            rating: 4.4,
            review_count: 5000,
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_redtiger() {
        let record = processor().process(&redtiger()).unwrap();
        let product = record.as_normalized().unwrap();
        let specs = &product.specs;

        assert_eq!(specs.video.resolution, "4K");
        assert_eq!(specs.physical.fov, 170);
        assert_eq!(specs.physical.screen_size, Some(3.2));
        assert!(specs.connectivity.wifi);
        assert!(specs.connectivity.gps);
        assert!(specs.video.night_vision);
        assert!(specs.features.parking_mode);
        assert_eq!(product.clean_model_name, "F7NP Front");

        let used = &product.extraction_metadata.sources_used;
        assert_eq!(used["video"]["resolution"].source, SourceName::Model);
    }

    #[test]
    fn test_model_beats_description() {
        let raw = RawProduct {
            model: "VIOFO A119 Mini 2 1440p Dash Cam".to_string(),
            description: Some("Also records at 4K in our premium model".to_string()),
            ..Default::default()
        };
        let record = processor().process(&raw).unwrap();
        let product = record.as_normalized().unwrap();
        assert_eq!(product.specs.video.resolution, "1440p");
        assert_eq!(
            product.extraction_metadata.sources_used["video"]["resolution"].source,
            SourceName::Model
        );
    }

    #[test]
    fn test_error_page_dropped() {
        let raw = RawProduct {
            model: "Page Not Found".to_string(),
            ..Default::default()
        };
        assert!(processor().process(&raw).is_none());
    }

    #[test]
    fn test_bad_vendor_field_passes_raw_through() {
        let raw = RawProduct {
            id: 9,
            model: "Garmin Mini 2".to_string(),
            structured_specs: Some(json!([1, 2, 3])),
            ..Default::default()
        };
        let record = processor().process(&raw).unwrap();
        assert_eq!(record, ProductRecord::Raw(raw.clone()));
        assert!(processor().try_process(&raw).is_err());
    }

    #[test]
    fn test_process_all_counts() {
        let raws = vec![
            redtiger(),
            RawProduct {
                model: "Error".to_string(),
                ..Default::default()
            },
            RawProduct {
                model: "Garmin Mini 2".to_string(),
                technical_details: Some(json!("n/a")),
                ..Default::default()
            },
        ];
        let records = processor().process_all(&raws);
        assert_eq!(records.len(), 2);
        assert!(records[0].as_normalized().is_some());
        assert!(records[1].as_normalized().is_none());
    }

    #[test]
    fn test_infer_brand() {
        let p = processor();
        assert_eq!(p.infer_brand("Dash Cam by VIOFO, 4K"), "VIOFO");
        assert_eq!(p.infer_brand("Vantrue N4 3 Channel"), "Vantrue");
        assert_eq!(p.infer_brand(""), "");
    }

    #[test]
    fn test_infer_brand_whole_words_only() {
        let p = ProductProcessor::new(AppConfig::default().extraction.known_brands).unwrap();
        // "Improved" contains "rove"
        assert_eq!(p.infer_brand("Chortau Improved Dash Cam 1080p"), "Chortau");
        assert_eq!(p.infer_brand("Improved Dash Cam 1080p"), "Improved");
        assert_eq!(p.infer_brand("70mai Dash Cam A500S"), "70mai");
        assert_eq!(p.infer_brand("New ROVE R2-4K Pro"), "Rove");
    }

    #[test]
    fn test_brand_inferred_when_missing() {
        let raw = RawProduct {
            model: "Garmin Dash Cam 67W".to_string(),
            ..Default::default()
        };
        let record = processor().process(&raw).unwrap();
        let product = record.as_normalized().unwrap();
        assert_eq!(product.product.brand, "Garmin");
        assert_eq!(product.clean_model_name, "Dash Cam");
    }

    #[test]
    fn test_clean_model_name() {
        let p = processor();
        assert_eq!(p.clean_model_name("Garmin", "garmin Mini 2 Car Camera"), "Mini 2");
        assert_eq!(p.clean_model_name("VIOFO", "VIOFO A129-Plus Duo"), "A129-Plus");
        assert_eq!(p.clean_model_name("Nextbase", "(Renewed) Nextbase 322GW"), "(Renewed) Nextbase");
        assert_eq!(p.clean_model_name("", ""), "");
    }

    #[test]
    fn test_clean_model_name_keeps_bare_brand() {
        let p = processor();
        assert_eq!(p.clean_model_name("Garmin", "Garmin "), "Garmin ");
        assert_eq!(p.clean_model_name("Garmin", "Garmin"), "Garmin");
        assert_eq!(p.clean_model_name("Garmin", "GarminMini 2"), "GarminMini 2");
        assert_eq!(p.clean_model_name("Garmin", "GARMIN\tMini 2"), "Mini 2");
    }
}
