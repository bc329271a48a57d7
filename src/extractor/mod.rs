//! Specification extraction from free-text listing data.
//!
//! Sources are consulted in their fixed aggregation order and the first
//! match wins; a later, higher-confidence match never overrides it.

pub mod attributes;
pub mod patterns;
pub mod sources;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{RawProduct, SourceUsage};

pub use patterns::PatternLibrary;
pub use sources::{Source, SourceData, SourceName, Sources, MAX_SOURCE_PRIORITY};

/// One extracted value together with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecField<T> {
    pub value: T,
    pub source: SourceName,
    pub confidence: f64,
    pub pattern: String,
}

impl<T> SpecField<T> {
    /// Value matched in `source` by `pattern`, confidence scaled by source priority
    pub fn matched(value: T, source: &Source, base_confidence: f64, pattern: &str) -> Self {
        Self {
            value,
            source: source.name,
            confidence: source.weigh(base_confidence),
            pattern: pattern.to_string(),
        }
    }

    /// Fallback value used when nothing matched
    pub fn fallback(value: T, confidence: f64) -> Self {
        Self {
            value,
            source: SourceName::Default,
            confidence: confidence.min(0.5),
            pattern: "default".to_string(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SpecField<U> {
        SpecField {
            value: f(self.value),
            source: self.source,
            confidence: self.confidence,
            pattern: self.pattern,
        }
    }

    pub fn usage(&self) -> SourceUsage {
        SourceUsage {
            source: self.source,
            confidence: self.confidence,
            pattern: self.pattern.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVideoSpecs {
    pub resolution: SpecField<String>,
    pub fps: SpecField<u32>,
    pub hdr: SpecField<bool>,
    pub night_vision: SpecField<bool>,
    pub wdr: SpecField<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPhysicalSpecs {
    pub fov: SpecField<u32>,
    pub screen_size: Option<SpecField<f64>>,
    pub screen_type: SpecField<String>,
    pub channels: SpecField<u8>,
    pub size_description: Option<SpecField<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConnectivitySpecs {
    pub wifi: SpecField<bool>,
    pub wifi_frequency: Option<SpecField<String>>,
    pub bluetooth: SpecField<bool>,
    pub gps: SpecField<bool>,
    pub voice_control: SpecField<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeatureSpecs {
    pub parking_mode: SpecField<bool>,
    pub motion_detection: SpecField<bool>,
    pub loop_recording: SpecField<bool>,
    pub emergency_recording: SpecField<bool>,
    pub time_lapse: SpecField<bool>,
    pub remote_monitoring: SpecField<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStorageSpecs {
    /// GB
    pub included_storage: Option<SpecField<u32>>,
    /// GB
    pub max_storage: SpecField<u32>,
    pub memory_card_included: SpecField<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAdditionalSpecs {
    pub model_number: Option<SpecField<String>>,
    pub operating_temperature: Option<SpecField<String>>,
    pub power_source: SpecField<String>,
}

/// Specification tree before normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpecs {
    pub video: RawVideoSpecs,
    pub physical: RawPhysicalSpecs,
    pub connectivity: RawConnectivitySpecs,
    pub features: RawFeatureSpecs,
    pub storage: RawStorageSpecs,
    pub additional: RawAdditionalSpecs,
}

type UsageGroup = BTreeMap<String, SourceUsage>;

fn record<T>(group: &mut UsageGroup, name: &str, field: &SpecField<T>) {
    group.insert(name.to_string(), field.usage());
}

fn record_opt<T>(group: &mut UsageGroup, name: &str, field: &Option<SpecField<T>>) {
    if let Some(field) = field {
        record(group, name, field);
    }
}

impl RawSpecs {
    /// Provenance of every non-null field, keyed by group then attribute
    pub fn sources_used(&self) -> BTreeMap<String, UsageGroup> {
        let mut used = BTreeMap::new();

        let v = &self.video;
        let mut video = UsageGroup::new();
        record(&mut video, "resolution", &v.resolution);
        record(&mut video, "fps", &v.fps);
        record(&mut video, "hdr", &v.hdr);
        record(&mut video, "nightVision", &v.night_vision);
        record(&mut video, "wdr", &v.wdr);
        used.insert("video".to_string(), video);

        let p = &self.physical;
        let mut physical = UsageGroup::new();
        record(&mut physical, "fov", &p.fov);
        record_opt(&mut physical, "screenSize", &p.screen_size);
        record(&mut physical, "screenType", &p.screen_type);
        record(&mut physical, "channels", &p.channels);
        record_opt(&mut physical, "sizeDescription", &p.size_description);
        used.insert("physical".to_string(), physical);

        let c = &self.connectivity;
        let mut connectivity = UsageGroup::new();
        record(&mut connectivity, "wifi", &c.wifi);
        record_opt(&mut connectivity, "wifiFrequency", &c.wifi_frequency);
        record(&mut connectivity, "bluetooth", &c.bluetooth);
        record(&mut connectivity, "gps", &c.gps);
        record(&mut connectivity, "voiceControl", &c.voice_control);
        used.insert("connectivity".to_string(), connectivity);

        let f = &self.features;
        let mut features = UsageGroup::new();
        record(&mut features, "parkingMode", &f.parking_mode);
        record(&mut features, "motionDetection", &f.motion_detection);
        record(&mut features, "loopRecording", &f.loop_recording);
        record(&mut features, "emergencyRecording", &f.emergency_recording);
        record(&mut features, "timeLapse", &f.time_lapse);
        record(&mut features, "remoteMonitoring", &f.remote_monitoring);
        used.insert("features".to_string(), features);

        let s = &self.storage;
        let mut storage = UsageGroup::new();
        record_opt(&mut storage, "includedStorage", &s.included_storage);
        record(&mut storage, "maxStorage", &s.max_storage);
        record(&mut storage, "memoryCardIncluded", &s.memory_card_included);
        used.insert("storage".to_string(), storage);

        let a = &self.additional;
        let mut additional = UsageGroup::new();
        record_opt(&mut additional, "modelNumber", &a.model_number);
        record_opt(&mut additional, "operatingTemperature", &a.operating_temperature);
        record(&mut additional, "powerSource", &a.power_source);
        used.insert("additional".to_string(), additional);

        used
    }

    /// Every confidence in the tree
    pub fn confidences(&self) -> Vec<f64> {
        self.sources_used()
            .values()
            .flat_map(|group| group.values().map(|u| u.confidence))
            .collect()
    }
}

/// Runs every attribute extractor over a product's sources
#[derive(Debug, Clone)]
pub struct SpecificationExtractor {
    patterns: PatternLibrary,
}

impl SpecificationExtractor {
    pub fn new() -> Result<Self> {
        crate::normalizer::storage_patterns()?;
        Ok(Self {
            patterns: PatternLibrary::compile()?,
        })
    }

    /// True when the listing title is an error or dead-listing page
    pub fn is_error_page(&self, title: &str) -> bool {
        self.patterns.error_page.is_match(title)
    }

    /// Extract the raw specification tree.
    ///
    /// Returns `Ok(None)` for error pages. Fails only when the product's
    /// vendor fields have an unexpected shape.
    pub fn extract(&self, product: &RawProduct) -> Result<Option<RawSpecs>> {
        if self.is_error_page(&product.model) {
            debug!("Rejecting error page listing: {}", product.model);
            return Ok(None);
        }

        let sources = Sources::aggregate(product)?;
        Ok(Some(self.extract_from_sources(&sources, product.resolution.as_deref())))
    }

    fn extract_from_sources(&self, sources: &Sources, declared_resolution: Option<&str>) -> RawSpecs {
        use attributes::*;

        let lib = &self.patterns;
        let flag = |name: &str| extract_flag(lib, name, sources);

        RawSpecs {
            video: RawVideoSpecs {
                resolution: extract_resolution(lib, sources, declared_resolution),
                fps: extract_frame_rate(lib, sources),
                hdr: flag("hdr"),
                night_vision: flag("nightVision"),
                wdr: flag("wdr"),
            },
            physical: RawPhysicalSpecs {
                fov: extract_fov(lib, sources),
                screen_size: extract_screen_size(lib, sources),
                screen_type: extract_screen_type(lib, sources),
                channels: extract_channels(lib, sources),
                size_description: extract_size_description(lib, sources),
            },
            connectivity: RawConnectivitySpecs {
                wifi: flag("wifi"),
                wifi_frequency: extract_wifi_frequency(lib, sources),
                bluetooth: flag("bluetooth"),
                gps: flag("gps"),
                voice_control: flag("voiceControl"),
            },
            features: RawFeatureSpecs {
                parking_mode: flag("parkingMode"),
                motion_detection: flag("motionDetection"),
                loop_recording: flag("loopRecording"),
                emergency_recording: flag("emergencyRecording"),
                time_lapse: flag("timeLapse"),
                remote_monitoring: flag("remoteMonitoring"),
            },
            storage: RawStorageSpecs {
                included_storage: extract_included_storage(lib, sources),
                max_storage: extract_max_storage(lib, sources),
                memory_card_included: flag("memoryCardIncluded"),
            },
            additional: RawAdditionalSpecs {
                model_number: extract_model_number(lib, sources),
                operating_temperature: extract_operating_temperature(lib, sources),
                power_source: extract_power_source(lib, sources),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const REDTIGER_TITLE: &str = "REDTIGER F7NP Front Rear, 4K/2.5K Full HD Dash Camera for Cars, \
        Included 32GB Card, Built-in Wi-Fi GPS, 3.16\" IPS Screen, Night Vision, \
        170°Wide Angle, WDR, 24H Parking Mode";

    fn extractor() -> SpecificationExtractor {
        SpecificationExtractor::new().unwrap()
    }

    fn redtiger() -> RawProduct {
        RawProduct {
            id: 1234,
            brand: "REDTIGER".to_string(),
            model: REDTIGER_TITLE.to_string(),
            features: vec![
                "SUPERIOR NIGHT VISION- equipped with HDR/WDR technology".to_string(),
                "RELIABLE FEATURES- Loop Recording, 24-hour parking monitor with time-lapse"
                    .to_string(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_redtiger_title() {
        let specs = extractor().extract(&redtiger()).unwrap().unwrap();

        assert_eq!(specs.video.resolution.value, "4K");
        assert_eq!(specs.video.resolution.source, SourceName::Model);
        assert_eq!(specs.physical.fov.value, 170);
        assert_eq!(specs.physical.screen_size.as_ref().unwrap().value, 3.16);
        assert_eq!(specs.physical.screen_type.value, "IPS");
        assert_eq!(specs.physical.channels.value, 2);
        assert!(specs.connectivity.wifi.value);
        assert!(specs.connectivity.gps.value);
        assert!(specs.video.night_vision.value);
        assert!(specs.video.wdr.value);
        assert!(specs.features.parking_mode.value);
        assert_eq!(specs.storage.included_storage.as_ref().unwrap().value, 32);
        assert!(specs.storage.memory_card_included.value);
    }

    #[test]
    fn test_feature_bullets_used_when_title_silent() {
        let specs = extractor().extract(&redtiger()).unwrap().unwrap();
        let loop_recording = &specs.features.loop_recording;
        assert!(loop_recording.value);
        assert_eq!(loop_recording.source, SourceName::Features);
        assert!((loop_recording.confidence - 0.8 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_page_rejected() {
        let product = RawProduct {
            model: "Page Not Found".to_string(),
            features: vec!["4K WiFi GPS".to_string()],
            ..Default::default()
        };
        assert!(extractor().extract(&product).unwrap().is_none());
    }

    #[test]
    fn test_malformed_vendor_field_is_an_error() {
        let product = RawProduct {
            model: "VIOFO A119 Mini 2".to_string(),
            structured_specs: Some(json!("wifi: yes")),
            ..Default::default()
        };
        assert!(extractor().extract(&product).is_err());
    }

    #[test]
    fn test_confidences_within_unit_interval() {
        let products = [
            redtiger(),
            RawProduct::default(),
            RawProduct {
                model: "Garmin Dash Cam 67W 1440p 180-degree FOV".to_string(),
                description: Some("Voice control, 2.4GHz WiFi, supports up to 512GB".to_string()),
                structured_specs: Some(json!({"Bluetooth": true, "GPS Module": "Supported"})),
                ..Default::default()
            },
        ];

        for product in &products {
            let specs = extractor().extract(product).unwrap().unwrap();
            for confidence in specs.confidences() {
                assert!((0.0..=1.0).contains(&confidence), "{}", confidence);
            }
        }
    }

    #[test]
    fn test_defaults_carry_default_source() {
        let specs = extractor().extract(&RawProduct::default()).unwrap().unwrap();
        assert_eq!(specs.video.resolution.value, "1080p");
        assert_eq!(specs.video.resolution.source, SourceName::Default);
        assert!(specs.video.resolution.confidence <= 0.5);
        assert!(specs.physical.screen_size.is_none());
        assert!(specs.additional.model_number.is_none());
        assert!(!specs.connectivity.gps.value);
        assert_eq!(specs.connectivity.gps.source, SourceName::Default);
    }

    #[test]
    fn test_sources_used_skips_null_fields() {
        let specs = extractor().extract(&RawProduct::default()).unwrap().unwrap();
        let used = specs.sources_used();
        assert_eq!(used.len(), 6);
        assert!(used["physical"].get("screenSize").is_none());
        assert_eq!(used["video"]["resolution"].source, SourceName::Default);
        assert_eq!(used["features"].len(), 6);
    }
}
