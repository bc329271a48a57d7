//! Canonicalization of extracted specifications.
//!
//! Every rule maps its own output to itself, so normalizing an already
//! normalized tree changes nothing.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::error;

use crate::extractor::{RawSpecs, SpecField};

const COMMON_FPS: &[u32] = &[24, 25, 30, 50, 60, 120];
const COMMON_ANGLES: &[u32] = &[120, 130, 140, 150, 160, 170, 180];
const SNAP_TOLERANCE: u32 = 2;

const RESOLUTIONS: &[(&str, &str)] = &[
    ("4k", "4K"),
    ("2160p", "4K"),
    ("2.7k", "1440p"),
    ("2.5k", "1440p"),
    ("2k", "1440p"),
    ("1440p", "1440p"),
    ("1080p", "1080p"),
    ("full hd", "1080p"),
    ("fhd", "1080p"),
    ("hd", "720p"),
    ("720p", "720p"),
    ("sd", "SD"),
];

const SCREEN_TYPES: &[(&str, &str)] = &[
    ("ips", "IPS"),
    ("lcd", "LCD"),
    ("oled", "OLED"),
    ("amoled", "AMOLED"),
    ("tft", "TFT"),
];

const WIFI_FREQUENCIES: &[(&str, &str)] = &[
    ("2.4", "2.4GHz"),
    ("2.4ghz", "2.4GHz"),
    ("2.4 ghz", "2.4GHz"),
    ("2.4g", "2.4GHz"),
    ("5", "5GHz"),
    ("5ghz", "5GHz"),
    ("5 ghz", "5GHz"),
    ("5g", "5GHz"),
    ("dual", "Dual-band"),
    ("dual band", "Dual-band"),
    ("dual-band", "Dual-band"),
    ("both", "Dual-band"),
];

const POWER_OPTIONS: &[(&str, &str)] = &[
    ("hardwire", "Hardwire"),
    ("hardwiring", "Hardwire"),
    ("direct wire", "Hardwire"),
    ("car charger", "Car Charger"),
    ("cigarette lighter", "Car Charger"),
    ("12v", "Car Charger"),
    ("battery", "Battery"),
    ("rechargeable", "Battery"),
    ("capacitor", "Capacitor"),
    ("supercapacitor", "Capacitor"),
    ("super capacitor", "Capacitor"),
];

const TRUE_WORDS: &[&str] = &["true", "yes", "y", "1", "on", "enabled"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSpecs {
    pub resolution: String,
    pub fps: u32,
    pub hdr: bool,
    pub night_vision: bool,
    pub wdr: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalSpecs {
    pub fov: u32,
    /// Inches, one decimal
    pub screen_size: Option<f64>,
    pub screen_type: String,
    pub channels: u8,
    pub size_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivitySpecs {
    pub wifi: bool,
    pub wifi_frequency: Option<String>,
    pub bluetooth: bool,
    pub gps: bool,
    pub voice_control: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSpecs {
    pub parking_mode: bool,
    pub motion_detection: bool,
    pub loop_recording: bool,
    pub emergency_recording: bool,
    pub time_lapse: bool,
    pub remote_monitoring: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpecs {
    /// GB
    pub included_storage: Option<f64>,
    /// GB
    pub max_storage: Option<f64>,
    pub memory_card_included: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalSpecs {
    pub model_number: Option<String>,
    pub operating_temperature: Option<String>,
    pub power_source: String,
}

/// Canonical specification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specs {
    pub video: VideoSpecs,
    pub physical: PhysicalSpecs,
    pub connectivity: ConnectivitySpecs,
    pub features: FeatureSpecs,
    pub storage: StorageSpecs,
    pub additional: AdditionalSpecs,
}

fn flag(field: &SpecField<bool>) -> bool {
    normalize_boolean(&Value::Bool(field.value))
}

fn storage(field: Option<&SpecField<u32>>) -> Option<f64> {
    field.and_then(|f| normalize_storage(&Value::from(f.value)))
}

/// Unwrap every field and canonicalize it
pub fn normalize_specs(raw: &RawSpecs) -> Specs {
    let video = &raw.video;
    let physical = &raw.physical;
    let connectivity = &raw.connectivity;
    let features = &raw.features;
    let additional = &raw.additional;

    Specs {
        video: VideoSpecs {
            resolution: normalize_resolution(&video.resolution.value),
            fps: normalize_frame_rate(video.fps.value),
            hdr: flag(&video.hdr),
            night_vision: flag(&video.night_vision),
            wdr: flag(&video.wdr),
        },
        physical: PhysicalSpecs {
            fov: normalize_angle(physical.fov.value),
            screen_size: physical.screen_size.as_ref().map(|f| normalize_screen_size(f.value)),
            screen_type: normalize_screen_type(&physical.screen_type.value),
            channels: normalize_channels(physical.channels.value.into()),
            size_description: physical.size_description.as_ref().map(|f| f.value.clone()),
        },
        connectivity: ConnectivitySpecs {
            wifi: flag(&connectivity.wifi),
            wifi_frequency: connectivity
                .wifi_frequency
                .as_ref()
                .map(|f| normalize_wifi_frequency(&f.value)),
            bluetooth: flag(&connectivity.bluetooth),
            gps: flag(&connectivity.gps),
            voice_control: flag(&connectivity.voice_control),
        },
        features: FeatureSpecs {
            parking_mode: flag(&features.parking_mode),
            motion_detection: flag(&features.motion_detection),
            loop_recording: flag(&features.loop_recording),
            emergency_recording: flag(&features.emergency_recording),
            time_lapse: flag(&features.time_lapse),
            remote_monitoring: flag(&features.remote_monitoring),
        },
        storage: StorageSpecs {
            included_storage: storage(raw.storage.included_storage.as_ref()),
            max_storage: storage(Some(&raw.storage.max_storage)),
            memory_card_included: flag(&raw.storage.memory_card_included),
        },
        additional: AdditionalSpecs {
            model_number: additional.model_number.as_ref().map(|f| normalize_model_number(&f.value)),
            operating_temperature: additional.operating_temperature.as_ref().map(|f| f.value.clone()),
            power_source: normalize_power_source(&additional.power_source.value),
        },
    }
}

impl Specs {
    /// Run every rule over an already canonical tree
    pub fn normalized(&self) -> Specs {
        let storage = |gb: Option<f64>| gb.and_then(|v| normalize_storage(&Value::from(v)));

        Specs {
            video: VideoSpecs {
                resolution: normalize_resolution(&self.video.resolution),
                fps: normalize_frame_rate(self.video.fps),
                ..self.video.clone()
            },
            physical: PhysicalSpecs {
                fov: normalize_angle(self.physical.fov),
                screen_size: self.physical.screen_size.map(normalize_screen_size),
                screen_type: normalize_screen_type(&self.physical.screen_type),
                channels: normalize_channels(self.physical.channels.into()),
                size_description: self.physical.size_description.clone(),
            },
            connectivity: ConnectivitySpecs {
                wifi_frequency: self
                    .connectivity
                    .wifi_frequency
                    .as_deref()
                    .map(normalize_wifi_frequency),
                ..self.connectivity.clone()
            },
            features: self.features.clone(),
            storage: StorageSpecs {
                included_storage: storage(self.storage.included_storage),
                max_storage: storage(self.storage.max_storage),
                memory_card_included: self.storage.memory_card_included,
            },
            additional: AdditionalSpecs {
                model_number: self.additional.model_number.as_deref().map(normalize_model_number),
                operating_temperature: self.additional.operating_temperature.clone(),
                power_source: normalize_power_source(&self.additional.power_source),
            },
        }
    }
}

fn lookup(table: &[(&str, &'static str)], value: &str) -> String {
    let key = value.trim().to_lowercase();
    table
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| value.to_string())
}

fn snap(value: u32, targets: &[u32]) -> u32 {
    targets
        .iter()
        .copied()
        .filter(|target| value.abs_diff(*target) <= SNAP_TOLERANCE)
        .min_by_key(|target| value.abs_diff(*target))
        .unwrap_or(value)
}

pub fn normalize_resolution(value: &str) -> String {
    lookup(RESOLUTIONS, value)
}

/// Snap to a common frame rate within ±2
pub fn normalize_frame_rate(fps: u32) -> u32 {
    snap(fps, COMMON_FPS)
}

/// Snap to a common field of view within ±2 degrees
pub fn normalize_angle(degrees: u32) -> u32 {
    snap(degrees, COMMON_ANGLES)
}

pub fn normalize_boolean(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => TRUE_WORDS.contains(&s.trim().to_lowercase().as_str()),
        _ => false,
    }
}

pub fn normalize_screen_size(inches: f64) -> f64 {
    (inches * 10.0).round() / 10.0
}

pub fn normalize_screen_type(value: &str) -> String {
    lookup(SCREEN_TYPES, value)
}

/// 1 to 3 channels, anything else falls back to a single camera
pub fn normalize_channels(channels: i64) -> u8 {
    match channels {
        1..=3 => channels as u8,
        _ => 1,
    }
}

pub fn normalize_wifi_frequency(value: &str) -> String {
    lookup(WIFI_FREQUENCIES, value)
}

pub fn normalize_power_source(value: &str) -> String {
    lookup(POWER_OPTIONS, value)
}

pub fn normalize_model_number(value: &str) -> String {
    value.trim().to_string()
}

pub(crate) struct StoragePatterns {
    units: Vec<(Regex, f64)>,
    bare: Regex,
}

/// Storage unit patterns, compiled on first use.
///
/// [`SpecificationExtractor::new`](crate::extractor::SpecificationExtractor::new)
/// calls this so a bad pattern fails construction instead of dropping values.
pub(crate) fn storage_patterns() -> Result<&'static StoragePatterns> {
    static PATTERNS: OnceLock<StoragePatterns> = OnceLock::new();
    if let Some(patterns) = PATTERNS.get() {
        return Ok(patterns);
    }

    let build = |p: &str| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid storage pattern {}", p))
    };
    let patterns = StoragePatterns {
        units: vec![
            (build(r"(\d+(?:\.\d+)?)\s*TB")?, 1024.0),
            (build(r"(\d+(?:\.\d+)?)\s*GB")?, 1.0),
            (build(r"(\d+(?:\.\d+)?)\s*MB")?, 1.0 / 1024.0),
        ],
        bare: build(r"(\d+(?:\.\d+)?)")?,
    };
    Ok(PATTERNS.get_or_init(|| patterns))
}

fn capture_number(regex: &Regex, text: &str) -> Option<f64> {
    regex.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Storage in GB.
///
/// Numbers pass through. Strings are read by unit (TB, then GB, then MB);
/// a bare number is taken as GB when it lies in [1, 1024].
pub fn normalize_storage(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => {
            let patterns = match storage_patterns() {
                Ok(patterns) => patterns,
                Err(e) => {
                    error!("Cannot normalize storage {:?}: {:#}", text, e);
                    return None;
                }
            };
            for (regex, gb_per_unit) in &patterns.units {
                if let Some(amount) = capture_number(regex, text) {
                    return Some(amount * gb_per_unit);
                }
            }
            capture_number(&patterns.bare, text).filter(|gb| (1.0..=1024.0).contains(gb))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Specs {
        Specs {
            video: VideoSpecs {
                resolution: "2.5K".to_string(),
                fps: 29,
                hdr: true,
                night_vision: false,
                wdr: true,
            },
            physical: PhysicalSpecs {
                fov: 148,
                screen_size: Some(3.16),
                screen_type: "ips".to_string(),
                channels: 5,
                size_description: Some("Compact".to_string()),
            },
            connectivity: ConnectivitySpecs {
                wifi: true,
                wifi_frequency: Some("Dual Band".to_string()),
                bluetooth: false,
                gps: true,
                voice_control: false,
            },
            features: FeatureSpecs {
                parking_mode: true,
                motion_detection: false,
                loop_recording: true,
                emergency_recording: true,
                time_lapse: false,
                remote_monitoring: false,
            },
            storage: StorageSpecs {
                included_storage: Some(32.0),
                max_storage: Some(0.48828125),
                memory_card_included: true,
            },
            additional: AdditionalSpecs {
                model_number: Some("  010-02505-00 ".to_string()),
                operating_temperature: Some("-20°C to 70°C".to_string()),
                power_source: "supercapacitor".to_string(),
            },
        }
    }

    #[test]
    fn test_resolution_table() {
        assert_eq!(normalize_resolution("2160p"), "4K");
        assert_eq!(normalize_resolution("FHD"), "1080p");
        assert_eq!(normalize_resolution("hd"), "720p");
        assert_eq!(normalize_resolution("SD"), "SD");
        assert_eq!(normalize_resolution(" Full HD "), "1080p");
        assert_eq!(normalize_resolution("8K"), "8K");
    }

    #[test]
    fn test_angle_snapping() {
        assert_eq!(normalize_angle(148), 150);
        assert_eq!(normalize_angle(145), 145);
        assert_eq!(normalize_angle(170), 170);
        assert_eq!(normalize_frame_rate(29), 30);
        assert_eq!(normalize_frame_rate(45), 45);
        // nearest target wins over the first one in tolerance
        assert_eq!(normalize_frame_rate(26), 25);
        assert_eq!(normalize_frame_rate(23), 24);
    }

    #[test]
    fn test_boolean_coercion() {
        assert!(normalize_boolean(&json!(true)));
        assert!(normalize_boolean(&json!(" Yes ")));
        assert!(normalize_boolean(&json!("enabled")));
        assert!(normalize_boolean(&json!(2)));
        assert!(!normalize_boolean(&json!(0)));
        assert!(!normalize_boolean(&json!("no")));
        assert!(!normalize_boolean(&Value::Null));
    }

    #[test]
    fn test_storage_units() {
        assert_eq!(normalize_storage(&json!("1TB")), Some(1024.0));
        assert_eq!(normalize_storage(&json!("500MB")), Some(0.48828125));
        assert_eq!(normalize_storage(&json!("64GB")), Some(64.0));
        assert_eq!(normalize_storage(&json!("64")), Some(64.0));
        assert_eq!(normalize_storage(&json!("4096")), None);
        assert_eq!(normalize_storage(&json!("unknown")), None);
        assert_eq!(normalize_storage(&json!(256)), Some(256.0));
        assert_eq!(normalize_storage(&Value::Null), None);
    }

    #[test]
    fn test_storage_patterns_compile() {
        let patterns = storage_patterns().unwrap();
        assert_eq!(patterns.units.len(), 3);
        assert!(std::ptr::eq(patterns, storage_patterns().unwrap()));
    }

    #[test]
    fn test_channels_clamped() {
        assert_eq!(normalize_channels(5), 1);
        assert_eq!(normalize_channels(0), 1);
        assert_eq!(normalize_channels(3), 3);
    }

    #[test]
    fn test_lookup_tables() {
        assert_eq!(normalize_screen_type("amoled"), "AMOLED");
        assert_eq!(normalize_screen_type("LED"), "LED");
        assert_eq!(normalize_wifi_frequency("Dual Band"), "Dual-band");
        assert_eq!(normalize_wifi_frequency("5GHz"), "5GHz");
        assert_eq!(normalize_power_source("Cigarette Lighter"), "Car Charger");
        assert_eq!(normalize_power_source("Solar"), "Solar");
        assert_eq!(normalize_model_number(" A129 "), "A129");
        assert_eq!(normalize_screen_size(3.16), 3.2);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = sample().normalized();
        assert_eq!(once.video.resolution, "1440p");
        assert_eq!(once.video.fps, 30);
        assert_eq!(once.physical.fov, 150);
        assert_eq!(once.physical.screen_size, Some(3.2));
        assert_eq!(once.physical.screen_type, "IPS");
        assert_eq!(once.physical.channels, 1);
        assert_eq!(once.connectivity.wifi_frequency.as_deref(), Some("Dual-band"));
        assert_eq!(once.additional.model_number.as_deref(), Some("010-02505-00"));
        assert_eq!(once.additional.power_source, "Capacitor");

        assert_eq!(once.normalized(), once);
    }
}
