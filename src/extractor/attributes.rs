//! One extractor per attribute.
//!
//! Each walks the aggregated sources in order and, within a source, the
//! pattern table in order. The first hit wins.

use regex::Captures;
use serde_json::Value;

use super::patterns::{CompiledCapture, CompiledValue, PatternLibrary};
use super::sources::{SourceName, Sources};
use super::SpecField;

/// First table entry matching any text source
fn first_value<T: Clone>(table: &[CompiledValue<T>], sources: &Sources) -> Option<SpecField<T>> {
    for (source, text) in sources.texts() {
        for entry in table {
            if entry.regex.is_match(text) {
                return Some(SpecField::matched(
                    entry.value.clone(),
                    source,
                    entry.confidence,
                    entry.regex.as_str(),
                ));
            }
        }
    }
    None
}

/// First capture that `parse` accepts. A rejected capture does not stop the
/// scan: the next pattern, then the next source, is tried.
fn first_capture<T>(
    table: &[CompiledCapture],
    sources: &Sources,
    parse: impl Fn(&Captures) -> Option<T>,
) -> Option<SpecField<T>> {
    for (source, text) in sources.texts() {
        for entry in table {
            let Some(caps) = entry.captures(text) else {
                continue;
            };
            if let Some(value) = parse(&caps) {
                return Some(SpecField::matched(
                    value,
                    source,
                    entry.confidence,
                    entry.regex.as_str(),
                ));
            }
        }
    }
    None
}

fn parse_group<T: std::str::FromStr>(caps: &Captures, index: usize) -> Option<T> {
    caps.get(index)?.as_str().parse().ok()
}

fn bounded_u32(caps: &Captures, max: u32) -> Option<u32> {
    parse_group::<u32>(caps, 1).filter(|v| *v > 0 && *v <= max)
}

fn owned(field: SpecField<&'static str>) -> SpecField<String> {
    field.map(String::from)
}

pub fn extract_resolution(
    lib: &PatternLibrary,
    sources: &Sources,
    declared: Option<&str>,
) -> SpecField<String> {
    if let Some(found) = first_value(&lib.resolution, sources) {
        return owned(found);
    }

    match declared.map(str::trim).filter(|r| !r.is_empty()) {
        Some(resolution) => SpecField {
            value: resolution.to_string(),
            source: SourceName::Product,
            confidence: 0.95,
            pattern: "direct".to_string(),
        },
        None => SpecField::fallback("1080p".to_string(), 0.3),
    }
}

pub fn extract_frame_rate(lib: &PatternLibrary, sources: &Sources) -> SpecField<u32> {
    first_capture(&lib.fps, sources, |caps| bounded_u32(caps, 240))
        .unwrap_or_else(|| SpecField::fallback(30, 0.3))
}

pub fn extract_fov(lib: &PatternLibrary, sources: &Sources) -> SpecField<u32> {
    first_capture(&lib.fov, sources, |caps| bounded_u32(caps, 360))
        .unwrap_or_else(|| SpecField::fallback(140, 0.3))
}

/// Diagonal in inches; no default
pub fn extract_screen_size(lib: &PatternLibrary, sources: &Sources) -> Option<SpecField<f64>> {
    first_capture(&lib.screen_size, sources, |caps| {
        parse_group::<f64>(caps, 1).filter(|v| *v > 0.0 && *v <= 15.0)
    })
}

pub fn extract_screen_type(lib: &PatternLibrary, sources: &Sources) -> SpecField<String> {
    first_value(&lib.screen_type, sources)
        .map(owned)
        .unwrap_or_else(|| SpecField::fallback("LCD".to_string(), 0.4))
}

pub fn extract_channels(lib: &PatternLibrary, sources: &Sources) -> SpecField<u8> {
    first_value(&lib.channels, sources).unwrap_or_else(|| SpecField::fallback(1, 0.5))
}

pub fn extract_size_description(
    lib: &PatternLibrary,
    sources: &Sources,
) -> Option<SpecField<String>> {
    first_value(&lib.size_description, sources).map(owned)
}

pub fn extract_wifi_frequency(lib: &PatternLibrary, sources: &Sources) -> Option<SpecField<String>> {
    first_value(&lib.wifi_frequency, sources).map(owned)
}

/// Card bundled in the box, GB
pub fn extract_included_storage(lib: &PatternLibrary, sources: &Sources) -> Option<SpecField<u32>> {
    first_capture(&lib.included_storage, sources, |caps| {
        parse_group::<u32>(caps, 1).filter(|v| *v > 0)
    })
}

/// Largest supported card, GB
pub fn extract_max_storage(lib: &PatternLibrary, sources: &Sources) -> SpecField<u32> {
    first_capture(&lib.max_storage, sources, |caps| {
        parse_group::<u32>(caps, 1).filter(|v| *v > 0)
    })
    .unwrap_or_else(|| SpecField::fallback(128, 0.3))
}

pub fn extract_model_number(lib: &PatternLibrary, sources: &Sources) -> Option<SpecField<String>> {
    first_capture(std::slice::from_ref(&lib.model_number), sources, |caps| {
        caps.get(1).map(|m| m.as_str().to_string())
    })
}

/// Rendered as "{min}°C to {max}°C"
pub fn extract_operating_temperature(
    lib: &PatternLibrary,
    sources: &Sources,
) -> Option<SpecField<String>> {
    first_capture(&lib.temperature, sources, |caps| {
        let min: i32 = parse_group(caps, 1)?;
        let max: i32 = parse_group(caps, 2)?;
        Some(format!("{}°C to {}°C", min, max))
    })
}

pub fn extract_power_source(lib: &PatternLibrary, sources: &Sources) -> SpecField<String> {
    first_value(&lib.power_source, sources)
        .map(owned)
        .unwrap_or_else(|| SpecField::fallback("Car Charger".to_string(), 0.5))
}

const FLAG_CONFIDENCE: f64 = 0.8;

/// Boolean feature flag.
///
/// Text sources are tried first. Failing that, a structured vendor key
/// containing the attribute name decides. Otherwise the flag is false.
pub fn extract_flag(lib: &PatternLibrary, name: &str, sources: &Sources) -> SpecField<bool> {
    if let Some(flag) = lib.flag(name) {
        for (source, text) in sources.texts() {
            if flag.regex.is_match(text) {
                return SpecField::matched(true, source, FLAG_CONFIDENCE, flag.regex.as_str());
            }
        }
    }

    structured_flag(name, sources).unwrap_or_else(|| SpecField::fallback(false, 0.5))
}

fn structured_flag(name: &str, sources: &Sources) -> Option<SpecField<bool>> {
    let specs = sources.get(SourceName::StructuredSpecs)?.as_structured()?;
    let needle = name.to_lowercase();

    for (key, value) in specs {
        if !key.to_lowercase().contains(&needle) {
            continue;
        }
        let (value, confidence) = match value {
            Value::Bool(b) => (*b, 0.9),
            Value::String(s) => (truthy_text(s), 0.85),
            _ => continue,
        };
        return Some(SpecField {
            value,
            source: SourceName::StructuredSpecs,
            confidence,
            pattern: "structured".to_string(),
        });
    }
    None
}

fn truthy_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["yes", "true", "supported", "1"]
        .iter()
        .any(|token| lower.contains(token))
}
