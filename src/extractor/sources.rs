//! Source aggregation: the ordered, priority-weighted views of one product
//! that the extractors read from.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::RawProduct;

/// Highest priority in the source list, used to scale confidences
pub const MAX_SOURCE_PRIORITY: u8 = 3;

/// Where an extracted value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceName {
    Model,
    Features,
    StructuredSpecs,
    Description,
    TechnicalDetails,
    /// A value already present on the raw product record
    Product,
    Default,
}

/// Source payload, narrowed once at aggregation time
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    Text(String),
    Structured(Map<String, Value>),
}

/// One entry of the aggregated source list
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub name: SourceName,
    pub data: SourceData,
    pub priority: u8,
}

impl Source {
    fn text(name: SourceName, text: String, priority: u8) -> Self {
        Self {
            name,
            data: SourceData::Text(text),
            priority,
        }
    }

    /// Text payload, `None` for structured sources
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            SourceData::Text(text) => Some(text),
            SourceData::Structured(_) => None,
        }
    }

    /// Object payload, `None` for text sources
    pub fn as_structured(&self) -> Option<&Map<String, Value>> {
        match &self.data {
            SourceData::Structured(map) => Some(map),
            SourceData::Text(_) => None,
        }
    }

    /// Scale a base confidence by this source's trust
    pub fn weigh(&self, base_confidence: f64) -> f64 {
        (base_confidence * self.priority as f64 / MAX_SOURCE_PRIORITY as f64).clamp(0.0, 1.0)
    }
}

/// Ordered source list for one product
#[derive(Debug, Clone, PartialEq)]
pub struct Sources {
    entries: Vec<Source>,
}

impl Sources {
    /// Build the source list in its fixed order:
    /// model (2), features (1), structuredSpecs (3), description (0), technicalDetails (3).
    ///
    /// Vendor objects that are present but not JSON objects are rejected.
    pub fn aggregate(product: &RawProduct) -> Result<Self> {
        let structured = narrow_object("structuredSpecs", product.structured_specs.as_ref())?;
        let technical = narrow_object("technicalDetails", product.technical_details.as_ref())?;

        let entries = vec![
            Source::text(SourceName::Model, product.model.clone(), 2),
            Source::text(SourceName::Features, product.features.join(" "), 1),
            Source {
                name: SourceName::StructuredSpecs,
                data: SourceData::Structured(structured),
                priority: 3,
            },
            Source::text(
                SourceName::Description,
                product.description.clone().unwrap_or_default(),
                0,
            ),
            Source {
                name: SourceName::TechnicalDetails,
                data: SourceData::Structured(technical),
                priority: 3,
            },
        ];

        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.entries.iter()
    }

    /// Text sources only, in order
    pub fn texts(&self) -> impl Iterator<Item = (&Source, &str)> {
        self.entries
            .iter()
            .filter_map(|s| s.as_text().map(|text| (s, text)))
    }

    pub fn get(&self, name: SourceName) -> Option<&Source> {
        self.entries.iter().find(|s| s.name == name)
    }
}

fn narrow_object(field: &str, value: Option<&Value>) -> Result<Map<String, Value>> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => bail!(
            "{} must be an object, got {}",
            field,
            json_kind(other)
        ),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product() -> RawProduct {
        RawProduct {
            model: "Nextbase 622GW".to_string(),
            features: vec!["4K recording".to_string(), "Alexa built in".to_string()],
            description: Some("Flagship dash cam".to_string()),
            structured_specs: Some(json!({"GPS": "Yes"})),
            ..Default::default()
        }
    }

    #[test]
    fn test_source_order_and_priorities() {
        let sources = Sources::aggregate(&product()).unwrap();
        let order: Vec<_> = sources.iter().map(|s| (s.name, s.priority)).collect();
        assert_eq!(
            order,
            vec![
                (SourceName::Model, 2),
                (SourceName::Features, 1),
                (SourceName::StructuredSpecs, 3),
                (SourceName::Description, 0),
                (SourceName::TechnicalDetails, 3),
            ]
        );
    }

    #[test]
    fn test_features_joined_with_spaces() {
        let sources = Sources::aggregate(&product()).unwrap();
        let features = sources.get(SourceName::Features).unwrap();
        assert_eq!(features.as_text(), Some("4K recording Alexa built in"));
    }

    #[test]
    fn test_missing_vendor_objects_become_empty() {
        let sources = Sources::aggregate(&RawProduct::default()).unwrap();
        let technical = sources.get(SourceName::TechnicalDetails).unwrap();
        assert!(technical.as_structured().unwrap().is_empty());
        assert_eq!(sources.texts().count(), 3);
    }

    #[test]
    fn test_non_object_vendor_field_rejected() {
        let mut raw = product();
        raw.technical_details = Some(json!(["not", "an", "object"]));
        let err = Sources::aggregate(&raw).unwrap_err();
        assert!(err.to_string().contains("technicalDetails"));
    }

    #[test]
    fn test_weigh_scales_by_priority() {
        let sources = Sources::aggregate(&product()).unwrap();
        let model = sources.get(SourceName::Model).unwrap();
        assert!((model.weigh(0.9) - 0.6).abs() < 1e-9);
        let description = sources.get(SourceName::Description).unwrap();
        assert_eq!(description.weigh(0.9), 0.0);
    }
}
