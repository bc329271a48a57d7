//! Configuration for the dash cam finder.

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Catalog file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_products_file")]
    pub products_file: String,
    #[serde(default = "default_backup_file")]
    pub backup_file: String,
}

fn default_products_file() -> String {
    "data/products.json".to_string()
}

fn default_backup_file() -> String {
    "data/products.backup.json".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            products_file: default_products_file(),
            backup_file: default_backup_file(),
        }
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Brands recognised in listing titles when a record has no brand
    #[serde(default = "default_known_brands")]
    pub known_brands: Vec<String>,
}

fn default_known_brands() -> Vec<String> {
    [
        "Garmin", "Nextbase", "VIOFO", "REDTIGER", "Vantrue", "BlackVue", "Thinkware", "Rexing",
        "Rove", "Cobra", "Nexar", "WOLFBOX", "AZDOME", "70mai", "Miofive", "Kingslim", "Chortau",
        "Kenwood", "Transcend", "Vava",
    ]
    .iter()
    .map(|b| b.to_string())
    .collect()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            known_brands: default_known_brands(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (DASHCAM_SERVER_PORT, etc.)
            .add_source(
                config::Environment::with_prefix("DASHCAM")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.data.products_file, "data/products.json");
        assert!(config.extraction.known_brands.iter().any(|b| b == "REDTIGER"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"server": {"port": 9000}, "extraction": {"known_brands": ["Acme"]}}"#)
                .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.data.backup_file, "data/products.backup.json");
        assert_eq!(config.extraction.known_brands, vec!["Acme".to_string()]);
    }
}
