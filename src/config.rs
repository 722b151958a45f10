use crate::oracle::OracleConfig;
use serde::Deserialize;
use std::{env, fs, path::Path};

const DEFAULT_MODEL_ID: &str = "anthropic.claude-3-5-sonnet-20240620-v1:0";

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub models: ModelSettings,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
}

fn default_db_path() -> String {
    "store/invoices.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per bucket.
    #[serde(default = "default_attachment_root")]
    pub attachment_root: String,
    #[serde(default = "default_attachment_bucket")]
    pub attachment_bucket: String,
}

fn default_attachment_root() -> String {
    "objects".to_string()
}

fn default_attachment_bucket() -> String {
    "attachments".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            attachment_root: default_attachment_root(),
            attachment_bucket: default_attachment_bucket(),
        }
    }
}

/// Primary and optional fallback model ids, read once at start-up.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_id")]
    pub primary: String,
    /// Empty means no fallback.
    #[serde(default)]
    pub fallback: String,
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            primary: default_model_id(),
            fallback: String::new(),
        }
    }
}

impl ModelSettings {
    /// The fallback id, if one is configured and differs from the primary.
    pub fn fallback_for(&self, model_id: &str) -> Option<&str> {
        let fallback = self.fallback.trim();
        (!fallback.is_empty() && fallback != model_id).then_some(fallback)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://bedrock-runtime.us-east-1.amazonaws.com".to_string()
}

fn default_api_key_env() -> String {
    "BEDROCK_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    pub fn api_key(&self) -> Result<String, Box<dyn std::error::Error>> {
        env::var(&self.api_key_env)
            .map_err(|_| format!("{} env var required for the reasoning service", self.api_key_env).into())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            storage: StorageConfig::default(),
            models: ModelSettings::default(),
            service: ServiceConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` if it exists, otherwise fall back to defaults; then apply
    /// environment overrides.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut cfg = if path.as_ref().exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides(|name| env::var(name).ok());
        Ok(cfg)
    }

    /// `EXTRACT_MODEL_ID` / `EXTRACT_FALLBACK_MODEL_ID` replace the configured ids.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(primary) = lookup("EXTRACT_MODEL_ID").filter(|v| !v.trim().is_empty()) {
            self.models.primary = primary;
        }
        if let Some(fallback) = lookup("EXTRACT_FALLBACK_MODEL_ID") {
            self.models.fallback = fallback;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg.db_path, "store/invoices.db");
        assert_eq!(cfg.models.primary, DEFAULT_MODEL_ID);
        assert!(cfg.models.fallback.is_empty());
        assert_eq!(cfg.service.timeout_secs, 120);
        assert_eq!(cfg.storage.attachment_bucket, "attachments");
        assert_eq!(cfg.oracle.source, "INVOICE_EXTRACTOR");
    }

    #[test]
    fn test_parse_sections() {
        let cfg = Config::parse(
            r#"
            db_path = "/tmp/x.db"

            [models]
            primary = "amazon.nova-pro-v1:0"
            fallback = "amazon.titan-text-express-v1"

            [service]
            timeout_secs = 30

            [oracle]
            business_unit = "EU1"

            [oracle.supplier_mapping."Acme Corporation"]
            supplier_id = 12345
            supplier_site = "MAIN"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.db_path, "/tmp/x.db");
        assert_eq!(cfg.models.primary, "amazon.nova-pro-v1:0");
        assert_eq!(cfg.service.timeout_secs, 30);
        assert_eq!(cfg.oracle.business_unit, "EU1");
        let acme = &cfg.oracle.supplier_mapping["Acme Corporation"];
        assert_eq!(acme.supplier_id, Some(12345));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(|name| match name {
            "EXTRACT_MODEL_ID" => Some("primary-x".to_string()),
            "EXTRACT_FALLBACK_MODEL_ID" => Some("fallback-y".to_string()),
            _ => None,
        });
        assert_eq!(cfg.models.primary, "primary-x");
        assert_eq!(cfg.models.fallback_for("primary-x"), Some("fallback-y"));
    }

    #[test]
    fn test_fallback_must_differ() {
        let models = ModelSettings {
            primary: "a".into(),
            fallback: "a".into(),
        };
        assert_eq!(models.fallback_for("a"), None);
        let models = ModelSettings {
            primary: "a".into(),
            fallback: "  ".into(),
        };
        assert_eq!(models.fallback_for("a"), None);
    }
}
