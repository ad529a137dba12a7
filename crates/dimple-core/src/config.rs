//! Layered settings: TOML files, then `DIMPLE_<SECTION>__<KEY>` environment variables.
//!
//! Layers, lowest priority first: `config.toml` in the user config directory,
//! `dimple.{environment}.toml`, `dimple.local.toml`, an explicit `--config` file.
//! Values stay optional here; each consumer checks what it needs with [require].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app_data;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const ENV_PREFIX: &str = "DIMPLE_";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const REDACTED: &str = "********";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub azure: AzureSettings,
    pub ingest: IngestSettings,
    pub http: HttpSettings,
}

/// Search service and OpenAI connection. All strings are passed through to the services.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_service_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_admin_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_embedding_deployment: Option<String>,
    /// Kept as a string; parsed by [crate::schema::parse_dimensions].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_embedding_dimensions: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Embedding requests in flight at once. 1 (the default) is strictly sequential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embed_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Where to look for config files.
#[derive(Debug, Clone)]
pub struct ConfigSources {
    pub environment: String,
    /// Directory holding `dimple.{environment}.toml` and `dimple.local.toml`.
    pub base_dir: PathBuf,
    pub user_config: Option<PathBuf>,
    /// Must exist when given.
    pub explicit: Option<PathBuf>,
}

impl ConfigSources {
    /// Sources for the current directory and the user config directory.
    pub fn new(environment: impl Into<String>, explicit: Option<PathBuf>) -> Self {
        Self {
            environment: environment.into(),
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            user_config: default_config_path(),
            explicit,
        }
    }

    /// Optional file layers in priority order (lowest first).
    fn optional_layers(&self) -> Vec<PathBuf> {
        let mut layers = Vec::new();
        if let Some(p) = &self.user_config {
            layers.push(p.clone());
        }
        layers.push(self.base_dir.join(format!("dimple.{}.toml", self.environment)));
        layers.push(self.base_dir.join("dimple.local.toml"));
        layers
    }
}

impl Settings {
    /// Load all layers and apply environment overrides.
    pub fn load(sources: &ConfigSources) -> Result<Self, ConfigError> {
        let mut settings = Settings::default();
        for path in sources.optional_layers() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading config layer");
                settings.merge(Self::load_file(&path)?);
            }
        }
        if let Some(path) = &sources.explicit {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.clone()));
            }
            settings.merge(Self::load_file(path)?);
        }
        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&s).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?).map_err(ConfigError::Write)
    }

    /// Values set in `other` win.
    pub fn merge(&mut self, other: Settings) {
        let a = &mut self.azure;
        let b = other.azure;
        overlay(&mut a.index_name, b.index_name);
        overlay(&mut a.search_service_endpoint, b.search_service_endpoint);
        overlay(&mut a.search_admin_key, b.search_admin_key);
        overlay(&mut a.openai_endpoint, b.openai_endpoint);
        overlay(&mut a.openai_api_key, b.openai_api_key);
        overlay(&mut a.openai_embedding_model, b.openai_embedding_model);
        overlay(&mut a.openai_embedding_deployment, b.openai_embedding_deployment);
        overlay(&mut a.openai_embedding_dimensions, b.openai_embedding_dimensions);
        overlay(&mut self.ingest.embed_concurrency, other.ingest.embed_concurrency);
        overlay(&mut self.ingest.csv_path, other.ingest.csv_path);
        overlay(&mut self.http.timeout_secs, other.http.timeout_secs);
    }

    /// Apply `DIMPLE_SECTION__KEY=value` variables from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply overrides from `(name, value)` pairs; names without the prefix are ignored.
    pub fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(ENV_PREFIX) {
                if let Err(e) = self.set_value(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value(&mut self, path: &str, value: &str) -> Result<(), ConfigError> {
        let text = || Some(value.to_string());
        match path {
            "AZURE__INDEX_NAME" => self.azure.index_name = text(),
            "AZURE__SEARCH_SERVICE_ENDPOINT" => self.azure.search_service_endpoint = text(),
            "AZURE__SEARCH_ADMIN_KEY" => self.azure.search_admin_key = text(),
            "AZURE__OPENAI_ENDPOINT" => self.azure.openai_endpoint = text(),
            "AZURE__OPENAI_API_KEY" => self.azure.openai_api_key = text(),
            "AZURE__OPENAI_EMBEDDING_MODEL" => self.azure.openai_embedding_model = text(),
            "AZURE__OPENAI_EMBEDDING_DEPLOYMENT" => self.azure.openai_embedding_deployment = text(),
            "AZURE__OPENAI_EMBEDDING_DIMENSIONS" => self.azure.openai_embedding_dimensions = text(),
            "INGEST__EMBED_CONCURRENCY" => {
                self.ingest.embed_concurrency = Some(parse_number(path, value)?);
            }
            "INGEST__CSV_PATH" => self.ingest.csv_path = Some(PathBuf::from(value)),
            "HTTP__TIMEOUT_SECS" => self.http.timeout_secs = Some(parse_number(path, value)?),
            "ENVIRONMENT" => {}
            _ => tracing::debug!("Unknown env config key: {}", path),
        }
        Ok(())
    }

    /// Embedding requests allowed in flight; never less than 1.
    pub fn embed_concurrency(&self) -> usize {
        self.ingest.embed_concurrency.unwrap_or(1).max(1)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Copy with credentials masked, for display.
    pub fn redacted(&self) -> Settings {
        let mut s = self.clone();
        for key in [&mut s.azure.search_admin_key, &mut s.azure.openai_api_key] {
            if key.is_some() {
                *key = Some(REDACTED.to_string());
            }
        }
        s
    }

    /// Starter file written by `dimple config init`.
    pub fn template() -> Settings {
        Settings {
            azure: AzureSettings {
                index_name: Some("golfballs".into()),
                search_service_endpoint: Some("https://<search-service>.search.windows.net".into()),
                search_admin_key: Some("<search-admin-key>".into()),
                openai_endpoint: Some("https://<openai-resource>.openai.azure.com".into()),
                openai_api_key: Some("<openai-api-key>".into()),
                openai_embedding_model: Some("text-embedding-3-small".into()),
                openai_embedding_deployment: Some("text-embedding-3-small".into()),
                openai_embedding_dimensions: Some("1536".into()),
            },
            ingest: IngestSettings {
                embed_concurrency: Some(1),
                csv_path: None,
            },
            http: HttpSettings {
                timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            },
        }
    }
}

/// Returns the value, or `ConfigError::Missing` when unset or blank.
pub fn require<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ConfigError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

/// `config.toml` in the user config directory, if it can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    app_data::config_dir().map(|d| d.join(CONFIG_FILENAME))
}

fn overlay<T>(base: &mut Option<T>, top: Option<T>) {
    if top.is_some() {
        *base = top;
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("cannot parse {:?} as a number", value),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
