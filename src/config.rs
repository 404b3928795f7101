use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use validator::ValidateUrl;

use crate::error::ConfigurationError;

/// Accepts either a literal list of origins or a comma-separated string
/// (split and trimmed). A JSON-style string beginning with `[` is parsed as
/// a list. Any other shape fails deserialization.
fn deserialize_allowed_origins<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }
    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) if s.trim_start().starts_with('[') => {
            serde_json::from_str(&s).map_err(serde::de::Error::custom)
        }
        StringOrVec::String(s) => Ok(s
            .split(',')
            .map(|x| x.trim().to_string())
            .filter(|x| !x.is_empty())
            .collect()),
        StringOrVec::Vec(v) => Ok(v),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub project: ProjectConfig,
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub api_v1_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(deserialize_with = "deserialize_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub name: String,
    pub port: String,
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    /// Driver-qualified connection string assembled from the individual
    /// fields. Only consulted when no explicit `url` was supplied.
    pub fn derived_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub secret_key: String,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub algorithm: String,
    pub jwt_secret_key: Option<String>,
    pub jwt_algorithm: Option<String>,
}

impl SecurityConfig {
    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret_key.as_deref().unwrap_or(&self.secret_key)
    }

    pub fn jwt_algorithm(&self) -> &str {
        self.jwt_algorithm.as_deref().unwrap_or(&self.algorithm)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: String,
}

impl Settings {
    /// Resolves configuration once at startup: per-field defaults, then an
    /// optional `config.toml`, then `TELEMED__`-prefixed environment
    /// variables. The deserialized value is finalized (derivation +
    /// validation) before anything else sees it.
    pub fn new() -> Result<Self, ConfigurationError> {
        let config = Self::builder_with_defaults()?
            .add_source(File::with_name("config.toml").required(false))
            .add_source(Environment::with_prefix("TELEMED").separator("__"))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.finalize()
    }

    pub(crate) fn builder_with_defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        Config::builder()
            .set_default("project.name", "Telemedicine App")?
            .set_default("project.api_v1_prefix", "/api/v1")?
            .set_default("server.host", "http://localhost")?
            .set_default("server.port", 8000)?
            .set_default(
                "cors.allowed_origins",
                vec!["http://localhost:3000", "http://localhost:8000"],
            )?
            .set_default("database.host", "localhost")?
            .set_default("database.user", "telemedicine_user")?
            .set_default("database.password", "telemedicine_password")?
            .set_default("database.name", "telemedicine")?
            .set_default("database.port", "5432")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("security.secret_key", "your-secret-key-change-in-production")?
            .set_default("security.access_token_expire_minutes", 15)?
            .set_default("security.refresh_token_expire_days", 7)?
            .set_default("security.algorithm", "HS256")?
            .set_default("logging.level", "info")?
            .set_default("logging.directory", "./logs")?
            .set_default("environment", "development")
    }

    /// Second phase of resolution: derive values that depend on sibling
    /// fields, then validate the fully-populated struct. Runs exactly once;
    /// the returned value is treated as read-only for the rest of the
    /// process lifetime.
    pub fn finalize(mut self) -> Result<Self, ConfigurationError> {
        if self.database.url.is_none() {
            self.database.url = Some(self.database.derived_url());
        }
        if self.security.jwt_secret_key.is_none() {
            self.security.jwt_secret_key = Some(self.security.secret_key.clone());
        }
        if self.security.jwt_algorithm.is_none() {
            self.security.jwt_algorithm = Some(self.security.algorithm.clone());
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.project.api_v1_prefix.starts_with('/') {
            return Err(ConfigurationError::InvalidApiPrefix(
                self.project.api_v1_prefix.clone(),
            ));
        }
        if !self.server.host.validate_url() {
            return Err(ConfigurationError::InvalidUrl {
                field: "server.host",
                value: self.server.host.clone(),
            });
        }
        for origin in &self.cors.allowed_origins {
            if !origin.validate_url() {
                return Err(ConfigurationError::InvalidUrl {
                    field: "cors.allowed_origins",
                    value: origin.clone(),
                });
            }
        }
        Ok(())
    }
}
