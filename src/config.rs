use anyhow::Context;
use serde::Deserialize;

use crate::api::errors::ErrorMode;

/// Placeholder in `DATABASE` replaced by `DATABASE_PASSWORD`.
pub const PASSWORD_PLACEHOLDER: &str = "<PASSWORD>";

/// Env file read before the environment, unless `NATOURS_CONFIG_FILE` points
/// somewhere else.
pub const DEFAULT_CONFIG_FILE: &str = "config.env";

/// Server configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// MongoDB connection string (`DATABASE`).
    pub database: String,
    pub database_password: Option<String>,
    pub database_name: String,
    pub port: u16,
    /// `development` or `production` (`APP_ENV`).
    pub app_env: String,
    /// Directory served for unmatched GET requests.
    pub static_dir: String,
}

impl AppConfig {
    /// Load the env file (if any), then build the config from the process
    /// environment.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("NATOURS_CONFIG_FILE")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        match dotenvy::from_path(&path) {
            Ok(()) => tracing::debug!(path = %path, "Loaded env file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to read env file {path}")),
        }
        Self::from_environment(config::Environment::default())
    }

    /// Build the config from an environment source, applying defaults.
    pub fn from_environment(environment: config::Environment) -> anyhow::Result<Self> {
        config::Config::builder()
            .set_default("database", "mongodb://localhost:27017")?
            .set_default("database_name", "natours")?
            .set_default("port", 8000)?
            .set_default("app_env", "production")?
            .set_default("static_dir", "public")?
            .add_source(environment.try_parsing(true).ignore_empty(true))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn error_mode(&self) -> ErrorMode {
        ErrorMode::from_env_name(&self.app_env)
    }

    /// Default tracing filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        match self.error_mode() {
            ErrorMode::Development => "natours=debug,tower_http=debug",
            ErrorMode::Production => "natours=info,tower_http=warn",
        }
    }

    /// Connection string with the password placeholder filled in.
    pub fn mongo_uri(&self) -> anyhow::Result<String> {
        if !self.database.contains(PASSWORD_PLACEHOLDER) {
            return Ok(self.database.clone());
        }
        let password = self
            .database_password
            .as_deref()
            .with_context(|| format!("DATABASE contains {PASSWORD_PLACEHOLDER} but DATABASE_PASSWORD is not set"))?;

        Ok(self
            .database
            .replace(PASSWORD_PLACEHOLDER, &urlencoding::encode(password)))
    }

    /// Connection string safe to log.
    pub fn redacted_uri(&self) -> String {
        match url::Url::parse(&self.database) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("****"));
                url.to_string()
            }
            _ => self.database.clone(),
        }
    }
}
