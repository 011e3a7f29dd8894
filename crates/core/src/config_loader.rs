use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

/// Default location of the TOML configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration from the default TOML file and `APP_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads application configuration from a specific TOML file.
    ///
    /// A missing file is not an error; defaults and environment variables still apply.
    /// Nested keys are addressed with a double underscore, e.g. `APP_PUBLISHER__UPLOAD_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()?;

        tracing::debug!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Loads application configuration with a specific profile overlay.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(path: &str, profile: &str) -> Result<AppConfig> {
        let profile_path = match path.strip_suffix(".toml") {
            Some(stem) => format!("{stem}.{profile}.toml"),
            None => format!("{path}.{profile}"),
        };

        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Toml::file(profile_path))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()?;

        Ok(config)
    }
}
