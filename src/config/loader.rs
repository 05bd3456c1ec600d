//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery, environment
//! detection and layering through the `config` crate.

use super::error::{ConfigResult, ConfigurationError};
use super::SproutConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const BASE_FILE_NAMES: [&str; 2] = ["sprout.yaml", "sprout.yml"];
const DEFAULT_CONFIG_DIR: &str = "config";

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: SproutConfig,
    environment: String,
    config_directory: PathBuf,
    /// False when built from defaults and environment variables only
    file_backed: bool,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let base_file = Self::find_config_file(&config_directory)?;
        let env_file = config_directory
            .join("environments")
            .join(format!("{environment}.yaml"));

        let builder = Config::builder()
            .add_source(File::from(base_file.as_path()))
            .add_source(File::from(env_file.as_path()).required(false));
        let config = Self::finish(builder)?;

        info!(
            environment = environment,
            config_directory = %config_directory.display(),
            max_connections = config.database.max_connections,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
            file_backed: true,
        }))
    }

    /// Load from `config_dir`, or from defaults and environment variables when no
    /// directory was named and the default one holds no base file.
    ///
    /// Every other failure is returned, including a named directory without files and
    /// values that fail validation.
    pub fn load_or_environment(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_or_environment_from(config_dir, PathBuf::from(DEFAULT_CONFIG_DIR), &environment)
    }

    fn load_or_environment_from(
        config_dir: Option<PathBuf>,
        default_dir: PathBuf,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let named = config_dir.is_some();
        let directory = config_dir.unwrap_or(default_dir);
        match Self::load_from_directory_with_env(Some(directory), environment) {
            Err(ConfigurationError::ConfigFileNotFound { .. }) if !named => {
                Self::from_environment_with_env(environment)
            }
            result => result,
        }
    }

    /// Build configuration from defaults and environment variables only
    ///
    /// Used when no configuration directory is present.
    pub fn from_environment() -> ConfigResult<Arc<ConfigManager>> {
        Self::from_environment_with_env(&Self::detect_environment())
    }

    fn from_environment_with_env(environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        warn!(
            environment = %environment,
            "No configuration file found, using defaults and environment overrides"
        );

        let config = Self::finish(Config::builder())?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: PathBuf::from(DEFAULT_CONFIG_DIR),
            file_backed: false,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &SproutConfig {
        &self.config
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Whether any configuration file was read
    pub fn is_file_backed(&self) -> bool {
        self.file_backed
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("SPROUT_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn find_config_file(config_directory: &Path) -> ConfigResult<PathBuf> {
        let mut searched_paths = Vec::new();

        for name in BASE_FILE_NAMES {
            let config_path = config_directory.join(name);
            searched_paths.push(config_path.clone());

            if config_path.exists() {
                debug!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        Err(ConfigurationError::config_file_not_found(searched_paths))
    }

    /// Apply environment variable layers, deserialize and validate
    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ConfigResult<SproutConfig> {
        let database_url = env::var("DATABASE_URL").ok();

        let config: SproutConfig = builder
            .add_source(
                Environment::with_prefix("SPROUT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", database_url)?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}
