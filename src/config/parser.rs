use crate::config::types::{Config, OutputConfig};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Values supplied on the command line that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub search_url: Option<String>,
    pub max_pages: Option<u32>,
    pub max_concurrent: Option<u32>,
    pub delay_seconds: Option<f64>,
    pub batch_size: Option<u32>,
    pub checkpoint_interval: Option<u32>,
    pub output_prefix: Option<String>,
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use villa_sweep::config::load_config;
///
/// let config = load_config(Path::new("villa.toml")).unwrap();
/// println!("Batch size: {}", config.crawler.batch_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so two exports can be traced back to the same settings.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Applies command-line overrides and re-validates the result
pub fn apply_overrides(mut config: Config, overrides: ConfigOverrides) -> Result<Config, ConfigError> {
    let crawler = &mut config.crawler;
    if let Some(url) = overrides.search_url {
        crawler.search_url = Some(url);
    }
    if let Some(max_pages) = overrides.max_pages {
        crawler.max_pages = Some(max_pages);
    }
    if let Some(max_concurrent) = overrides.max_concurrent {
        crawler.max_concurrent = max_concurrent;
    }
    if let Some(delay) = overrides.delay_seconds {
        crawler.delay_seconds = delay;
    }
    if let Some(batch_size) = overrides.batch_size {
        crawler.batch_size = batch_size;
    }
    if let Some(interval) = overrides.checkpoint_interval {
        crawler.checkpoint_interval = interval;
    }
    if let Some(prefix) = overrides.output_prefix {
        let log_path = config.output.log_path.clone();
        config.output = OutputConfig {
            log_path,
            ..OutputConfig::with_prefix(&prefix)
        };
    }

    validate(&config)?;
    Ok(config)
}
