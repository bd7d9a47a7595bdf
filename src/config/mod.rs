//! Configuration module for Villa-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and layering command-line overrides on top of them.
//!
//! # Example
//!
//! ```no_run
//! use villa_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("villa.toml")).unwrap();
//! println!("Crawler will run {} requests at once", config.crawler.max_concurrent);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    AttributeLabels, BackoffKind, Config, CrawlerConfig, FetcherConfig, OutputConfig, SiteConfig,
    UserAgentConfig,
};

pub use parser::{
    apply_overrides, compute_config_hash, load_config, load_config_with_hash, ConfigOverrides,
};
pub use validation::validate;
