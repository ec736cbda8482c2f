//! Configuration module for the newsletter relocator
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use newsletter_relocator::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("relocator.toml")).unwrap();
//! println!("Retries per request: {}", config.pipeline.max_retries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ExtractionConfig, PipelineConfig, ResourceTypeEntry, StoreConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
