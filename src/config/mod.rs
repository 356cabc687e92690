//! Configuration module for Page-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use page_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Each URL gets {} attempts", config.crawler.max_retries);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CacheBackend, CacheConfig, Config, CrawlerConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
