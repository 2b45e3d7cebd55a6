//! Configuration module for Gamecha
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use gamecha::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gamecha.toml")).unwrap();
//! if let Some(steam) = &config.seeker.steam {
//!     println!("Steam seeker will use {} workers", steam.worker);
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, SeekerConfig, SteamConfig, StoreConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
