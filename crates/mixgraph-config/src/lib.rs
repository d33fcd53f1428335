//! Configuration for mixgraph mixing graphs.
//!
//! # Features
//!
//! - **Graph config**: Stream format, device, tick interval, and named mixers in TOML
//! - **Effect chains**: Per-mixer effects with unit-aware parameter values
//! - **Validation**: Every problem in a config reported at once
//! - **Paths**: Platform-specific config directory
//! - **Construction**: Build a live [`MixerGraph`](mixgraph_core::MixerGraph) from a config
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use mixgraph_config::GraphConfig;
//! use mixgraph_core::SoftBackend;
//!
//! let config = GraphConfig::from_toml(r#"
//!     [[mixers]]
//!     name = "music"
//!
//!     [[mixers.effects]]
//!     type = "reverb"
//!     params = { room_size = "80%" }
//! "#).unwrap();
//!
//! let graph = config.build(Arc::new(SoftBackend::with_device(config.device))).unwrap();
//! assert!(graph.mixer("music").is_some());
//! ```

mod effect_config;
mod error;
mod graph_config;

/// Platform-specific configuration paths.
pub mod paths;

/// Graph configuration validation.
pub mod validation;

pub use effect_config::{EffectConfig, parse_param_value};
pub use error::ConfigError;
pub use graph_config::{GraphConfig, MixerConfig, StreamConfig};
pub use paths::{CONFIG_FILE_NAME, default_config_path, user_config_dir};
pub use validation::{ValidationError, ValidationResult, validate_config, validate_effect};
