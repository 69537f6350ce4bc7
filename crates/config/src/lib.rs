//! # Lampyre Config
//!
//! Configuration loading for Lampyre nodes.
//!
//! All settings live in a single `lampyre.toml` file. Every field has a
//! default, so an empty file (or no file at all) yields a runnable
//! configuration; validation runs after parsing and rejects parameter
//! combinations the protocol cannot operate under.
//!
//! ## Example
//!
//! ```rust
//! use lampyre_config::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.protocol.num_rings, 10);
//! config.validate().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;

pub use config::{Config, LoggingConfig, NodeConfig, ProtocolConfig, StrategyConfig, StrategyKind};
pub use error::{ConfigError, ConfigResult};
