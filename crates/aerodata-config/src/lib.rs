//! # AeroData Configuration Library
//!
//! Type-safe configuration for the query compilation and validation engine.
//!
//! ## Features
//!
//! - Multi-format support (YAML, TOML, JSON)
//! - `{env:VAR}` references in any string value
//! - Validation of numeric settings before they reach the engine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aerodata_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::load_from_file("aerodata.toml").await?;
//!     println!("retry attempts: {}", config.execution.retry.max_attempts);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod loader;

pub use config::*;
pub use loader::*;
