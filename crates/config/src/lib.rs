//! Configuration loading and validation for the routespan interceptor.
//!
//! Config files: `routespan.toml` or `routespan.json`.
//! Searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{config_dir, discover_and_load, load_config, parse_config},
    schema::{StatusPolicy, TracingConfig},
};
