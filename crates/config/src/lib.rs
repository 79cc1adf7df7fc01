//! Configuration loading and validation.
//!
//! Config files: `parley.toml`, `parley.yaml`, `parley.yml` or `parley.json`,
//! searched in `./` then the user config directory (`~/.config/parley/`).
//!
//! `${ENV_VAR}` and `${ENV_VAR:-default}` placeholders are expanded before
//! parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{Format, config_dir, discover_and_load, find_config_file, load_config, load_or_discover},
    schema::{AgentConfig, ContextBackend, ContextConfig, ParleyConfig, RoutingConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
