//! Shared types, error model, and configuration for hostlink.
//!
//! This crate is the foundation depended on by all other hostlink crates.
//! It provides:
//! - [`HostlinkError`] — the unified error type
//! - Domain types ([`Context`], [`EntityRef`], [`EngineId`], [`SessionId`])
//! - Configuration ([`AppConfig`], [`EngineSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EngineSettings, ResolverSettings, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{HostlinkError, Result};
pub use types::{Context, EngineId, EntityRef, SessionId};
