//! Application configuration for hostlink.
//!
//! User config lives at `~/.hostlink/hostlink.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HostlinkError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "hostlink.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".hostlink";

// ---------------------------------------------------------------------------
// Config structs (matching hostlink.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Pipeline-installation lookup settings.
    #[serde(default)]
    pub resolver: ResolverSettings,
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Engine instance name handed to the session factory.
    #[serde(default = "default_engine_name")]
    pub name: String,

    /// Emit `log_debug` lines to the host console.
    #[serde(default)]
    pub debug_logging: bool,

    /// Column at which session log lines are wrapped.
    #[serde(default = "default_console_width")]
    pub console_width: usize,

    /// UI affordance name of a running session's menu.
    #[serde(default = "default_menu_name")]
    pub menu_name: String,

    /// UI affordance name of the disabled marker.
    #[serde(default = "default_disabled_menu_name")]
    pub disabled_menu_name: String,

    /// Label shown for both menus.
    #[serde(default = "default_menu_label")]
    pub menu_label: String,

    /// Template key whose expansion becomes the host's project folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_project: Option<String>,

    /// Accepted host version prefixes. Empty accepts any version.
    #[serde(default)]
    pub supported_host_versions: Vec<String>,

    /// Accepted host platforms. Empty accepts any platform.
    #[serde(default)]
    pub supported_platforms: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            name: default_engine_name(),
            debug_logging: false,
            console_width: default_console_width(),
            menu_name: default_menu_name(),
            disabled_menu_name: default_disabled_menu_name(),
            menu_label: default_menu_label(),
            template_project: None,
            supported_host_versions: Vec::new(),
            supported_platforms: Vec::new(),
        }
    }
}

fn default_engine_name() -> String {
    "tk-headless".into()
}
fn default_console_width() -> usize {
    200
}
fn default_menu_name() -> String {
    "PipelineMenu".into()
}
fn default_disabled_menu_name() -> String {
    "PipelineMenuDisabled".into()
}
fn default_menu_label() -> String {
    "Pipeline".into()
}

/// `[resolver]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Directory marking the root of a pipeline installation.
    #[serde(default = "default_config_dir_name")]
    pub config_dir_name: String,

    /// File inside `config_dir_name` describing the installation.
    #[serde(default = "default_config_file_name")]
    pub config_file_name: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            config_dir_name: default_config_dir_name(),
            config_file_name: default_config_file_name(),
        }
    }
}

fn default_config_dir_name() -> String {
    ".pipeline".into()
}
fn default_config_file_name() -> String {
    "pipeline.toml".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.hostlink/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HostlinkError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.hostlink/hostlink.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HostlinkError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| HostlinkError::config(format!("failed to parse {}: {e}", path.display())))?;

    if config.engine.console_width == 0 {
        return Err(HostlinkError::config("engine.console_width must be at least 1"));
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HostlinkError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HostlinkError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HostlinkError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
