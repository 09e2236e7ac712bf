//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from an optional TOML file. A missing file
//! is never fatal: the services log a warning and run on compiled defaults.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `CIVI_ROOT_FOLDER` environment variable
//! 3. `root_folder` in the TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::weights::{WeightConfig, WeightSettings};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CIVI_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "civi.db";

/// Default query API port
pub const DEFAULT_API_PORT: u16 = 5780;

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub api_host: String,
    pub api_port: u16,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            api_host: "127.0.0.1".to_string(),
            api_port: DEFAULT_API_PORT,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/civi (or /var/lib/civi for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("civi"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/civi"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/civi
        dirs::data_dir()
            .map(|d| d.join("civi"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/civi"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\civi
        dirs::data_local_dir()
            .map(|d| d.join("civi"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\civi"))
    } else {
        PathBuf::from("./civi_data")
    }
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and default export directory
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Raw `[weights]` section; see [`TomlConfig::weight_config`]
    #[serde(default)]
    pub weights: WeightSettings,

    #[serde(default)]
    pub confidence: ConfidenceConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub api: ApiConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Staleness decay applied to "latest" scores
#[derive(Debug, Clone, Deserialize)]
pub struct ConfidenceConfig {
    #[serde(default = "default_decay_per_year")]
    pub decay_per_year: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            decay_per_year: default_decay_per_year(),
        }
    }
}

fn default_decay_per_year() -> f64 {
    0.1
}

/// Static export settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Output directory (default: `<root>/export`)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// JSON list of `{"alpha-3", "name", "region"}` objects
    #[serde(default)]
    pub country_codes_path: Option<PathBuf>,

    #[serde(default = "default_source_version")]
    pub source_version: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            country_codes_path: None,
            source_version: default_source_version(),
        }
    }
}

fn default_source_version() -> String {
    "1.0".to_string()
}

/// Year range requested from upstream providers
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_end_year")]
    pub end_year: i32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            end_year: default_end_year(),
        }
    }
}

fn default_start_year() -> i32 {
    2019
}

fn default_end_year() -> i32 {
    2024
}

/// Query API listener
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

impl TomlConfig {
    /// Load configuration
    ///
    /// An explicitly named file must exist and parse. Without one, the
    /// platform config file is used if present; otherwise defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        match default_config_file() {
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validated weight configuration (defaults overlaid with `[weights]`)
    pub fn weight_config(&self) -> Result<WeightConfig> {
        WeightConfig::from_settings(&self.weights)
    }
}

/// Locate the platform config file, if one exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("civi").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/civi/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_override: Option<PathBuf>,
    config_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_override: None,
            config_root: None,
        }
    }

    pub fn with_cli_override(mut self, path: Option<PathBuf>) -> Self {
        self.cli_override = path;
        self
    }

    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.config_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_override {
            info!("[{}] Root folder from command line: {}", self.module_name, path.display());
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                info!("[{}] Root folder from {}: {}", self.module_name, ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.config_root {
            info!("[{}] Root folder from config file: {}", self.module_name, path.display());
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        let path = CompiledDefaults::for_current_platform().root_folder;
        info!("[{}] Root folder (default): {}", self.module_name, path.display());
        path
    }
}

/// Creates the root folder layout and derives paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    /// Export directory, honouring the `[export] output_dir` override
    pub fn export_dir(&self, config: &ExportConfig) -> PathBuf {
        config
            .output_dir
            .clone()
            .unwrap_or_else(|| self.root_folder.join("export"))
    }
}
