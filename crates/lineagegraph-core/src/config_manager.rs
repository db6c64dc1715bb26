use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for LineageGraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LineageGraphConfig {
    /// Graph view defaults
    #[serde(default)]
    pub graph: GraphViewConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-view defaults seeded into every build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphViewConfig {
    /// Default collapse state of table cards in the table view
    #[serde(default)]
    pub table_default_collapsed: bool,

    /// Default collapse state of table cards in the column view
    #[serde(default)]
    pub column_default_collapsed: bool,

    /// Number of shared table names listed on a script edge before "+N more"
    #[serde(default = "default_script_label_cap")]
    pub script_edge_label_cap: usize,
}

impl Default for GraphViewConfig {
    fn default() -> Self {
        Self {
            table_default_collapsed: false,
            column_default_collapsed: false,
            script_edge_label_cap: default_script_label_cap(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn default_script_label_cap() -> usize {
    3
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: LineageGraphConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.lineagegraph.toml, then ~/.lineagegraph/config.toml)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match config_path {
            Some(ref path) => info!(path = %path.display(), "Loaded lineagegraph configuration"),
            None => info!("No config file found, using defaults"),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load from an explicit file, still honouring environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::apply_env_overrides(Self::read_toml_file(path)?);
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
        }
    }

    fn load_config_file() -> Result<(LineageGraphConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".lineagegraph.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".lineagegraph").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((LineageGraphConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<LineageGraphConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: LineageGraphConfig) -> LineageGraphConfig {
        if let Ok(value) = std::env::var("LINEAGEGRAPH_DEFAULT_COLLAPSED") {
            config.graph.table_default_collapsed = parse_flag(&value);
        }
        if let Ok(value) = std::env::var("LINEAGEGRAPH_COLUMN_DEFAULT_COLLAPSED") {
            config.graph.column_default_collapsed = parse_flag(&value);
        }
        if let Ok(cap) = std::env::var("LINEAGEGRAPH_SCRIPT_LABEL_CAP") {
            match cap.parse() {
                Ok(n) => config.graph.script_edge_label_cap = n,
                Err(_) => warn!("Ignoring non-numeric LINEAGEGRAPH_SCRIPT_LABEL_CAP={}", cap),
            }
        }
        // Filter directives such as "lineagegraph=debug" are left to the subscriber.
        if let Ok(level) = std::env::var("RUST_LOG") {
            if LOG_LEVELS.contains(&level.as_str()) {
                config.logging.level = level;
            }
        }
        config
    }

    fn validate_config(config: &LineageGraphConfig) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        match config.logging.format.as_str() {
            "pretty" | "json" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, json, compact",
                    other
                )))
            }
        }

        if config.graph.script_edge_label_cap == 0 {
            return Err(ConfigError::ValidationError(
                "script_edge_label_cap must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn config(&self) -> &LineageGraphConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Write the default configuration to `path`, creating parent directories.
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(&LineageGraphConfig::default())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
