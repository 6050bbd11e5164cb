use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::transport::types::CurrentIdentity;

const CONFIG_FILE: &str = ".pr-dashboard.toml";
const TOKEN_ENV: &str = "TFS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

/// Which backend serves the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Talk to the REST API directly
    #[default]
    Rest,
    /// Run as an extension, with the host providing the user context
    Extension,
}

/// Top-level configuration loaded from .pr-dashboard.toml.
///
/// All sections are optional so `--mock` works with no file at all.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportKind,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub extension: ExtensionConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Collection URL, e.g. https://tfs.example.com/tfs/DefaultCollection
    pub api_endpoint: Option<String>,
    /// Project used when not listing across all projects
    pub default_project: Option<String>,
    /// Personal access token. If None, falls back to TFS_TOKEN env var.
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtensionConfig {
    /// Hosted services do not expose the identity endpoints.
    #[serde(default)]
    pub hosted: bool,
    /// Signed-in user as supplied by the extension host
    pub user: Option<UserContext>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserContext {
    pub id: String,
    pub display_name: String,
    pub unique_name: String,
}

impl From<UserContext> for CurrentIdentity {
    fn from(context: UserContext) -> Self {
        CurrentIdentity {
            id: context.id,
            display_name: context.display_name,
            unique_name: context.unique_name,
        }
    }
}

impl Config {
    /// Load configuration from .pr-dashboard.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the access token: config file value takes precedence,
    /// falls back to TFS_TOKEN env var.
    pub fn token(&self) -> Option<String> {
        self.server
            .token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV).ok())
    }

    pub fn api_endpoint(&self) -> Result<&str, ConfigError> {
        self.server
            .api_endpoint
            .as_deref()
            .ok_or(ConfigError::Missing("server.api_endpoint"))
    }

    pub fn default_project(&self) -> Result<&str, ConfigError> {
        self.server
            .default_project
            .as_deref()
            .ok_or(ConfigError::Missing("server.default_project"))
    }

    pub fn extension_user(&self) -> Result<CurrentIdentity, ConfigError> {
        self.extension
            .user
            .clone()
            .map(CurrentIdentity::from)
            .ok_or(ConfigError::Missing("extension.user"))
    }
}
