//! Configuration file management for planvault.
//!
//! Provides a TOML-based config file at `~/.config/planvault/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use planvault_store::config::DbConfig;

pub const ENV_BIND: &str = "PLANVAULT_BIND";
pub const ENV_PORT: &str = "PLANVAULT_PORT";
pub const ENV_STORE: &str = "PLANVAULT_STORE";

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// -----------------------------------------------------------------------
// Store backend selection
// -----------------------------------------------------------------------

/// Which [`planvault_store::KeyValueStore`] implementation to serve from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        })
    }
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend {other:?} (expected postgres or memory)"),
        }
    }
}

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub store: StoreSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the planvault config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/planvault` or
/// `~/.config/planvault`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("planvault");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("planvault")
}

/// Return the path to the planvault config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn parse_config(contents: &str) -> Result<ConfigFile> {
    toml::from_str(contents).context("failed to parse config file")
}

/// Load the config file if it exists. A file that exists but does not
/// parse is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse_config(&contents).map(Some)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct Overrides<'a> {
    pub database_url: Option<&'a str>,
    pub bind: Option<&'a str>,
    pub port: Option<u16>,
    pub backend: Option<StoreBackend>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct PlanvaultConfig {
    pub db_config: DbConfig,
    pub bind: String,
    pub port: u16,
    pub backend: StoreBackend,
}

impl PlanvaultConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    pub fn resolve(overrides: &Overrides<'_>) -> Result<Self> {
        let file_config = load_config()?;
        Self::resolve_with(overrides, file_config.as_ref())
    }

    /// Same as [`Self::resolve`] with an explicit (possibly absent) config file.
    pub fn resolve_with(overrides: &Overrides<'_>, file: Option<&ConfigFile>) -> Result<Self> {
        let db_url = match overrides.database_url {
            Some(url) => url.to_string(),
            None => match std::env::var(DbConfig::ENV_VAR) {
                Ok(url) => url,
                Err(_) => file
                    .map(|f| f.database.url.clone())
                    .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_string()),
            },
        };

        let bind = match overrides.bind {
            Some(bind) => bind.to_string(),
            None => match std::env::var(ENV_BIND) {
                Ok(bind) => bind,
                Err(_) => file
                    .map(|f| f.server.bind.clone())
                    .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            },
        };

        let port = match overrides.port {
            Some(port) => port,
            None => match std::env::var(ENV_PORT) {
                Ok(raw) => raw
                    .trim()
                    .parse::<u16>()
                    .with_context(|| format!("{ENV_PORT} is not a valid port: {raw:?}"))?,
                Err(_) => file.map(|f| f.server.port).unwrap_or(DEFAULT_PORT),
            },
        };

        let backend = match overrides.backend {
            Some(backend) => backend,
            None => match std::env::var(ENV_STORE) {
                Ok(raw) => raw
                    .parse::<StoreBackend>()
                    .with_context(|| format!("invalid {ENV_STORE} value"))?,
                Err(_) => file.map(|f| f.store.backend).unwrap_or_default(),
            },
        };

        Ok(Self {
            db_config: DbConfig::new(db_url),
            bind,
            port,
            backend,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
