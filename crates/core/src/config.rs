//! Application configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Directory name used under the platform config and data directories.
pub const APP_DIR: &str = "titlepatch";
/// Vendor host serving patch metadata.
pub const DEFAULT_VENDOR_BASE_URL: &str = "https://a0.ww.np.dl.playstation.net";
/// Sentinel database path selecting a transient in-memory store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

const DEFAULT_TIMEOUT_SECS: u64 = 15;

const DEFAULT_CONFIG: &str = r#"# titlepatch configuration
#
# Every key can also be set through the environment, e.g. TITLEPATCH_PORT=8080.

# bind_address = "0.0.0.0"
# port = 9000

# SQLite database file, or ":memory:" for a throwaway catalog.
# database_path = "/var/lib/titlepatch/catalog.sqlite"

# vendor_base_url = "https://a0.ww.np.dl.playstation.net"
# request_timeout_secs = 15

# PEM bundle trusted in addition to the system roots, for vendor hosts
# signed by a private certificate authority.
# extra_root_certificate = "/etc/titlepatch/vendor-ca.pem"
"#;

/// Runtime settings for the catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interface the HTTP server listens on.
    pub bind_address: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// SQLite database path.
    pub database_path: PathBuf,
    /// Scheme and host of the vendor patch server.
    pub vendor_base_url: String,
    /// Per-request timeout against the vendor.
    pub request_timeout_secs: u64,
    /// Additional trusted root certificate (PEM).
    #[serde(default)]
    pub extra_root_certificate: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9000,
            database_path: default_database_path(),
            vendor_base_url: DEFAULT_VENDOR_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            extra_root_certificate: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load configuration using an explicit config file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", i64::from(defaults.port))?
            .set_default(
                "database_path",
                defaults.database_path.to_string_lossy().to_string(),
            )?
            .set_default("vendor_base_url", defaults.vendor_base_url)?
            .set_default("request_timeout_secs", DEFAULT_TIMEOUT_SECS as i64)?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("TITLEPATCH"));

        // Hosting platforms hand out the listening port through a bare PORT.
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("port", port)?;
        }

        builder
            .build()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Whether the catalog lives only in memory.
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }

    /// Socket address string for the HTTP listener.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Location of the user's config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("data"))
        .join(APP_DIR)
        .join("catalog.sqlite")
}

/// Write a commented default config file if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    write_default_config(&config_path())
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))
}
