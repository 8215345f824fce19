//! Startup configuration.
//!
//! A YAML file describes the named servers to start. The core engine is
//! driven by [`ServerSpec`] values directly; the file is only startup glue.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// TLS settings for one server. Immutable; read once at server start.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    /// PEM bundle holding the certificate chain and private key.
    pub bundle: PathBuf,
    /// Rejected if set: encrypted bundles are not supported.
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub require_client_auth: bool,
    /// CA bundle used to verify client certificates.
    #[serde(default)]
    pub client_ca: Option<PathBuf>,
    /// Enabled protocol versions, e.g. "TLSv1.3", "TLSv1.2".
    #[serde(default = "default_protocols")]
    pub protocols: Vec<String>,
}

fn default_protocols() -> Vec<String> {
    vec!["TLSv1.3".to_string(), "TLSv1.2".to_string()]
}

/// Start intent for one named server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSpec {
    pub id: String,
    pub host: String,
    pub port: u16,
    /// TLS is enabled when settings are present.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

impl ServerSpec {
    pub fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub servers: Vec<ServerSpec>,
}

impl Config {
    /// Loads the file named by the `CONFIG` env var, or `config.yaml`.
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
        Self::from_file(Path::new(&path))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}
