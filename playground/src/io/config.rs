//! Client configuration stored under `.playground/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use url::Url;

/// Location of the config file, relative to the project directory.
pub const CONFIG_PATH: &str = ".playground/config.toml";

/// How sessions reach the execution server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Streamed output over `/ws/submit`.
    #[default]
    WebSocket,
    /// One POST to `/submit`; output arrives all at once.
    Http,
}

/// Client configuration (TOML).
///
/// Missing fields take their defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the execution server.
    pub server_url: String,

    pub transport: TransportMode,

    /// Snapshot file, relative to the project directory.
    pub snapshot_path: PathBuf,

    /// Root-level file the server runs, and the one re-selected after a run.
    pub main_file: String,

    /// Remove ANSI escape sequences from program output before printing.
    pub strip_ansi: bool,

    /// Whole-request timeout for the HTTP transport, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            transport: TransportMode::WebSocket,
            snapshot_path: PathBuf::from(".playground/tree.json"),
            main_file: "main.dingle".to_string(),
            strip_ansi: true,
            http_timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        let url = self.server_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "server_url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        if self.main_file.trim().is_empty() {
            return Err(anyhow!("main_file must be non-empty"));
        }
        if self.main_file.contains('/') {
            return Err(anyhow!("main_file must be a root-level file name"));
        }
        if self.snapshot_path.as_os_str().is_empty() {
            return Err(anyhow!("snapshot_path must be non-empty"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn server_url(&self) -> Result<Url> {
        Url::parse(self.server_url.trim())
            .with_context(|| format!("parse server_url '{}'", self.server_url))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ClientConfig::default()`.
pub fn load_config(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        let cfg = ClientConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ClientConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ClientConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Write `contents` next to `path` and rename it into place.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path
        .file_name()
        .with_context(|| format!("path has no file name {}", path.display()))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
