// src/config/app.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::resolver::ResolverMode;

pub const DEFAULT_CONFIG_PATH: &str = "config/econutri.toml";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:10000";
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SETTINGS_DIR: &str = "data/settings";

pub const ENV_CONFIG_PATH: &str = "ECONUTRI_CONFIG_PATH";
pub const ENV_API_BASE_URL: &str = "ECONUTRI_API_BASE_URL";
pub const ENV_RESOLVER: &str = "ECONUTRI_RESOLVER";
pub const ENV_REMOTE_TIMEOUT_MS: &str = "ECONUTRI_REMOTE_TIMEOUT_MS";
pub const ENV_SETTINGS_DIR: &str = "ECONUTRI_SETTINGS_DIR";
pub const ENV_SAVE_HISTORY: &str = "ECONUTRI_SAVE_HISTORY";

const TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 100..=60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the analysis/grade/recommendation backend.
    pub api_base_url: String,
    /// "local" | "remote"
    pub resolver: ResolverMode,
    /// Upper bound on one remote resolve. Clamped back to the default outside 100..=60000.
    pub remote_timeout_ms: u64,
    pub settings_dir: PathBuf,
    /// Ask the grade service to record remote resolves in scan history.
    pub save_history: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            resolver: ResolverMode::Local,
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT_MS,
            settings_dir: PathBuf::from(DEFAULT_SETTINGS_DIR),
            save_history: true,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing app config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading app config at {}", path.display()))?;
        Self::from_toml_str(&data)
    }

    /// Resolve config the way the binary does:
    /// 1) `$ECONUTRI_CONFIG_PATH` (must exist)
    /// 2) `config/econutri.toml` if present
    /// 3) built-in defaults
    ///
    /// then apply `ECONUTRI_*` env overrides.
    pub fn load_default() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(PathBuf::from(p))?,
            Err(_) => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::load_from_file(&p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_overrides(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    /// Apply overrides from any key lookup (the process env in production).
    /// Unparsable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(mode) = get(ENV_RESOLVER) {
            match mode.parse::<ResolverMode>() {
                Ok(m) => self.resolver = m,
                Err(e) => warn!(error = %e, "ignoring {ENV_RESOLVER}"),
            }
        }
        if let Some(ms) = get(ENV_REMOTE_TIMEOUT_MS) {
            match ms.trim().parse::<u64>() {
                Ok(v) => self.remote_timeout_ms = v,
                Err(_) => warn!(value = %ms, "ignoring {ENV_REMOTE_TIMEOUT_MS}"),
            }
        }
        if let Some(dir) = get(ENV_SETTINGS_DIR).filter(|v| !v.trim().is_empty()) {
            self.settings_dir = PathBuf::from(dir.trim());
        }
        if let Some(v) = get(ENV_SAVE_HISTORY) {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.save_history = true,
                "0" | "false" | "no" => self.save_history = false,
                _ => warn!(value = %v, "ignoring {ENV_SAVE_HISTORY}"),
            }
        }
        self.sanitize();
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    fn sanitize(&mut self) {
        if !TIMEOUT_RANGE_MS.contains(&self.remote_timeout_ms) {
            warn!(
                remote_timeout_ms = self.remote_timeout_ms,
                "remote timeout out of range, using default"
            );
            self.remote_timeout_ms = DEFAULT_REMOTE_TIMEOUT_MS;
        }
        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        self.api_base_url = if trimmed.is_empty() {
            DEFAULT_API_BASE_URL.to_string()
        } else {
            trimmed.to_string()
        };
    }
}
