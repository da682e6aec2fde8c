//! TOML + environment configuration.
//!
//! Layering, lowest to highest: built-in defaults, the TOML file,
//! `FLEETPULSE_*` environment variables, CLI flags (applied by the
//! commands themselves). Everything resolves to owned values handed to
//! the components that need them — there is no global config state.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleetpulse_core::TimingPolicy;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub timing: TimingSection,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite path, or ":memory:".
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            database: default_database(),
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}
fn default_port() -> u16 {
    8080
}
fn default_database() -> String {
    "fleet.db".into()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ClientSection {
    /// Server base URL for watch / stats / sweep.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".into()
}

/// Optional overrides for the timing policy. Anything unset keeps the
/// production default.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TimingSection {
    pub push_cadence_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub max_push_retries: Option<u32>,
    pub poll_interval_secs: Option<u64>,
    pub staleness_threshold_secs: Option<u64>,
}

impl TimingSection {
    /// Apply the overrides on top of the default policy.
    pub fn to_policy(&self) -> TimingPolicy {
        let mut policy = TimingPolicy::default();
        if let Some(secs) = self.push_cadence_secs {
            policy.push_cadence = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout_secs {
            policy.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(n) = self.max_push_retries {
            policy.max_push_retries = n;
        }
        if let Some(secs) = self.poll_interval_secs {
            policy.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.staleness_threshold_secs {
            policy.staleness_threshold = Duration::from_secs(secs);
        }
        policy
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Default config file location (platform config dir).
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "fleetpulse", "fleetpulse")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load config from `path` (or the default location), layered with
/// `FLEETPULSE_*` environment variables. A missing file is fine —
/// defaults apply.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(Config::default()));

    let file = path.map(Path::to_path_buf).or_else(config_path);
    if let Some(file) = file {
        figment = figment.merge(Toml::file(file));
    }

    let config = figment
        .merge(Env::prefixed("FLEETPULSE_").split("__"))
        .extract()?;
    Ok(config)
}
