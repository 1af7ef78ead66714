//! Configuration management for the Warden node
//!
//! Settings come from `conf/application.yml` (or the file given with
//! `--config`), then `WARDEN.`-prefixed environment variables, then command
//! line overrides.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use config::{Config, Environment};
use tracing::Level;
use warden_cache::CacheConfig;
use warden_common::CONFIG_PREFIX;
use warden_lock::LockConfig;

use crate::soak::SoakConfig;
use crate::startup::logging::{LogRotation, LoggingConfig};

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";

/// Command line arguments for the node
#[derive(Debug, Default, Parser)]
#[command(name = "warden-server", version, about = "Warden lock coordinator node")]
pub struct Cli {
    /// Configuration file, `conf/application.yml` when omitted
    #[arg(short = 'c', long = "config", env = "WARDEN_CONFIG")]
    pub config: Option<PathBuf>,
    /// Log level override
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,
    /// Simulated nodes sharing one cluster backend
    #[arg(long = "nodes")]
    pub nodes: Option<u32>,
    /// Worker threads per node
    #[arg(long = "workers")]
    pub workers: Option<u32>,
    /// Distinct resource ids the workers contend on
    #[arg(long = "resources")]
    pub resources: Option<u32>,
    /// Lock round trips per worker
    #[arg(long = "iterations")]
    pub iterations: Option<u32>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Build the configuration for the given command line
    ///
    /// A missing default file is tolerated; a missing file named with
    /// `--config` is an error.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let explicit = cli.config.is_some();
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut builder = Config::builder()
            .add_source(config::File::from(path.as_path()).required(explicit))
            .add_source(
                Environment::with_prefix(CONFIG_PREFIX)
                    .separator(".")
                    .keep_prefix(true)
                    .try_parsing(true),
            );

        let overrides = [
            ("warden.soak.nodes", cli.nodes),
            ("warden.soak.workers", cli.workers),
            ("warden.soak.resources", cli.resources),
            ("warden.soak.iterations", cli.iterations),
        ];
        for (key, value) in overrides {
            if let Some(v) = value {
                builder = builder
                    .set_override(key, v as i64)
                    .with_context(|| format!("Failed to set override {key}"))?;
            }
        }
        if let Some(level) = &cli.log_level {
            builder = builder
                .set_override("warden.log.level", level.as_str())
                .context("Failed to set log level override")?;
        }

        let config = builder
            .build()
            .with_context(|| format!("Failed to build configuration from {}", path.display()))?;
        Ok(Configuration { config })
    }

    pub fn lock_config(&self) -> LockConfig {
        LockConfig::from_config(&self.config)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::from_config(&self.config)
    }

    pub fn log_level(&self) -> Level {
        self.config
            .get_string("warden.log.level")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Level::INFO)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            log_dir: self
                .config
                .get_string("warden.log.dir")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs")),
            console_output: self.config.get_bool("warden.log.console").unwrap_or(true),
            file_logging: self.config.get_bool("warden.log.file").unwrap_or(false),
            level: self.log_level(),
            rotation: self
                .config
                .get_string("warden.log.rotation")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(LogRotation::Daily),
        }
    }

    pub fn soak_config(&self) -> SoakConfig {
        let get = |key: &str, default: u32| {
            self.config
                .get_int(key)
                .map(|v| v.clamp(1, u32::MAX as i64) as u32)
                .unwrap_or(default)
        };
        let defaults = SoakConfig::default();

        SoakConfig {
            nodes: get("warden.soak.nodes", defaults.nodes),
            workers: get("warden.soak.workers", defaults.workers),
            resources: get("warden.soak.resources", defaults.resources),
            iterations: get("warden.soak.iterations", defaults.iterations),
            hold: self
                .config
                .get_int("warden.soak.hold-ms")
                .map(|v| Duration::from_millis(v.max(0) as u64))
                .unwrap_or(defaults.hold),
        }
    }
}
