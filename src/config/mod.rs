//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CliArgs, Command, GlobalOverrides, InspectionsCommand, ListInspectionsArgs, RetryArgs,
    ShowInspectionArgs, StatusArgs,
};

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vigil";
const DEFAULT_DATABASE_PATH: &str = "vigil.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_DB_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_CODE_PREFIX: &str = "INSP";

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub sync: SyncSettings,
    pub inspections: InspectionSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: NonZeroU32,
    pub busy_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// No remote means the device works fully offline and the outbox accumulates.
    pub remote_url: Option<Url>,
    pub api_token: Option<String>,
    pub request_timeout: Duration,
    pub sync_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct InspectionSettings {
    pub code_prefix: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("VIGIL").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    sync: RawSyncSettings,
    inspections: RawInspectionSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = overrides.database_path.as_ref() {
            self.database.path = Some(path.clone());
        }
        if let Some(url) = overrides.remote_url.as_ref() {
            self.sync.remote_url = Some(url.clone());
        }
        if let Some(timeout) = overrides.request_timeout_ms {
            self.sync.request_timeout_ms = Some(timeout);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            sync,
            inspections,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            sync: build_sync_settings(sync)?,
            inspections: build_inspection_settings(inspections)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let path = database
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid("database.path", "path must not be empty"));
    }

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    let busy_timeout_ms = database
        .busy_timeout_ms
        .unwrap_or(DEFAULT_DB_BUSY_TIMEOUT_MS);

    Ok(DatabaseSettings {
        path,
        max_connections,
        busy_timeout: Duration::from_millis(busy_timeout_ms),
    })
}

fn build_sync_settings(sync: RawSyncSettings) -> Result<SyncSettings, LoadError> {
    let remote_url = match sync.remote_url.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => {
            let url = Url::parse(value)
                .map_err(|err| LoadError::invalid("sync.remote_url", err.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "sync.remote_url",
                    format!("unsupported scheme `{}`", url.scheme()),
                ));
            }
            Some(url)
        }
    };

    let api_token = sync.api_token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let timeout_ms = sync
        .request_timeout_ms
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "sync.request_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(SyncSettings {
        remote_url,
        api_token,
        request_timeout: Duration::from_millis(timeout_ms),
        sync_on_startup: sync.sync_on_startup.unwrap_or(true),
    })
}

fn build_inspection_settings(
    inspections: RawInspectionSettings,
) -> Result<InspectionSettings, LoadError> {
    let code_prefix = inspections
        .code_prefix
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_CODE_PREFIX.to_string());
    if code_prefix.is_empty() || !code_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LoadError::invalid(
            "inspections.code_prefix",
            "must be non-empty and alphanumeric",
        ));
    }

    Ok(InspectionSettings { code_prefix })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    path: Option<PathBuf>,
    max_connections: Option<u32>,
    busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSyncSettings {
    remote_url: Option<String>,
    api_token: Option<String>,
    request_timeout_ms: Option<u64>,
    sync_on_startup: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawInspectionSettings {
    code_prefix: Option<String>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
