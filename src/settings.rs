use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "table_indexer.toml";
const ENV_PREFIX: &str = "INDEXER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub artifacts: ArtifactSettings,
    pub index: IndexSettings,
    pub cleaning: CleaningSettings,
    pub run: RunSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub database: PathBuf,
    pub table: String,
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings {
            database: PathBuf::from("data/source.sqlite"),
            table: "table_m3".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    pub raw: PathBuf,
    pub clean: PathBuf,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        ArtifactSettings {
            raw: PathBuf::from("/tmp/raw_data.csv"),
            clean: PathBuf::from("/tmp/clean_data.csv"),
        }
    }
}

/// How a document's `_id` is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// SHA-256 of the record content.
    ContentHash,
    /// Value of `index.id_column`, falling back to the content hash.
    Column,
    /// Let the index assign ids. Re-runs duplicate documents.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnRecordError {
    Abort,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub url: String,
    pub name: String,
    pub timeout_secs: u64,
    pub id_strategy: IdStrategy,
    pub id_column: String,
    pub on_record_error: OnRecordError,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings {
            url: "http://elasticsearch:9200".into(),
            name: "m3_afi".into(),
            timeout_secs: 30,
            id_strategy: IdStrategy::ContentHash,
            id_column: "unique_id".into(),
            on_record_error: OnRecordError::Abort,
        }
    }
}

impl IndexSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What to do with a numeric column that has nulls but no values to take a median of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllNullPolicy {
    Leave,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningSettings {
    pub all_null_numeric: AllNullPolicy,
    pub unknown_label: String,
}

impl Default for CleaningSettings {
    fn default() -> Self {
        CleaningSettings {
            all_null_numeric: AllNullPolicy::Leave,
            unknown_label: "Unknown".into(),
        }
    }
}

/// Run metadata. Only `retries` and `retry_delay_secs` change behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub owner: String,
    pub retries: u32,
    pub retry_delay_secs: u64,
    pub schedule: String,
    pub timezone: String,
    pub start_date: NaiveDate,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            owner: "afi".into(),
            retries: 1,
            retry_delay_secs: 300,
            schedule: "10,20,30 9 * * 6".into(),
            timezone: "Asia/Jakarta".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 11, 1).unwrap_or_default(),
        }
    }
}

impl RunSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Settings {
    /// Defaults, then the TOML file at `path` if it exists, then `INDEXER_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading variables from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Settings> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let explicit = path.is_some();

        let settings = Config::builder()
            .add_source(
                File::from(file.as_path())
                    .format(FileFormat::Toml)
                    .required(explicit),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read settings from {:?}", file))?;

        settings
            .try_deserialize()
            .context("Invalid settings")
    }
}
