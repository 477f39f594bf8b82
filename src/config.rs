//! Folder layout, polling interval and CSV column names

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub folders: Folders,
    pub poll_interval_ms: u64,
    pub columns: ColumnSchema,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            folders: Folders::default(),
            poll_interval_ms: 5000,
            columns: ColumnSchema::default(),
        }
    }
}

impl AppConfig {
    /// Reads a TOML file, or returns defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        anyhow::ensure!(config.poll_interval_ms > 0, "poll_interval_ms must be positive");
        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// The four directories the orchestrator works with.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Folders {
    pub input: PathBuf,
    pub done: PathBuf,
    pub error: PathBuf,
    pub output: PathBuf,
}

impl Default for Folders {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/input"),
            done: PathBuf::from("data/done"),
            error: PathBuf::from("data/error"),
            output: PathBuf::from("data/output"),
        }
    }
}

impl Folders {
    pub fn under(root: &Path) -> Self {
        Self {
            input: root.join("input"),
            done: root.join("done"),
            error: root.join("error"),
            output: root.join("output"),
        }
    }

    pub fn ensure_exists(&self) -> anyhow::Result<()> {
        for dir in [&self.input, &self.done, &self.error, &self.output] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create folder {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Header names of the input columns.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColumnSchema {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub course_name: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub grade: String,
    pub completion_date: String,
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            first_name: "Etunimi".to_string(),
            last_name: "Sukunimi".to_string(),
            email: "E-mail".to_string(),
            course_name: "Kurssin nimi".to_string(),
            start_date: "Kurssi alkaa".to_string(),
            end_date: "Kurssi päättyy".to_string(),
            status: "Status".to_string(),
            grade: "Arvosana".to_string(),
            completion_date: "Kurssin suorituspäivämäärä".to_string(),
        }
    }
}

impl ColumnSchema {
    /// Columns that must appear in the header row.
    pub fn required(&self) -> [&str; 7] {
        [
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.email.as_str(),
            self.course_name.as_str(),
            self.start_date.as_str(),
            self.end_date.as_str(),
            self.status.as_str(),
        ]
    }
}
