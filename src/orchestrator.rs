use std::fs;
use std::future::Future;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use crate::config::{AppConfig, ColumnSchema, Folders};
use crate::dedup;
use crate::error::PipelineError;
use crate::summary;
use crate::validate;
use crate::writer::{self, OutputWriter};

/// Terminal state of a processed file. A file in either state has left
/// the input folder and is not picked up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Succeeded { output_dir: PathBuf },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub file_name: String,
    pub state: FileState,
}

/// Result of one scan of the input folder.
#[derive(Debug, Default)]
pub struct TickReport {
    pub outcomes: Vec<FileOutcome>,
    pub scan_error: Option<String>,
}

impl TickReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, FileState::Succeeded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, FileState::Failed { .. }))
            .count()
    }
}

/// Drives each CSV in the input folder through
/// validate → dedup → summarize → write, then files it under done or error.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    folders: Folders,
    columns: ColumnSchema,
    writer: OutputWriter,
}

impl Orchestrator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            folders: config.folders.clone(),
            columns: config.columns.clone(),
            writer: OutputWriter::new(config.folders.output.clone()),
        }
    }

    pub fn folders(&self) -> &Folders {
        &self.folders
    }

    /// CSV files in the input folder, in directory enumeration order.
    pub fn discover(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.folders.input)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(%err, "Skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if path.is_file() && is_csv(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// One scan: every discovered file is processed to a terminal state,
    /// one after another.
    pub fn tick(&self) -> TickReport {
        info!(folder = %self.folders.input.display(), "Checking folder for new CSV files");

        let files = match self.discover() {
            Ok(files) => files,
            Err(err) => {
                error!(folder = %self.folders.input.display(), %err, "Error reading input folder");
                return TickReport {
                    outcomes: Vec::new(),
                    scan_error: Some(err.to_string()),
                };
            }
        };

        let outcomes = files.iter().map(|path| self.process_file(path)).collect();
        TickReport {
            outcomes,
            scan_error: None,
        }
    }

    pub fn process_file(&self, path: &Path) -> FileOutcome {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(file = %file_name, "Processing file");

        let state = match self.run_pipeline(path) {
            Ok(output_dir) => match relocate(path, &self.folders.done) {
                Ok(target) => {
                    info!(file = %file_name, done = %target.display(), "Finished processing");
                    FileState::Succeeded { output_dir }
                }
                Err(err) => {
                    discard_output(&output_dir);
                    self.fail(path, &file_name, format!("failed to move to done folder: {err}"))
                }
            },
            Err(err) => self.fail(path, &file_name, err.to_string()),
        };

        FileOutcome { file_name, state }
    }

    fn run_pipeline(&self, path: &Path) -> Result<PathBuf, PipelineError> {
        let file = fs::File::open(path)?;
        let parsed = validate::read_records(BufReader::new(file), &self.columns)?;
        let canonical = dedup::deduplicate(parsed.records);
        let summaries = summary::summarize(&canonical);
        self.writer.write(&writer::base_name(path), &summaries)
    }

    fn fail(&self, path: &Path, file_name: &str, reason: String) -> FileState {
        error!(file = %file_name, %reason, "Failed to process file");
        match relocate(path, &self.folders.error) {
            Ok(target) => info!(file = %file_name, error = %target.display(), "Moved failed file to error folder"),
            // Left in place, so the next tick picks it up again.
            Err(err) => error!(file = %file_name, %err, "Failed to move file to error folder"),
        }
        FileState::Failed { reason }
    }

    /// Scans on a fixed delay until `shutdown` resolves. Files are processed
    /// on the blocking pool so the timer and shutdown signal stay responsive.
    pub async fn run<F>(self: Arc<Self>, delay: Duration, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(delay_ms = delay.as_millis() as u64, "Starting file watcher");

        loop {
            let worker = Arc::clone(&self);
            let report = tokio::task::spawn_blocking(move || worker.tick())
                .await
                .context("tick task panicked")?;
            if !report.outcomes.is_empty() {
                info!(
                    succeeded = report.succeeded(),
                    failed = report.failed(),
                    "Tick finished"
                );
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping file watcher");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Ok(())
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Moves `path` into `dir`, replacing a same-named file there. `dir` is
/// created when missing.
fn relocate(path: &Path, dir: &Path) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    fs::create_dir_all(dir)?;
    let target = dir.join(file_name);

    if target.is_file() {
        fs::remove_file(&target)?;
    }
    if fs::rename(path, &target).is_err() {
        // rename cannot cross filesystems
        fs::copy(path, &target)?;
        fs::remove_file(path)?;
    }
    Ok(target)
}

fn discard_output(dir: &Path) {
    if let Err(err) = fs::remove_dir_all(dir) {
        warn!(dir = %dir.display(), %err, "Failed to remove output folder");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Orchestrator) {
        let root = TempDir::new().unwrap();
        let config = AppConfig {
            folders: Folders::under(root.path()),
            ..AppConfig::default()
        };
        config.folders.ensure_exists().unwrap();
        (root, Orchestrator::new(&config))
    }

    #[test]
    fn discovers_only_csv_files() {
        let (_root, orchestrator) = setup();
        let input = &orchestrator.folders().input;
        fs::write(input.join("a.csv"), "x").unwrap();
        fs::write(input.join("b.CSV"), "x").unwrap();
        fs::write(input.join("notes.txt"), "x").unwrap();
        fs::write(input.join(".upload.part"), "x").unwrap();
        fs::create_dir(input.join("nested.csv")).unwrap();

        let mut names: Vec<_> = orchestrator
            .discover()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.csv", "b.CSV"]);
    }

    #[test]
    fn relocate_replaces_existing_target() {
        let (_root, orchestrator) = setup();
        let folders = orchestrator.folders();
        let source = folders.input.join("dup.csv");
        fs::write(&source, "new").unwrap();
        fs::write(folders.done.join("dup.csv"), "old").unwrap();

        let target = relocate(&source, &folders.done).unwrap();
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(target).unwrap(), "new");
    }

    #[test]
    fn unreadable_input_folder_ends_tick() {
        let (_root, orchestrator) = setup();
        fs::remove_dir_all(&orchestrator.folders().input).unwrap();

        let report = orchestrator.tick();
        assert!(report.scan_error.is_some());
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn relocate_recreates_missing_folder() {
        let (_root, orchestrator) = setup();
        let folders = orchestrator.folders();
        fs::remove_dir_all(&folders.error).unwrap();
        let source = folders.input.join("late.csv");
        fs::write(&source, "x").unwrap();

        let target = relocate(&source, &folders.error).unwrap();
        assert_eq!(target, folders.error.join("late.csv"));
        assert!(!source.exists());
    }

    #[test]
    fn missing_error_folder_does_not_cause_reprocessing() {
        let (_root, orchestrator) = setup();
        let folders = orchestrator.folders();
        fs::remove_dir_all(&folders.error).unwrap();
        fs::write(folders.input.join("empty.csv"), "").unwrap();

        let first = orchestrator.tick();
        assert_eq!(first.failed(), 1);
        let second = orchestrator.tick();
        assert!(second.outcomes.is_empty());

        assert!(!folders.input.join("empty.csv").exists());
        assert!(folders.error.join("empty.csv").exists());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_root, orchestrator) = setup();
        let orchestrator = Arc::new(orchestrator);
        orchestrator
            .run(Duration::from_secs(3600), async {})
            .await
            .unwrap();
    }
}
