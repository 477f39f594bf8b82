use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::Summaries;

pub const COURSES_FILE: &str = "courses.json";
pub const USERS_FILE: &str = "users.json";
pub const RESULTS_FILE: &str = "course_results.json";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Writes the three JSON documents for one processed file.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_root: PathBuf,
}

impl OutputWriter {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    /// Creates `<root>/<base>_<timestamp>` and fills it. Either all three
    /// documents are written or the directory is removed again.
    pub fn write(&self, base_name: &str, summaries: &Summaries) -> Result<PathBuf, PipelineError> {
        self.write_at(base_name, summaries, Local::now().naive_local())
    }

    pub fn write_at(
        &self,
        base_name: &str,
        summaries: &Summaries,
        now: NaiveDateTime,
    ) -> Result<PathBuf, PipelineError> {
        let dir = self.claim_dir(base_name, now)?;
        info!(dir = %dir.display(), "Writing JSON outputs");

        let written = write_document(&dir, COURSES_FILE, &summaries.courses)
            .and_then(|_| write_document(&dir, USERS_FILE, &summaries.users))
            .and_then(|_| write_document(&dir, RESULTS_FILE, &summaries.results));

        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_dir_all(&dir) {
                warn!(dir = %dir.display(), %cleanup, "Failed to remove partial output");
            }
            return Err(err);
        }

        info!(
            courses = summaries.courses.len(),
            users = summaries.users.len(),
            results = summaries.results.len(),
            "JSON outputs written"
        );
        Ok(dir)
    }

    /// Creates a fresh directory, adding `-1`, `-2`, ... when the
    /// timestamped name is already taken.
    fn claim_dir(&self, base_name: &str, now: NaiveDateTime) -> Result<PathBuf, PipelineError> {
        let stem = format!("{}_{}", base_name, now.format(TIMESTAMP_FORMAT));
        let mut suffix = 0usize;
        loop {
            let name = if suffix == 0 {
                stem.clone()
            } else {
                format!("{stem}-{suffix}")
            };
            let candidate = self.output_root.join(name);
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Serializes to a temporary sibling and renames it into place.
fn write_document<T: Serialize>(dir: &Path, name: &str, value: &T) -> Result<(), PipelineError> {
    let target = dir.join(name);
    let tmp = dir.join(format!(".{name}.tmp"));

    let file = fs::File::create(&tmp)?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.flush()?;
    drop(out);

    fs::rename(&tmp, &target)?;
    Ok(())
}

/// File name without its `.csv` extension.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}
