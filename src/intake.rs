use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::IntakeError;

pub const ACCEPTED: &str = "CSV uploaded successfully and queued for processing.";

/// Copies a file from disk into the input folder. See [`submit_bytes`].
pub fn submit(source: &Path, input_dir: &Path) -> Result<PathBuf, IntakeError> {
    let name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| IntakeError::InvalidName(source.display().to_string()))?;
    let content = fs::read(source)?;
    submit_bytes(&name, &content, input_dir)
}

/// Places an uploaded CSV into the input folder for the next tick.
///
/// The content lands in a hidden `.part` file first and is renamed into
/// place, so the watcher never sees a half-written CSV. An existing file
/// with the same name is replaced. Returns without waiting for processing.
pub fn submit_bytes(file_name: &str, content: &[u8], input_dir: &Path) -> Result<PathBuf, IntakeError> {
    if content.is_empty() {
        warn!("File upload failed: empty file");
        return Err(IntakeError::Empty);
    }

    let clean = clean_name(file_name)?;
    if !clean.to_lowercase().ends_with(".csv") {
        warn!(file = %clean, "Rejected file upload: not a .csv");
        return Err(IntakeError::NotCsv(clean));
    }

    let staging = input_dir.join(format!(".{}.part", Uuid::new_v4()));
    let target = input_dir.join(&clean);

    let staged = fs::File::create(&staging).and_then(|mut file| {
        file.write_all(content)?;
        file.sync_all()
    });
    if let Err(err) = staged.and_then(|_| fs::rename(&staging, &target)) {
        if let Err(cleanup) = fs::remove_file(&staging) {
            warn!(path = %staging.display(), %cleanup, "Failed to remove staging file");
        }
        return Err(err.into());
    }

    info!(path = %target.display(), "Uploaded CSV saved");
    Ok(target)
}

/// Keeps only the final path component so uploads cannot escape the input folder.
fn clean_name(file_name: &str) -> Result<String, IntakeError> {
    let last = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if last.is_empty() || last == "." || last == ".." {
        return Err(IntakeError::InvalidName(file_name.to_string()));
    }
    Ok(last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stores_csv_in_input_folder() {
        let dir = TempDir::new().unwrap();
        let path = submit_bytes("records.csv", b"a,b\n1,2\n", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("records.csv"));
        assert_eq!(fs::read(&path).unwrap(), b"a,b\n1,2\n");

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "staging file must not remain");
    }

    #[test]
    fn replaces_same_named_file() {
        let dir = TempDir::new().unwrap();
        submit_bytes("records.csv", b"old", dir.path()).unwrap();
        let path = submit_bytes("records.csv", b"new", dir.path()).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn rejects_empty_and_non_csv() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            submit_bytes("records.csv", b"", dir.path()),
            Err(IntakeError::Empty)
        ));
        assert!(matches!(
            submit_bytes("records.txt", b"x", dir.path()),
            Err(IntakeError::NotCsv(name)) if name == "records.txt"
        ));
        assert!(submit_bytes("RECORDS.CSV", b"x", dir.path()).is_ok());
    }

    #[test]
    fn strips_directory_components() {
        let dir = TempDir::new().unwrap();
        let path = submit_bytes("../../etc/records.csv", b"x", dir.path()).unwrap();
        assert_eq!(path, dir.path().join("records.csv"));
        assert!(matches!(
            submit_bytes("uploads/", b"x", dir.path()),
            Err(IntakeError::InvalidName(_))
        ));
    }

    #[test]
    fn failed_rename_removes_staging_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("records.csv")).unwrap();

        let err = submit_bytes("records.csv", b"a,b\n", dir.path()).unwrap_err();
        assert!(matches!(err, IntakeError::Io(_)));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn submit_reads_source_file() {
        let src = TempDir::new().unwrap();
        let input = TempDir::new().unwrap();
        let source = src.path().join("batch.csv");
        fs::write(&source, "h\nv\n").unwrap();

        let path = submit(&source, input.path()).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "h\nv\n");
        assert!(source.exists());
    }
}
