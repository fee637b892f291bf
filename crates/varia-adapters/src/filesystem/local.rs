//! Local filesystem adapter using std::fs.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use walkdir::WalkDir;

use varia_core::{
    application::{ApplicationError, ports::Filesystem},
    error::{VariaError, VariaResult},
};

/// Production filesystem implementation using `std::fs`.
///
/// Whole-file writes go through a temporary sibling file and a rename, so a
/// reader never sees a half-written artifact or change log.
#[derive(Debug, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    /// Create a new local filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> VariaResult<()> {
        fs::create_dir_all(path).map_err(|e| map_io_error(path, e, "create directory"))
    }

    fn write_file(&self, path: &Path, content: &str) -> VariaResult<()> {
        atomic_write(path, content.as_bytes()).map_err(|e| map_io_error(path, e, "write file"))
    }

    fn append_file(&self, path: &Path, content: &str) -> VariaResult<()> {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| {
                file.write_all(content.as_bytes())?;
                file.sync_all()
            })
            .map_err(|e| map_io_error(path, e, "append to file"))
    }

    fn read_file(&self, path: &Path) -> VariaResult<String> {
        fs::read_to_string(path).map_err(|e| map_io_error(path, e, "read file"))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_dirs(&self, path: &Path) -> VariaResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: format!("Failed to list directory: {}", e),
            })?;
            if entry.file_type().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove_dir_all(&self, path: &Path) -> VariaResult<()> {
        fs::remove_dir_all(path).map_err(|e| map_io_error(path, e, "remove directory"))
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let tmp = path.with_file_name(format!(".{}.tmp.{}", name, std::process::id()));

    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)
}

fn map_io_error(path: &Path, e: io::Error, operation: &str) -> VariaError {
    ApplicationError::FilesystemError {
        path: path.to_path_buf(),
        reason: format!("Failed to {}: {}", operation, e),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_replaces_and_append_extends() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("exp_def.jsonl");
        let fs = LocalFilesystem::new();

        fs.write_file(&file, "a\n").unwrap();
        fs.write_file(&file, "b\n").unwrap();
        fs.append_file(&file, "c\n").unwrap();

        assert_eq!(fs.read_file(&file).unwrap(), "b\nc\n");
    }

    #[test]
    fn write_leaves_no_temporary_files() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFilesystem::new();
        fs.write_file(&dir.path().join("template.argos"), "<x/>").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["template.argos"]);
    }

    #[test]
    fn list_dirs_returns_sorted_subdirectories_only() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFilesystem::new();
        for name in ["exp2", "exp0", "exp1/nested"] {
            fs.create_dir_all(&dir.path().join(name)).unwrap();
        }
        fs.write_file(&dir.path().join("notes.txt"), "").unwrap();

        assert_eq!(
            fs.list_dirs(dir.path()).unwrap(),
            vec!["exp0", "exp1", "exp2"]
        );
    }

    #[test]
    fn reading_a_missing_file_is_a_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let err = LocalFilesystem::new()
            .read_file(&dir.path().join("absent"))
            .unwrap_err();
        assert!(matches!(
            err,
            VariaError::Application(ApplicationError::FilesystemError { .. })
        ));
    }
}
