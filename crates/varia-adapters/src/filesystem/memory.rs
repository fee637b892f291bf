//! In-memory filesystem adapter for testing.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use varia_core::{
    application::{ApplicationError, ports::Filesystem},
    error::VariaResult,
};

/// In-memory filesystem for testing.
///
/// Clones share state, so a test can hand one clone to a service and
/// inspect the other.
#[derive(Debug, Clone)]
pub struct MemoryFilesystem {
    inner: Arc<RwLock<MemoryFilesystemInner>>,
}

#[derive(Debug, Default)]
struct MemoryFilesystemInner {
    files: HashMap<PathBuf, String>,
    directories: HashSet<PathBuf>,
}

impl MemoryFilesystem {
    /// Create a new empty memory filesystem.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryFilesystemInner::default())),
        }
    }

    /// A file's content, if present (testing helper).
    pub fn file(&self, path: &Path) -> Option<String> {
        let inner = self.inner.read().ok()?;
        inner.files.get(path).cloned()
    }

    /// List all files, sorted.
    pub fn list_files(&self) -> Vec<PathBuf> {
        let Ok(inner) = self.inner.read() else {
            return Vec::new();
        };
        let mut files: Vec<_> = inner.files.keys().cloned().collect();
        files.sort();
        files
    }
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFilesystemInner {
    fn ensure_parent(&self, path: &Path) -> VariaResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !self.directories.contains(parent) {
                return Err(ApplicationError::FilesystemError {
                    path: path.to_path_buf(),
                    reason: "Parent directory does not exist".into(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl Filesystem for MemoryFilesystem {
    fn create_dir_all(&self, path: &Path) -> VariaResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;

        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            inner.directories.insert(current.clone());
        }

        Ok(())
    }

    fn write_file(&self, path: &Path, content: &str) -> VariaResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;

        inner.ensure_parent(path)?;
        inner.files.insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn append_file(&self, path: &Path, content: &str) -> VariaResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;

        inner.ensure_parent(path)?;
        inner
            .files
            .entry(path.to_path_buf())
            .or_default()
            .push_str(content);
        Ok(())
    }

    fn read_file(&self, path: &Path) -> VariaResult<String> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;

        inner.files.get(path).cloned().ok_or_else(|| {
            ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "No such file".into(),
            }
            .into()
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner
            .read()
            .map(|inner| inner.files.contains_key(path) || inner.directories.contains(path))
            .unwrap_or(false)
    }

    fn list_dirs(&self, path: &Path) -> VariaResult<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| ApplicationError::StoreLockError)?;

        let names: BTreeSet<String> = inner
            .directories
            .iter()
            .filter(|d| d.parent() == Some(path))
            .filter_map(|d| d.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        Ok(names.into_iter().collect())
    }

    fn remove_dir_all(&self, path: &Path) -> VariaResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| ApplicationError::StoreLockError)?;

        inner.directories.retain(|p| !p.starts_with(path));
        inner.files.retain(|p, _| !p.starts_with(path));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_require_a_parent_directory() {
        let fs = MemoryFilesystem::new();
        assert!(fs.write_file(Path::new("batch/exp0/t.xml"), "x").is_err());

        fs.create_dir_all(Path::new("batch/exp0")).unwrap();
        fs.write_file(Path::new("batch/exp0/t.xml"), "x").unwrap();
        assert_eq!(fs.file(Path::new("batch/exp0/t.xml")).as_deref(), Some("x"));
    }

    #[test]
    fn append_extends_existing_content() {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all(Path::new("b")).unwrap();
        fs.write_file(Path::new("b/log"), "1\n").unwrap();
        fs.append_file(Path::new("b/log"), "2\n").unwrap();
        assert_eq!(fs.read_file(Path::new("b/log")).unwrap(), "1\n2\n");
    }

    #[test]
    fn list_dirs_sees_immediate_children_only() {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all(Path::new("batch/exp1/deep")).unwrap();
        fs.create_dir_all(Path::new("batch/exp0")).unwrap();
        assert_eq!(
            fs.list_dirs(Path::new("batch")).unwrap(),
            vec!["exp0", "exp1"]
        );
    }

    #[test]
    fn remove_dir_all_drops_the_whole_subtree() {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all(Path::new("batch/exp0")).unwrap();
        fs.write_file(Path::new("batch/exp0/t.xml"), "x").unwrap();

        fs.remove_dir_all(Path::new("batch")).unwrap();
        assert!(!fs.exists(Path::new("batch")));
        assert!(!fs.exists(Path::new("batch/exp0")));
        assert!(fs.list_files().is_empty());
    }
}
