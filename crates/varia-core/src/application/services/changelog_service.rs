//! Change log persistence and the read-only query API built on it.
//!
//! The scaffolding stage writes one log per experiment directory. Any later
//! process (run launchers, statistics, plotting) reopens it through
//! [`ChangeLogService`] without ever touching the definition documents.

use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::{
    application::{ApplicationError, ports::Filesystem},
    domain::{BatchCriteria, ChangeLog, ExperimentName, NodePath, RunRecord},
    error::VariaResult,
};

/// File name of the change log inside an experiment directory.
pub const CHANGELOG_FILE: &str = "exp_def.jsonl";

pub fn changelog_path(exp_dir: &Path) -> PathBuf {
    exp_dir.join(CHANGELOG_FILE)
}

pub(crate) fn persist(fs: &dyn Filesystem, exp_dir: &Path, log: &ChangeLog) -> VariaResult<()> {
    let path = changelog_path(exp_dir);
    fs.write_file(&path, &log.encode()?)?;
    debug!(path = %path.display(), "change log written");
    Ok(())
}

pub(crate) fn append_run(fs: &dyn Filesystem, exp_dir: &Path, run: &RunRecord) -> VariaResult<()> {
    let path = changelog_path(exp_dir);
    if !fs.exists(&path) {
        return Err(ApplicationError::ChangeLogMissing { path }.into());
    }
    fs.append_file(&path, &ChangeLog::encode_run(run)?)
}

pub(crate) fn load(fs: &dyn Filesystem, exp_dir: &Path) -> VariaResult<ChangeLog> {
    let path = changelog_path(exp_dir);
    if !fs.exists(&path) {
        return Err(ApplicationError::ChangeLogMissing { path }.into());
    }
    Ok(ChangeLog::decode(&fs.read_file(&path)?)?)
}

/// Read-only access to persisted change logs.
pub struct ChangeLogService {
    filesystem: Box<dyn Filesystem>,
}

impl ChangeLogService {
    pub fn new(filesystem: Box<dyn Filesystem>) -> Self {
        Self { filesystem }
    }

    /// Load the log of one experiment directory.
    ///
    /// A missing log means the scaffolding stage has not run for this
    /// directory; that is reported as [`ApplicationError::ChangeLogMissing`]
    /// and never retried.
    #[instrument(skip(self), fields(exp_dir = %exp_dir.display()))]
    pub fn load(&self, exp_dir: &Path) -> VariaResult<ChangeLog> {
        load(self.filesystem.as_ref(), exp_dir)
    }

    pub fn attr_value(
        &self,
        exp_dir: &Path,
        path: &NodePath,
        attr: &str,
    ) -> VariaResult<Option<String>> {
        Ok(self
            .load(exp_dir)?
            .attr_value(path, attr)
            .map(str::to_string))
    }

    pub fn population_size(&self, exp_dir: &Path) -> VariaResult<Option<u64>> {
        Ok(self.load(exp_dir)?.population_size())
    }

    /// Population size of every experiment in a batch, in criteria order.
    pub fn batch_population_sizes(
        &self,
        root: &Path,
        criteria: &BatchCriteria,
    ) -> VariaResult<Vec<(ExperimentName, Option<u64>)>> {
        criteria
            .experiment_names()?
            .into_iter()
            .map(|name| {
                let size = self.population_size(&root.join(name.as_str()))?;
                Ok((name, size))
            })
            .collect()
    }
}
