//! Scaffold Service - main application orchestrator.
//!
//! This service turns a template definition and batch criteria into a batch
//! directory:
//! 1. Generate the experiment definitions (pure, may reject the criteria)
//! 2. Per experiment: copy the template, apply its changes, write artifacts
//! 3. Persist each experiment's change log (and run records)
//! 4. Check the batch directory holds exactly the generated experiments

use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::{
    application::{
        ApplicationError, ExperimentDefinition,
        ports::Filesystem,
        services::{changelog_service, writer::DefinitionWriter},
    },
    domain::{
        BatchCriteria, ChangeLog, ExperimentDef, ExperimentName, NodePath, RunRecord,
        WriteSpecSet,
    },
    error::VariaResult,
};

/// Subdivide every experiment into `runs` runs, each with its own artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub runs: usize,
    /// Run `i` gets seed `base_seed + i`.
    pub base_seed: Option<u64>,
    /// Attribute receiving the seed, e.g. `.//experiment` / `random_seed`.
    pub seed_target: Option<(NodePath, String)>,
}

impl RunPlan {
    /// Seed of run `index`, if the plan seeds runs.
    pub fn seed(&self, index: usize) -> VariaResult<Option<u64>> {
        let Some(base) = self.base_seed else {
            return Ok(None);
        };
        u64::try_from(index)
            .ok()
            .and_then(|i| base.checked_add(i))
            .map(Some)
            .ok_or_else(|| {
                ApplicationError::InvalidRunPlan {
                    reason: format!("seed {base} + run {index} does not fit in 64 bits"),
                }
                .into()
            })
    }

    /// Every seed must be representable before anything is written.
    fn validate(&self) -> VariaResult<()> {
        match self.runs.checked_sub(1) {
            Some(last) => self.seed(last).map(|_| ()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaffoldOptions {
    pub overwrite_existing: bool,
    pub runs: Option<RunPlan>,
}

/// Everything needed to scaffold one batch.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub root: PathBuf,
    pub criteria: BatchCriteria,
    /// File name of the main artifact inside each experiment directory.
    pub artifact_name: String,
    pub write_specs: WriteSpecSet,
    pub options: ScaffoldOptions,
}

impl BatchPlan {
    pub fn new(
        root: impl Into<PathBuf>,
        criteria: BatchCriteria,
        artifact_name: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            criteria,
            artifact_name: artifact_name.into(),
            write_specs: WriteSpecSet::default(),
            options: ScaffoldOptions::default(),
        }
    }

    pub fn write_specs(mut self, specs: WriteSpecSet) -> Self {
        self.write_specs = specs;
        self
    }

    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.options.overwrite_existing = overwrite;
        self
    }

    pub fn runs(mut self, runs: RunPlan) -> Self {
        self.options.runs = Some(runs);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentReport {
    pub name: ExperimentName,
    pub dir: PathBuf,
    pub artifacts: Vec<PathBuf>,
    pub elements_added: usize,
    pub changes_applied: usize,
    pub changes_unapplied: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldReport {
    pub root: PathBuf,
    pub experiments: Vec<ExperimentReport>,
}

/// Main scaffolding service.
pub struct ScaffoldService {
    filesystem: Box<dyn Filesystem>,
}

impl ScaffoldService {
    /// Create a new scaffold service with the given filesystem adapter.
    pub fn new(filesystem: Box<dyn Filesystem>) -> Self {
        Self { filesystem }
    }

    /// The experiments a plan would create, without touching the filesystem.
    pub fn preview(&self, plan: &BatchPlan) -> VariaResult<Vec<ExperimentDef>> {
        Ok(plan.criteria.generate()?)
    }

    /// Scaffold a batch.
    ///
    /// Criteria problems are reported before anything is written. When this
    /// call created the batch root and a later step fails, the root is
    /// removed again; a pre-existing root is never removed.
    #[instrument(
        skip_all,
        fields(
            root = %plan.root.display(),
            criteria = ?plan.criteria.specs()
        )
    )]
    pub fn scaffold(
        &self,
        plan: &BatchPlan,
        template: &ExperimentDefinition,
    ) -> VariaResult<ScaffoldReport> {
        let defs = plan.criteria.generate()?;
        if let Some(runs) = &plan.options.runs {
            runs.validate()?;
        }
        info!(experiments = defs.len(), "Scaffolding batch");

        let root_existed = self.filesystem.exists(&plan.root);
        if root_existed && !plan.options.overwrite_existing {
            return Err(ApplicationError::BatchExists {
                path: plan.root.clone(),
            }
            .into());
        }

        match self.write_batch(plan, template, &defs) {
            Ok(report) => {
                info!("Batch scaffolded successfully");
                Ok(report)
            }
            Err(e) if !root_existed => {
                warn!("Scaffold failed, attempting rollback");
                self.rollback(&plan.root);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    // -------------------------------------------------------------------------
    // Internal Helpers
    // -------------------------------------------------------------------------

    fn write_batch(
        &self,
        plan: &BatchPlan,
        template: &ExperimentDefinition,
        defs: &[ExperimentDef],
    ) -> VariaResult<ScaffoldReport> {
        self.filesystem.create_dir_all(&plan.root)?;

        let experiments = defs
            .iter()
            .map(|def| self.write_experiment(plan, template, def))
            .collect::<VariaResult<Vec<_>>>()?;

        let found = self.filesystem.list_dirs(&plan.root)?.len();
        if found != defs.len() {
            return Err(ApplicationError::ExperimentCountMismatch {
                root: plan.root.clone(),
                expected: defs.len(),
                found,
            }
            .into());
        }

        Ok(ScaffoldReport {
            root: plan.root.clone(),
            experiments,
        })
    }

    #[instrument(skip_all, fields(experiment = %def.name))]
    fn write_experiment(
        &self,
        plan: &BatchPlan,
        template: &ExperimentDefinition,
        def: &ExperimentDef,
    ) -> VariaResult<ExperimentReport> {
        let dir = plan.root.join(def.name.as_str());
        self.filesystem.create_dir_all(&dir)?;

        let mut experiment = template.fork();
        let applied = experiment.apply(def)?;
        let base = dir.join(&plan.artifact_name);
        let writer = DefinitionWriter::new(self.filesystem.as_ref());

        let log = ChangeLog::new(def.name.clone(), experiment.trail().clone());
        let mut artifacts = Vec::new();

        match &plan.options.runs {
            None => {
                artifacts = writer.write(&experiment, &base, &plan.write_specs)?;
                changelog_service::persist(self.filesystem.as_ref(), &dir, &log)?;
            }
            Some(runs) => {
                changelog_service::persist(self.filesystem.as_ref(), &dir, &log)?;
                for index in 0..runs.runs {
                    let (written, record) =
                        self.write_run(&writer, &experiment, &base, plan, runs, index)?;
                    changelog_service::append_run(self.filesystem.as_ref(), &dir, &record)?;
                    artifacts.extend(written);
                }
            }
        }

        info!(
            artifacts = artifacts.len(),
            changes = applied.changes_applied,
            "Experiment written"
        );
        Ok(ExperimentReport {
            name: def.name.clone(),
            dir,
            artifacts,
            elements_added: applied.elements_added,
            changes_applied: applied.changes_applied,
            changes_unapplied: applied.unapplied.len(),
        })
    }

    fn write_run(
        &self,
        writer: &DefinitionWriter<'_>,
        experiment: &ExperimentDefinition,
        base: &Path,
        plan: &BatchPlan,
        runs: &RunPlan,
        index: usize,
    ) -> VariaResult<(Vec<PathBuf>, RunRecord)> {
        let mut run = experiment.fork();
        let seed = runs.seed(index)?;

        if let (Some(seed), Some((path, attr))) = (seed, &runs.seed_target) {
            let value = seed.to_string();
            if !run.attr_change(path, attr, &value) && !run.attr_add(path, attr, &value)? {
                warn!(%path, attr = %attr, "could not write run seed");
            }
        }

        let specs = plan.write_specs.with_extra_suffix(&format!("_run{}", index));
        let written = writer.write(&run, base, &specs)?;

        let record = RunRecord {
            index,
            seed,
            outputs: written
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
            attr_changes: run.trail().attr_changes().iter().cloned().collect(),
        };
        Ok((written, record))
    }

    /// Best-effort rollback on failure.
    fn rollback(&self, root: &Path) {
        if let Err(e) = self.filesystem.remove_dir_all(root) {
            warn!(
                error = %e,
                path = %root.display(),
                "Rollback failed"
            );
        } else {
            info!("Rollback successful");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::definition::fake::FlatBackend;
    use crate::application::ports::MockFilesystem;
    use crate::domain::DomainError;
    use crate::error::VariaError;

    fn template() -> ExperimentDefinition {
        ExperimentDefinition::new(Box::new(
            FlatBackend::default().with_node(".//arena", &[("size", "10,10,2")]),
        ))
    }

    fn plan(spec: &str) -> BatchPlan {
        BatchPlan::new(
            "batch",
            BatchCriteria::parse(&[spec]).unwrap(),
            "template.argos",
        )
    }

    #[test]
    fn existing_root_is_refused_before_writing() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_create_dir_all().times(0);
        fs.expect_remove_dir_all().times(0);

        let service = ScaffoldService::new(Box::new(fs));
        let err = service
            .scaffold(&plan("population_size.Log4"), &template())
            .unwrap_err();
        assert!(matches!(
            err,
            VariaError::Application(ApplicationError::BatchExists { .. })
        ));
    }

    #[test]
    fn specification_errors_precede_any_filesystem_access() {
        let criteria = BatchCriteria::parse(&[
            "population_size.Log4",
            "population_constant_density.CD1.I2.C2",
        ])
        .unwrap();
        // no expectations: any filesystem call would panic
        let service = ScaffoldService::new(Box::new(MockFilesystem::new()));
        let err = service
            .scaffold(&BatchPlan::new("batch", criteria, "t.argos"), &template())
            .unwrap_err();
        assert!(matches!(
            err,
            VariaError::Domain(DomainError::ConflictingWrites { .. })
        ));
    }

    #[test]
    fn failed_scaffold_removes_the_root_it_created() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| false);
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file().returning(|path, _| {
            Err(ApplicationError::FilesystemError {
                path: path.to_path_buf(),
                reason: "disk full".into(),
            }
            .into())
        });
        fs.expect_remove_dir_all()
            .times(1)
            .returning(|root| {
                assert_eq!(root, Path::new("batch"));
                Ok(())
            });

        let service = ScaffoldService::new(Box::new(fs));
        assert!(service.scaffold(&plan("population_size.Log4"), &template()).is_err());
    }

    #[test]
    fn failure_inside_existing_root_keeps_it() {
        let mut fs = MockFilesystem::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_create_dir_all().returning(|_| Ok(()));
        fs.expect_write_file().returning(|_, _| Ok(()));
        fs.expect_list_dirs()
            .returning(|_| Ok(vec!["exp0".into(), "exp1".into(), "exp2".into(), "old".into()]));
        fs.expect_remove_dir_all().times(0);

        let service = ScaffoldService::new(Box::new(fs));
        let err = service
            .scaffold(&plan("population_size.Log4").overwrite_existing(true), &template())
            .unwrap_err();
        assert!(matches!(
            err,
            VariaError::Application(ApplicationError::ExperimentCountMismatch {
                expected: 3,
                found: 4,
                ..
            })
        ));
    }

    #[test]
    fn seeds_past_u64_are_rejected_before_writing() {
        let runs = RunPlan {
            runs: 3,
            base_seed: Some(u64::MAX - 1),
            seed_target: None,
        };
        assert_eq!(runs.seed(1).unwrap(), Some(u64::MAX));
        assert!(runs.seed(2).is_err());

        // no expectations: any filesystem call would panic
        let service = ScaffoldService::new(Box::new(MockFilesystem::new()));
        let err = service
            .scaffold(&plan("population_size.Log4").runs(runs), &template())
            .unwrap_err();
        assert!(matches!(
            err,
            VariaError::Application(ApplicationError::InvalidRunPlan { .. })
        ));
    }

    #[test]
    fn unseeded_runs_have_no_seed() {
        let runs = RunPlan {
            runs: 2,
            base_seed: None,
            seed_target: None,
        };
        assert_eq!(runs.seed(1).unwrap(), None);
    }

    #[test]
    fn preview_lists_experiments_without_io() {
        let service = ScaffoldService::new(Box::new(MockFilesystem::new()));
        let names: Vec<_> = service
            .preview(&plan("population_size.Set2,4"))
            .unwrap()
            .into_iter()
            .map(|d| d.name.to_string())
            .collect();
        assert_eq!(names, vec!["exp0", "exp1"]);
    }
}
