//! Implementation of the `varia scaffold` command.
//!
//! Responsibility: turn CLI arguments into a core `BatchPlan`, run the
//! scaffold service against the local filesystem, and display results. No
//! business logic lives here.

use std::io::IsTerminal as _;
use std::path::Path;

use serde_json::json;
use tracing::{debug, info, instrument};

use varia_adapters::{LocalFilesystem, load_definition, load_write_specs};
use varia_core::{
    application::{BatchPlan, ExperimentDefinition, RunPlan, ScaffoldReport, ScaffoldService},
    domain::{BatchCriteria, ExperimentDef, NodePath, WriteSpecSet},
    error::VariaError,
};

use crate::{
    cli::{OutputFormat, ScaffoldArgs},
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Execute the `varia scaffold` command.
///
/// 1. Parse criteria and optional write specs (nothing is touched on error)
/// 2. Load the template
/// 3. Print the plan for `--dry-run`, or confirm unless `--yes`
/// 4. Scaffold and report
#[instrument(skip_all, fields(output = %args.output.display()))]
pub fn execute(
    args: ScaffoldArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let plan = build_plan(&args, &config)?;
    debug!(
        criteria = ?plan.criteria.specs(),
        overwrite = plan.options.overwrite_existing,
        "Plan resolved"
    );

    let template = load_template(&args.template)?;
    let service = ScaffoldService::new(Box::new(LocalFilesystem::new()));

    if args.dry_run {
        return show_dry_run(&service.preview(&plan)?, &plan, &output);
    }

    let wants_prompt = config.scaffold.confirm
        && !args.yes
        && !output.is_quiet()
        && std::io::stdin().is_terminal();
    if wants_prompt {
        let count = plan.criteria.cardinality().map_err(VariaError::from)?;
        output.header("Batch")?;
        output.print(&format!("  Template:    {}", args.template.display()))?;
        output.print(&format!("  Criteria:    {}", plan.criteria.specs().join(" + ")))?;
        output.print(&format!("  Experiments: {count}"))?;
        output.print(&format!("  Location:    {}", plan.root.display()))?;
        if !confirm(&format!("Write {count} experiments?"))? {
            return Err(CliError::Cancelled);
        }
    }

    info!(root = %plan.root.display(), "Scaffold started");
    let spinner = output.spinner("Scaffolding batch...");
    let result = service.scaffold(&plan, &template);
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    let report = result?;

    show_report(&report, &output)
}

// ── Plan construction ─────────────────────────────────────────────────────────

fn build_plan(args: &ScaffoldArgs, config: &AppConfig) -> CliResult<BatchPlan> {
    let criteria = BatchCriteria::parse(args.criteria.as_slice()).map_err(VariaError::from)?;

    let write_specs = match args.write_specs.as_ref().or(config.scaffold.write_specs.as_ref()) {
        Some(path) => load_write_specs(path).map_err(VariaError::from)?,
        None => WriteSpecSet::default(),
    };

    let mut plan = BatchPlan::new(&args.output, criteria, artifact_name(&args.template)?)
        .write_specs(write_specs)
        .overwrite_existing(args.force || config.scaffold.overwrite);

    if let Some(runs) = run_plan(args)? {
        plan = plan.runs(runs);
    }
    Ok(plan)
}

fn run_plan(args: &ScaffoldArgs) -> CliResult<Option<RunPlan>> {
    let Some(runs) = args.runs else {
        return Ok(None);
    };
    let seed_target = match (&args.seed_path, &args.seed_attr) {
        (Some(path), Some(attr)) => {
            let path = NodePath::parse(path).map_err(VariaError::from)?;
            Some((path, attr.clone()))
        }
        _ => None,
    };
    Ok(Some(RunPlan {
        runs: runs as usize,
        base_seed: args.seed,
        seed_target,
    }))
}

/// Experiments keep the template's file name.
fn artifact_name(template: &Path) -> CliResult<String> {
    template
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| CliError::InvalidInput {
            message: format!("'{}' does not name a file", template.display()),
            source: None,
        })
}

fn load_template(path: &Path) -> CliResult<ExperimentDefinition> {
    if !path.is_file() {
        return Err(CliError::TemplateNotFound {
            path: path.to_path_buf(),
        });
    }
    Ok(load_definition(&LocalFilesystem::new(), path)?)
}

// ── UI helpers ────────────────────────────────────────────────────────────────

fn show_dry_run(defs: &[ExperimentDef], plan: &BatchPlan, out: &OutputManager) -> CliResult<()> {
    if out.format() == OutputFormat::Json {
        let experiments: Vec<_> = defs
            .iter()
            .map(|def| {
                json!({
                    "name": def.name,
                    "attr_changes": def.attr_changes.iter().collect::<Vec<_>>(),
                    "element_adds": def.element_adds.iter().collect::<Vec<_>>(),
                })
            })
            .collect();
        out.json(&json!({
            "root": plan.root,
            "dry_run": true,
            "experiments": experiments,
        }))?;
        return Ok(());
    }

    out.info(&format!(
        "Dry run: would create {} experiments in {}",
        defs.len(),
        plan.root.display()
    ))?;
    if plan.root.exists() && !plan.options.overwrite_existing {
        out.warning("The batch root already exists; scaffolding needs --force")?;
    }
    for def in defs {
        out.print(&format!("  {}", def.name))?;
        for add in &def.element_adds {
            let attrs: Vec<String> = add.attrs.iter().map(|(k, v)| format!("{k}={v}")).collect();
            out.print(&format!("    + {}/{} {}", add.parent, add.tag, attrs.join(" ")))?;
        }
        for change in &def.attr_changes {
            out.print(&format!("    ~ {}@{} = {}", change.path, change.attr, change.value))?;
        }
    }
    Ok(())
}

fn show_report(report: &ScaffoldReport, out: &OutputManager) -> CliResult<()> {
    if out.format() == OutputFormat::Json {
        let experiments: Vec<_> = report
            .experiments
            .iter()
            .map(|exp| {
                json!({
                    "name": exp.name,
                    "dir": exp.dir,
                    "artifacts": exp.artifacts,
                    "elements_added": exp.elements_added,
                    "changes_applied": exp.changes_applied,
                    "changes_unapplied": exp.changes_unapplied,
                })
            })
            .collect();
        out.json(&json!({ "root": report.root, "experiments": experiments }))?;
        return Ok(());
    }

    for exp in &report.experiments {
        out.print(&format!(
            "  {}  ({} files, {} changes)",
            exp.name,
            exp.artifacts.len(),
            exp.changes_applied
        ))?;
        if exp.changes_unapplied > 0 {
            out.warning(&format!(
                "{}: {} changes matched nothing in the template",
                exp.name, exp.changes_unapplied
            ))?;
        }
    }
    out.success(&format!(
        "Scaffolded {} experiments in {}",
        report.experiments.len(),
        report.root.display()
    ))?;
    Ok(())
}

#[cfg(feature = "interactive")]
fn confirm(prompt: &str) -> CliResult<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .map_err(|e| CliError::IoError {
            message: "failed to read confirmation input".into(),
            source: std::io::Error::other(e),
        })
}

#[cfg(not(feature = "interactive"))]
fn confirm(prompt: &str) -> CliResult<bool> {
    use std::io::{self, Write};

    use crate::error::IntoCli as _;

    print!("{prompt} [Y/n] ");
    io::stdout()
        .flush()
        .with_cli_context(|| "failed to flush stdout")?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .with_cli_context(|| "failed to read confirmation input")?;

    let input = input.trim().to_ascii_lowercase();
    Ok(input.is_empty() || input == "y" || input == "yes")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(criteria: &[&str]) -> ScaffoldArgs {
        ScaffoldArgs {
            template: PathBuf::from("templates/swarm.argos"),
            criteria: criteria.iter().map(|s| s.to_string()).collect(),
            output: PathBuf::from("batch"),
            force: false,
            dry_run: false,
            yes: true,
            write_specs: None,
            runs: None,
            seed: None,
            seed_path: None,
            seed_attr: None,
        }
    }

    #[test]
    fn artifact_name_is_template_file_name() {
        assert_eq!(
            artifact_name(Path::new("templates/swarm.argos")).unwrap(),
            "swarm.argos"
        );
        assert!(artifact_name(Path::new("..")).is_err());
    }

    #[test]
    fn config_overwrite_stands_in_for_force() {
        let mut config = AppConfig::default();
        config.scaffold.overwrite = true;
        let plan = build_plan(&args(&["population_size.Log4"]), &config).unwrap();
        assert!(plan.options.overwrite_existing);
        assert_eq!(plan.artifact_name, "swarm.argos");
    }

    #[test]
    fn bad_criteria_fail_before_anything_else() {
        let err = build_plan(&args(&["population_size.Fib4"]), &AppConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn seed_target_needs_both_halves() {
        let mut a = args(&["population_size.Log4"]);
        a.runs = Some(3);
        a.seed = Some(10);
        let plan = run_plan(&a).unwrap().unwrap();
        assert_eq!(plan.runs, 3);
        assert_eq!(plan.base_seed, Some(10));
        assert!(plan.seed_target.is_none());

        a.seed_path = Some(".//experiment".into());
        a.seed_attr = Some("random_seed".into());
        let plan = run_plan(&a).unwrap().unwrap();
        assert_eq!(plan.seed_target.unwrap().1, "random_seed");
    }

    #[test]
    fn missing_template_is_not_found() {
        let err = load_template(Path::new("does/not/exist.argos")).err().unwrap();
        assert_eq!(err.exit_code(), 3);
    }
}
