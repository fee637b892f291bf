//! Implementation of the `varia query` command.
//!
//! Read-only: everything shown comes from the persisted change logs, never
//! from re-parsing the rendered artifacts.

use std::path::Path;

use serde_json::json;
use tracing::instrument;

use varia_adapters::LocalFilesystem;
use varia_core::{
    application::ChangeLogService,
    domain::{BatchCriteria, ChangeLog, Mutation, NodePath},
    error::VariaError,
};

use crate::{
    cli::{OutputFormat, QueryArgs},
    error::{CliError, CliResult},
    output::OutputManager,
};

#[instrument(skip_all)]
pub fn execute(args: QueryArgs, output: OutputManager) -> CliResult<()> {
    let logs = ChangeLogService::new(Box::new(LocalFilesystem::new()));
    let target = attr_target(&args)?;

    match (&args.experiment, &args.batch) {
        (Some(dir), _) => {
            ensure_dir(dir)?;
            let log = logs.load(dir)?;
            match target {
                Some((path, attr)) => show_attr(&log, &path, &attr, &output),
                None => show_log(&log, &output),
            }
        }
        (None, Some(root)) => {
            ensure_dir(root)?;
            let criteria =
                BatchCriteria::parse(args.criteria.as_slice()).map_err(VariaError::from)?;
            show_batch(&logs, root, &criteria, target.as_ref(), &output)
        }
        // clap's `target` group guarantees one of the two.
        (None, None) => Err(CliError::InvalidInput {
            message: "pass --experiment or --batch".into(),
            source: None,
        }),
    }
}

fn attr_target(args: &QueryArgs) -> CliResult<Option<(NodePath, String)>> {
    match (&args.path, &args.attr) {
        (Some(path), Some(attr)) => {
            let path = NodePath::parse(path).map_err(VariaError::from)?;
            Ok(Some((path, attr.clone())))
        }
        _ => Ok(None),
    }
}

fn ensure_dir(path: &Path) -> CliResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(CliError::NotADirectory {
            path: path.to_path_buf(),
        })
    }
}

// ── Single experiment ─────────────────────────────────────────────────────────

fn show_attr(log: &ChangeLog, path: &NodePath, attr: &str, out: &OutputManager) -> CliResult<()> {
    let value = log.attr_value(path, attr);

    if out.format() == OutputFormat::Json {
        out.json(&json!({
            "experiment": log.experiment,
            "path": path,
            "attr": attr,
            "value": value,
        }))?;
        return Ok(());
    }

    match value {
        Some(value) => println!("{value}"),
        None => out.warning(&format!(
            "{} did not set {path}@{attr}",
            log.experiment
        ))?,
    }
    Ok(())
}

fn show_log(log: &ChangeLog, out: &OutputManager) -> CliResult<()> {
    let trail = &log.trail;

    if out.format() == OutputFormat::Json {
        let changes: Vec<_> = trail.mutations().iter().map(mutation_json).collect();
        out.json(&json!({
            "experiment": log.experiment,
            "population_size": log.population_size(),
            "changes": changes,
            "runs": log.runs,
        }))?;
        return Ok(());
    }

    out.header(&format!("Experiment {}", log.experiment))?;
    if let Some(size) = log.population_size() {
        out.print(&format!("  population size: {size}"))?;
    }
    for mutation in trail.mutations() {
        let line = match mutation {
            Mutation::ElementAdd(add) => format!("  + {}/{}", add.parent, add.tag),
            Mutation::AttrChange(change) => {
                format!("  ~ {}@{} = {}", change.path, change.attr, change.value)
            }
            Mutation::ElementRemove(remove) => format!("  - {}/{}", remove.parent, remove.tag),
            Mutation::ElementRename(rename) => {
                format!("  > {}/{} -> {}", rename.parent, rename.tag, rename.new_tag)
            }
        };
        out.print(&line)?;
    }
    for run in &log.runs {
        let seed = run
            .seed
            .map(|s| format!(" seed {s}"))
            .unwrap_or_default();
        out.print(&format!("  run {}{}: {}", run.index, seed, run.outputs.join(", ")))?;
    }
    Ok(())
}

fn mutation_json(mutation: &Mutation) -> serde_json::Value {
    match mutation {
        Mutation::AttrChange(c) => json!({ "kind": "attr_change", "change": c }),
        Mutation::ElementAdd(a) => json!({ "kind": "element_add", "change": a }),
        Mutation::ElementRemove(r) => json!({ "kind": "element_remove", "change": r }),
        Mutation::ElementRename(r) => json!({ "kind": "element_rename", "change": r }),
    }
}

// ── Whole batch ───────────────────────────────────────────────────────────────

fn show_batch(
    logs: &ChangeLogService,
    root: &Path,
    criteria: &BatchCriteria,
    target: Option<&(NodePath, String)>,
    out: &OutputManager,
) -> CliResult<()> {
    let rows: Vec<(String, Option<String>)> = match target {
        Some((path, attr)) => criteria
            .experiment_names()
            .map_err(VariaError::from)?
            .into_iter()
            .map(|name| {
                let value = logs.attr_value(&root.join(name.as_str()), path, attr)?;
                Ok((name.to_string(), value))
            })
            .collect::<Result<_, VariaError>>()?,
        None => logs
            .batch_population_sizes(root, criteria)?
            .into_iter()
            .map(|(name, size)| (name.to_string(), size.map(|s| s.to_string())))
            .collect(),
    };

    let column = match target {
        Some((path, attr)) => format!("{path}@{attr}"),
        None => "population_size".to_string(),
    };

    if out.format() == OutputFormat::Json {
        let entries: Vec<_> = rows
            .iter()
            .map(|(name, value)| json!({ "experiment": name, column.as_str(): value }))
            .collect();
        out.json(&entries)?;
        return Ok(());
    }

    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0).max(10);
    out.header(&format!("{:<width$}  {}", "experiment", column))?;
    for (name, value) in &rows {
        out.print(&format!(
            "{:<width$}  {}",
            name,
            value.as_deref().unwrap_or("-")
        ))?;
    }
    Ok(())
}
