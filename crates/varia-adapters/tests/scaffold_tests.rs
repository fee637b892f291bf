//! End-to-end scaffolding through the real adapters.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use varia_adapters::{LocalFilesystem, MemoryFilesystem, load_definition, parse_write_specs};
use varia_core::application::ApplicationError;
use varia_core::domain::{DefinitionFormat, Mutation, NodePath};
use varia_core::error::VariaError;
use varia_core::prelude::*;

const ARGOS_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<argos-configuration>
  <framework>
    <experiment length="100" ticks_per_second="10" random_seed="0"/>
  </framework>
  <arena size="10,10,2" center="5,5,1">
    <box id="wall_north" size="10,0.1,0.5"/>
  </arena>
</argos-configuration>
"#;

const YAML_TEMPLATE: &str = r#"experiment:
  length: 100
arena:
  size: "10,10,2"
  light:
    intensity: 3.0
"#;

const TOML_TEMPLATE: &str = r#"# swarm template
[experiment]
length = 100  # seconds

[arena]
size = "10,10,2"
"#;

fn write_template(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn criteria(specs: &[&str]) -> BatchCriteria {
    BatchCriteria::parse(specs).unwrap()
}

#[test]
fn log4_batch_records_population_per_experiment() {
    let tmp = TempDir::new().unwrap();
    let template_path = write_template(tmp.path(), "template.argos", ARGOS_TEMPLATE);
    let template = load_definition(&LocalFilesystem::new(), &template_path).unwrap();

    let root = tmp.path().join("batch");
    let plan = BatchPlan::new(&root, criteria(&["population_size.Log4"]), "template.argos");
    let report = ScaffoldService::new(Box::new(LocalFilesystem::new()))
        .scaffold(&plan, &template)
        .unwrap();

    let names: Vec<_> = report.experiments.iter().map(|e| e.name.to_string()).collect();
    assert_eq!(names, vec!["exp0", "exp1", "exp2"]);
    for exp in &report.experiments {
        assert!(exp.dir.join("template.argos").is_file());
        assert!(exp.dir.join("exp_def.jsonl").is_file());
    }

    let logs = ChangeLogService::new(Box::new(LocalFilesystem::new()));
    assert_eq!(logs.population_size(&root.join("exp1")).unwrap(), Some(2));
    assert_eq!(
        logs.batch_population_sizes(&root, &plan.criteria)
            .unwrap()
            .into_iter()
            .map(|(_, size)| size)
            .collect::<Vec<_>>(),
        vec![Some(1), Some(2), Some(4)]
    );

    let written = load_definition(&LocalFilesystem::new(), &root.join("exp2/template.argos")).unwrap();
    let entity = NodePath::parse(".//arena/distribute/entity").unwrap();
    assert_eq!(written.attr_get(&entity, "quantity").as_deref(), Some("4"));
    // the template itself is untouched
    assert!(!template.has_element(&entity));
}

#[test]
fn rescaffolding_with_overwrite_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let template_path = write_template(tmp.path(), "template.argos", ARGOS_TEMPLATE);
    let template = load_definition(&LocalFilesystem::new(), &template_path).unwrap();
    let root = tmp.path().join("batch");
    let plan = BatchPlan::new(&root, criteria(&["population_size.Set3,6"]), "template.argos")
        .overwrite_existing(true);
    let service = ScaffoldService::new(Box::new(LocalFilesystem::new()));

    service.scaffold(&plan, &template).unwrap();
    let first_artifact = fs::read_to_string(root.join("exp1/template.argos")).unwrap();
    let first_log = fs::read_to_string(root.join("exp1/exp_def.jsonl")).unwrap();

    service.scaffold(&plan, &template).unwrap();
    assert_eq!(fs::read_to_string(root.join("exp1/template.argos")).unwrap(), first_artifact);
    assert_eq!(fs::read_to_string(root.join("exp1/exp_def.jsonl")).unwrap(), first_log);
}

#[test]
fn existing_batch_is_refused_without_overwrite() {
    let tmp = TempDir::new().unwrap();
    let template_path = write_template(tmp.path(), "template.argos", ARGOS_TEMPLATE);
    let template = load_definition(&LocalFilesystem::new(), &template_path).unwrap();
    let root = tmp.path().join("batch");
    fs::create_dir(&root).unwrap();

    let plan = BatchPlan::new(&root, criteria(&["population_size.Log2"]), "template.argos");
    let err = ScaffoldService::new(Box::new(LocalFilesystem::new()))
        .scaffold(&plan, &template)
        .unwrap_err();
    assert!(matches!(
        err,
        VariaError::Application(ApplicationError::BatchExists { .. })
    ));
}

#[test]
fn stale_experiment_directory_is_a_count_mismatch() {
    let tmp = TempDir::new().unwrap();
    let template_path = write_template(tmp.path(), "template.argos", ARGOS_TEMPLATE);
    let template = load_definition(&LocalFilesystem::new(), &template_path).unwrap();
    let root = tmp.path().join("batch");
    fs::create_dir_all(root.join("exp9")).unwrap();

    let plan = BatchPlan::new(&root, criteria(&["population_size.Log4"]), "template.argos")
        .overwrite_existing(true);
    let err = ScaffoldService::new(Box::new(LocalFilesystem::new()))
        .scaffold(&plan, &template)
        .unwrap_err();

    assert!(matches!(
        err,
        VariaError::Application(ApplicationError::ExperimentCountMismatch {
            expected: 3,
            found: 4,
            ..
        })
    ));
    // a root that existed before is never rolled back
    assert!(root.join("exp9").is_dir());
}

#[test]
fn querying_before_scaffolding_reports_missing_log() {
    let tmp = TempDir::new().unwrap();
    let logs = ChangeLogService::new(Box::new(LocalFilesystem::new()));
    let err = logs.population_size(&tmp.path().join("exp0")).unwrap_err();
    assert!(matches!(
        err,
        VariaError::Application(ApplicationError::ChangeLogMissing { .. })
    ));
}

#[test]
fn runs_get_their_own_seeded_artifacts() {
    let fs = MemoryFilesystem::new();
    let template = varia_adapters::parse_definition(DefinitionFormat::Xml, ARGOS_TEMPLATE).unwrap();

    let plan = BatchPlan::new("batch", criteria(&["population_size.Set5"]), "template.argos")
        .runs(RunPlan {
            runs: 2,
            base_seed: Some(100),
            seed_target: Some((NodePath::parse(".//experiment").unwrap(), "random_seed".into())),
        });
    ScaffoldService::new(Box::new(fs.clone()))
        .scaffold(&plan, &template)
        .unwrap();

    let run1 = fs.file(Path::new("batch/exp0/template_run1.argos")).unwrap();
    assert!(run1.contains(r#"random_seed="101""#));
    assert!(run1.contains(r#"quantity="5""#));
    assert!(fs.file(Path::new("batch/exp0/template.argos")).is_none());

    let log = ChangeLogService::new(Box::new(fs.clone()))
        .load(Path::new("batch/exp0"))
        .unwrap();
    assert_eq!(log.population_size(), Some(5));
    assert_eq!(log.runs.len(), 2);
    assert_eq!(log.runs[1].seed, Some(101));
    assert_eq!(log.runs[1].outputs, vec!["template_run1.argos"]);
}

#[test]
fn bivariate_batch_names_and_merges_both_criteria() {
    let fs = MemoryFilesystem::new();
    let template = varia_adapters::parse_definition(DefinitionFormat::Yaml, YAML_TEMPLATE).unwrap();
    let plan = BatchPlan::new(
        "batch",
        criteria(&["population_size.Set2,4", "sweep.experiment@length=100,200"]),
        "template.yaml",
    );
    let report = ScaffoldService::new(Box::new(fs.clone()))
        .scaffold(&plan, &template)
        .unwrap();

    let names: Vec<_> = report.experiments.iter().map(|e| e.name.to_string()).collect();
    assert_eq!(
        names,
        vec![
            "c1-exp0+c2-length_100",
            "c1-exp0+c2-length_200",
            "c1-exp1+c2-length_100",
            "c1-exp1+c2-length_200",
        ]
    );

    let text = fs
        .file(Path::new("batch/c1-exp1+c2-length_200/template.yaml"))
        .unwrap();
    let written = varia_adapters::parse_definition(DefinitionFormat::Yaml, &text).unwrap();
    let experiment = NodePath::parse("./experiment").unwrap();
    let entity = NodePath::parse(".//arena/distribute/entity").unwrap();
    assert_eq!(written.attr_get(&experiment, "length").as_deref(), Some("200"));
    assert_eq!(written.attr_get(&entity, "quantity").as_deref(), Some("4"));
}

#[test]
fn one_definition_fans_out_to_several_files() {
    let fs = MemoryFilesystem::new();
    let template = varia_adapters::parse_definition(DefinitionFormat::Yaml, YAML_TEMPLATE).unwrap();
    let specs = parse_write_specs(
        r#"
[[write]]
source = "."

[[write]]
source = "./arena"
rename = "field"
suffix = "_arena"

[[write]]
source = ".//visualization"
suffix = "_vis"

[[write.new_children]]
parent = "$new_root"
tag = "visualization"

[[write.grafts]]
source = ".//light"
dest = "./visualization"
"#,
    )
    .unwrap();

    let plan = BatchPlan::new("batch", criteria(&["population_size.Set3"]), "template.yaml")
        .write_specs(specs);
    let report = ScaffoldService::new(Box::new(fs.clone()))
        .scaffold(&plan, &template)
        .unwrap();
    assert_eq!(report.experiments[0].artifacts.len(), 3);

    let arena = fs.file(Path::new("batch/exp0/template_arena.yaml")).unwrap();
    assert!(arena.starts_with("field:"));
    assert!(!arena.contains("experiment"));

    let vis = fs.file(Path::new("batch/exp0/template_vis.yaml")).unwrap();
    let vis = varia_adapters::parse_definition(DefinitionFormat::Yaml, &vis).unwrap();
    let light = NodePath::parse("./visualization/light").unwrap();
    assert_eq!(vis.attr_get(&light, "intensity").as_deref(), Some("3.0"));
}

#[test]
fn toml_outputs_keep_template_comments() {
    let fs = MemoryFilesystem::new();
    let template = varia_adapters::parse_definition(DefinitionFormat::Toml, TOML_TEMPLATE).unwrap();
    let plan = BatchPlan::new(
        "batch",
        criteria(&["sweep.experiment@length=250"]),
        "template.toml",
    );
    ScaffoldService::new(Box::new(fs.clone()))
        .scaffold(&plan, &template)
        .unwrap();

    let text = fs.file(Path::new("batch/length_250/template.toml")).unwrap();
    assert!(text.starts_with("# swarm template\n"));
    assert!(text.contains("length = 250  # seconds"));
}

#[test]
fn replaying_a_log_in_order_rebuilds_the_experiment() {
    let template = varia_adapters::parse_definition(DefinitionFormat::Xml, ARGOS_TEMPLATE).unwrap();
    let arena = NodePath::parse(".//arena").unwrap();

    let mut edited = template.fork();
    assert!(edited.element_remove_all(&arena, "box"));
    assert!(
        edited
            .element_add(&ElementAdd::new(arena.clone(), "box").attr("id", "wall_south"))
            .unwrap()
    );

    let log = ChangeLog::new(ExperimentName::indexed(0), edited.trail().clone());
    let decoded = ChangeLog::decode(&log.encode().unwrap()).unwrap();

    let mut replayed = template.fork();
    for mutation in decoded.trail.mutations() {
        match mutation {
            Mutation::ElementRemove(r) if r.all => {
                replayed.element_remove_all(&r.parent, &r.tag);
            }
            Mutation::ElementRemove(r) => {
                replayed.element_remove(&r.parent, &r.tag);
            }
            Mutation::ElementAdd(a) => {
                replayed.element_add(a).unwrap();
            }
            Mutation::AttrChange(c) => {
                replayed.attr_change(&c.path, &c.attr, &c.value);
            }
            Mutation::ElementRename(r) => {
                replayed.element_change(&r.parent, &r.tag, &r.new_tag);
            }
        }
    }

    assert_eq!(replayed.serialize().unwrap(), edited.serialize().unwrap());
    assert_eq!(
        replayed.attr_get(&arena.child("box"), "id").as_deref(),
        Some("wall_south")
    );
}
