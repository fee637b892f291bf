//! Write-spec manifest loader.
//!
//! A manifest describes how each experiment definition fans out into
//! artifact files. Without one, every experiment gets a single copy of the
//! whole definition.
//!
//! # Manifest format
//!
//! ```toml
//! # whole definition, written to the base artifact name
//! [[write]]
//! source = "."
//!
//! # the arena alone, renamed, written to <stem>_arena.<ext>
//! [[write]]
//! source = ".//arena"
//! rename = "arena_config"
//! suffix = "_arena"
//!
//! # a file that does not exist in the template yet
//! [[write]]
//! source = ".//visualization"
//! suffix = "_vis"
//!
//! [[write.new_children]]
//! parent = "$new_root"          # declares the root when the source is absent
//! tag    = "visualization"
//!
//! [[write.new_children]]
//! parent = ".//visualization"
//! tag    = "camera"
//! attrs  = { position = "0,0,10" }
//!
//! [[write.grafts]]
//! source = ".//arena/light"     # copied from the original definition
//! dest   = ".//visualization"
//! ```

use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, instrument};

use varia_core::domain::{
    DomainError, ElementAdd, NEW_ROOT_MARKER, NodePath, WriteSpec, WriteSpecSet,
};

// ── Manifest types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WriteManifest {
    pub write: Vec<WriteEntry>,
}

/// One `[[write]]` table.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WriteEntry {
    /// Path of the subtree to write; `"."` for the whole definition.
    pub source: String,
    pub rename: Option<String>,
    pub suffix: Option<String>,
    #[serde(default)]
    pub new_children: Vec<ChildEntry>,
    #[serde(default)]
    pub grafts: Vec<GraftEntry>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ChildEntry {
    /// Parent path, or `"$new_root"`.
    pub parent: String,
    pub tag: String,
    #[serde(default)]
    pub attrs: IndexMap<String, String>,
    #[serde(default)]
    pub allow_dup: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct GraftEntry {
    pub source: String,
    pub dest: String,
}

// ── Loader ────────────────────────────────────────────────────────────────────

/// Load a manifest file.
#[instrument(fields(path = %path.display()))]
pub fn load_write_specs(path: &Path) -> Result<WriteSpecSet, DomainError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        DomainError::InvalidWriteSpec(format!("failed to read '{}': {e}", path.display()))
    })?;
    parse_write_specs(&raw)
}

/// Parse manifest text.
pub fn parse_write_specs(raw: &str) -> Result<WriteSpecSet, DomainError> {
    let manifest: WriteManifest = toml::from_str(raw)
        .map_err(|e| DomainError::InvalidWriteSpec(format!("failed to parse manifest: {e}")))?;

    let specs = manifest
        .write
        .into_iter()
        .map(build_spec)
        .collect::<Result<Vec<_>, _>>()?;

    debug!(count = specs.len(), "loaded write specs");
    WriteSpecSet::new(specs)
}

fn build_spec(entry: WriteEntry) -> Result<WriteSpec, DomainError> {
    let mut spec = WriteSpec::new(NodePath::parse(&entry.source)?);

    if let Some(rename) = entry.rename {
        spec = spec.rename_root(rename);
    }
    if let Some(suffix) = entry.suffix {
        spec = spec.suffix(suffix);
    }

    for child in entry.new_children {
        if child.parent == NEW_ROOT_MARKER {
            if spec.new_root.is_some() {
                return Err(DomainError::InvalidWriteSpec(format!(
                    "'{}' declares more than one new root",
                    entry.source
                )));
            }
            spec = spec.new_root(child.tag, child.attrs);
            continue;
        }

        let mut add = ElementAdd::new(NodePath::parse(&child.parent)?, child.tag)
            .allow_dup(child.allow_dup);
        add.attrs = child.attrs;
        spec = spec.child(add);
    }

    for graft in entry.grafts {
        spec = spec.graft(NodePath::parse(&graft.source)?, NodePath::parse(&graft.dest)?);
    }

    spec.validate()?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"
[[write]]
source = "."

[[write]]
source = ".//arena"
rename = "arena_config"
suffix = "_arena"

[[write]]
source = ".//visualization"
suffix = "_vis"

[[write.new_children]]
parent = "$new_root"
tag = "visualization"

[[write.new_children]]
parent = ".//visualization"
tag = "camera"
attrs = { position = "0,0,10" }

[[write.grafts]]
source = ".//arena/light"
dest = ".//visualization"
"#;

    #[test]
    fn parses_every_section() {
        let specs = parse_write_specs(MANIFEST).unwrap();
        let specs: Vec<_> = specs.iter().collect();
        assert_eq!(specs.len(), 3);

        assert!(specs[0].source.is_root());
        assert_eq!(specs[1].rename_root.as_deref(), Some("arena_config"));
        assert_eq!(specs[1].suffix.as_deref(), Some("_arena"));

        let vis = specs[2];
        assert_eq!(vis.new_root.as_ref().unwrap().tag, "visualization");
        assert_eq!(vis.new_children.len(), 1);
        let camera = vis.new_children.iter().next().unwrap();
        assert_eq!(camera.attrs.get("position").map(String::as_str), Some("0,0,10"));
        assert_eq!(vis.grafts[0].dest.to_string(), ".//visualization");
    }

    #[test]
    fn loads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        assert_eq!(load_write_specs(file.path()).unwrap().len(), 3);
    }

    #[test]
    fn rejects_bad_paths_and_unknown_keys() {
        assert!(matches!(
            parse_write_specs("[[write]]\nsource = \".//a b\"\n"),
            Err(DomainError::InvalidPath { .. })
        ));
        assert!(matches!(
            parse_write_specs("[[write]]\nsource = \".\"\ncolour = \"red\"\n"),
            Err(DomainError::InvalidWriteSpec(_))
        ));
    }

    #[test]
    fn rejects_two_new_roots() {
        let raw = r#"
[[write]]
source = ".//x"
[[write.new_children]]
parent = "$new_root"
tag = "a"
[[write.new_children]]
parent = "$new_root"
tag = "b"
"#;
        assert!(parse_write_specs(raw).is_err());
    }
}
