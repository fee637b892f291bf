//! Write specs: how one experiment definition fans out into artifact files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::changes::{ElementAdd, ElementAddList};
use super::error::{DomainError, DomainResult};
use super::path::NodePath;

/// Parent marker used by manifests to declare a brand-new root element.
pub const NEW_ROOT_MARKER: &str = "$new_root";

/// Root element created when a spec's source subtree does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoot {
    pub tag: String,
    pub attrs: IndexMap<String, String>,
}

/// Copy the subtree at `source` of the *original* document under `dest` of
/// the output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graft {
    pub source: NodePath,
    pub dest: NodePath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSpec {
    pub source: NodePath,
    pub rename_root: Option<String>,
    pub suffix: Option<String>,
    pub new_root: Option<NewRoot>,
    pub new_children: ElementAddList,
    pub grafts: Vec<Graft>,
}

impl WriteSpec {
    pub fn new(source: NodePath) -> Self {
        Self {
            source,
            rename_root: None,
            suffix: None,
            new_root: None,
            new_children: ElementAddList::new(),
            grafts: Vec::new(),
        }
    }

    /// Render the whole document unchanged.
    pub fn whole_tree() -> Self {
        Self::new(NodePath::root())
    }

    pub fn rename_root(mut self, tag: impl Into<String>) -> Self {
        self.rename_root = Some(tag.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn new_root(mut self, tag: impl Into<String>, attrs: IndexMap<String, String>) -> Self {
        self.new_root = Some(NewRoot {
            tag: tag.into(),
            attrs,
        });
        self
    }

    pub fn child(mut self, add: ElementAdd) -> Self {
        self.new_children.push(add);
        self
    }

    pub fn graft(mut self, source: NodePath, dest: NodePath) -> Self {
        self.grafts.push(Graft { source, dest });
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if let Some(suffix) = &self.suffix {
            if suffix.contains(['/', '\\']) || suffix == "." || suffix == ".." {
                return Err(DomainError::InvalidWriteSpec(format!(
                    "suffix '{}' must not contain path separators",
                    suffix
                )));
            }
        }
        if let Some(tag) = &self.rename_root {
            if tag.trim().is_empty() {
                return Err(DomainError::InvalidWriteSpec("empty root rename".into()));
            }
        }
        Ok(())
    }

    /// Artifact path for this spec: `<dir>/<stem><suffix>.<ext>` of `base`.
    pub fn output_path(&self, base: &Path) -> PathBuf {
        let suffix = self.suffix.as_deref().unwrap_or_default();
        if suffix.is_empty() {
            return base.to_path_buf();
        }
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match base.extension() {
            Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
            None => format!("{}{}", stem, suffix),
        };
        base.with_file_name(name)
    }

    /// Copy of this spec writing to `<stem><suffix><extra>.<ext>`.
    pub fn with_extra_suffix(&self, extra: &str) -> Self {
        let mut spec = self.clone();
        spec.suffix = Some(format!("{}{}", self.suffix.as_deref().unwrap_or_default(), extra));
        spec
    }
}

/// Ordered, non-empty list of write specs with distinct output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSpecSet(Vec<WriteSpec>);

impl WriteSpecSet {
    pub fn new(specs: Vec<WriteSpec>) -> DomainResult<Self> {
        if specs.is_empty() {
            return Err(DomainError::InvalidWriteSpec("no write specs given".into()));
        }
        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate()?;
            let suffix = spec.suffix.clone().unwrap_or_default();
            if !seen.insert(suffix.clone()) {
                return Err(DomainError::InvalidWriteSpec(format!(
                    "two specs write the same file (suffix '{}')",
                    suffix
                )));
            }
        }
        Ok(Self(specs))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WriteSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every spec with `extra` appended to its suffix (per-run artifacts).
    pub fn with_extra_suffix(&self, extra: &str) -> Self {
        Self(self.0.iter().map(|s| s.with_extra_suffix(extra)).collect())
    }
}

impl Default for WriteSpecSet {
    fn default() -> Self {
        Self(vec![WriteSpec::whole_tree()])
    }
}

impl<'a> IntoIterator for &'a WriteSpecSet {
    type Item = &'a WriteSpec;
    type IntoIter = std::slice::Iter<'a, WriteSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_renders_the_whole_tree() {
        let set = WriteSpecSet::default();
        assert_eq!(set.len(), 1);
        let spec = set.iter().next().unwrap();
        assert!(spec.source.is_root());
        assert_eq!(
            spec.output_path(Path::new("exp0/template.argos")),
            PathBuf::from("exp0/template.argos")
        );
    }

    #[test]
    fn suffix_lands_between_stem_and_extension() {
        let spec = WriteSpec::new(NodePath::parse(".//arena").unwrap()).suffix("_arena");
        assert_eq!(
            spec.output_path(Path::new("out/exp1/template.argos")),
            PathBuf::from("out/exp1/template_arena.argos")
        );
        assert_eq!(
            spec.output_path(Path::new("out/exp1/Makefile")),
            PathBuf::from("out/exp1/Makefile_arena")
        );
    }

    #[test]
    fn run_suffix_extends_spec_suffix() {
        let set = WriteSpecSet::new(vec![
            WriteSpec::whole_tree(),
            WriteSpec::new(NodePath::parse(".//arena").unwrap()).suffix("_arena"),
        ])
        .unwrap();
        let suffixes: Vec<_> = set
            .with_extra_suffix("_run3")
            .iter()
            .map(|s| s.suffix.clone().unwrap())
            .collect();
        assert_eq!(suffixes, vec!["_run3", "_arena_run3"]);
    }

    #[test]
    fn clashing_outputs_are_rejected() {
        let result = WriteSpecSet::new(vec![
            WriteSpec::whole_tree(),
            WriteSpec::new(NodePath::parse(".//arena").unwrap()),
        ]);
        assert!(matches!(result, Err(DomainError::InvalidWriteSpec(_))));
        assert!(WriteSpecSet::new(Vec::new()).is_err());
    }

    #[test]
    fn suffix_cannot_escape_the_experiment_directory() {
        let spec = WriteSpec::whole_tree().suffix("/../x");
        assert!(spec.validate().is_err());
    }
}
