//! Definition writer - projects one experiment definition into artifacts.
//!
//! Each [`WriteSpec`] picks a subtree of the definition, reshapes it and
//! writes it to its own file, so one definition can fan out into several
//! configuration files.

use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use crate::{
    application::{
        ApplicationError, ExperimentDefinition,
        ports::{DefinitionBackend, Filesystem},
    },
    domain::{WriteSpec, WriteSpecSet},
    error::VariaResult,
};

pub struct DefinitionWriter<'a> {
    filesystem: &'a dyn Filesystem,
}

impl<'a> DefinitionWriter<'a> {
    pub fn new(filesystem: &'a dyn Filesystem) -> Self {
        Self { filesystem }
    }

    /// Render and write every spec; `base` names the artifact the default
    /// (suffix-less) spec writes to. Returns the paths written.
    #[instrument(skip_all, fields(base = %base.display(), specs = specs.len()))]
    pub fn write(
        &self,
        definition: &ExperimentDefinition,
        base: &Path,
        specs: &WriteSpecSet,
    ) -> VariaResult<Vec<PathBuf>> {
        let mut written = Vec::new();

        for spec in specs {
            let Some(content) = render(definition, spec)? else {
                continue;
            };
            let target = spec.output_path(base);
            self.filesystem.write_file(&target, &content)?;
            debug!(path = %target.display(), "artifact written");
            written.push(target);
        }

        Ok(written)
    }
}

/// Render one spec to text. `None` when the source subtree is absent and the
/// spec does not declare a new root.
pub fn render(definition: &ExperimentDefinition, spec: &WriteSpec) -> VariaResult<Option<String>> {
    let original = definition.backend();

    let mut output: Box<dyn DefinitionBackend> = match original.extract(&spec.source) {
        Some(subtree) => subtree,
        None => match &spec.new_root {
            Some(root) => original.with_root(&root.tag, &root.attrs),
            None => {
                warn!(source = %spec.source, "source subtree not found, skipping write spec");
                return Ok(None);
            }
        },
    };

    if let Some(tag) = &spec.rename_root {
        if !output.rename_root(tag) {
            warn!(tag = %tag, "could not rename output root");
        }
    }

    for add in &spec.new_children {
        output.element_add(&add.parent, &add.tag, &add.attrs, add.allow_dup)?;
    }

    for graft in &spec.grafts {
        match original.extract(&graft.source) {
            Some(subtree) => {
                if !output.graft(&graft.dest, subtree.as_ref())? {
                    warn!(source = %graft.source, dest = %graft.dest, "graft destination not found");
                }
            }
            None => warn!(source = %graft.source, "graft source not found"),
        }
    }

    output
        .serialize()
        .map(Some)
        .map_err(|e| {
            ApplicationError::RenderingFailed {
                path: PathBuf::from(spec.source.to_string()),
                reason: e.to_string(),
            }
            .into()
        })
}
