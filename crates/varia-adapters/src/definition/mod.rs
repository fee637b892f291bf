//! Document backends for experiment definitions.
//!
//! The backend is picked once, from the file extension, when a definition
//! is loaded; everything downstream works through `DefinitionBackend`.

mod scalar;
mod toml;
mod xml;
mod yaml;

pub use self::toml::TomlDefinition;
pub use self::xml::XmlDefinition;
pub use self::yaml::YamlDefinition;

use std::path::Path;

use tracing::{debug, instrument};

use varia_core::{
    application::{ExperimentDefinition, ports::{DefinitionBackend, Filesystem}},
    domain::{DefinitionFormat, DomainResult},
    error::VariaResult,
};

/// Parse `text` with the backend for `format`.
pub fn parse_backend(format: DefinitionFormat, text: &str) -> DomainResult<Box<dyn DefinitionBackend>> {
    Ok(match format {
        DefinitionFormat::Xml => Box::new(XmlDefinition::parse(text)?),
        DefinitionFormat::Yaml => Box::new(YamlDefinition::parse(text)?),
        DefinitionFormat::Toml => Box::new(TomlDefinition::parse(text)?),
    })
}

pub fn parse_definition(format: DefinitionFormat, text: &str) -> DomainResult<ExperimentDefinition> {
    parse_backend(format, text).map(ExperimentDefinition::new)
}

/// Read and parse a template definition, choosing the backend by extension.
#[instrument(skip(filesystem), fields(path = %path.display()))]
pub fn load_definition(
    filesystem: &dyn Filesystem,
    path: &Path,
) -> VariaResult<ExperimentDefinition> {
    let format = DefinitionFormat::from_path(path)?;
    let text = filesystem.read_file(path)?;
    let definition = parse_definition(format, &text)?;
    debug!(%format, "definition loaded");
    Ok(definition)
}
