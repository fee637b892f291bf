//! Document formats an experiment definition can be stored in.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Storage format of an experiment definition, which also selects the
/// backend that edits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionFormat {
    /// Markup tree; attributes are strings, paths resolve to their first match.
    Xml,
    /// Path-query tree; every match of a path is visible.
    Yaml,
    /// Path-query tree that keeps comments and layout intact.
    Toml,
}

impl DefinitionFormat {
    pub const ALL: [DefinitionFormat; 3] = [Self::Xml, Self::Yaml, Self::Toml];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }

    pub const fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Xml => &["xml", "argos", "launch"],
            Self::Yaml => &["yaml", "yml"],
            Self::Toml => &["toml"],
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        Self::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
            .ok_or_else(|| DomainError::UnsupportedFormat(path.display().to_string()))
    }
}

impl fmt::Display for DefinitionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefinitionFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" | "argos" => Ok(Self::Xml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            other => Err(DomainError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            DefinitionFormat::from_path(Path::new("a/template.argos")).unwrap(),
            DefinitionFormat::Xml
        );
        assert_eq!(
            DefinitionFormat::from_path(Path::new("exp.YML")).unwrap(),
            DefinitionFormat::Yaml
        );
        assert_eq!(
            DefinitionFormat::from_path(Path::new("exp.toml")).unwrap(),
            DefinitionFormat::Toml
        );
        assert!(DefinitionFormat::from_path(Path::new("exp.json")).is_err());
        assert!(DefinitionFormat::from_path(Path::new("Makefile")).is_err());
    }

    #[test]
    fn parses_names() {
        assert_eq!("XML".parse::<DefinitionFormat>().unwrap(), DefinitionFormat::Xml);
        assert!("ini".parse::<DefinitionFormat>().is_err());
    }
}
