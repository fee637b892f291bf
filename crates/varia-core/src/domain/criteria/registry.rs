//! Batch criteria category registry.
//!
//! Each category is described exactly once by a [`CriteriaDef`]. Parsing a
//! criteria spec string is a table lookup on its category followed by the
//! category's own definition parser.
//!
//! # Adding a New Category
//!
//! 1. Add a variant to [`CriteriaKind`] and a branch to
//!    [`generate`](super::generate)
//! 2. Add one [`CriteriaDef`] entry to [`CRITERIA_REGISTRY`]

use super::kinds::{
    ConstantDensityParams, CriteriaKind, DEFAULT_LINEAR_COUNT, PopulationSizeParams, Progression,
    SweepParams,
};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::path::NodePath;

/// Parses the part of a spec after `<category>.`; errors are plain reasons.
pub type DefinitionParser = fn(&str) -> Result<CriteriaKind, String>;

#[derive(Debug, Clone, Copy)]
pub struct CriteriaDef {
    /// Text before the first `.` of a spec string.
    pub category: &'static str,
    pub summary: &'static str,
    /// Grammar of the definition part.
    pub grammar: &'static str,
    /// A complete, valid spec string.
    pub example: &'static str,
    pub parse: DefinitionParser,
}

/// Single source of truth for the available criteria.
pub static CRITERIA_REGISTRY: &[CriteriaDef] = &[
    CriteriaDef {
        category: "population_size",
        summary: "Vary the number of agents in the arena",
        grammar: "Log<max> | Linear<max>[.C<n>] | Set<v1>,<v2>,...",
        example: "population_size.Log64",
        parse: parse_population_size,
    },
    CriteriaDef {
        category: "population_constant_density",
        summary: "Grow a square arena while keeping agents per unit area fixed",
        grammar: "CD<density>.I<increment>.C<n>  (density uses 'p' as decimal point)",
        example: "population_constant_density.CD0p5.I4.C4",
        parse: parse_constant_density,
    },
    CriteriaDef {
        category: "sweep",
        summary: "Set one attribute to each of a list of values",
        grammar: "<tag or path>@<attr>=<v1>,<v2>,...",
        example: "sweep.experiment@length=100,200,400",
        parse: parse_sweep,
    },
];

// ── Registry lookup API ──────────────────────────────────────────────────────

pub fn find_criteria(category: &str) -> Option<&'static CriteriaDef> {
    CRITERIA_REGISTRY.iter().find(|def| def.category == category)
}

/// Parse a full `<category>.<definition>` spec string.
pub fn parse_spec(spec: &str) -> DomainResult<CriteriaKind> {
    let spec = spec.trim();
    let (category, definition) =
        spec.split_once('.')
            .ok_or_else(|| DomainError::InvalidCriteria {
                spec: spec.to_string(),
                reason: "expected <category>.<definition>".into(),
            })?;

    let def = find_criteria(category).ok_or_else(|| DomainError::UnknownCriteria {
        category: category.to_string(),
    })?;

    (def.parse)(definition).map_err(|reason| DomainError::InvalidCriteria {
        spec: spec.to_string(),
        reason,
    })
}

// ── Definition parsers ───────────────────────────────────────────────────────

fn parse_population_size(definition: &str) -> Result<CriteriaKind, String> {
    let progression = if let Some(max) = definition.strip_prefix("Log") {
        Progression::Log {
            max: positive(max, "Log maximum")?,
        }
    } else if let Some(rest) = definition.strip_prefix("Linear") {
        let (max, count) = match rest.split_once(".C") {
            Some((max, count)) => {
                let max = positive(max, "Linear maximum")?;
                (max, positive(count, "Linear count")?)
            }
            None => {
                let max = positive(rest, "Linear maximum")?;
                (max, max.min(DEFAULT_LINEAR_COUNT))
            }
        };
        if count > max {
            return Err(format!("cannot fit {} distinct values in 1..={}", count, max));
        }
        Progression::Linear { max, count }
    } else if let Some(list) = definition.strip_prefix("Set") {
        let values = list
            .split(',')
            .map(|v| positive(v, "Set value"))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(dup) = first_duplicate(&values) {
            return Err(format!("value {} listed twice", dup));
        }
        Progression::Set(values)
    } else {
        return Err("expected Log<max>, Linear<max>[.C<n>] or Set<v1>,<v2>,...".into());
    };

    Ok(CriteriaKind::PopulationSize(PopulationSizeParams { progression }))
}

fn parse_constant_density(definition: &str) -> Result<CriteriaKind, String> {
    let parts: Vec<&str> = definition.split('.').collect();
    let [density, increment, count] = parts.as_slice() else {
        return Err("expected CD<density>.I<increment>.C<n>".into());
    };

    let density = density
        .strip_prefix("CD")
        .ok_or("density must start with 'CD'")?
        .replace('p', ".");
    let density: f64 = density
        .parse()
        .map_err(|_| format!("'{}' is not a number", density))?;
    if !(density.is_finite() && density > 0.0) {
        return Err("density must be positive".into());
    }

    let increment = positive(
        increment.strip_prefix('I').ok_or("increment must start with 'I'")?,
        "increment",
    )?;
    let count = positive(
        count.strip_prefix('C').ok_or("count must start with 'C'")?,
        "count",
    )?;

    Ok(CriteriaKind::PopulationConstantDensity(
        ConstantDensityParams {
            density,
            increment,
            count,
        },
    ))
}

fn parse_sweep(definition: &str) -> Result<CriteriaKind, String> {
    let (target, values) = definition
        .split_once('=')
        .ok_or("expected <tag or path>@<attr>=<values>")?;
    let (target, attr) = target
        .rsplit_once('@')
        .ok_or("expected <tag or path>@<attr>")?;

    let target = target.trim();
    let attr = attr.trim();
    if target.is_empty() || attr.is_empty() {
        return Err("both a target and an attribute are required".into());
    }

    let path = if target.contains('/') || target.starts_with('.') {
        NodePath::parse(target).map_err(|e| e.to_string())?
    } else {
        NodePath::parse(&format!(".//{}", target)).map_err(|e| e.to_string())?
    };

    let values: Vec<String> = values.split(',').map(|v| v.trim().to_string()).collect();
    if values.iter().any(String::is_empty) {
        return Err("empty value in list".into());
    }
    if let Some(dup) = first_duplicate(&values) {
        return Err(format!("value '{}' listed twice", dup));
    }

    Ok(CriteriaKind::AttributeSweep(SweepParams {
        path,
        attr: attr.to_string(),
        values,
    }))
}

fn positive(raw: &str, what: &str) -> Result<u64, String> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(format!("{} must be at least 1", what)),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("{} '{}' is not a positive integer", what, raw)),
    }
}

fn first_duplicate<T: PartialEq + Clone>(values: &[T]) -> Option<T> {
    values
        .iter()
        .enumerate()
        .find(|(i, v)| values[..*i].contains(v))
        .map(|(_, v)| v.clone())
}

// ── Registry integrity (checked in tests) ────────────────────────────────────

#[doc(hidden)]
pub fn assert_registry_integrity() {
    for (i, def) in CRITERIA_REGISTRY.iter().enumerate() {
        assert!(
            !def.category.contains('.'),
            "category '{}' contains the '.' separator",
            def.category
        );
        assert!(
            CRITERIA_REGISTRY[..i].iter().all(|d| d.category != def.category),
            "category '{}' registered twice",
            def.category
        );
        let kind = parse_spec(def.example)
            .unwrap_or_else(|e| panic!("example '{}' does not parse: {}", def.example, e));
        assert_eq!(kind.category(), def.category);
    }
}
