//! Batch criteria: from a terse spec string to a family of experiments.
//!
//! A *univariate* criteria varies one thing; a *bivariate* criteria is the
//! cartesian product of two univariate ones. Both produce an ordered list of
//! [`ExperimentDef`]s with unique, invertible names.

mod kinds;
mod registry;

pub use kinds::{
    ConstantDensityParams, CriteriaKind, DEFAULT_LINEAR_COUNT, POPULATION_ATTR, POPULATION_PATH,
    PopulationSizeParams, Progression, SweepParams, generate,
};
pub use registry::{
    CRITERIA_REGISTRY, CriteriaDef, DefinitionParser, assert_registry_integrity, find_criteria,
    parse_spec,
};

use std::collections::HashSet;

use super::error::{DomainError, DomainResult};
use super::experiment::{ExperimentDef, ExperimentName};

const FIRST_PREFIX: &str = "c1-";
const SECOND_PREFIX: &str = "c2-";
const NAME_JOIN: char = '+';

// ── Univariate ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct UnivariateCriteria {
    spec: String,
    kind: CriteriaKind,
}

impl UnivariateCriteria {
    pub fn parse(spec: &str) -> DomainResult<Self> {
        let kind = parse_spec(spec)?;
        Ok(Self {
            spec: spec.trim().to_string(),
            kind,
        })
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn kind(&self) -> &CriteriaKind {
        &self.kind
    }

    pub fn category(&self) -> &'static str {
        self.kind.category()
    }

    /// Generated experiments, validated for unique names free of the
    /// bivariate separators.
    pub fn generate(&self) -> DomainResult<Vec<ExperimentDef>> {
        let defs = generate(&self.kind)?;
        for def in &defs {
            if def.name.as_str().contains(['+', '-']) {
                return Err(DomainError::InvalidExperimentName {
                    name: def.name.to_string(),
                    reason: "univariate names cannot contain '+' or '-'".into(),
                });
            }
        }
        ensure_unique(&defs)?;
        Ok(defs)
    }

    pub fn experiment_names(&self) -> DomainResult<Vec<ExperimentName>> {
        Ok(self.generate()?.into_iter().map(|d| d.name).collect())
    }

    /// Position of `name` in the generated order.
    pub fn parse_name(&self, name: &str) -> DomainResult<Option<usize>> {
        Ok(self
            .experiment_names()?
            .iter()
            .position(|n| n.as_str() == name))
    }
}

// ── Bivariate ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct BivariateCriteria {
    first: UnivariateCriteria,
    second: UnivariateCriteria,
}

impl BivariateCriteria {
    pub fn new(first: UnivariateCriteria, second: UnivariateCriteria) -> DomainResult<Self> {
        if first.category() == second.category() {
            return Err(DomainError::DuplicateCriteria {
                category: first.category().to_string(),
            });
        }
        Ok(Self { first, second })
    }

    pub fn first(&self) -> &UnivariateCriteria {
        &self.first
    }

    pub fn second(&self) -> &UnivariateCriteria {
        &self.second
    }

    /// Cartesian product, first criteria outer. Each member carries both
    /// change sets; a (path, attribute) written by both criteria is an error.
    pub fn generate(&self) -> DomainResult<Vec<ExperimentDef>> {
        let outer = self.first.generate()?;
        let inner = self.second.generate()?;

        let mut defs = Vec::with_capacity(outer.len() * inner.len());
        for a in &outer {
            for b in &inner {
                defs.push(ExperimentDef {
                    name: Self::compose_name(&a.name, &b.name)?,
                    attr_changes: a.attr_changes.merge_disjoint(&b.attr_changes)?,
                    element_adds: a.element_adds.concat(&b.element_adds),
                });
            }
        }
        ensure_unique(&defs)?;
        Ok(defs)
    }

    /// `c1-<first>+c2-<second>`.
    pub fn compose_name(
        first: &ExperimentName,
        second: &ExperimentName,
    ) -> DomainResult<ExperimentName> {
        ExperimentName::new(format!(
            "{}{}{}{}{}",
            FIRST_PREFIX, first, NAME_JOIN, SECOND_PREFIX, second
        ))
    }

    /// Recover the two univariate names from a composed name.
    pub fn parse_name(name: &str) -> DomainResult<(ExperimentName, ExperimentName)> {
        let invalid = || DomainError::InvalidExperimentName {
            name: name.to_string(),
            reason: format!(
                "expected {}<name>{}{}<name>",
                FIRST_PREFIX, NAME_JOIN, SECOND_PREFIX
            ),
        };

        let rest = name.strip_prefix(FIRST_PREFIX).ok_or_else(invalid)?;
        let (first, second) = rest.split_once(NAME_JOIN).ok_or_else(invalid)?;
        let second = second.strip_prefix(SECOND_PREFIX).ok_or_else(invalid)?;
        Ok((ExperimentName::new(first)?, ExperimentName::new(second)?))
    }
}

// ── Batch ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum BatchCriteria {
    Univariate(UnivariateCriteria),
    Bivariate(BivariateCriteria),
}

impl BatchCriteria {
    /// Parse one or two spec strings. Everything that can be wrong with the
    /// criteria is reported here, before any experiment is generated.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> DomainResult<Self> {
        match specs {
            [] => Err(DomainError::MissingCriteria),
            [single] => Ok(Self::Univariate(UnivariateCriteria::parse(single.as_ref())?)),
            [first, second] => Ok(Self::Bivariate(BivariateCriteria::new(
                UnivariateCriteria::parse(first.as_ref())?,
                UnivariateCriteria::parse(second.as_ref())?,
            )?)),
            more => Err(DomainError::TooManyCriteria { count: more.len() }),
        }
    }

    pub fn generate(&self) -> DomainResult<Vec<ExperimentDef>> {
        match self {
            Self::Univariate(c) => c.generate(),
            Self::Bivariate(c) => c.generate(),
        }
    }

    pub fn experiment_names(&self) -> DomainResult<Vec<ExperimentName>> {
        Ok(self.generate()?.into_iter().map(|d| d.name).collect())
    }

    pub fn cardinality(&self) -> DomainResult<usize> {
        Ok(self.generate()?.len())
    }

    pub fn specs(&self) -> Vec<&str> {
        match self {
            Self::Univariate(c) => vec![c.spec()],
            Self::Bivariate(c) => vec![c.first.spec(), c.second.spec()],
        }
    }
}

fn ensure_unique(defs: &[ExperimentDef]) -> DomainResult<()> {
    let mut seen = HashSet::new();
    for def in defs {
        if !seen.insert(def.name.as_str()) {
            return Err(DomainError::DuplicateExperimentName {
                name: def.name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::path::NodePath;

    fn names(defs: &[ExperimentDef]) -> Vec<String> {
        defs.iter().map(|d| d.name.to_string()).collect()
    }

    #[test]
    fn univariate_log_batch() {
        let criteria = BatchCriteria::parse(&["population_size.Log4"]).unwrap();
        let defs = criteria.generate().unwrap();
        assert_eq!(names(&defs), vec!["exp0", "exp1", "exp2"]);
        assert_eq!(criteria.cardinality().unwrap(), 3);
    }

    #[test]
    fn univariate_names_are_invertible() {
        let criteria = UnivariateCriteria::parse("population_size.Set5,10,20").unwrap();
        assert_eq!(criteria.parse_name("exp2").unwrap(), Some(2));
        assert_eq!(criteria.parse_name("exp3").unwrap(), None);
    }

    #[test]
    fn bivariate_is_a_row_major_product() {
        let criteria = BatchCriteria::parse(&[
            "population_size.Log2",
            "sweep.experiment@length=100,200,300",
        ])
        .unwrap();
        let defs = criteria.generate().unwrap();

        assert_eq!(defs.len(), 2 * 3);
        assert_eq!(
            names(&defs),
            vec![
                "c1-exp0+c2-length_100",
                "c1-exp0+c2-length_200",
                "c1-exp0+c2-length_300",
                "c1-exp1+c2-length_100",
                "c1-exp1+c2-length_200",
                "c1-exp1+c2-length_300",
            ]
        );

        let member = &defs[4];
        let population = NodePath::parse(POPULATION_PATH).unwrap();
        let length = NodePath::parse(".//experiment").unwrap();
        assert_eq!(member.attr_changes.get(&population, POPULATION_ATTR).unwrap().value, "2");
        assert_eq!(member.attr_changes.get(&length, "length").unwrap().value, "200");
        assert_eq!(member.element_adds.len(), 2);
    }

    #[test]
    fn bivariate_names_parse_back_exactly() {
        let criteria = BatchCriteria::parse(&[
            "sweep.arena@size=10_10_2,20_20_2",
            "population_size.Set1,8",
        ])
        .unwrap();
        let BatchCriteria::Bivariate(bivariate) = &criteria else {
            panic!("expected bivariate criteria");
        };
        let first = bivariate.first().experiment_names().unwrap();
        let second = bivariate.second().experiment_names().unwrap();

        for def in criteria.generate().unwrap() {
            let (a, b) = BivariateCriteria::parse_name(def.name.as_str()).unwrap();
            assert!(first.contains(&a));
            assert!(second.contains(&b));
            assert_eq!(BivariateCriteria::compose_name(&a, &b).unwrap(), def.name);
        }
    }

    #[test]
    fn bivariate_rejects_conflicting_writes() {
        let criteria = BatchCriteria::parse(&[
            "population_size.Log4",
            "population_constant_density.CD1.I2.C2",
        ])
        .unwrap();
        assert!(matches!(
            criteria.generate(),
            Err(DomainError::ConflictingWrites { ref attr, .. }) if attr == POPULATION_ATTR
        ));
    }

    #[test]
    fn criteria_count_is_checked() {
        let none: [&str; 0] = [];
        assert_eq!(BatchCriteria::parse(&none), Err(DomainError::MissingCriteria));
        assert_eq!(
            BatchCriteria::parse(&[
                "population_size.Log4",
                "sweep.a@b=1",
                "population_constant_density.CD1.I1.C1"
            ]),
            Err(DomainError::TooManyCriteria { count: 3 })
        );
    }

    #[test]
    fn same_category_twice_is_rejected() {
        assert_eq!(
            BatchCriteria::parse(&["population_size.Log4", "population_size.Set3"]),
            Err(DomainError::DuplicateCriteria {
                category: "population_size".into()
            })
        );
    }

    #[test]
    fn malformed_bivariate_names_are_rejected() {
        for bad in ["exp0", "c1-exp0", "c1-exp0+exp1", "c2-exp0+c1-exp1"] {
            assert!(BivariateCriteria::parse_name(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn sweep_values_colliding_after_sanitizing_are_rejected() {
        let criteria = BatchCriteria::parse(&["sweep.arena@size=1;1,1_1"]).unwrap();
        assert!(matches!(
            criteria.generate(),
            Err(DomainError::DuplicateExperimentName { .. })
        ));
    }
}
