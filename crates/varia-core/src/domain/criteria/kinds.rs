//! Criteria kinds, their parameters and the pure generators behind them.

use crate::domain::changes::{AttributeChange, ElementAdd};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::experiment::{ExperimentDef, ExperimentName, sanitize_name_component};
use crate::domain::path::NodePath;

/// Element holding the population of a swarm experiment.
pub const POPULATION_PATH: &str = ".//arena/distribute/entity";
/// Attribute of [`POPULATION_PATH`] carrying the population size.
pub const POPULATION_ATTR: &str = "quantity";

const ARENA_PATH: &str = ".//arena";
const DISTRIBUTE_PATH: &str = ".//arena/distribute";

/// Number of values `Linear<max>` produces when no `.C<n>` is given.
pub const DEFAULT_LINEAR_COUNT: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaKind {
    PopulationSize(PopulationSizeParams),
    PopulationConstantDensity(ConstantDensityParams),
    AttributeSweep(SweepParams),
}

impl CriteriaKind {
    pub fn category(&self) -> &'static str {
        match self {
            Self::PopulationSize(_) => "population_size",
            Self::PopulationConstantDensity(_) => "population_constant_density",
            Self::AttributeSweep(_) => "sweep",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progression {
    /// 1, 2, 4, … up to and including `max` when it is a power of two.
    Log { max: u64 },
    /// `count` evenly spaced integers ending at `max`.
    Linear { max: u64, count: u64 },
    Set(Vec<u64>),
}

impl Progression {
    pub fn values(&self) -> Vec<u64> {
        match self {
            Self::Log { max } => std::iter::successors(Some(1u64), |v| v.checked_mul(2))
                .take_while(|v| v <= max)
                .collect(),
            Self::Linear { max, count } => (1..=*count)
                .map(|k| ((*max as f64) * (k as f64) / (*count as f64)).round() as u64)
                .collect(),
            Self::Set(values) => values.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationSizeParams {
    pub progression: Progression,
}

/// Square arenas growing by `increment` per step, populated to `density`
/// agents per unit area.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDensityParams {
    pub density: f64,
    pub increment: u64,
    pub count: u64,
}

impl ConstantDensityParams {
    /// (arena side, population) for each step. Fails when a side or its
    /// population does not fit in a `u64`.
    pub fn points(&self) -> DomainResult<Vec<(u64, u64)>> {
        (1..=self.count)
            .map(|k| {
                let side = self
                    .increment
                    .checked_mul(k)
                    .ok_or_else(|| self.out_of_range(format!("arena side {} x {k}", self.increment)))?;
                let area = side
                    .checked_mul(side)
                    .ok_or_else(|| self.out_of_range(format!("arena area for side {side}")))?;
                let population = (self.density * area as f64).round().max(1.0);
                if !population.is_finite() || population >= u64::MAX as f64 {
                    return Err(self.out_of_range(format!("population for side {side}")));
                }
                Ok((side, population as u64))
            })
            .collect()
    }

    fn out_of_range(&self, what: String) -> DomainError {
        DomainError::InvalidCriteria {
            spec: format!(
                "population_constant_density.CD{}.I{}.C{}",
                self.density.to_string().replace('.', "p"),
                self.increment,
                self.count
            ),
            reason: format!("{what} is out of range"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepParams {
    pub path: NodePath,
    pub attr: String,
    pub values: Vec<String>,
}

/// Generate the experiment definitions a criteria kind describes.
///
/// Pure: no I/O, same input gives the same output in the same order.
pub fn generate(kind: &CriteriaKind) -> DomainResult<Vec<ExperimentDef>> {
    match kind {
        CriteriaKind::PopulationSize(params) => Ok(params
            .progression
            .values()
            .into_iter()
            .enumerate()
            .map(|(i, n)| population_def(ExperimentName::indexed(i), n))
            .collect()),

        CriteriaKind::PopulationConstantDensity(params) => {
            let arena = path(ARENA_PATH);
            Ok(params
                .points()?
                .into_iter()
                .enumerate()
                .map(|(i, (side, population))| {
                    population_def(ExperimentName::indexed(i), population)
                        .with_change(AttributeChange::new(
                            arena.clone(),
                            "size",
                            format!("{},{},2", side, side),
                        ))
                        .with_change(AttributeChange::new(
                            arena.clone(),
                            "center",
                            format!("{},{},1", side as f64 / 2.0, side as f64 / 2.0),
                        ))
                })
                .collect())
        }

        CriteriaKind::AttributeSweep(params) => params
            .values
            .iter()
            .map(|value| {
                let name = ExperimentName::new(format!(
                    "{}_{}",
                    sanitize_name_component(&params.attr),
                    sanitize_name_component(value)
                ))?;
                Ok(ExperimentDef::new(name).with_change(AttributeChange::new(
                    params.path.clone(),
                    params.attr.clone(),
                    value.clone(),
                )))
            })
            .collect(),
    }
}

/// Definition setting the population to `size`, creating the distribute and
/// entity elements when the template lacks them.
fn population_def(name: ExperimentName, size: u64) -> ExperimentDef {
    let size = size.to_string();
    ExperimentDef::new(name)
        .with_add(ElementAdd::new(path(ARENA_PATH), "distribute"))
        .with_add(ElementAdd::new(path(DISTRIBUTE_PATH), "entity").attr(POPULATION_ATTR, &size))
        .with_change(AttributeChange::new(
            path(POPULATION_PATH),
            POPULATION_ATTR,
            size,
        ))
}

fn path(text: &str) -> NodePath {
    // Only called with the literal paths above.
    NodePath::parse(text).unwrap_or_else(|_| NodePath::root())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_progression_doubles_up_to_max() {
        assert_eq!(Progression::Log { max: 4 }.values(), vec![1, 2, 4]);
        assert_eq!(Progression::Log { max: 10 }.values(), vec![1, 2, 4, 8]);
        assert_eq!(Progression::Log { max: 1 }.values(), vec![1]);
    }

    #[test]
    fn linear_progression_ends_at_max() {
        assert_eq!(
            Progression::Linear { max: 10, count: 5 }.values(),
            vec![2, 4, 6, 8, 10]
        );
        assert_eq!(
            Progression::Linear { max: 100, count: 10 }.values().last(),
            Some(&100)
        );
    }

    #[test]
    fn constant_density_scales_population_with_area() {
        let params = ConstantDensityParams {
            density: 0.5,
            increment: 4,
            count: 3,
        };
        assert_eq!(params.points().unwrap(), vec![(4, 8), (8, 32), (12, 72)]);
    }

    #[test]
    fn constant_density_never_empties_the_arena() {
        let params = ConstantDensityParams {
            density: 0.001,
            increment: 1,
            count: 1,
        };
        assert_eq!(params.points().unwrap(), vec![(1, 1)]);
    }

    #[test]
    fn constant_density_rejects_arenas_past_u64() {
        let params = ConstantDensityParams {
            density: 1.0,
            increment: 5_000_000_000,
            count: 1,
        };
        assert!(matches!(
            params.points(),
            Err(DomainError::InvalidCriteria { .. })
        ));

        let huge_step = ConstantDensityParams {
            density: 1.0,
            increment: u64::MAX / 2 + 1,
            count: 2,
        };
        assert!(huge_step.points().is_err());
    }

    #[test]
    fn population_defs_set_the_canonical_pair() {
        let defs = generate(&CriteriaKind::PopulationSize(PopulationSizeParams {
            progression: Progression::Log { max: 4 },
        }))
        .unwrap();

        let quantities: Vec<_> = defs
            .iter()
            .map(|d| {
                d.attr_changes
                    .get(&path(POPULATION_PATH), POPULATION_ATTR)
                    .unwrap()
                    .value
                    .clone()
            })
            .collect();
        assert_eq!(quantities, vec!["1", "2", "4"]);

        let names: Vec<_> = defs.iter().map(|d| d.name.to_string()).collect();
        assert_eq!(names, vec!["exp0", "exp1", "exp2"]);

        let adds: Vec<_> = defs[0].element_adds.iter().map(|a| a.tag.as_str()).collect();
        assert_eq!(adds, vec!["distribute", "entity"]);
    }

    #[test]
    fn sweep_defs_use_value_encoding_names() {
        let defs = generate(&CriteriaKind::AttributeSweep(SweepParams {
            path: path(".//experiment"),
            attr: "length".into(),
            values: vec!["100".into(), "2.5".into()],
        }))
        .unwrap();

        let names: Vec<_> = defs.iter().map(|d| d.name.to_string()).collect();
        assert_eq!(names, vec!["length_100", "length_2.5"]);
        assert_eq!(
            defs[1].attr_changes.get(&path(".//experiment"), "length").unwrap().value,
            "2.5"
        );
    }
}
