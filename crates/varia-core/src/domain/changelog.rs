//! Durable record of what was changed to produce one experiment.
//!
//! The log is JSON Lines: one self-describing record per line, tagged by a
//! `"record"` field. A header comes first; everything after it is read until
//! the input is exhausted, so a log can be appended to (run records) without
//! rewriting it. Records carry no timestamps: scaffolding the same batch
//! twice produces byte-identical logs.
//!
//! ```text
//! {"record":"header","format":1,"experiment":"exp1"}
//! {"record":"element_add","parent":".//arena","tag":"distribute","attrs":{},"allow_dup":false}
//! {"record":"attr_change","path":".//arena/distribute/entity","attr":"quantity","value":"2"}
//! ```

use serde::{Deserialize, Serialize};

use super::changes::{
    AttributeChange, AuditTrail, ElementAdd, ElementRemove, ElementRename, Mutation,
};
use super::criteria::{POPULATION_ATTR, POPULATION_PATH};
use super::error::{DomainError, DomainResult};
use super::experiment::ExperimentName;
use super::path::NodePath;

/// Version written into every header.
pub const CHANGELOG_FORMAT: u32 = 1;

/// One run of an experiment, recorded after its artifacts are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Artifact file names relative to the experiment directory.
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attr_changes: Vec<AttributeChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum ChangeRecord {
    Header {
        format: u32,
        experiment: ExperimentName,
    },
    AttrChange(AttributeChange),
    ElementAdd(ElementAdd),
    ElementRemove(ElementRemove),
    ElementRename(ElementRename),
    Run(RunRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLog {
    pub experiment: ExperimentName,
    pub trail: AuditTrail,
    pub runs: Vec<RunRecord>,
}

impl ChangeLog {
    pub fn new(experiment: ExperimentName, trail: AuditTrail) -> Self {
        Self {
            experiment,
            trail,
            runs: Vec::new(),
        }
    }

    pub fn encode(&self) -> DomainResult<String> {
        let mut records = vec![ChangeRecord::Header {
            format: CHANGELOG_FORMAT,
            experiment: self.experiment.clone(),
        }];
        records.extend(self.trail.mutations().iter().cloned().map(ChangeRecord::from));
        records.extend(self.runs.iter().cloned().map(ChangeRecord::Run));

        let mut out = String::new();
        for (i, record) in records.iter().enumerate() {
            out.push_str(&encode_record(record, i + 1)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// A single line appending `run` to an encoded log.
    pub fn encode_run(run: &RunRecord) -> DomainResult<String> {
        let mut line = encode_record(&ChangeRecord::Run(run.clone()), 0)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(text: &str) -> DomainResult<Self> {
        let mut log: Option<ChangeLog> = None;

        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            if raw.trim().is_empty() {
                continue;
            }
            let record: ChangeRecord =
                serde_json::from_str(raw).map_err(|e| DomainError::InvalidChangeLog {
                    line,
                    reason: e.to_string(),
                })?;

            let Some(current) = log.as_mut() else {
                let ChangeRecord::Header { format, experiment } = record else {
                    return Err(DomainError::InvalidChangeLog {
                        line,
                        reason: "log must start with a header record".into(),
                    });
                };
                if format != CHANGELOG_FORMAT {
                    return Err(DomainError::InvalidChangeLog {
                        line,
                        reason: format!("unsupported format version {}", format),
                    });
                }
                log = Some(ChangeLog::new(experiment, AuditTrail::default()));
                continue;
            };

            match record {
                ChangeRecord::Header { .. } => {
                    return Err(DomainError::InvalidChangeLog {
                        line,
                        reason: "second header record".into(),
                    });
                }
                ChangeRecord::AttrChange(c) => current.trail.record(c),
                ChangeRecord::ElementAdd(a) => current.trail.record(a),
                ChangeRecord::ElementRemove(r) => current.trail.record(r),
                ChangeRecord::ElementRename(r) => current.trail.record(r),
                ChangeRecord::Run(r) => current.runs.push(r),
            }
        }

        log.ok_or(DomainError::InvalidChangeLog {
            line: 0,
            reason: "log is empty".into(),
        })
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Value the experiment last gave `attr` at `path`, through an attribute
    /// change or the attributes of an element added exactly at `path`.
    pub fn attr_value(&self, path: &NodePath, attr: &str) -> Option<&str> {
        self.trail
            .mutations()
            .iter()
            .rev()
            .find_map(|mutation| match mutation {
                Mutation::AttrChange(c) if &c.path == path && c.attr == attr => {
                    Some(c.value.as_str())
                }
                Mutation::ElementAdd(add) if &add.parent.child(&add.tag) == path => {
                    add.attrs.get(attr).map(String::as_str)
                }
                _ => None,
            })
    }

    /// Population size of a swarm experiment, if the experiment set one.
    pub fn population_size(&self) -> Option<u64> {
        let path = NodePath::parse(POPULATION_PATH).ok()?;
        self.attr_value(&path, POPULATION_ATTR)?.parse().ok()
    }
}

impl From<Mutation> for ChangeRecord {
    fn from(mutation: Mutation) -> Self {
        match mutation {
            Mutation::AttrChange(c) => Self::AttrChange(c),
            Mutation::ElementAdd(a) => Self::ElementAdd(a),
            Mutation::ElementRemove(r) => Self::ElementRemove(r),
            Mutation::ElementRename(r) => Self::ElementRename(r),
        }
    }
}

fn encode_record(record: &ChangeRecord, line: usize) -> DomainResult<String> {
    serde_json::to_string(record).map_err(|e| DomainError::InvalidChangeLog {
        line,
        reason: e.to_string(),
    })
}
