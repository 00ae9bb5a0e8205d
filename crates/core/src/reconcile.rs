use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::matcher::{Candidate, MatchType, Matcher};
use crate::model::{CampaignRecord, TargetRow, WriteInstruction};
use crate::taxonomy::TokenGroup;
use crate::tokenizer::{analyze, TokenSet};

/// Sheet rows tokenized once for a run. Built per run and passed in; there is
/// no shared cache between runs.
#[derive(Debug, Clone, Default)]
pub struct TargetIndex {
    candidates: Vec<Candidate>,
}

impl TargetIndex {
    pub fn new(rows: &[TargetRow]) -> Self {
        Self {
            candidates: rows.iter().cloned().map(Candidate::new).collect(),
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Non-fatal findings collected during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    AmbiguousTokens {
        raw_name: String,
        groups: Vec<TokenGroup>,
    },
    NoMatch {
        raw_name: String,
        confidence: f64,
    },
    DuplicateTarget {
        row_index: u32,
        label: String,
        previous: String,
        current: String,
    },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::AmbiguousTokens { raw_name, groups } => {
                let groups: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
                write!(f, "'{raw_name}' has conflicting {} tokens", groups.join("/"))
            }
            DataQualityWarning::NoMatch {
                raw_name,
                confidence,
            } => write!(f, "no sheet row for '{raw_name}' (best overlap {confidence:.2})"),
            DataQualityWarning::DuplicateTarget {
                row_index,
                label,
                previous,
                current,
            } => write!(
                f,
                "row {row_index} '{label}' matched by both '{previous}' and '{current}'; keeping '{current}'"
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub source: CampaignRecord,
    pub target: Option<TargetRow>,
    pub confidence: f64,
    pub matched_tokens: TokenSet,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// One instruction per row, in order of first match.
    pub writes: Vec<WriteInstruction>,
    pub unmatched: Vec<CampaignRecord>,
    pub results: Vec<MatchResult>,
    pub warnings: Vec<DataQualityWarning>,
}

impl Reconciliation {
    pub fn matched_count(&self) -> usize {
        self.results.iter().filter(|r| r.target.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    matcher: Matcher,
}

impl Reconciler {
    pub fn new(matcher: Matcher) -> Self {
        Self { matcher }
    }

    pub fn reconcile(&self, records: &[CampaignRecord], target_rows: &[TargetRow]) -> Reconciliation {
        self.reconcile_with_index(records, &TargetIndex::new(target_rows))
    }

    /// Match every record independently. Misses go to `unmatched`; two
    /// records on one row keep the later value and log a duplicate warning.
    pub fn reconcile_with_index(&self, records: &[CampaignRecord], index: &TargetIndex) -> Reconciliation {
        let mut out = Reconciliation::default();
        let mut row_positions: HashMap<u32, usize> = HashMap::new();

        for record in records {
            let analysis = analyze(&record.raw_name);
            if !analysis.unrecognized.is_empty() {
                debug!(
                    "Ignoring unrecognized fragments in '{}': {:?}",
                    record.raw_name, analysis.unrecognized
                );
            }
            if !analysis.conflicts.is_empty() {
                let warning = DataQualityWarning::AmbiguousTokens {
                    raw_name: record.raw_name.clone(),
                    groups: analysis.conflicts.clone(),
                };
                warn!("{warning}");
                out.warnings.push(warning);
            }

            let found = self.matcher.find_best_match(&analysis.tokens, index.candidates());

            match &found.target {
                Some(target) => {
                    debug!(
                        "Matched '{}' -> row {} '{}' (confidence {:.2})",
                        record.raw_name, target.row_index, target.label, found.confidence
                    );
                    let instruction = WriteInstruction {
                        row_index: target.row_index,
                        value: record.metric_value,
                        label: target.label.clone(),
                        source_name: record.raw_name.clone(),
                    };
                    match row_positions.get(&target.row_index) {
                        Some(&pos) => {
                            let warning = DataQualityWarning::DuplicateTarget {
                                row_index: target.row_index,
                                label: target.label.clone(),
                                previous: out.writes[pos].source_name.clone(),
                                current: record.raw_name.clone(),
                            };
                            warn!("{warning}");
                            out.warnings.push(warning);
                            out.writes[pos] = instruction;
                        }
                        None => {
                            row_positions.insert(target.row_index, out.writes.len());
                            out.writes.push(instruction);
                        }
                    }
                }
                None => {
                    let warning = DataQualityWarning::NoMatch {
                        raw_name: record.raw_name.clone(),
                        confidence: found.confidence,
                    };
                    warn!("{warning}");
                    out.warnings.push(warning);
                    out.unmatched.push(record.clone());
                }
            }

            out.results.push(MatchResult {
                source: record.clone(),
                target: found.target,
                confidence: found.confidence,
                matched_tokens: found.matched_tokens,
                match_type: found.match_type,
            });
        }

        out
    }
}

/// Reconcile with the default threshold.
pub fn reconcile(records: &[CampaignRecord], target_rows: &[TargetRow]) -> Reconciliation {
    Reconciler::default().reconcile(records, target_rows)
}
