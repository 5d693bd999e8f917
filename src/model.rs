use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

/// A single extracted entity, identified by its lowercased kind and value.
///
/// Confidence and the raw line number are metadata only; they survive in the
/// formatted source line kept on the owning [`Record`], never in identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    pub kind: String,
    pub value: String,
}

impl Entity {
    pub fn new(kind: &str, value: &str) -> Self {
        Self {
            kind: kind.trim().to_lowercase(),
            value: value.trim().to_lowercase(),
        }
    }
}

/// All entities extracted for one LID, plus the original-cased formatted
/// lines needed to reproduce diagnostics verbatim.
#[derive(Debug, Clone, Default)]
pub struct Record {
    /// Insertion-ordered, deduplicated entity set. Iteration order is the
    /// order of first appearance in the input, which also fixes the
    /// tie-break when several timestamps fall inside the tolerance window.
    pub entities: Vec<Entity>,
    /// Formatted source lines in input order, one per tuple match.
    pub lines: Vec<String>,
    /// Reverse lookup from entity identity to its formatted source line.
    pub line_for: HashMap<Entity, String>,
}

impl Record {
    pub fn push(&mut self, entity: Entity, formatted_line: String) {
        self.lines.push(formatted_line.clone());
        if !self.entities.contains(&entity) {
            self.entities.push(entity.clone());
            self.line_for.insert(entity, formatted_line);
        }
    }
}

/// Parsed input file: LID to record, ordered numerically by LID.
#[derive(Debug, Default)]
pub struct Dataset {
    pub records: BTreeMap<u64, Record>,
}

const NO_ENTITIES: &[Entity] = &[];

impl Dataset {
    pub fn entities(&self, lid: u64) -> &[Entity] {
        self.records
            .get(&lid)
            .map_or(NO_ENTITIES, |record| record.entities.as_slice())
    }

    pub fn record(&self, lid: u64) -> Option<&Record> {
        self.records.get(&lid)
    }

    pub fn entity_total(&self) -> usize {
        self.records.values().map(|record| record.entities.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InputHash {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompareRunManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub inputs: Vec<InputHash>,
    pub tolerance_hours: i64,
    pub rows_compared: usize,
    pub mean_f1_context_aware: f64,
    pub mean_f1_context_free: f64,
    pub context_aware: crate::metrics::EntityCounts,
    pub context_free: crate::metrics::EntityCounts,
    pub context_aware_micro: crate::metrics::Scores,
    pub context_free_micro: crate::metrics::Scores,
    pub mean_f1_difference: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub significant: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateRunManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub inputs: Vec<InputHash>,
    pub tolerance_hours: i64,
    pub ground_truth_rows: usize,
    pub ground_truth_entities: usize,
    pub candidate_rows: usize,
    pub candidate_entities: usize,
    pub counts: crate::metrics::EntityCounts,
    pub micro: crate::metrics::Scores,
}
