use chrono::NaiveDateTime;

use crate::model::Entity;

pub const DEFAULT_TOLERANCE_HOURS: i64 = 14;

/// Entity kind that gets windowed-time equality instead of exact equality.
pub const TIMESTAMP_KIND: &str = "timestamp";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of matching one candidate record against the ground truth for a
/// single LID. True positives and false positives hold candidate-side
/// entities; false negatives hold ground-truth-side entities.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub true_positives: Vec<Entity>,
    pub false_positives: Vec<Entity>,
    pub false_negatives: Vec<Entity>,
}

impl MatchOutcome {
    pub fn tp(&self) -> usize {
        self.true_positives.len()
    }

    pub fn fp(&self) -> usize {
        self.false_positives.len()
    }

    pub fn fn_count(&self) -> usize {
        self.false_negatives.len()
    }
}

/// Parses an extracted timestamp value, tolerating a trailing `UTC` marker
/// in either case (values are lowercased during normalization).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let cleaned = trimmed
        .strip_suffix("UTC")
        .or_else(|| trimmed.strip_suffix("utc"))
        .unwrap_or(trimmed)
        .trim();
    NaiveDateTime::parse_from_str(cleaned, TIMESTAMP_FORMAT).ok()
}

/// True when both values parse as timestamps and lie within the tolerance
/// window. Any parse failure means no match, never an error.
pub fn timestamps_match(a: &str, b: &str, tolerance_hours: i64) -> bool {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(left), Some(right)) => {
            (left - right).num_seconds().abs() <= tolerance_hours * 3600
        }
        _ => false,
    }
}

/// Partitions a candidate entity set against the ground truth for one LID.
///
/// Two passes over a working pool of candidate entities: first every
/// ground-truth entity present verbatim consumes its pool element, then
/// every remaining ground-truth timestamp consumes the first remaining
/// timestamp candidate inside the tolerance window. Each side consumes the
/// other at most once, so `tp + fn == |ground_truth|` and
/// `tp + fp == |candidate|` always hold.
pub fn compare_entities(
    ground_truth: &[Entity],
    candidate: &[Entity],
    tolerance_hours: i64,
) -> MatchOutcome {
    let mut pool: Vec<Entity> = candidate.to_vec();
    let mut true_positives = Vec::new();
    let mut unmatched = Vec::new();

    for item in ground_truth {
        match pool.iter().position(|entry| entry == item) {
            Some(index) => true_positives.push(pool.remove(index)),
            None => unmatched.push(item.clone()),
        }
    }

    let mut false_negatives = Vec::new();
    for item in unmatched {
        if item.kind != TIMESTAMP_KIND {
            false_negatives.push(item);
            continue;
        }

        let window_hit = pool.iter().position(|entry| {
            entry.kind == TIMESTAMP_KIND && timestamps_match(&item.value, &entry.value, tolerance_hours)
        });
        match window_hit {
            Some(index) => true_positives.push(pool.remove(index)),
            None => false_negatives.push(item),
        }
    }

    MatchOutcome {
        true_positives,
        false_positives: pool,
        false_negatives,
    }
}
