use anyhow::{Context, Result};
use regex::Regex;
use tracing::warn;

use crate::model::{Dataset, Entity, Record};

/// Literal token that opens every record block; the LID follows, closed by
/// the next `)`.
pub const RECORD_MARKER: &str = "(LID,";

const ENTITY_TUPLE_PATTERN: &str = r"\((\d+),\s*([\w\s]+),\s*(.+?),\s*(\d+)\)";

/// Parses one input file into a [`Dataset`].
///
/// Chunks without a closing `)` for the LID, and LIDs that are not plain
/// integers, are skipped. Text between entity tuples is ignored, so a block
/// whose tuples never match the grammar simply yields an empty record.
pub fn parse_dataset(text: &str) -> Result<Dataset> {
    let tuple_regex =
        Regex::new(ENTITY_TUPLE_PATTERN).context("failed to compile entity tuple regex")?;

    let mut dataset = Dataset::default();

    for chunk in text.split(RECORD_MARKER) {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }

        let Some((lid_part, rest)) = chunk.split_once(')') else {
            warn!(chunk = %truncate_for_log(chunk), "skipping record chunk without closing LID delimiter");
            continue;
        };

        let lid_raw = lid_part.trim();
        let lid: u64 = match lid_raw.parse() {
            Ok(lid) => lid,
            Err(_) => {
                warn!(lid = %lid_raw, "skipping record chunk with non-numeric LID");
                continue;
            }
        };

        let mut record = Record::default();
        for captures in tuple_regex.captures_iter(rest) {
            let (_, [line_number, kind, value, confidence]) = captures.extract();
            let formatted = format!(
                "({}, {}, {}, {})",
                line_number,
                kind.trim(),
                value.trim(),
                confidence
            );
            record.push(Entity::new(kind, value), formatted);
        }

        dataset.records.insert(lid, record);
    }

    Ok(dataset)
}

fn truncate_for_log(chunk: &str) -> String {
    const MAX: usize = 40;
    if chunk.len() <= MAX {
        chunk.to_string()
    } else {
        let cut = chunk
            .char_indices()
            .take_while(|(index, _)| *index < MAX)
            .last()
            .map_or(0, |(index, ch)| index + ch.len_utf8());
        format!("{}...", &chunk[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::parse_dataset;
    use crate::model::Entity;

    #[test]
    fn parse_dataset_extracts_entities_per_lid() {
        let text = "(LID, 3) (12, Timestamp, 2024-01-01 10:00:00 UTC, 95) (13, Location, Paris, 80)\n\
                    (LID, 1) (7, Type, crash, 99)";

        let dataset = parse_dataset(text).expect("parse succeeds");
        assert_eq!(dataset.records.len(), 2);

        let entities = dataset.entities(3);
        assert_eq!(entities.len(), 2);
        assert_eq!(
            entities[0],
            Entity::new("timestamp", "2024-01-01 10:00:00 utc")
        );
        assert_eq!(entities[1], Entity::new("location", "paris"));

        assert_eq!(
            dataset.entities(1),
            &[Entity::new("type", "crash")]
        );
    }

    #[test]
    fn parse_dataset_orders_lids_numerically() {
        let text = "(LID, 10) (1, Type, a, 1)\n(LID, 2) (2, Type, b, 1)\n(LID, 33) (3, Type, c, 1)";

        let dataset = parse_dataset(text).expect("parse succeeds");
        let lids: Vec<u64> = dataset.records.keys().copied().collect();
        assert_eq!(lids, vec![2, 10, 33]);
    }

    #[test]
    fn parse_dataset_preserves_original_cased_lines() {
        let text = "(LID, 5) (42, Location, Market Street, 77)";

        let dataset = parse_dataset(text).expect("parse succeeds");
        let record = dataset.record(5).expect("record present");
        assert_eq!(record.lines, vec!["(42, Location, Market Street, 77)"]);

        let entity = Entity::new("location", "market street");
        assert_eq!(
            record.line_for.get(&entity).map(String::as_str),
            Some("(42, Location, Market Street, 77)")
        );
    }

    #[test]
    fn parse_dataset_skips_chunk_without_closing_delimiter() {
        let text = "(LID, 9 (1, Type, orphan, 1)";

        let dataset = parse_dataset(text).expect("parse succeeds");
        assert!(dataset.records.is_empty());
    }

    #[test]
    fn parse_dataset_skips_non_numeric_lid() {
        let text = "(LID, abc) (1, Type, stray, 1)\n(LID, 4) (2, Type, kept, 1)";

        let dataset = parse_dataset(text).expect("parse succeeds");
        assert_eq!(dataset.records.len(), 1);
        assert!(dataset.record(4).is_some());
    }

    #[test]
    fn parse_dataset_ignores_text_between_tuples() {
        let text = "(LID, 1) noise here (3, Type, kept, 50) trailing garbage";

        let dataset = parse_dataset(text).expect("parse succeeds");
        assert_eq!(dataset.entities(1), &[Entity::new("type", "kept")]);
    }

    #[test]
    fn parse_dataset_deduplicates_repeated_entities() {
        let text = "(LID, 1) (3, Type, crash, 50) (4, TYPE, Crash, 60)";

        let dataset = parse_dataset(text).expect("parse succeeds");
        let record = dataset.record(1).expect("record present");
        assert_eq!(record.entities.len(), 1);
        // Both source lines are kept even though identity collapses them.
        assert_eq!(record.lines.len(), 2);
    }

    #[test]
    fn parse_dataset_yields_empty_dataset_for_empty_input() {
        let dataset = parse_dataset("").expect("parse succeeds");
        assert!(dataset.records.is_empty());
        assert_eq!(dataset.entity_total(), 0);
    }

    #[test]
    fn parse_dataset_keeps_record_with_no_matching_tuples() {
        let text = "(LID, 7) nothing shaped like a tuple";

        let dataset = parse_dataset(text).expect("parse succeeds");
        let record = dataset.record(7).expect("record present");
        assert!(record.entities.is_empty());
        assert!(record.lines.is_empty());
    }
}
