use std::collections::BTreeSet;

use anyhow::Result;
use tracing::info;

use crate::cli::EvaluateArgs;
use crate::matching::compare_entities;
use crate::metrics::EntityCounts;
use crate::model::EvaluateRunManifest;
use crate::parse::parse_dataset;
use crate::report::{self, EvaluateSummary, push_dump_block};
use crate::util;

const MANIFEST_VERSION: u32 = 1;

/// Single-condition evaluation: scores one candidate extraction against the
/// ground truth and dumps the matched and mismatched entities per LID.
pub fn run(args: EvaluateArgs) -> Result<()> {
    util::ensure_directory(&args.output_dir)?;

    let ground_truth = parse_dataset(&util::read_text_file(&args.ground_truth)?)?;
    let candidate = parse_dataset(&util::read_text_file(&args.candidate)?)?;

    info!(
        ground_truth_rows = ground_truth.records.len(),
        candidate_rows = candidate.records.len(),
        tolerance_hours = args.tolerance_hours,
        "datasets parsed"
    );

    let lids: BTreeSet<u64> = ground_truth
        .records
        .keys()
        .chain(candidate.records.keys())
        .copied()
        .collect();

    let mut totals = EntityCounts::default();
    let mut tp_blocks = Vec::new();
    let mut fp_blocks = Vec::new();
    let mut fn_blocks = Vec::new();

    for lid in lids {
        let outcome = compare_entities(
            ground_truth.entities(lid),
            candidate.entities(lid),
            args.tolerance_hours,
        );
        totals.add(&outcome);

        // TP and FP lines come from the candidate file, FN lines from the
        // ground truth, so every dumped entity traces back to its source.
        push_dump_block(
            &mut tp_blocks,
            lid,
            candidate.record(lid),
            &outcome.true_positives,
        );
        push_dump_block(
            &mut fp_blocks,
            lid,
            candidate.record(lid),
            &outcome.false_positives,
        );
        push_dump_block(
            &mut fn_blocks,
            lid,
            ground_truth.record(lid),
            &outcome.false_negatives,
        );
    }

    report::write_dump(&args.output_dir.join("true_positives.txt"), &tp_blocks)?;
    report::write_dump(&args.output_dir.join("false_positives.txt"), &fp_blocks)?;
    report::write_dump(&args.output_dir.join("false_negatives.txt"), &fn_blocks)?;

    let summary = EvaluateSummary {
        ground_truth_rows: ground_truth.records.len(),
        ground_truth_entities: ground_truth.entity_total(),
        candidate_rows: candidate.records.len(),
        candidate_entities: candidate.entity_total(),
        counts: totals,
    };
    report::write_evaluate_summary(&args.output_dir.join("summary.txt"), &summary)?;

    let manifest = EvaluateRunManifest {
        manifest_version: MANIFEST_VERSION,
        generated_at: util::now_utc_string(),
        inputs: vec![
            util::input_hash(&args.ground_truth)?,
            util::input_hash(&args.candidate)?,
        ],
        tolerance_hours: args.tolerance_hours,
        ground_truth_rows: summary.ground_truth_rows,
        ground_truth_entities: summary.ground_truth_entities,
        candidate_rows: summary.candidate_rows,
        candidate_entities: summary.candidate_entities,
        counts: totals,
        micro: totals.scores(),
    };
    util::write_json_pretty(&args.output_dir.join("summary.json"), &manifest)?;

    info!(
        ground_truth_rows = summary.ground_truth_rows,
        candidate_rows = summary.candidate_rows,
        tp = totals.true_positives,
        fp = totals.false_positives,
        fn_count = totals.false_negatives,
        output_dir = %args.output_dir.display(),
        "evaluation complete"
    );

    Ok(())
}
