use std::collections::BTreeSet;

use anyhow::Result;
use tracing::info;

use crate::cli::CompareArgs;
use crate::matching::compare_entities;
use crate::metrics::{self, EntityCounts};
use crate::model::CompareRunManifest;
use crate::parse::parse_dataset;
use crate::report::{self, CompareSummary, RowAccuracy, push_dump_block};
use crate::util;

const MANIFEST_VERSION: u32 = 1;

/// Two-condition evaluation: scores the context-aware and context-free
/// extractions against the same ground truth, LID by LID, and compares the
/// two per-LID F1 series with a paired t-test.
pub fn run(args: CompareArgs) -> Result<()> {
    util::ensure_directory(&args.output_dir)?;

    let ground_truth = parse_dataset(&util::read_text_file(&args.ground_truth)?)?;
    let context_aware = parse_dataset(&util::read_text_file(&args.context_aware)?)?;
    let context_free = parse_dataset(&util::read_text_file(&args.context_free)?)?;

    info!(
        ground_truth_rows = ground_truth.records.len(),
        context_aware_rows = context_aware.records.len(),
        context_free_rows = context_free.records.len(),
        tolerance_hours = args.tolerance_hours,
        "datasets parsed"
    );

    // Union of LIDs across all three inputs, numerically ordered. A LID
    // missing on one side is compared against an empty entity set.
    let lids: BTreeSet<u64> = ground_truth
        .records
        .keys()
        .chain(context_aware.records.keys())
        .chain(context_free.records.keys())
        .copied()
        .collect();

    let mut rows = Vec::with_capacity(lids.len());
    let mut f1_context = Vec::with_capacity(lids.len());
    let mut f1_context_free = Vec::with_capacity(lids.len());
    let mut totals_context = EntityCounts::default();
    let mut totals_context_free = EntityCounts::default();
    let mut context_fp_blocks = Vec::new();
    let mut context_fn_blocks = Vec::new();
    let mut context_free_fp_blocks = Vec::new();
    let mut context_free_fn_blocks = Vec::new();

    for lid in lids {
        let truth = ground_truth.entities(lid);
        let context_outcome =
            compare_entities(truth, context_aware.entities(lid), args.tolerance_hours);
        let context_free_outcome =
            compare_entities(truth, context_free.entities(lid), args.tolerance_hours);

        totals_context.add(&context_outcome);
        totals_context_free.add(&context_free_outcome);

        let context_counts = EntityCounts::from(&context_outcome);
        let context_free_counts = EntityCounts::from(&context_free_outcome);
        let context_scores = metrics::score(
            context_counts.true_positives,
            context_counts.false_positives,
            context_counts.false_negatives,
        );
        let context_free_scores = metrics::score(
            context_free_counts.true_positives,
            context_free_counts.false_positives,
            context_free_counts.false_negatives,
        );

        f1_context.push(context_scores.f1);
        f1_context_free.push(context_free_scores.f1);
        rows.push(RowAccuracy {
            lid,
            f1_context: context_scores.f1,
            f1_context_free: context_free_scores.f1,
            context: context_counts,
            context_free: context_free_counts,
        });

        push_dump_block(
            &mut context_fp_blocks,
            lid,
            context_aware.record(lid),
            &context_outcome.false_positives,
        );
        push_dump_block(
            &mut context_fn_blocks,
            lid,
            ground_truth.record(lid),
            &context_outcome.false_negatives,
        );
        push_dump_block(
            &mut context_free_fp_blocks,
            lid,
            context_free.record(lid),
            &context_free_outcome.false_positives,
        );
        push_dump_block(
            &mut context_free_fn_blocks,
            lid,
            ground_truth.record(lid),
            &context_free_outcome.false_negatives,
        );
    }

    let t_test = metrics::paired_t_test(&f1_context, &f1_context_free)?;

    report::write_row_accuracy(&args.output_dir.join("row_accuracy.csv"), &rows)?;
    report::write_dump(
        &args.output_dir.join("context_aware_fp.txt"),
        &context_fp_blocks,
    )?;
    report::write_dump(
        &args.output_dir.join("context_aware_fn.txt"),
        &context_fn_blocks,
    )?;
    report::write_dump(
        &args.output_dir.join("context_free_fp.txt"),
        &context_free_fp_blocks,
    )?;
    report::write_dump(
        &args.output_dir.join("context_free_fn.txt"),
        &context_free_fn_blocks,
    )?;

    let summary = CompareSummary {
        rows_compared: rows.len(),
        mean_f1_context: t_test.mean_a,
        mean_f1_context_free: t_test.mean_b,
        context: totals_context,
        context_free: totals_context_free,
        t_test,
    };
    report::write_compare_summary(&args.output_dir.join("summary.txt"), &summary)?;

    let manifest = CompareRunManifest {
        manifest_version: MANIFEST_VERSION,
        generated_at: util::now_utc_string(),
        inputs: vec![
            util::input_hash(&args.ground_truth)?,
            util::input_hash(&args.context_aware)?,
            util::input_hash(&args.context_free)?,
        ],
        tolerance_hours: args.tolerance_hours,
        rows_compared: summary.rows_compared,
        mean_f1_context_aware: summary.mean_f1_context,
        mean_f1_context_free: summary.mean_f1_context_free,
        context_aware: totals_context,
        context_free: totals_context_free,
        context_aware_micro: totals_context.scores(),
        context_free_micro: totals_context_free.scores(),
        mean_f1_difference: t_test.mean_difference,
        t_statistic: t_test.t_statistic,
        p_value: t_test.p_value,
        significant: t_test.significant,
    };
    util::write_json_pretty(&args.output_dir.join("summary.json"), &manifest)?;

    info!(
        rows = summary.rows_compared,
        context_tp = totals_context.true_positives,
        context_fp = totals_context.false_positives,
        context_fn = totals_context.false_negatives,
        context_free_tp = totals_context_free.true_positives,
        context_free_fp = totals_context_free.false_positives,
        context_free_fn = totals_context_free.false_negatives,
        t_value = t_test.t_statistic,
        p_value = t_test.p_value,
        significant = t_test.significant,
        output_dir = %args.output_dir.display(),
        "comparison complete"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::run;
    use crate::cli::CompareArgs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lideval-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn compare_pipeline_reports_expected_rows_and_totals() {
        let dir = temp_dir("compare-e2e");
        let gt_path = dir.join("ground_truth.txt");
        let candidate_path = dir.join("candidate.txt");
        let output_dir = dir.join("out");

        // LID 1: a timestamp and a location; LID 2: a single type entity.
        fs::write(
            &gt_path,
            "(LID, 1) (10, Timestamp, 2024-01-01 00:00:00, 90) (11, Location, Paris, 85)\n\
             (LID, 2) (20, Type, crash, 95)\n",
        )
        .expect("write ground truth");

        // The candidate hits LID 1's timestamp inside the tolerance window,
        // omits the location, and fabricates an entity for LID 2.
        fs::write(
            &candidate_path,
            "(LID, 1) (10, Timestamp, 2024-01-01 10:00:00, 70)\n\
             (LID, 2) (20, Component, gpu, 60)\n",
        )
        .expect("write candidate");

        run(CompareArgs {
            ground_truth: gt_path,
            context_aware: candidate_path.clone(),
            context_free: candidate_path,
            output_dir: output_dir.clone(),
            tolerance_hours: 14,
        })
        .expect("compare run succeeds");

        let csv = fs::read_to_string(output_dir.join("row_accuracy.csv")).expect("csv written");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "LID,F1_Context,F1_ContextFree,TP_C,FP_C,FN_C,TP_CF,FP_CF,FN_CF",
                "1,0.6667,0.6667,1,0,1,1,0,1",
                "2,0.0000,0.0000,0,1,1,0,1,1",
            ]
        );

        let summary = fs::read_to_string(output_dir.join("summary.txt")).expect("summary written");
        assert!(summary.contains("Total Rows Compared: 2"));
        assert!(summary.contains("Context-Aware - TP: 1, FP: 1, FN: 2"));
        assert!(summary.contains("Context-Free  - TP: 1, FP: 1, FN: 2"));
        // Identical F1 series on both conditions: no significance.
        assert!(summary.contains("t-value: 0.0000"));
        assert!(summary.contains("p-value: 1.000000"));
        assert!(summary.contains("Significant? NO"));

        let context_fn =
            fs::read_to_string(output_dir.join("context_aware_fn.txt")).expect("fn dump written");
        assert_eq!(
            context_fn,
            "(LID, 1); (11, Location, Paris, 85)\n\n(LID, 2); (20, Type, crash, 95)\n"
        );

        let context_fp =
            fs::read_to_string(output_dir.join("context_aware_fp.txt")).expect("fp dump written");
        assert_eq!(context_fp, "(LID, 2); (20, Component, gpu, 60)\n");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn compare_pipeline_counts_lids_missing_from_ground_truth() {
        let dir = temp_dir("compare-union");
        let gt_path = dir.join("ground_truth.txt");
        let context_path = dir.join("context.txt");
        let context_free_path = dir.join("context_free.txt");
        let output_dir = dir.join("out");

        fs::write(&gt_path, "(LID, 1) (1, Type, crash, 90)\n").expect("write ground truth");
        fs::write(
            &context_path,
            "(LID, 1) (1, Type, crash, 80)\n(LID, 3) (2, Type, invented, 55)\n",
        )
        .expect("write context file");
        fs::write(&context_free_path, "(LID, 1) (1, Type, crash, 80)\n")
            .expect("write context-free file");

        run(CompareArgs {
            ground_truth: gt_path,
            context_aware: context_path,
            context_free: context_free_path,
            output_dir: output_dir.clone(),
            tolerance_hours: 14,
        })
        .expect("compare run succeeds");

        let csv = fs::read_to_string(output_dir.join("row_accuracy.csv")).expect("csv written");
        let lines: Vec<&str> = csv.lines().collect();
        // LID 3 exists only in the context-aware file; its fabricated entity
        // still counts as a false positive against an empty ground truth.
        assert_eq!(lines[1], "1,1.0000,1.0000,1,0,0,1,0,0");
        assert_eq!(lines[2], "3,0.0000,0.0000,0,1,0,0,0,0");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn compare_run_fails_on_unreadable_input() {
        let dir = temp_dir("compare-missing-input");
        let output_dir = dir.join("out");

        let result = run(CompareArgs {
            ground_truth: dir.join("does-not-exist.txt"),
            context_aware: dir.join("also-missing.txt"),
            context_free: dir.join("still-missing.txt"),
            output_dir,
            tolerance_hours: 14,
        });
        assert!(result.is_err());

        fs::remove_dir_all(&dir).ok();
    }
}
