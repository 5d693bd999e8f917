use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;

use crate::metrics::{EntityCounts, PairedTTest};
use crate::model::{Entity, Record};
use crate::util::write_text_file;

pub const ROW_ACCURACY_HEADER: &str =
    "LID,F1_Context,F1_ContextFree,TP_C,FP_C,FN_C,TP_CF,FP_CF,FN_CF";

/// One row of `row_accuracy.csv`: both conditions for a single LID.
#[derive(Debug, Clone)]
pub struct RowAccuracy {
    pub lid: u64,
    pub f1_context: f64,
    pub f1_context_free: f64,
    pub context: EntityCounts,
    pub context_free: EntityCounts,
}

/// Diagnostic block: the formatted source lines behind one LID's false
/// positives or false negatives.
#[derive(Debug, Clone)]
pub struct DumpBlock {
    pub lid: u64,
    pub lines: Vec<String>,
}

/// Renders the formatted source lines behind `entities` into a dump block.
/// Every entity was parsed out of `record`, so the reverse lookup is total;
/// an absent record can only mean an empty entity list.
pub fn push_dump_block(
    blocks: &mut Vec<DumpBlock>,
    lid: u64,
    record: Option<&Record>,
    entities: &[Entity],
) {
    if entities.is_empty() {
        return;
    }
    let Some(record) = record else {
        return;
    };

    let lines: Vec<String> = entities
        .iter()
        .filter_map(|entity| record.line_for.get(entity).cloned())
        .collect();
    blocks.push(DumpBlock { lid, lines });
}

pub fn write_row_accuracy(path: &Path, rows: &[RowAccuracy]) -> Result<()> {
    let mut out = String::new();
    out.push_str(ROW_ACCURACY_HEADER);
    out.push('\n');

    for row in rows {
        let _ = writeln!(
            out,
            "{},{:.4},{:.4},{},{},{},{},{},{}",
            row.lid,
            row.f1_context,
            row.f1_context_free,
            row.context.true_positives,
            row.context.false_positives,
            row.context.false_negatives,
            row.context_free.true_positives,
            row.context_free.false_positives,
            row.context_free.false_negatives,
        );
    }

    write_text_file(path, &out)
}

pub fn render_dump(blocks: &[DumpBlock]) -> String {
    let rendered: Vec<String> = blocks
        .iter()
        .map(|block| format!("(LID, {}); {}", block.lid, block.lines.join(" ")))
        .collect();

    let mut out = rendered.join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

pub fn write_dump(path: &Path, blocks: &[DumpBlock]) -> Result<()> {
    write_text_file(path, &render_dump(blocks))
}

pub struct CompareSummary {
    pub rows_compared: usize,
    pub mean_f1_context: f64,
    pub mean_f1_context_free: f64,
    pub context: EntityCounts,
    pub context_free: EntityCounts,
    pub t_test: PairedTTest,
}

pub fn write_compare_summary(path: &Path, summary: &CompareSummary) -> Result<()> {
    let mut out = String::new();
    out.push_str("EVALUATION SUMMARY\n");
    out.push_str("--------------------------\n");
    let _ = writeln!(out, "Total Rows Compared: {}\n", summary.rows_compared);
    let _ = writeln!(
        out,
        "Average F1 Context-Aware: {:.4}",
        summary.mean_f1_context
    );
    let _ = writeln!(
        out,
        "Average F1 Context-Free: {:.4}\n",
        summary.mean_f1_context_free
    );
    out.push_str("Total Entity-Level Counts:\n");
    let _ = writeln!(
        out,
        "Context-Aware - TP: {}, FP: {}, FN: {}",
        summary.context.true_positives,
        summary.context.false_positives,
        summary.context.false_negatives,
    );
    let _ = writeln!(
        out,
        "Context-Free  - TP: {}, FP: {}, FN: {}\n",
        summary.context_free.true_positives,
        summary.context_free.false_positives,
        summary.context_free.false_negatives,
    );
    let _ = writeln!(out, "Paired t-test (n={}):", summary.t_test.n);
    let _ = writeln!(out, "t-value: {:.4}", summary.t_test.t_statistic);
    let _ = writeln!(out, "p-value: {:.6}", summary.t_test.p_value);
    let _ = writeln!(
        out,
        "Significant? {}",
        if summary.t_test.significant { "YES" } else { "NO" }
    );

    write_text_file(path, &out)
}

pub struct EvaluateSummary {
    pub ground_truth_rows: usize,
    pub ground_truth_entities: usize,
    pub candidate_rows: usize,
    pub candidate_entities: usize,
    pub counts: EntityCounts,
}

pub fn write_evaluate_summary(path: &Path, summary: &EvaluateSummary) -> Result<()> {
    let mut out = String::new();
    out.push_str("EVALUATION SUMMARY\n");
    out.push_str("--------------------------\n");
    let _ = writeln!(
        out,
        "Total Rows in Ground Truth: {}",
        summary.ground_truth_rows
    );
    let _ = writeln!(
        out,
        "Total Entities in Ground Truth: {}",
        summary.ground_truth_entities
    );
    let _ = writeln!(out, "Total Rows in Candidate: {}", summary.candidate_rows);
    let _ = writeln!(
        out,
        "Total Entities in Candidate: {}\n",
        summary.candidate_entities
    );
    let _ = writeln!(
        out,
        "True Positives (TP): {}",
        summary.counts.true_positives
    );
    let _ = writeln!(
        out,
        "False Positives (FP): {}",
        summary.counts.false_positives
    );
    let _ = writeln!(
        out,
        "False Negatives (FN): {}",
        summary.counts.false_negatives
    );

    write_text_file(path, &out)
}
