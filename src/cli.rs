use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::matching::DEFAULT_TOLERANCE_HOURS;

#[derive(Parser, Debug)]
#[command(
    name = "lideval",
    version,
    about = "Scores AI-extracted entity records against annotated ground truth"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare two extraction conditions against the same ground truth.
    Compare(CompareArgs),
    /// Evaluate a single candidate file against the ground truth.
    Evaluate(EvaluateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long)]
    pub ground_truth: PathBuf,

    #[arg(long)]
    pub context_aware: PathBuf,

    #[arg(long)]
    pub context_free: PathBuf,

    #[arg(long, default_value = "eval-output")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_TOLERANCE_HOURS)]
    pub tolerance_hours: i64,
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub ground_truth: PathBuf,

    #[arg(long)]
    pub candidate: PathBuf,

    #[arg(long, default_value = "eval-output")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = DEFAULT_TOLERANCE_HOURS)]
    pub tolerance_hours: i64,
}
