//! CLI argument parsing for Biasgen

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::model::{AugmentationKind, ModelKind, PreprocessMethod};
use crate::settings::{BiasMode, DataMode};

#[derive(Parser, Debug)]
#[command(name = "biasgen")]
#[command(version)]
#[command(about = "Two-class synthetic dataset generator with systematic bias", long_about = None)]
pub struct Cli {
    /// Enable debug logging to stderr
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a train/test dataset pair and save it to a directory
    Generate {
        /// Settings JSON file
        #[arg(short, long, value_name = "FILE")]
        settings: PathBuf,

        /// Output directory for the canonical train/test layout
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        /// Distribution family for both classes
        #[arg(long = "data-mode", value_enum, default_value = "gaussian")]
        data_mode: DataMode,

        /// How the biased test counterpart is produced
        #[arg(long = "bias-mode", value_enum, default_value = "translation")]
        bias_mode: BiasMode,

        /// Seed driving sampling and shuffling
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of indexed dataset pairs to write (suffix _0.._N-1)
        #[arg(long, value_name = "N")]
        runs: Option<usize>,
    },

    /// Generate in memory, fit a classifier on the original set and score it
    /// against the biased set
    Evaluate {
        /// Settings JSON file
        #[arg(short, long, value_name = "FILE")]
        settings: PathBuf,

        /// Distribution family for both classes
        #[arg(long = "data-mode", value_enum, default_value = "gaussian")]
        data_mode: DataMode,

        /// How the biased test counterpart is produced
        #[arg(long = "bias-mode", value_enum, default_value = "translation")]
        bias_mode: BiasMode,

        /// Classifier strategy to evaluate
        #[arg(short, long, value_enum, default_value = "naive-bayes")]
        model: ModelKind,

        /// Compensate the estimated train/test shift before scoring
        #[arg(long, value_enum)]
        preprocess: Option<PreprocessMethod>,

        /// Augment the training set before fitting
        #[arg(long, value_enum)]
        augment: Option<AugmentationKind>,

        /// Seed driving sampling and shuffling
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}
