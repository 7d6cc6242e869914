//! Biasgen - two-class synthetic dataset generator with systematic bias
//!
//! This library synthesizes labeled signal/background datasets from
//! parametric distributions, derives a biased counterpart (geometric
//! transform or parameter perturbation) to simulate train/test domain shift,
//! and wraps baseline classifiers for evaluating against that shift.

pub mod classifiers;
pub mod cli;
pub mod dataset;
pub mod distributions;
pub mod error;
pub mod generator;
pub mod model;
pub mod model_persistence;
pub mod settings;
pub mod systematics;
