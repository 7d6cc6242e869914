//! Data generation pipeline: settings -> sampling -> bias -> shuffled pair
//!
//! [`DataGenerator`] walks a fixed state machine:
//!
//! ```text
//! Uninitialized -> SettingsLoaded -> DistributionsReady -> SystematicsReady -> DataGenerated
//! ```
//!
//! `load_settings` validates the contract and derives the per-class
//! distributions and the systematic transforms; `generate_data` draws both
//! datasets; `get_data`/`save_data` expose them. Calling a later-stage
//! operation before its prerequisite fails with a precondition error instead
//! of touching any output.
//!
//! The original and biased datasets are shuffled with a single permutation
//! drawn from the caller's seed and applied identically to features and
//! labels of both sets, so row `i` of the original corresponds to row `i` of
//! the biased counterpart in every bias mode.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use tracing::{debug, info};

use crate::dataset::{Dataset, BACKGROUND_LABEL, SIGNAL_LABEL};
use crate::distributions::{EventDistribution, Gaussian, GaussianGamma};
use crate::error::{BiasgenError, Result};
use crate::settings::{BiasMode, DataMode, Settings};
use crate::systematics::{Scaling, Systematic, Translation, ANY_DIMENSION};

/// Pipeline stage; each public operation requires a minimum stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Uninitialized,
    SettingsLoaded,
    DistributionsReady,
    SystematicsReady,
    DataGenerated,
}

/// Orchestrates per-class sampling, bias application and label stacking
pub struct DataGenerator {
    data_mode: DataMode,
    bias_mode: BiasMode,
    settings: Settings,
    stage: Stage,

    signal_distribution: Option<Box<dyn EventDistribution>>,
    background_distribution: Option<Box<dyn EventDistribution>>,

    // Perturbation mode: independently biased distribution pair
    biased_signal_distribution: Option<GaussianGamma>,
    biased_background_distribution: Option<GaussianGamma>,

    // Transform mode: translation always, scaling only when factor > 1
    translation: Option<Translation>,
    scaling: Option<Scaling>,

    original: Option<Dataset>,
    biased: Option<Dataset>,
}

impl DataGenerator {
    /// Build a generator over an injected settings contract
    pub fn new(settings: Settings, data_mode: DataMode, bias_mode: BiasMode) -> Self {
        Self {
            data_mode,
            bias_mode,
            settings,
            stage: Stage::Uninitialized,
            signal_distribution: None,
            background_distribution: None,
            biased_signal_distribution: None,
            biased_background_distribution: None,
            translation: None,
            scaling: None,
            original: None,
            biased: None,
        }
    }

    /// Build a generator from a settings JSON file
    pub fn from_file(
        path: impl AsRef<Path>,
        data_mode: DataMode,
        bias_mode: BiasMode,
    ) -> Result<Self> {
        let settings = Settings::from_file(path)?;
        Ok(Self::new(settings, data_mode, bias_mode))
    }

    pub fn data_mode(&self) -> DataMode {
        self.data_mode
    }

    pub fn bias_mode(&self) -> BiasMode {
        self.bias_mode
    }

    /// Validate the settings and derive distributions and systematics
    pub fn load_settings(&mut self) -> Result<()> {
        self.settings.validate(self.data_mode, self.bias_mode)?;
        self.stage = Stage::SettingsLoaded;
        info!("settings loaded");

        self.derive_distributions()?;
        self.stage = Stage::DistributionsReady;
        info!("signal and background distributions derived");

        self.derive_systematics()?;
        self.stage = Stage::SystematicsReady;
        info!("systematics derived");

        Ok(())
    }

    fn derive_distributions(&mut self) -> Result<()> {
        let dimension = self.settings.problem_dimension;

        match self.data_mode {
            DataMode::Gaussian => {
                let background_mu = self
                    .settings
                    .background_mu
                    .clone()
                    .ok_or(BiasgenError::MissingKey("background_mu"))?;
                let background_sigma = self
                    .settings
                    .background_sigma
                    .clone()
                    .ok_or(BiasgenError::MissingKey("background_sigma"))?;
                let theta = self.settings.theta.ok_or(BiasgenError::MissingKey("theta"))?;
                let l = self.settings.l.ok_or(BiasgenError::MissingKey("L"))?;
                let sigma_scale = self
                    .settings
                    .signal_sigma_scale
                    .ok_or(BiasgenError::MissingKey("signal_sigma_scale"))?;

                // Signal center sits at L * (cos theta, sin theta) from the
                // background center, in the first two coordinates.
                let mut signal_mu = background_mu.clone();
                signal_mu[0] += l * theta.cos();
                if dimension >= 2 {
                    signal_mu[1] += l * theta.sin();
                }
                let signal_sigma: Vec<f64> =
                    background_sigma.iter().map(|s| s * sigma_scale).collect();
                debug!(?signal_mu, "derived signal center");

                self.background_distribution =
                    Some(Box::new(Gaussian::new(background_mu, background_sigma)?));
                self.signal_distribution =
                    Some(Box::new(Gaussian::new(signal_mu, signal_sigma)?));
            }
            DataMode::GaussianGamma => {
                if dimension != 2 {
                    return Err(BiasgenError::DimensionMismatch {
                        expected: 2,
                        actual: dimension,
                    });
                }
                let (background, signal) = self.marginal_distributions()?;
                self.background_distribution = Some(Box::new(background));
                self.signal_distribution = Some(Box::new(signal));
            }
        }
        Ok(())
    }

    /// Background and signal marginal stacks for the gaussian-gamma mode
    fn marginal_distributions(&self) -> Result<(GaussianGamma, GaussianGamma)> {
        let background = GaussianGamma::new(vec![
            self.settings
                .background_dim_1
                .ok_or(BiasgenError::MissingKey("background_dim_1"))?,
            self.settings
                .background_dim_2
                .ok_or(BiasgenError::MissingKey("background_dim_2"))?,
        ]);
        let signal = GaussianGamma::new(vec![
            self.settings
                .signal_dim_1
                .ok_or(BiasgenError::MissingKey("signal_dim_1"))?,
            self.settings
                .signal_dim_2
                .ok_or(BiasgenError::MissingKey("signal_dim_2"))?,
        ]);
        Ok((background, signal))
    }

    fn derive_systematics(&mut self) -> Result<()> {
        let dimension = self.settings.problem_dimension;

        match self.bias_mode {
            BiasMode::Translation => {
                let z_magnitude = self
                    .settings
                    .z_magnitude
                    .ok_or(BiasgenError::MissingKey("z_magnitude"))?;
                let alpha = self.settings.alpha.ok_or(BiasgenError::MissingKey("alpha"))?;
                let scaling_factor = self
                    .settings
                    .scaling_factor
                    .ok_or(BiasgenError::MissingKey("scaling_factor"))?;

                // Direction cosines rounded to two decimals, zero beyond the
                // plane the angle lives in.
                let mut z = vec![0.0; dimension];
                z[0] = round2(alpha.cos()) * z_magnitude;
                if dimension >= 2 {
                    z[1] = round2(alpha.sin()) * z_magnitude;
                }
                debug!(?z, "derived translation vector");
                self.translation = Some(Translation::new(ANY_DIMENSION, z));

                if scaling_factor > 1.0 {
                    self.scaling = Some(Scaling::new(
                        ANY_DIMENSION,
                        vec![scaling_factor; dimension],
                    ));
                }
            }
            BiasMode::GammaPerturbation => {
                if self.data_mode != DataMode::GaussianGamma {
                    return Err(BiasgenError::UnsupportedMode(
                        "gamma perturbation requires the gaussian-gamma data mode".to_string(),
                    ));
                }
                let deltas = [
                    (
                        self.settings.delta_k_1.ok_or(BiasgenError::MissingKey("delta_k_1"))?,
                        self.settings
                            .delta_tau_1
                            .ok_or(BiasgenError::MissingKey("delta_tau_1"))?,
                    ),
                    (
                        self.settings.delta_k_2.ok_or(BiasgenError::MissingKey("delta_k_2"))?,
                        self.settings
                            .delta_tau_2
                            .ok_or(BiasgenError::MissingKey("delta_tau_2"))?,
                    ),
                ];
                let (background, signal) = self.marginal_distributions()?;
                self.biased_background_distribution = Some(background.perturbed(&deltas)?);
                self.biased_signal_distribution = Some(signal.perturbed(&deltas)?);
            }
        }
        Ok(())
    }

    /// Draw the original dataset and its biased counterpart
    ///
    /// All randomness (sampling and the shared shuffle permutation) flows
    /// from `seed`; a fixed seed reproduces both datasets bit-for-bit.
    pub fn generate_data(&mut self, seed: u64) -> Result<()> {
        if self.stage < Stage::DistributionsReady {
            return Err(BiasgenError::Precondition(
                "distributions are not loaded, call `load_settings` first",
            ));
        }
        if self.stage < Stage::SystematicsReady {
            return Err(BiasgenError::Precondition(
                "systematics are not loaded, call `load_settings` first",
            ));
        }

        let dimension = self.settings.problem_dimension;
        let n_signal = self.settings.number_of_signal_events();
        let n_background = self.settings.number_of_background_events();
        let mut rng = StdRng::seed_from_u64(seed);

        let signal_distribution = self
            .signal_distribution
            .as_ref()
            .ok_or(BiasgenError::Precondition("signal distribution missing"))?;
        let background_distribution = self
            .background_distribution
            .as_ref()
            .ok_or(BiasgenError::Precondition("background distribution missing"))?;

        let signal_data = signal_distribution.generate_points(&mut rng, n_signal, dimension)?;
        let background_data =
            background_distribution.generate_points(&mut rng, n_background, dimension)?;
        info!(n_signal, n_background, "data generated");

        let (biased_signal_data, biased_background_data) = match self.bias_mode {
            BiasMode::Translation => {
                let translation = self
                    .translation
                    .as_ref()
                    .ok_or(BiasgenError::Precondition("translation not derived"))?;
                let mut biased_signal =
                    translation.apply_systematics(dimension, &signal_data)?;
                let mut biased_background =
                    translation.apply_systematics(dimension, &background_data)?;
                if let Some(scaling) = &self.scaling {
                    biased_signal = scaling.apply_systematics(dimension, &biased_signal)?;
                    biased_background =
                        scaling.apply_systematics(dimension, &biased_background)?;
                    info!("translation and scaling applied");
                } else {
                    info!("translation applied");
                }
                (biased_signal, biased_background)
            }
            BiasMode::GammaPerturbation => {
                // Resampling, not a transform: the biased set is statistically
                // related to the original draw but not a function of it.
                let biased_signal_distribution = self
                    .biased_signal_distribution
                    .as_ref()
                    .ok_or(BiasgenError::Precondition("biased distributions not derived"))?;
                let biased_background_distribution = self
                    .biased_background_distribution
                    .as_ref()
                    .ok_or(BiasgenError::Precondition("biased distributions not derived"))?;
                let biased_signal = biased_signal_distribution
                    .generate_points(&mut rng, n_signal, dimension)?;
                let biased_background = biased_background_distribution
                    .generate_points(&mut rng, n_background, dimension)?;
                info!("gamma perturbation applied");
                (biased_signal, biased_background)
            }
        };

        // Labels are attached per class before concatenation: signal rows
        // first, background rows after, identically in both datasets.
        let mut labels = vec![SIGNAL_LABEL; n_signal];
        labels.extend(vec![BACKGROUND_LABEL; n_background]);

        let mut original_features = signal_data;
        original_features.extend(background_data);
        let mut biased_features = biased_signal_data;
        biased_features.extend(biased_background_data);

        // One permutation for everything keeps original/biased rows and their
        // labels aligned by construction.
        let mut permutation: Vec<usize> = (0..labels.len()).collect();
        permutation.shuffle(&mut rng);

        let original = Dataset::new(
            apply_permutation(&permutation, &original_features),
            apply_permutation(&permutation, &labels),
        )?;
        let biased = Dataset::new(
            apply_permutation(&permutation, &biased_features),
            apply_permutation(&permutation, &labels),
        )?;

        self.original = Some(original);
        self.biased = Some(biased);
        self.stage = Stage::DataGenerated;
        Ok(())
    }

    /// Read-only views of the settings and both datasets
    pub fn get_data(&self) -> Result<(&Settings, &Dataset, &Dataset)> {
        match (&self.original, &self.biased) {
            (Some(original), Some(biased)) => Ok((&self.settings, original, biased)),
            _ => Err(BiasgenError::Precondition(
                "data is not generated, call `generate_data` first",
            )),
        }
    }

    /// Persist the dataset pair and settings under the canonical layout
    ///
    /// ```text
    /// {dir}/train/data/train[_i].csv      original features
    /// {dir}/train/labels/train[_i].labels original labels
    /// {dir}/test/data/test[_i].csv        biased features
    /// {dir}/test/labels/test[_i].labels   biased labels
    /// {dir}/settings/settings[_i].json
    /// ```
    ///
    /// Directories are created unconditionally before any write; each file is
    /// written in one shot, so a retry overwrites cleanly.
    pub fn save_data(&self, directory: impl AsRef<Path>, index: Option<usize>) -> Result<()> {
        let (settings, original, biased) = self.get_data()?;
        let directory = directory.as_ref();

        let train_data_dir = directory.join("train").join("data");
        let train_labels_dir = directory.join("train").join("labels");
        let test_data_dir = directory.join("test").join("data");
        let test_labels_dir = directory.join("test").join("labels");
        let settings_dir = directory.join("settings");
        for dir in [
            &train_data_dir,
            &train_labels_dir,
            &test_data_dir,
            &test_labels_dir,
            &settings_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }

        std::fs::write(
            train_data_dir.join(file_name("train", "csv", index)),
            original.to_csv(),
        )?;
        std::fs::write(
            train_labels_dir.join(file_name("train", "labels", index)),
            original.labels_file_body(),
        )?;
        std::fs::write(
            test_data_dir.join(file_name("test", "csv", index)),
            biased.to_csv(),
        )?;
        std::fs::write(
            test_labels_dir.join(file_name("test", "labels", index)),
            biased.labels_file_body(),
        )?;
        settings.to_file(settings_dir.join(file_name("settings", "json", index)))?;

        info!(directory = %directory.display(), "train and test data saved");
        Ok(())
    }
}

/// Reload a saved (train, test) dataset pair from the canonical layout
pub fn load_dataset_pair(
    directory: impl AsRef<Path>,
    index: Option<usize>,
) -> Result<(Dataset, Dataset)> {
    let directory = directory.as_ref();
    let read = |sub: &[&str], name: String| -> Result<String> {
        let mut path = directory.to_path_buf();
        for part in sub {
            path = path.join(part);
        }
        Ok(std::fs::read_to_string(path.join(name))?)
    };

    let train = Dataset::new(
        Dataset::features_from_csv(&read(&["train", "data"], file_name("train", "csv", index))?)?,
        Dataset::labels_from_str(&read(
            &["train", "labels"],
            file_name("train", "labels", index),
        )?)?,
    )?;
    let test = Dataset::new(
        Dataset::features_from_csv(&read(&["test", "data"], file_name("test", "csv", index))?)?,
        Dataset::labels_from_str(&read(
            &["test", "labels"],
            file_name("test", "labels", index),
        )?)?,
    )?;
    Ok((train, test))
}

fn file_name(stem: &str, extension: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{stem}_{i}.{extension}"),
        None => format!("{stem}.{extension}"),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn apply_permutation<T: Clone>(permutation: &[usize], items: &[T]) -> Vec<T> {
    permutation.iter().map(|&i| items[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MarginalKind, MarginalSpec};

    fn gaussian_settings() -> Settings {
        Settings {
            problem_dimension: 2,
            total_number_of_events: 1000,
            p_b: 0.6,
            background_mu: Some(vec![0.0, 0.0]),
            background_sigma: Some(vec![1.0, 1.0]),
            theta: Some(0.0),
            l: Some(5.0),
            signal_sigma_scale: Some(1.0),
            z_magnitude: Some(2.0),
            alpha: Some(0.0),
            scaling_factor: Some(1.0),
            ..Settings::default()
        }
    }

    fn gamma_settings() -> Settings {
        let gamma = |k, tau| MarginalSpec {
            distrib: MarginalKind::Gamma,
            param_1: k,
            param_2: tau,
        };
        Settings {
            problem_dimension: 2,
            total_number_of_events: 2000,
            p_b: 0.5,
            background_dim_1: Some(gamma(2.0, 2.0)),
            background_dim_2: Some(gamma(3.0, 1.0)),
            signal_dim_1: Some(gamma(5.0, 2.0)),
            signal_dim_2: Some(gamma(6.0, 1.0)),
            delta_k_1: Some(1.0),
            delta_tau_1: Some(0.0),
            delta_k_2: Some(0.5),
            delta_tau_2: Some(0.0),
            ..Settings::default()
        }
    }

    #[test]
    fn test_generate_before_load_settings_fails() {
        let mut generator =
            DataGenerator::new(gaussian_settings(), DataMode::Gaussian, BiasMode::Translation);
        let err = generator.generate_data(1).unwrap_err();
        assert!(matches!(err, BiasgenError::Precondition(_)));
    }

    #[test]
    fn test_get_data_before_generate_fails() {
        let mut generator =
            DataGenerator::new(gaussian_settings(), DataMode::Gaussian, BiasMode::Translation);
        generator.load_settings().unwrap();
        assert!(matches!(
            generator.get_data().unwrap_err(),
            BiasgenError::Precondition(_)
        ));
    }

    #[test]
    fn test_end_to_end_scenario_counts_and_translation() {
        // dim 2, 1000 events, p_b 0.6, theta 0, L 5, alpha 0, |z| 2, scale 1
        let mut generator =
            DataGenerator::new(gaussian_settings(), DataMode::Gaussian, BiasMode::Translation);
        generator.load_settings().unwrap();
        generator.generate_data(42).unwrap();

        let (_, original, biased) = generator.get_data().unwrap();
        assert_eq!(original.len(), 1000);
        assert_eq!(original.labels.iter().filter(|&&y| y == 1).count(), 400);
        assert_eq!(original.labels.iter().filter(|&&y| y == 0).count(), 600);

        // scaling skipped (factor not > 1): biased = original + (2, 0) per row
        for (row, biased_row) in original.features.iter().zip(biased.features.iter()) {
            assert!((biased_row[0] - (row[0] + 2.0)).abs() < 1e-12);
            assert!((biased_row[1] - row[1]).abs() < 1e-12);
        }
        assert_eq!(original.labels, biased.labels);
    }

    #[test]
    fn test_signal_center_derived_from_theta_and_l() {
        let mut generator =
            DataGenerator::new(gaussian_settings(), DataMode::Gaussian, BiasMode::Translation);
        generator.load_settings().unwrap();
        generator.generate_data(7).unwrap();

        let (_, original, _) = generator.get_data().unwrap();
        let signal_rows: Vec<&Vec<f64>> = original
            .features
            .iter()
            .zip(original.labels.iter())
            .filter(|(_, &y)| y == SIGNAL_LABEL)
            .map(|(row, _)| row)
            .collect();
        let mean_x: f64 =
            signal_rows.iter().map(|r| r[0]).sum::<f64>() / signal_rows.len() as f64;
        let mean_y: f64 =
            signal_rows.iter().map(|r| r[1]).sum::<f64>() / signal_rows.len() as f64;
        assert!((mean_x - 5.0).abs() < 0.2, "signal mean x {mean_x}");
        assert!(mean_y.abs() < 0.2, "signal mean y {mean_y}");
    }

    #[test]
    fn test_scaling_applied_after_translation_when_factor_above_one() {
        let mut settings = gaussian_settings();
        settings.scaling_factor = Some(2.0);
        let mut generator =
            DataGenerator::new(settings, DataMode::Gaussian, BiasMode::Translation);
        generator.load_settings().unwrap();
        generator.generate_data(3).unwrap();

        let (_, original, biased) = generator.get_data().unwrap();
        for (row, biased_row) in original.features.iter().zip(biased.features.iter()) {
            assert!((biased_row[0] - (row[0] + 2.0) * 2.0).abs() < 1e-12);
            assert!((biased_row[1] - row[1] * 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_generation_reproducible_for_fixed_seed() {
        let make = || {
            let mut generator = DataGenerator::new(
                gaussian_settings(),
                DataMode::Gaussian,
                BiasMode::Translation,
            );
            generator.load_settings().unwrap();
            generator.generate_data(99).unwrap();
            let (_, original, biased) = generator.get_data().unwrap();
            (original.clone(), biased.clone())
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_shuffle_actually_reorders() {
        let mut generator =
            DataGenerator::new(gaussian_settings(), DataMode::Gaussian, BiasMode::Translation);
        generator.load_settings().unwrap();
        generator.generate_data(5).unwrap();
        let (_, original, _) = generator.get_data().unwrap();
        // signal-first stacking would put 400 ones up front
        let first_400_signal = original.labels[..400].iter().all(|&y| y == SIGNAL_LABEL);
        assert!(!first_400_signal);
    }

    #[test]
    fn test_perturbation_mode_mean_shift_matches_deltas() {
        let mut generator = DataGenerator::new(
            gamma_settings(),
            DataMode::GaussianGamma,
            BiasMode::GammaPerturbation,
        );
        generator.load_settings().unwrap();
        generator.generate_data(13).unwrap();

        let (_, original, biased) = generator.get_data().unwrap();
        // Background dim 1: Gamma(2,2) -> Gamma(3,2); mean moves 4 -> 6
        let background_mean = |ds: &Dataset| {
            let rows: Vec<f64> = ds
                .features
                .iter()
                .zip(ds.labels.iter())
                .filter(|(_, &y)| y == BACKGROUND_LABEL)
                .map(|(r, _)| r[0])
                .collect();
            rows.iter().sum::<f64>() / rows.len() as f64
        };
        let shift = background_mean(biased) - background_mean(original);
        assert!((shift - 2.0).abs() < 0.4, "mean shift {shift}");
    }

    #[test]
    fn test_perturbation_requires_gamma_data_mode() {
        let mut settings = gaussian_settings();
        settings.delta_k_1 = Some(1.0);
        settings.delta_tau_1 = Some(0.0);
        settings.delta_k_2 = Some(1.0);
        settings.delta_tau_2 = Some(0.0);
        let mut generator =
            DataGenerator::new(settings, DataMode::Gaussian, BiasMode::GammaPerturbation);
        let err = generator.load_settings().unwrap_err();
        assert!(matches!(err, BiasgenError::UnsupportedMode(_)));
    }

    #[test]
    fn test_file_name_suffixing() {
        assert_eq!(file_name("train", "csv", None), "train.csv");
        assert_eq!(file_name("settings", "json", Some(3)), "settings_3.json");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(0.999_999), 1.0);
        assert_eq!(round2(std::f64::consts::FRAC_1_SQRT_2), 0.71);
    }
}
