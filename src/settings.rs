//! Settings contract for a generation run
//!
//! Mirrors the JSON settings file consumed and produced by the pipeline.
//! Which keys are required depends on the selected data mode (Gaussian vs.
//! Gaussian-Gamma marginals) and bias mode (geometric transform vs. parameter
//! perturbation), so every mode-dependent field is optional at the serde
//! level and checked by [`Settings::validate`].

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{BiasgenError, Result};

/// Distribution family used for both classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DataMode {
    /// Multivariate Gaussian with independent per-dimension sigma
    Gaussian,
    /// Per-dimension independent marginals (Gaussian or Gamma)
    GaussianGamma,
}

/// How the biased (test) counterpart dataset is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BiasMode {
    /// Translate (and optionally scale) the original draws
    Translation,
    /// Re-sample from distributions with perturbed parameters
    GammaPerturbation,
}

/// Shape of a single per-dimension marginal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginalKind {
    Gaussian,
    Gamma,
}

/// One dimension's marginal: kind plus its two scalar parameters
///
/// For Gaussian marginals `param_1`/`param_2` are mean and sigma; for Gamma
/// they are shape `k` and scale `tau`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginalSpec {
    pub distrib: MarginalKind,
    pub param_1: f64,
    pub param_2: f64,
}

impl MarginalSpec {
    /// Same marginal with both parameters shifted by fixed deltas
    pub fn perturbed(&self, delta_1: f64, delta_2: f64) -> Self {
        Self {
            distrib: self.distrib,
            param_1: self.param_1 + delta_1,
            param_2: self.param_2 + delta_2,
        }
    }
}

/// Immutable per-run configuration
///
/// Field names match the settings JSON keys one-to-one so a loaded file
/// round-trips through [`Settings::to_file`] without renaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    pub problem_dimension: usize,
    pub total_number_of_events: usize,
    /// Background fraction; signal fraction is `1 - p_b`
    pub p_b: f64,

    // Gaussian data mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_mu: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_sigma: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theta: Option<f64>,
    #[serde(rename = "L", skip_serializing_if = "Option::is_none")]
    pub l: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_sigma_scale: Option<f64>,

    // Gaussian-Gamma data mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_dim_1: Option<MarginalSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_dim_2: Option<MarginalSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_dim_1: Option<MarginalSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_dim_2: Option<MarginalSpec>,

    // Translation bias mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_magnitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaling_factor: Option<f64>,

    // Gamma perturbation bias mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_k_1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_tau_1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_k_2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta_tau_2: Option<f64>,
}

impl Settings {
    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let body = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&body)
    }

    /// Write settings as JSON, omitting unset mode-dependent keys
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let body = serde_json::to_string(self)?;
        std::fs::write(path.as_ref(), body)?;
        Ok(())
    }

    /// Number of signal events, `floor(total * (1 - p_b))`
    pub fn number_of_signal_events(&self) -> usize {
        (self.total_number_of_events as f64 * (1.0 - self.p_b)) as usize
    }

    /// Number of background events, `floor(total * p_b)`
    pub fn number_of_background_events(&self) -> usize {
        (self.total_number_of_events as f64 * self.p_b) as usize
    }

    /// Check invariants and the presence of every key the selected modes need
    pub fn validate(&self, data_mode: DataMode, bias_mode: BiasMode) -> Result<()> {
        if self.problem_dimension < 1 {
            return Err(BiasgenError::Configuration(
                "problem_dimension must be >= 1".to_string(),
            ));
        }
        if self.total_number_of_events == 0 {
            return Err(BiasgenError::Configuration(
                "total_number_of_events must be > 0".to_string(),
            ));
        }
        if !(self.p_b > 0.0 && self.p_b < 1.0) {
            return Err(BiasgenError::Configuration(format!(
                "p_b must lie strictly between 0 and 1, got {}",
                self.p_b
            )));
        }

        match data_mode {
            DataMode::Gaussian => {
                let mu = self
                    .background_mu
                    .as_ref()
                    .ok_or(BiasgenError::MissingKey("background_mu"))?;
                let sigma = self
                    .background_sigma
                    .as_ref()
                    .ok_or(BiasgenError::MissingKey("background_sigma"))?;
                self.theta.ok_or(BiasgenError::MissingKey("theta"))?;
                self.l.ok_or(BiasgenError::MissingKey("L"))?;
                self.signal_sigma_scale
                    .ok_or(BiasgenError::MissingKey("signal_sigma_scale"))?;
                if mu.len() != self.problem_dimension {
                    return Err(BiasgenError::DimensionMismatch {
                        expected: self.problem_dimension,
                        actual: mu.len(),
                    });
                }
                if sigma.len() != self.problem_dimension {
                    return Err(BiasgenError::DimensionMismatch {
                        expected: self.problem_dimension,
                        actual: sigma.len(),
                    });
                }
            }
            DataMode::GaussianGamma => {
                self.background_dim_1
                    .ok_or(BiasgenError::MissingKey("background_dim_1"))?;
                self.background_dim_2
                    .ok_or(BiasgenError::MissingKey("background_dim_2"))?;
                self.signal_dim_1
                    .ok_or(BiasgenError::MissingKey("signal_dim_1"))?;
                self.signal_dim_2
                    .ok_or(BiasgenError::MissingKey("signal_dim_2"))?;
            }
        }

        match bias_mode {
            BiasMode::Translation => {
                self.z_magnitude
                    .ok_or(BiasgenError::MissingKey("z_magnitude"))?;
                self.alpha.ok_or(BiasgenError::MissingKey("alpha"))?;
                self.scaling_factor
                    .ok_or(BiasgenError::MissingKey("scaling_factor"))?;
            }
            BiasMode::GammaPerturbation => {
                self.delta_k_1.ok_or(BiasgenError::MissingKey("delta_k_1"))?;
                self.delta_tau_1
                    .ok_or(BiasgenError::MissingKey("delta_tau_1"))?;
                self.delta_k_2.ok_or(BiasgenError::MissingKey("delta_k_2"))?;
                self.delta_tau_2
                    .ok_or(BiasgenError::MissingKey("delta_tau_2"))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_event_counts_floor() {
        let settings = gaussian_settings();
        assert_eq!(settings.number_of_background_events(), 600);
        assert_eq!(settings.number_of_signal_events(), 400);
    }

    #[test]
    fn test_event_counts_never_exceed_total() {
        let mut settings = gaussian_settings();
        settings.total_number_of_events = 999;
        settings.p_b = 0.7;
        let n = settings.number_of_signal_events() + settings.number_of_background_events();
        assert!(n <= settings.total_number_of_events);
    }

    #[test]
    fn test_validate_gaussian_translation_ok() {
        let settings = gaussian_settings();
        assert!(settings
            .validate(DataMode::Gaussian, BiasMode::Translation)
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let mut settings = gaussian_settings();
        settings.p_b = 1.0;
        let err = settings
            .validate(DataMode::Gaussian, BiasMode::Translation)
            .unwrap_err();
        assert!(matches!(err, BiasgenError::Configuration(_)));
    }

    #[test]
    fn test_validate_names_missing_key() {
        let mut settings = gaussian_settings();
        settings.z_magnitude = None;
        let err = settings
            .validate(DataMode::Gaussian, BiasMode::Translation)
            .unwrap_err();
        assert_eq!(err.to_string(), "missing settings key: z_magnitude");
    }

    #[test]
    fn test_validate_gamma_mode_requires_dim_specs() {
        let settings = Settings {
            problem_dimension: 2,
            total_number_of_events: 100,
            p_b: 0.5,
            ..Settings::default()
        };
        let err = settings
            .validate(DataMode::GaussianGamma, BiasMode::GammaPerturbation)
            .unwrap_err();
        assert!(matches!(err, BiasgenError::MissingKey("background_dim_1")));
    }

    #[test]
    fn test_validate_rejects_mu_width_mismatch() {
        let mut settings = gaussian_settings();
        settings.background_mu = Some(vec![0.0, 0.0, 0.0]);
        let err = settings
            .validate(DataMode::Gaussian, BiasMode::Translation)
            .unwrap_err();
        assert!(matches!(err, BiasgenError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_json_round_trip_is_semantically_identical() {
        let settings = gaussian_settings();
        let json = serde_json::to_string(&settings).unwrap();
        let reloaded = Settings::from_json(&json).unwrap();
        assert_eq!(settings, reloaded);
        // unset keys are not serialized at all
        assert!(!json.contains("delta_k_1"));
    }

    #[test]
    fn test_marginal_spec_json_shape() {
        let spec = MarginalSpec {
            distrib: MarginalKind::Gamma,
            param_1: 2.0,
            param_2: 3.0,
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"distrib\":\"gamma\""));
        let back: MarginalSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_marginal_perturbed_shifts_both_params() {
        let spec = MarginalSpec {
            distrib: MarginalKind::Gamma,
            param_1: 2.0,
            param_2: 3.0,
        };
        let biased = spec.perturbed(0.5, -1.0);
        assert_eq!(biased.param_1, 2.5);
        assert_eq!(biased.param_2, 2.0);
        assert_eq!(biased.distrib, MarginalKind::Gamma);
    }

    #[test]
    fn test_capital_l_key_name() {
        let settings = gaussian_settings();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"L\":5.0"));
    }
}
