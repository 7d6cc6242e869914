//! Distribution strategies for per-class event sampling
//!
//! Each strategy holds immutable parameters and draws `count x dimension`
//! matrices from a caller-supplied seeded generator. All randomness flows
//! through that handle; there is no ambient global state, so a fixed seed
//! reproduces a draw bit-for-bit.

use rand::rngs::StdRng;
use rand_distr::{Distribution as _, Gamma, Normal};

use crate::error::{BiasgenError, Result};
use crate::settings::{MarginalKind, MarginalSpec};

/// A parametric source of raw feature vectors for one class
pub trait EventDistribution {
    /// Draw a `count x dimension` matrix of feature vectors
    fn generate_points(
        &self,
        rng: &mut StdRng,
        count: usize,
        dimension: usize,
    ) -> Result<Vec<Vec<f64>>>;
}

/// Multivariate Gaussian with independent per-dimension sigma
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    mu: Vec<f64>,
    sigma: Vec<f64>,
}

impl Gaussian {
    pub fn new(mu: Vec<f64>, sigma: Vec<f64>) -> Result<Self> {
        if mu.len() != sigma.len() {
            return Err(BiasgenError::DimensionMismatch {
                expected: mu.len(),
                actual: sigma.len(),
            });
        }
        Ok(Self { mu, sigma })
    }

    /// Distribution center (used to verify the derived signal placement)
    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }
}

impl EventDistribution for Gaussian {
    fn generate_points(
        &self,
        rng: &mut StdRng,
        count: usize,
        dimension: usize,
    ) -> Result<Vec<Vec<f64>>> {
        if dimension != self.mu.len() {
            return Err(BiasgenError::DimensionMismatch {
                expected: self.mu.len(),
                actual: dimension,
            });
        }

        let marginals: Vec<Normal<f64>> = self
            .mu
            .iter()
            .zip(self.sigma.iter())
            .map(|(&m, &s)| {
                Normal::new(m, s).map_err(|e| {
                    BiasgenError::Configuration(format!("invalid gaussian parameters: {e}"))
                })
            })
            .collect::<Result<_>>()?;

        let mut points = Vec::with_capacity(count);
        for _ in 0..count {
            points.push(marginals.iter().map(|n| n.sample(rng)).collect());
        }
        Ok(points)
    }
}

/// Per-dimension independent marginals, each Gaussian or Gamma
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianGamma {
    marginals: Vec<MarginalSpec>,
}

enum MarginalSampler {
    Gaussian(Normal<f64>),
    Gamma(Gamma<f64>),
}

impl MarginalSampler {
    fn build(spec: &MarginalSpec) -> Result<Self> {
        match spec.distrib {
            MarginalKind::Gaussian => Normal::new(spec.param_1, spec.param_2)
                .map(MarginalSampler::Gaussian)
                .map_err(|e| {
                    BiasgenError::Configuration(format!("invalid gaussian marginal: {e}"))
                }),
            MarginalKind::Gamma => Gamma::new(spec.param_1, spec.param_2)
                .map(MarginalSampler::Gamma)
                .map_err(|e| BiasgenError::Configuration(format!("invalid gamma marginal: {e}"))),
        }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            MarginalSampler::Gaussian(n) => n.sample(rng),
            MarginalSampler::Gamma(g) => g.sample(rng),
        }
    }
}

impl GaussianGamma {
    pub fn new(marginals: Vec<MarginalSpec>) -> Self {
        Self { marginals }
    }

    pub fn marginals(&self) -> &[MarginalSpec] {
        &self.marginals
    }

    /// Counterpart with per-dimension parameter deltas applied
    ///
    /// `deltas[i]` holds `(delta_param_1, delta_param_2)` for dimension `i`.
    pub fn perturbed(&self, deltas: &[(f64, f64)]) -> Result<Self> {
        if deltas.len() != self.marginals.len() {
            return Err(BiasgenError::DimensionMismatch {
                expected: self.marginals.len(),
                actual: deltas.len(),
            });
        }
        let marginals = self
            .marginals
            .iter()
            .zip(deltas.iter())
            .map(|(spec, &(d1, d2))| spec.perturbed(d1, d2))
            .collect();
        Ok(Self { marginals })
    }
}

impl EventDistribution for GaussianGamma {
    fn generate_points(
        &self,
        rng: &mut StdRng,
        count: usize,
        dimension: usize,
    ) -> Result<Vec<Vec<f64>>> {
        if dimension != self.marginals.len() {
            return Err(BiasgenError::DimensionMismatch {
                expected: self.marginals.len(),
                actual: dimension,
            });
        }

        let samplers: Vec<MarginalSampler> = self
            .marginals
            .iter()
            .map(MarginalSampler::build)
            .collect::<Result<_>>()?;

        let mut points = Vec::with_capacity(count);
        for _ in 0..count {
            points.push(samplers.iter().map(|s| s.sample(rng)).collect());
        }
        Ok(points)
    }
}
