//! Systematic bias transforms
//!
//! Pure row-wise transforms over a feature matrix. Each transform declares an
//! allowed dimensionality (`ANY_DIMENSION` accepts any width) and rejects a
//! matrix whose column count disagrees with it.

use crate::error::{BiasgenError, Result};

/// Wildcard for `allowed_dimension`: accept any matrix width
pub const ANY_DIMENSION: i32 = -1;

/// Transform contract shared by all systematics
pub trait Systematic {
    /// Return a transformed copy of `data`; never mutates the input
    fn apply_systematics(&self, dimension: usize, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
}

fn check_dimension(allowed: i32, vector_len: usize, dimension: usize) -> Result<()> {
    if allowed != ANY_DIMENSION && allowed as usize != dimension {
        return Err(BiasgenError::DimensionMismatch {
            expected: allowed as usize,
            actual: dimension,
        });
    }
    if vector_len != dimension {
        return Err(BiasgenError::DimensionMismatch {
            expected: vector_len,
            actual: dimension,
        });
    }
    Ok(())
}

/// Row-wise additive shift by a fixed vector
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    allowed_dimension: i32,
    translation_vector: Vec<f64>,
}

impl Translation {
    pub fn new(allowed_dimension: i32, translation_vector: Vec<f64>) -> Self {
        Self {
            allowed_dimension,
            translation_vector,
        }
    }

    pub fn translation_vector(&self) -> &[f64] {
        &self.translation_vector
    }
}

impl Systematic for Translation {
    fn apply_systematics(&self, dimension: usize, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_dimension(self.allowed_dimension, self.translation_vector.len(), dimension)?;
        Ok(data
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.translation_vector.iter())
                    .map(|(x, z)| x + z)
                    .collect()
            })
            .collect())
    }
}

/// Row-wise multiplicative scale by a fixed vector
#[derive(Debug, Clone, PartialEq)]
pub struct Scaling {
    allowed_dimension: i32,
    scaling_vector: Vec<f64>,
}

impl Scaling {
    pub fn new(allowed_dimension: i32, scaling_vector: Vec<f64>) -> Self {
        Self {
            allowed_dimension,
            scaling_vector,
        }
    }

    pub fn scaling_vector(&self) -> &[f64] {
        &self.scaling_vector
    }
}

impl Systematic for Scaling {
    fn apply_systematics(&self, dimension: usize, data: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_dimension(self.allowed_dimension, self.scaling_vector.len(), dimension)?;
        Ok(data
            .iter()
            .map(|row| {
                row.iter()
                    .zip(self.scaling_vector.iter())
                    .map(|(x, s)| x * s)
                    .collect()
            })
            .collect())
    }
}
