//! Labeled dataset container and its on-disk codecs
//!
//! A dataset is a feature matrix (rows = events, columns `x1..xD`) plus a
//! label vector in the same row order. Features are persisted as a headed
//! CSV; labels live in a sidecar file with one integer per line and no
//! trailing newline.

use crate::error::{BiasgenError, Result};

/// Class label for signal events
pub const SIGNAL_LABEL: u8 = 1;
/// Class label for background events
pub const BACKGROUND_LABEL: u8 = 0;

/// Feature matrix paired with an order-aligned label vector
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Build a dataset, checking row/label alignment
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<u8>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(BiasgenError::InvalidData(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Column count of the feature matrix (0 when empty)
    pub fn dimension(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Coordinate column names `x1..xD`
    pub fn column_names(dimension: usize) -> Vec<String> {
        (1..=dimension).map(|i| format!("x{i}")).collect()
    }

    /// Render the feature matrix as a headed CSV
    ///
    /// Values use the shortest round-trippable `f64` formatting, so a
    /// write/read cycle reproduces the matrix exactly.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(&Self::column_names(self.dimension()).join(","));
        out.push('\n');
        for row in &self.features {
            let fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }

    /// Parse a feature matrix from a headed CSV produced by [`Dataset::to_csv`]
    pub fn features_from_csv(body: &str) -> Result<Vec<Vec<f64>>> {
        let mut lines = body.lines();
        let header = lines
            .next()
            .ok_or_else(|| BiasgenError::InvalidData("empty CSV".to_string()))?;
        let dimension = header.split(',').count();

        let mut features = Vec::new();
        for (i, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let row: Vec<f64> = line
                .split(',')
                .map(|field| {
                    field.parse::<f64>().map_err(|_| {
                        BiasgenError::InvalidData(format!("bad value {field:?} on row {}", i + 1))
                    })
                })
                .collect::<Result<_>>()?;
            if row.len() != dimension {
                return Err(BiasgenError::InvalidData(format!(
                    "row {} has {} columns, header has {}",
                    i + 1,
                    row.len(),
                    dimension
                )));
            }
            features.push(row);
        }
        Ok(features)
    }

    /// Labels as a newline-joined list of integers, no trailing newline
    pub fn labels_file_body(&self) -> String {
        self.labels
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse a labels sidecar file
    pub fn labels_from_str(body: &str) -> Result<Vec<u8>> {
        body.lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.trim().parse::<u8>().map_err(|_| {
                    BiasgenError::InvalidData(format!("bad label {line:?}"))
                })
            })
            .collect()
    }
}
