//! Classifier artifact persistence
//!
//! Persists a fitted classifier to aprender's `.apr` format (zstd-compressed
//! by default) together with lightweight metadata, so a trained model can be
//! restored without refitting.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classifiers::Classifier;
use crate::error::{BiasgenError, Result};

/// Metadata stored alongside a persisted classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Crate version that created this artifact
    pub biasgen_version: String,
    /// Unix timestamp of training
    pub trained_at: u64,
    /// Number of samples the classifier was fitted on
    pub training_samples: usize,
}

impl ModelMetadata {
    pub fn new(training_samples: usize) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let trained_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            biasgen_version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at,
            training_samples,
        }
    }
}

/// Self-describing artifact: the fitted classifier plus its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedClassifier {
    pub classifier: Classifier,
    pub metadata: ModelMetadata,
}

/// Save a fitted classifier to `.apr` format
pub fn save_classifier(
    classifier: &Classifier,
    path: impl AsRef<Path>,
    training_samples: usize,
) -> Result<()> {
    use aprender::format::{save, Compression, ModelType, SaveOptions};

    let artifact = SavedClassifier {
        classifier: classifier.clone(),
        metadata: ModelMetadata::new(training_samples),
    };
    let options = SaveOptions::new().with_compression(Compression::ZstdDefault);
    save(&artifact, ModelType::Custom, path.as_ref(), options)
        .map_err(|e| BiasgenError::Model(format!("failed to save model: {e}")))
}

/// Load a classifier artifact from `.apr` format
pub fn load_classifier(path: impl AsRef<Path>) -> Result<SavedClassifier> {
    use aprender::format::{load, ModelType};

    if !path.as_ref().exists() {
        return Err(BiasgenError::Model(format!(
            "model file not found: {}",
            path.as_ref().display()
        )));
    }
    load::<SavedClassifier>(path.as_ref(), ModelType::Custom)
        .map_err(|e| BiasgenError::Model(format!("failed to load model: {e}")))
}
