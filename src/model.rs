//! Classifier wrapper for the domain-shift bench
//!
//! Wraps a pluggable classifier with the scaffolding the shifted test set
//! needs: optional preprocessing that compensates the estimated train/test
//! shift, optional training-set augmentation that anticipates it, and
//! per-scenario decision thresholds selected by a 1-based `case` index.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::info;

use crate::classifiers::{
    Classifier, GaussianDiscriminant, GaussianNb, LinearDiscriminant, Ridge, Scores,
};
use crate::error::{BiasgenError, Result};
use crate::model_persistence::{load_classifier, save_classifier};

/// Bootstrap sample size per augmentation round
const AUGMENTATION_SIZE: usize = 1000;
/// Number of augmentation rounds
const AUGMENTATION_ROUNDS: usize = 5;
/// Default seed for augmentation resampling and shuffling
const DEFAULT_AUGMENTATION_SEED: u64 = 42;

/// Which classifier strategy the wrapper drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    /// Predicts background for everything; never fits
    Constant,
    NaiveBayes,
    LinearDiscriminant,
    Ridge,
    GaussianDiscriminant,
}

/// Domain-shift compensation applied before scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PreprocessMethod {
    /// Subtract the estimated train-to-test mean shift
    Translation,
    /// Subtract the mean shift, then divide by the std-dev ratio
    Scaling,
}

/// Training-set augmentation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AugmentationKind {
    /// Resample and shift by random multiples of the estimated mean shift
    Translation,
    /// Same, plus a random multiplicative scale after the shift
    TranslationScaling,
}

/// Classifier plus train/test tables, preprocessing, augmentation, thresholds
#[derive(Debug)]
pub struct Model {
    kind: ModelKind,
    classifier: Option<Classifier>,
    x_train: Option<Vec<Vec<f64>>>,
    y_train: Option<Vec<u8>>,
    x_test: Option<Vec<Vec<f64>>>,
    preprocessing: Option<PreprocessMethod>,
    augmentation: Option<AugmentationKind>,
    /// 0-based threshold index (external input is 1-based)
    case: Option<usize>,
    thetas: Vec<f64>,
    augmentation_seed: u64,
    training_samples: usize,
    is_trained: bool,
}

impl Model {
    pub fn new(kind: ModelKind) -> Self {
        let classifier = match kind {
            ModelKind::Constant => None,
            ModelKind::NaiveBayes => Some(Classifier::GaussianNb(GaussianNb::new())),
            ModelKind::LinearDiscriminant => {
                Some(Classifier::LinearDiscriminant(LinearDiscriminant::new()))
            }
            ModelKind::Ridge => Some(Classifier::Ridge(Ridge::new())),
            ModelKind::GaussianDiscriminant => {
                Some(Classifier::GaussianDiscriminant(GaussianDiscriminant::new()))
            }
        };
        Self {
            kind,
            classifier,
            x_train: None,
            y_train: None,
            x_test: None,
            preprocessing: None,
            augmentation: None,
            case: None,
            thetas: Vec::new(),
            augmentation_seed: DEFAULT_AUGMENTATION_SEED,
            training_samples: 0,
            is_trained: false,
        }
    }

    pub fn with_train(mut self, x: Vec<Vec<f64>>, y: Vec<u8>) -> Self {
        self.x_train = Some(x);
        self.y_train = Some(y);
        self
    }

    pub fn with_test(mut self, x: Vec<Vec<f64>>) -> Self {
        self.x_test = Some(x);
        self
    }

    pub fn with_preprocessing(mut self, method: PreprocessMethod) -> Self {
        self.preprocessing = Some(method);
        self
    }

    pub fn with_augmentation(mut self, kind: AugmentationKind) -> Self {
        self.augmentation = Some(kind);
        self
    }

    pub fn with_augmentation_seed(mut self, seed: u64) -> Self {
        self.augmentation_seed = seed;
        self
    }

    /// Select a decision threshold by 1-based case index
    ///
    /// `case` comes from an external 1-based convention; zero is rejected
    /// here rather than silently wrapping into a bogus index.
    pub fn with_case(mut self, case: usize, thetas: Vec<f64>) -> Result<Self> {
        if case < 1 {
            return Err(BiasgenError::Configuration(
                "case is 1-based and must be >= 1".to_string(),
            ));
        }
        if case > thetas.len() {
            return Err(BiasgenError::Configuration(format!(
                "case {} exceeds the {} configured thresholds",
                case,
                thetas.len()
            )));
        }
        self.case = Some(case - 1);
        self.thetas = thetas;
        Ok(self)
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained
    }

    fn train_tables(&self) -> Result<(&Vec<Vec<f64>>, &Vec<u8>)> {
        match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(BiasgenError::Precondition("training data is not set")),
        }
    }

    fn test_table(&self) -> Result<&Vec<Vec<f64>>> {
        self.x_test
            .as_ref()
            .ok_or(BiasgenError::Precondition("test data is not set"))
    }

    /// Estimated per-feature train-to-test mean shift
    fn estimated_translation(&self) -> Result<Vec<f64>> {
        let (x_train, _) = self.train_tables()?;
        let x_test = self.test_table()?;
        let train_mean = column_means(x_train);
        let test_mean = column_means(x_test);
        Ok(test_mean
            .iter()
            .zip(train_mean.iter())
            .map(|(t, tr)| t - tr)
            .collect())
    }

    /// Estimated per-feature test/train std-dev ratio
    fn estimated_scaling(&self) -> Result<Vec<f64>> {
        let (x_train, _) = self.train_tables()?;
        let x_test = self.test_table()?;
        let train_std = column_stds(x_train);
        let test_std = column_stds(x_test);
        Ok(test_std
            .iter()
            .zip(train_std.iter())
            .map(|(t, tr)| t / tr)
            .collect())
    }

    /// Map a matrix back toward the training domain
    fn preprocess(&self, x: &[Vec<f64>], method: PreprocessMethod) -> Result<Vec<Vec<f64>>> {
        let translation = self.estimated_translation()?;
        match method {
            PreprocessMethod::Translation => Ok(x
                .iter()
                .map(|row| {
                    row.iter()
                        .zip(translation.iter())
                        .map(|(v, z)| v - z)
                        .collect()
                })
                .collect()),
            PreprocessMethod::Scaling => {
                let scaling = self.estimated_scaling()?;
                Ok(x.iter()
                    .map(|row| {
                        row.iter()
                            .zip(translation.iter())
                            .zip(scaling.iter())
                            .map(|((v, z), s)| (v - z) / s)
                            .collect()
                    })
                    .collect())
            }
        }
    }

    /// Synthesize an augmented training set anticipating the test shift
    fn augment(&self, kind: AugmentationKind) -> Result<(Vec<Vec<f64>>, Vec<u8>)> {
        let (x_train, y_train) = self.train_tables()?;
        if x_train.is_empty() {
            return Err(BiasgenError::InvalidData(
                "cannot augment an empty training set".to_string(),
            ));
        }
        let translation = self.estimated_translation()?;
        let scaling = match kind {
            AugmentationKind::Translation => None,
            AugmentationKind::TranslationScaling => Some(self.estimated_scaling()?),
        };
        let mut rng = StdRng::seed_from_u64(self.augmentation_seed);

        let mut augmented_x = Vec::with_capacity(AUGMENTATION_ROUNDS * AUGMENTATION_SIZE);
        let mut augmented_y = Vec::with_capacity(AUGMENTATION_ROUNDS * AUGMENTATION_SIZE);
        for _ in 0..AUGMENTATION_ROUNDS {
            for _ in 0..AUGMENTATION_SIZE {
                let alpha: f64 = rng.gen_range(-3.0..3.0);
                let beta: f64 = rng.gen_range(1.0..1.5);
                let pick = rng.gen_range(0..x_train.len());
                let row: Vec<f64> = x_train[pick]
                    .iter()
                    .enumerate()
                    .map(|(d, v)| {
                        let shifted = v + alpha * translation[d];
                        match &scaling {
                            Some(s) => shifted * (beta * s[d]),
                            None => shifted,
                        }
                    })
                    .collect();
                augmented_x.push(row);
                augmented_y.push(y_train[pick]);
            }
        }

        // One permutation applied to data and labels keeps rows aligned.
        let mut permutation: Vec<usize> = (0..augmented_x.len()).collect();
        permutation.shuffle(&mut rng);
        let shuffled_x = permutation.iter().map(|&i| augmented_x[i].clone()).collect();
        let shuffled_y = permutation.iter().map(|&i| augmented_y[i]).collect();
        Ok((shuffled_x, shuffled_y))
    }

    /// Fit the inner classifier; the constant model never fits
    pub fn fit(&mut self, x: Option<&[Vec<f64>]>, y: Option<&[u8]>) -> Result<()> {
        if self.classifier.is_none() {
            return Ok(());
        }

        let (x, y) = match self.augmentation {
            Some(kind) => {
                let (augmented_x, augmented_y) = self.augment(kind)?;
                info!(rows = augmented_x.len(), "training set augmented");
                (augmented_x, augmented_y)
            }
            None => {
                let x = match x {
                    Some(x) => x.to_vec(),
                    None => self
                        .x_train
                        .clone()
                        .ok_or(BiasgenError::Precondition("training data is not set"))?,
                };
                let y = match y {
                    Some(y) => y.to_vec(),
                    None => self
                        .y_train
                        .clone()
                        .ok_or(BiasgenError::Precondition("training data is not set"))?,
                };
                (x, y)
            }
        };

        let classifier = self
            .classifier
            .as_mut()
            .ok_or(BiasgenError::Precondition("classifier missing"))?;
        classifier.fit(&x, &y)?;
        self.training_samples = x.len();
        self.is_trained = true;
        Ok(())
    }

    fn resolve_input(&self, x: Option<&[Vec<f64>]>, preprocess: bool) -> Result<Vec<Vec<f64>>> {
        let input = match x {
            Some(x) => x.to_vec(),
            None => self.test_table()?.clone(),
        };
        match (self.preprocessing, preprocess) {
            (Some(method), true) => self.preprocess(&input, method),
            _ => Ok(input),
        }
    }

    /// Raw decision scores on an already-resolved matrix (no preprocessing,
    /// no threshold subtraction)
    fn raw_scores(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(BiasgenError::Precondition("classifier missing"))?;
        match classifier.scores(x)? {
            Scores::Probability(probabilities) => Ok(probabilities
                .into_iter()
                .map(|p| {
                    // log-odds of the positive class; the epsilon and clamp
                    // keep the logarithm finite at saturated posteriors
                    let odds = (1.0 / (p + f64::EPSILON) - 1.0).max(f64::MIN_POSITIVE);
                    -odds.ln()
                })
                .collect()),
            Scores::Margin(margins) => Ok(margins),
        }
    }

    /// Predict class labels
    ///
    /// With a configured `case`, thresholds the decision function at the
    /// selected theta instead of using the classifier's native boundary.
    pub fn predict(&self, x: Option<&[Vec<f64>]>, preprocess: bool) -> Result<Vec<u8>> {
        if self.kind == ModelKind::Constant {
            let rows = match x {
                Some(x) => x.len(),
                None => self.test_table()?.len(),
            };
            return Ok(vec![0; rows]);
        }

        let input = self.resolve_input(x, preprocess)?;
        match self.case {
            None => {
                let classifier = self
                    .classifier
                    .as_ref()
                    .ok_or(BiasgenError::Precondition("classifier missing"))?;
                classifier.predict(&input)
            }
            Some(case) => {
                let threshold = self.thetas[case];
                Ok(self
                    .raw_scores(&input)?
                    .into_iter()
                    .map(|score| u8::from(score > threshold))
                    .collect())
            }
        }
    }

    /// Decision scores; with a configured `case` the returned score is the
    /// margin relative to the selected threshold (`score - theta`)
    pub fn decision_function(&self, x: Option<&[Vec<f64>]>, preprocess: bool) -> Result<Vec<f64>> {
        if self.kind == ModelKind::Constant {
            let rows = match x {
                Some(x) => x.len(),
                None => self.test_table()?.len(),
            };
            return Ok(vec![0.0; rows]);
        }

        let input = self.resolve_input(x, preprocess)?;
        let scores = self.raw_scores(&input)?;
        match self.case {
            None => Ok(scores),
            Some(case) => {
                let threshold = self.thetas[case];
                Ok(scores.into_iter().map(|s| s - threshold).collect())
            }
        }
    }

    /// Persist the fitted inner classifier (not the wrapper configuration)
    pub fn save(&self, name: &str) -> Result<()> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(BiasgenError::Precondition("constant model has nothing to save"))?;
        if !self.is_trained {
            return Err(BiasgenError::Precondition("classifier is not fitted"));
        }
        save_classifier(classifier, artifact_path(name), self.training_samples)
    }

    /// Restore the inner classifier in place
    ///
    /// Mutates this wrapper through the exclusive reference; the wrapper's
    /// own configuration (preprocessing, thresholds, tables) is untouched.
    pub fn load(&mut self, name: &str) -> Result<()> {
        let saved = load_classifier(artifact_path(name))?;
        self.training_samples = saved.metadata.training_samples;
        self.classifier = Some(saved.classifier);
        self.is_trained = true;
        info!(name, "model reloaded");
        Ok(())
    }
}

fn artifact_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}.apr"))
}

fn column_means(x: &[Vec<f64>]) -> Vec<f64> {
    let d = x.first().map_or(0, Vec::len);
    let mut means = vec![0.0; d];
    for row in x {
        for (m, v) in means.iter_mut().zip(row.iter()) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= x.len() as f64;
    }
    means
}

/// Population standard deviation per column
fn column_stds(x: &[Vec<f64>]) -> Vec<f64> {
    let means = column_means(x);
    let d = means.len();
    let mut vars = vec![0.0; d];
    for row in x {
        for (v, (xi, mi)) in vars.iter_mut().zip(row.iter().zip(means.iter())) {
            *v += (xi - mi) * (xi - mi);
        }
    }
    vars.iter()
        .map(|v| (v / x.len() as f64).sqrt())
        .collect()
}
