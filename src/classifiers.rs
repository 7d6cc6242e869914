//! Baseline classifier strategies
//!
//! Closed set of two-class classifiers behind one tagged enum, each exposing
//! fit/predict plus either class probabilities (generative models) or a
//! signed margin (linear models). Learned parameters are plain serde data so
//! a fitted classifier can be persisted and restored.
//!
//! Labels follow the dataset convention: signal = 1, background = 0.

use serde::{Deserialize, Serialize};

use crate::error::{BiasgenError, Result};

/// Ridge regularization strength (matches the common library default)
const RIDGE_ALPHA: f64 = 1.0;
/// Variance/covariance floor keeping degenerate fits invertible
const SMOOTHING: f64 = 1e-9;

/// Score surface a classifier exposes for decision calibration
#[derive(Debug, Clone, PartialEq)]
pub enum Scores {
    /// Positive-class probabilities in `[0, 1]`
    Probability(Vec<f64>),
    /// Signed margins, positive meaning class 1
    Margin(Vec<f64>),
}

/// Closed tagged set of classifier strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Classifier {
    GaussianNb(GaussianNb),
    LinearDiscriminant(LinearDiscriminant),
    Ridge(Ridge),
    GaussianDiscriminant(GaussianDiscriminant),
}

impl Classifier {
    pub fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<()> {
        match self {
            Classifier::GaussianNb(c) => c.fit(x, y),
            Classifier::LinearDiscriminant(c) => c.fit(x, y),
            Classifier::Ridge(c) => c.fit(x, y),
            Classifier::GaussianDiscriminant(c) => c.fit(x, y),
        }
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>> {
        match self {
            Classifier::GaussianNb(c) => c.predict(x),
            Classifier::LinearDiscriminant(c) => c.predict(x),
            Classifier::Ridge(c) => c.predict(x),
            Classifier::GaussianDiscriminant(c) => c.predict(x),
        }
    }

    /// Native scoring surface: probabilities for NB/GDA, margins for LDA/Ridge
    pub fn scores(&self, x: &[Vec<f64>]) -> Result<Scores> {
        match self {
            Classifier::GaussianNb(c) => Ok(Scores::Probability(c.predict_proba(x)?)),
            Classifier::GaussianDiscriminant(c) => Ok(Scores::Probability(c.predict_proba(x)?)),
            Classifier::LinearDiscriminant(c) => Ok(Scores::Margin(c.decision_function(x)?)),
            Classifier::Ridge(c) => Ok(Scores::Margin(c.decision_function(x)?)),
        }
    }
}

/// Split rows by class, failing when either class is absent
fn split_classes<'a>(x: &'a [Vec<f64>], y: &[u8]) -> Result<(Vec<&'a Vec<f64>>, Vec<&'a Vec<f64>>)> {
    if x.len() != y.len() {
        return Err(BiasgenError::InvalidData(format!(
            "{} rows but {} labels",
            x.len(),
            y.len()
        )));
    }
    let mut background = Vec::new();
    let mut signal = Vec::new();
    for (row, &label) in x.iter().zip(y.iter()) {
        if label == 0 {
            background.push(row);
        } else {
            signal.push(row);
        }
    }
    if background.is_empty() || signal.is_empty() {
        return Err(BiasgenError::InvalidData(
            "training data must contain both classes".to_string(),
        ));
    }
    Ok((background, signal))
}

fn mean_rows(rows: &[&Vec<f64>]) -> Vec<f64> {
    let dimension = rows[0].len();
    let mut mean = vec![0.0; dimension];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row.iter()) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= rows.len() as f64;
    }
    mean
}

/// Scatter matrix `sum (x - mean)(x - mean)^T` for one class
fn scatter(rows: &[&Vec<f64>], mean: &[f64]) -> Vec<Vec<f64>> {
    let d = mean.len();
    let mut s = vec![vec![0.0; d]; d];
    for row in rows {
        for i in 0..d {
            let di = row[i] - mean[i];
            for j in 0..d {
                s[i][j] += di * (row[j] - mean[j]);
            }
        }
    }
    s
}

/// Gauss-Jordan inversion with partial pivoting; also returns `ln |det|`
fn invert_with_log_det(matrix: &[Vec<f64>]) -> Result<(Vec<Vec<f64>>, f64)> {
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix.to_vec();
    let mut inv = vec![vec![0.0; n]; n];
    for (i, row) in inv.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    let mut log_det = 0.0;
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&p, &q| {
                a[p][col]
                    .abs()
                    .partial_cmp(&a[q][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot_row][col].abs() < 1e-12 {
            return Err(BiasgenError::InvalidData(
                "singular covariance matrix".to_string(),
            ));
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        log_det += pivot.abs().ln();
        for j in 0..n {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Ok((inv, log_det))
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

/// Two-way softmax in log space
fn posterior_from_log_joint(log_background: f64, log_signal: f64) -> f64 {
    let max = log_background.max(log_signal);
    let pb = (log_background - max).exp();
    let ps = (log_signal - max).exp();
    ps / (pb + ps)
}

/// Gaussian Naive Bayes: per-class priors with per-feature mean and variance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GaussianNb {
    log_priors: Vec<f64>,
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
}

impl GaussianNb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<()> {
        let (background, signal) = split_classes(x, y)?;
        let total = x.len() as f64;

        let mut means = Vec::with_capacity(2);
        let mut variances = Vec::with_capacity(2);
        let mut log_priors = Vec::with_capacity(2);
        for rows in [&background, &signal] {
            let mean = mean_rows(rows);
            let d = mean.len();
            let mut variance = vec![0.0; d];
            for row in rows.iter() {
                for (v, (xi, mi)) in variance.iter_mut().zip(row.iter().zip(mean.iter())) {
                    *v += (xi - mi) * (xi - mi);
                }
            }
            for v in &mut variance {
                *v = *v / rows.len() as f64 + SMOOTHING;
            }
            log_priors.push((rows.len() as f64 / total).ln());
            means.push(mean);
            variances.push(variance);
        }

        self.log_priors = log_priors;
        self.means = means;
        self.variances = variances;
        Ok(())
    }

    fn log_joint(&self, row: &[f64], class: usize) -> f64 {
        let mut score = self.log_priors[class];
        for ((xi, mi), vi) in row
            .iter()
            .zip(self.means[class].iter())
            .zip(self.variances[class].iter())
        {
            score += -0.5 * (2.0 * std::f64::consts::PI * vi).ln()
                - (xi - mi) * (xi - mi) / (2.0 * vi);
        }
        score
    }

    fn check_fitted(&self) -> Result<()> {
        if self.means.is_empty() {
            return Err(BiasgenError::Precondition("classifier is not fitted"));
        }
        Ok(())
    }

    /// Positive-class posterior per row
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.check_fitted()?;
        Ok(x.iter()
            .map(|row| posterior_from_log_joint(self.log_joint(row, 0), self.log_joint(row, 1)))
            .collect())
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }
}

/// Fisher linear discriminant with pooled covariance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearDiscriminant {
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearDiscriminant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<()> {
        let (background, signal) = split_classes(x, y)?;
        let mean_b = mean_rows(&background);
        let mean_s = mean_rows(&signal);
        let d = mean_b.len();

        let mut pooled = scatter(&background, &mean_b);
        let signal_scatter = scatter(&signal, &mean_s);
        let denom = (x.len() - 2).max(1) as f64;
        for i in 0..d {
            for j in 0..d {
                pooled[i][j] = (pooled[i][j] + signal_scatter[i][j]) / denom;
            }
            pooled[i][i] += SMOOTHING;
        }

        let (precision, _) = invert_with_log_det(&pooled)?;
        let diff: Vec<f64> = mean_s.iter().zip(mean_b.iter()).map(|(s, b)| s - b).collect();
        let weights = mat_vec(&precision, &diff);

        let midpoint: Vec<f64> = mean_s
            .iter()
            .zip(mean_b.iter())
            .map(|(s, b)| (s + b) / 2.0)
            .collect();
        let log_prior_ratio =
            (signal.len() as f64 / x.len() as f64).ln() - (background.len() as f64 / x.len() as f64).ln();
        self.intercept = -dot(&weights, &midpoint) + log_prior_ratio;
        self.weights = weights;
        Ok(())
    }

    /// Signed margin `w . x + b`, positive meaning signal
    pub fn decision_function(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.weights.is_empty() {
            return Err(BiasgenError::Precondition("classifier is not fitted"));
        }
        Ok(x.iter().map(|row| dot(&self.weights, row) + self.intercept).collect())
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|score| u8::from(score > 0.0))
            .collect())
    }
}

/// Ridge regression on +-1 targets used as a classifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ridge {
    weights: Vec<f64>,
    intercept: f64,
}

impl Ridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<()> {
        split_classes(x, y)?;
        let d = x[0].len();
        let n = x.len() as f64;

        let targets: Vec<f64> = y.iter().map(|&label| if label == 1 { 1.0 } else { -1.0 }).collect();
        let x_mean = {
            let rows: Vec<&Vec<f64>> = x.iter().collect();
            mean_rows(&rows)
        };
        let y_mean = targets.iter().sum::<f64>() / n;

        // Normal equations on centered data: (Xc^T Xc + alpha I) w = Xc^T yc
        let mut gram = vec![vec![0.0; d]; d];
        let mut xty = vec![0.0; d];
        for (row, &t) in x.iter().zip(targets.iter()) {
            for i in 0..d {
                let ci = row[i] - x_mean[i];
                xty[i] += ci * (t - y_mean);
                for j in 0..d {
                    gram[i][j] += ci * (row[j] - x_mean[j]);
                }
            }
        }
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += RIDGE_ALPHA;
        }

        let (inverse, _) = invert_with_log_det(&gram)?;
        let weights = mat_vec(&inverse, &xty);
        self.intercept = y_mean - dot(&weights, &x_mean);
        self.weights = weights;
        Ok(())
    }

    pub fn decision_function(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.weights.is_empty() {
            return Err(BiasgenError::Precondition("classifier is not fitted"));
        }
        Ok(x.iter().map(|row| dot(&self.weights, row) + self.intercept).collect())
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>> {
        Ok(self
            .decision_function(x)?
            .into_iter()
            .map(|score| u8::from(score > 0.0))
            .collect())
    }
}

/// Generative Gaussian discriminant with per-class full covariance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GaussianDiscriminant {
    log_priors: Vec<f64>,
    means: Vec<Vec<f64>>,
    precisions: Vec<Vec<Vec<f64>>>,
    log_dets: Vec<f64>,
}

impl GaussianDiscriminant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<()> {
        let (background, signal) = split_classes(x, y)?;
        let total = x.len() as f64;

        let mut log_priors = Vec::with_capacity(2);
        let mut means = Vec::with_capacity(2);
        let mut precisions = Vec::with_capacity(2);
        let mut log_dets = Vec::with_capacity(2);
        for rows in [&background, &signal] {
            let mean = mean_rows(rows);
            let d = mean.len();
            let mut covariance = scatter(rows, &mean);
            for i in 0..d {
                for j in 0..d {
                    covariance[i][j] /= rows.len() as f64;
                }
                covariance[i][i] += SMOOTHING;
            }
            let (precision, log_det) = invert_with_log_det(&covariance)?;
            log_priors.push((rows.len() as f64 / total).ln());
            means.push(mean);
            precisions.push(precision);
            log_dets.push(log_det);
        }

        self.log_priors = log_priors;
        self.means = means;
        self.precisions = precisions;
        self.log_dets = log_dets;
        Ok(())
    }

    fn log_joint(&self, row: &[f64], class: usize) -> f64 {
        let diff: Vec<f64> = row
            .iter()
            .zip(self.means[class].iter())
            .map(|(x, m)| x - m)
            .collect();
        let mahalanobis = dot(&diff, &mat_vec(&self.precisions[class], &diff));
        self.log_priors[class] - 0.5 * self.log_dets[class] - 0.5 * mahalanobis
    }

    fn check_fitted(&self) -> Result<()> {
        if self.means.is_empty() {
            return Err(BiasgenError::Precondition("classifier is not fitted"));
        }
        Ok(())
    }

    /// Positive-class posterior per row
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.check_fitted()?;
        Ok(x.iter()
            .map(|row| posterior_from_log_joint(self.log_joint(row, 0), self.log_joint(row, 1)))
            .collect())
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::Rng;
    use rand::SeedableRng;

    /// Two well-separated Gaussian blobs around (0,0) and (5,5)
    fn separable_data(n_per_class: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..n_per_class {
            x.push(vec![rng.gen::<f64>() - 0.5, rng.gen::<f64>() - 0.5]);
            y.push(0);
        }
        for _ in 0..n_per_class {
            x.push(vec![5.0 + rng.gen::<f64>(), 5.0 + rng.gen::<f64>()]);
            y.push(1);
        }
        (x, y)
    }

    fn accuracy(predicted: &[u8], truth: &[u8]) -> f64 {
        let hits = predicted
            .iter()
            .zip(truth.iter())
            .filter(|(a, b)| a == b)
            .count();
        hits as f64 / truth.len() as f64
    }

    #[test]
    fn test_gaussian_nb_separates_blobs() {
        let (x, y) = separable_data(200, 1);
        let mut clf = GaussianNb::new();
        clf.fit(&x, &y).unwrap();
        assert!(accuracy(&clf.predict(&x).unwrap(), &y) > 0.99);
    }

    #[test]
    fn test_gaussian_nb_proba_in_unit_interval() {
        let (x, y) = separable_data(100, 2);
        let mut clf = GaussianNb::new();
        clf.fit(&x, &y).unwrap();
        for p in clf.predict_proba(&x).unwrap() {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_lda_separates_blobs() {
        let (x, y) = separable_data(200, 3);
        let mut clf = LinearDiscriminant::new();
        clf.fit(&x, &y).unwrap();
        assert!(accuracy(&clf.predict(&x).unwrap(), &y) > 0.99);
    }

    #[test]
    fn test_lda_margin_sign_matches_predict() {
        let (x, y) = separable_data(50, 4);
        let mut clf = LinearDiscriminant::new();
        clf.fit(&x, &y).unwrap();
        let margins = clf.decision_function(&x).unwrap();
        let predictions = clf.predict(&x).unwrap();
        for (margin, prediction) in margins.iter().zip(predictions.iter()) {
            assert_eq!(u8::from(*margin > 0.0), *prediction);
        }
    }

    #[test]
    fn test_ridge_separates_blobs() {
        let (x, y) = separable_data(200, 5);
        let mut clf = Ridge::new();
        clf.fit(&x, &y).unwrap();
        assert!(accuracy(&clf.predict(&x).unwrap(), &y) > 0.99);
    }

    #[test]
    fn test_gda_separates_blobs() {
        let (x, y) = separable_data(200, 6);
        let mut clf = GaussianDiscriminant::new();
        clf.fit(&x, &y).unwrap();
        assert!(accuracy(&clf.predict(&x).unwrap(), &y) > 0.99);
    }

    #[test]
    fn test_gda_handles_unequal_covariances() {
        // class 1 spread out 10x wider than class 0
        let mut rng = StdRng::seed_from_u64(7);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..300 {
            x.push(vec![rng.gen::<f64>() * 0.1, rng.gen::<f64>() * 0.1]);
            y.push(0);
            x.push(vec![rng.gen::<f64>() * 4.0 - 2.0, rng.gen::<f64>() * 4.0 - 2.0]);
            y.push(1);
        }
        let mut clf = GaussianDiscriminant::new();
        clf.fit(&x, &y).unwrap();
        assert!(accuracy(&clf.predict(&x).unwrap(), &y) > 0.8);
    }

    #[test]
    fn test_fit_rejects_single_class() {
        let x = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let y = vec![1, 1];
        assert!(GaussianNb::new().fit(&x, &y).is_err());
        assert!(LinearDiscriminant::new().fit(&x, &y).is_err());
    }

    #[test]
    fn test_unfitted_classifier_errors() {
        let clf = GaussianNb::new();
        let err = clf.predict(&[vec![0.0, 0.0]]).unwrap_err();
        assert!(matches!(err, BiasgenError::Precondition(_)));
    }

    #[test]
    fn test_classifier_enum_dispatch() {
        let (x, y) = separable_data(100, 8);
        let mut clf = Classifier::Ridge(Ridge::new());
        clf.fit(&x, &y).unwrap();
        assert!(accuracy(&clf.predict(&x).unwrap(), &y) > 0.99);
        assert!(matches!(clf.scores(&x).unwrap(), Scores::Margin(_)));

        let mut nb = Classifier::GaussianNb(GaussianNb::new());
        nb.fit(&x, &y).unwrap();
        assert!(matches!(nb.scores(&x).unwrap(), Scores::Probability(_)));
    }

    #[test]
    fn test_fitted_classifier_serde_round_trip() {
        let (x, y) = separable_data(100, 9);
        let mut clf = Classifier::GaussianDiscriminant(GaussianDiscriminant::new());
        clf.fit(&x, &y).unwrap();
        let json = serde_json::to_string(&clf).unwrap();
        let restored: Classifier = serde_json::from_str(&json).unwrap();
        assert_eq!(clf.predict(&x).unwrap(), restored.predict(&x).unwrap());
    }

    #[test]
    fn test_invert_identity() {
        let (inverse, log_det) =
            invert_with_log_det(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(inverse, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(log_det.abs() < 1e-12);
    }

    #[test]
    fn test_invert_known_matrix() {
        let (inverse, log_det) =
            invert_with_log_det(&[vec![4.0, 7.0], vec![2.0, 6.0]]).unwrap();
        // det = 10, inverse = [[0.6, -0.7], [-0.2, 0.4]]
        assert!((inverse[0][0] - 0.6).abs() < 1e-12);
        assert!((inverse[0][1] + 0.7).abs() < 1e-12);
        assert!((inverse[1][0] + 0.2).abs() < 1e-12);
        assert!((inverse[1][1] - 0.4).abs() < 1e-12);
        assert!((log_det - 10f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_invert_rejects_singular() {
        let err = invert_with_log_det(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap_err();
        assert!(matches!(err, BiasgenError::InvalidData(_)));
    }
}
