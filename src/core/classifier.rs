use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a classifier artifact.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model has {names} feature names but {weights} weights")]
    ShapeMismatch { names: usize, weights: usize },
}

/// Opaque scoring capability: an ordered numeric row in, a calibrated
/// probability of the "match" class out.
///
/// The engine never looks inside; any model that can honor the ordered
/// `feature_names` contract can be substituted. Implementations must be
/// safe for concurrent read-only use.
pub trait Classifier: Send + Sync {
    /// The fixed feature order this model was trained against.
    fn feature_names(&self) -> &[String];

    /// Probability of the positive class for one feature row.
    fn predict_proba(&self, row: &[f64]) -> f64;
}

/// Calibrated linear model loaded from the JSON artifact the offline
/// training pipeline exports: `{ feature_names, weights, intercept }`.
///
/// Training, grid search and calibration happen offline; this side of the
/// boundary only evaluates the logistic function over the exported weights.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    feature_names: Vec<String>,
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(
        feature_names: Vec<String>,
        weights: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, ModelError> {
        if feature_names.len() != weights.len() {
            return Err(ModelError::ShapeMismatch {
                names: feature_names.len(),
                weights: weights.len(),
            });
        }
        Ok(Self {
            feature_names,
            weights,
            intercept,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path)?;
        let model: LinearModel = serde_json::from_str(&raw)?;
        if model.feature_names.len() != model.weights.len() {
            return Err(ModelError::ShapeMismatch {
                names: model.feature_names.len(),
                weights: model.weights.len(),
            });
        }
        Ok(model)
    }
}

impl Classifier for LinearModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        let logit: f64 = self
            .weights
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        let probability = 1.0 / (1.0 + (-logit).exp());
        probability.clamp(0.0, 1.0)
    }
}
