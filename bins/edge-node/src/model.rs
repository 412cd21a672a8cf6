use serde::Deserialize;

use crate::error::{EdgeError, ModelError};

/// Pre-trained linear regression: `intercept + Σ weights[i] * x[i]`.
///
/// Stored as JSON: `{"features": [...], "intercept": f, "weights": [...]}`.
/// `features` fixes the order in which request fields are read.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    pub features: Vec<String>,
    pub intercept: f64,
    pub weights: Vec<f64>,
}

impl LinearModel {
    pub fn load(path: &str) -> Result<Self, EdgeError> {
        std::fs::read_to_string(path)
            .map_err(ModelError::Read)
            .and_then(|content| Self::from_json(&content))
            .map_err(|source| EdgeError::Model { path: path.to_string(), source })
    }

    pub fn from_json(content: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(content)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.features.is_empty() {
            return Err(ModelError::NoFeatures);
        }
        if self.weights.len() != self.features.len() {
            return Err(ModelError::ShapeMismatch {
                weights: self.weights.len(),
                features: self.features.len(),
            });
        }
        if !self.intercept.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(ModelError::NonFinite);
        }
        Ok(())
    }

    /// `x` must be in `features` order and of the same length.
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(x)
            .fold(self.intercept, |acc, (w, v)| acc + w * v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_the_path() {
        let err = LinearModel::load("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, EdgeError::Model { source: ModelError::Read(_), .. }));
        assert!(err.to_string().contains("/nonexistent/model.json"));
    }

    #[test]
    fn predicts_dot_product_plus_intercept() {
        let m = LinearModel::from_json(r#"{"features": ["a", "b"], "intercept": 1.5, "weights": [2.0, -1.0]}"#)
            .unwrap();
        assert_eq!(m.predict(&[3.0, 4.0]), 1.5 + 6.0 - 4.0);
    }

    #[test]
    fn rejects_shape_mismatch() {
        let err = LinearModel::from_json(r#"{"features": ["a", "b"], "intercept": 0, "weights": [1.0]}"#)
            .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { weights: 1, features: 2 }), "{err}");
        assert_eq!(err.to_string(), "1 weights for 2 features");

        assert!(matches!(
            LinearModel::from_json(r#"{"features": [], "intercept": 0, "weights": []}"#),
            Err(ModelError::NoFeatures)
        ));
        assert!(matches!(LinearModel::from_json("not json"), Err(ModelError::Json(_))));
    }
}
