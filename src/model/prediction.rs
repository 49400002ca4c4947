//! Prediction result

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Number of digit classes
pub const NUM_CLASSES: usize = 10;

/// Outcome of classifying one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted digit (0-9)
    pub prediction: u8,
    /// Probability of the predicted digit
    pub confidence: f32,
    /// Probability for every digit, indexed by class
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Arg-max over a 10-class probability vector.
    ///
    /// Ties resolve to the lowest class index. NaN entries are rejected.
    pub fn from_probabilities(probabilities: Vec<f32>) -> Result<Self> {
        if probabilities.len() != NUM_CLASSES {
            return Err(anyhow!(
                "model returned {} outputs, expected {}",
                probabilities.len(),
                NUM_CLASSES
            ));
        }
        if probabilities.iter().any(|p| p.is_nan()) {
            return Err(anyhow!("model returned NaN probabilities"));
        }

        let mut best = 0;
        for (i, &p) in probabilities.iter().enumerate().skip(1) {
            if p > probabilities[best] {
                best = i;
            }
        }

        Ok(Self {
            prediction: best as u8,
            confidence: probabilities[best],
            probabilities,
        })
    }
}

/// Softmax over raw scores, numerically stabilised by the max score
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// True if the values already look like a probability distribution
pub fn is_distribution(values: &[f32]) -> bool {
    let sum: f32 = values.iter().sum();
    values.iter().all(|v| (0.0..=1.0).contains(v)) && (sum - 1.0).abs() < 1e-3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        let probs = vec![0.05, 0.05, 0.6, 0.05, 0.05, 0.05, 0.05, 0.04, 0.03, 0.03];
        let p = Prediction::from_probabilities(probs.clone()).unwrap();
        assert_eq!(p.prediction, 2);
        assert_eq!(p.confidence, 0.6);
        assert_eq!(p.probabilities, probs);
    }

    #[test]
    fn test_argmax_tie_takes_first() {
        let p = Prediction::from_probabilities(vec![0.1; NUM_CLASSES]).unwrap();
        assert_eq!(p.prediction, 0);
    }

    #[test]
    fn test_wrong_length() {
        assert!(Prediction::from_probabilities(vec![0.5, 0.5]).is_err());
    }

    #[test]
    fn test_nan_rejected() {
        let mut probs = vec![0.1; NUM_CLASSES];
        probs[4] = f32::NAN;
        assert!(Prediction::from_probabilities(probs).is_err());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let out = softmax(&[1.0, 2.0, 3.0, -4.0, 0.0, 10.0, 1.0, 1.0, 1.0, 1.0]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(is_distribution(&out));
        assert!(!is_distribution(&[2.0, -1.0]));
    }
}
