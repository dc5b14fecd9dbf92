use serde::{Deserialize, Serialize};

use crate::explanation;
use crate::labels::{self, Prediction};

/// One raw `(label, score)` pair as emitted by the classifier.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: String,
    pub score: f32,
}

impl ClassificationResult {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionResponse {
    pub prediction: Prediction,
    /// Percentage, two decimals.
    pub confidence: f64,
    pub explanation: String,
}

impl PredictionResponse {
    /// Builds the response from the highest-scoring raw result.
    ///
    /// Returns `None` when `results` is empty.
    pub fn from_results(results: &[ClassificationResult]) -> Option<Self> {
        let top = top_result(results)?;
        let prediction = labels::normalize(&top.label);
        let confidence = round_to(f64::from(top.score), 4);

        Some(Self {
            prediction,
            confidence: round_to(confidence * 100.0, 2),
            explanation: explanation::compose(prediction, confidence),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthReport {
    pub status: String,
    pub model_loaded: bool,
    pub model_name: String,
    pub device: String,
    pub template_folder: String,
    pub template_exists: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}

pub fn top_result(results: &[ClassificationResult]) -> Option<&ClassificationResult> {
    results.iter().max_by(|a, b| a.score.total_cmp(&b.score))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_highest_score() {
        let results = vec![
            ClassificationResult::new("human", 0.077),
            ClassificationResult::new("artificial", 0.923),
        ];
        assert_eq!(top_result(&results).unwrap().label, "artificial");
        assert!(top_result(&[]).is_none());
    }

    #[test]
    fn response_from_artificial_top_label() {
        let results = vec![
            ClassificationResult::new("artificial", 0.923),
            ClassificationResult::new("human", 0.077),
        ];
        let response = PredictionResponse::from_results(&results).unwrap();
        assert_eq!(response.prediction, Prediction::AiGenerated);
        assert_eq!(response.confidence, 92.3);
        assert_eq!(
            response.explanation,
            explanation::compose(Prediction::AiGenerated, 0.923)
        );
    }

    #[test]
    fn confidence_is_rounded_to_two_decimals() {
        let results = vec![ClassificationResult::new("human", 0.876_54)];
        let response = PredictionResponse::from_results(&results).unwrap();
        assert_eq!(response.prediction, Prediction::Real);
        assert_eq!(response.confidence, 87.65);
    }

    #[test]
    fn serializes_with_display_label() {
        let response =
            PredictionResponse::from_results(&[ClassificationResult::new("real", 0.5)]).unwrap();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["prediction"], "Real");
        assert_eq!(json["confidence"], 50.0);
        assert!(json["explanation"].as_str().unwrap().contains("(50.0%)"));
    }

    #[test]
    fn from_results_is_none_for_empty_output() {
        assert!(PredictionResponse::from_results(&[]).is_none());
    }
}
