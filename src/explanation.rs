use crate::labels::Prediction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    /// confidence >= 0.90
    High,
    /// 0.70 <= confidence < 0.90
    Moderate,
    /// confidence < 0.70
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.90 {
            ConfidenceBand::High
        } else if confidence >= 0.70 {
            ConfidenceBand::Moderate
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Picks the canned explanation for a prediction at the given confidence
/// (a fraction in `[0, 1]`). The percentage is interpolated with one decimal.
pub fn compose(prediction: Prediction, confidence: f64) -> String {
    let pct = format!("{:.1}", confidence * 100.0);

    match (prediction, ConfidenceBand::from_confidence(confidence)) {
        (Prediction::AiGenerated, ConfidenceBand::High) => format!(
            "The model is highly confident ({pct}%) this image was created by an AI system. \
             Telltale signs include hyper-smooth textures, unnatural lighting gradients, and \
             structural inconsistencies typical of generative models."
        ),
        (Prediction::AiGenerated, ConfidenceBand::Moderate) => format!(
            "The model suspects ({pct}%) this image is AI-generated. Several subtle artifacts \
             such as irregular edges or blended features are characteristic of diffusion or \
             GAN-based synthesis."
        ),
        (Prediction::AiGenerated, ConfidenceBand::Low) => format!(
            "The model leans toward AI-generated ({pct}%), but with moderate uncertainty. The \
             image has some synthetic-looking qualities, though it shares traits with real \
             photography too."
        ),
        (Prediction::Real, ConfidenceBand::High) => format!(
            "The model is highly confident ({pct}%) this is a real photograph. Natural noise \
             patterns, authentic lighting, and organic imperfections are consistent with a \
             camera-captured image."
        ),
        (Prediction::Real, ConfidenceBand::Moderate) => format!(
            "The model believes ({pct}%) this is a real image. It exhibits mostly authentic \
             photographic characteristics, with only minor ambiguities."
        ),
        (Prediction::Real, ConfidenceBand::Low) => format!(
            "The model leans toward real ({pct}%), but is not highly certain. This image sits \
             near the boundary between AI-generated and real photography."
        ),
    }
}
