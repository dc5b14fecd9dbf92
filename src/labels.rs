use serde::Serialize;
use std::fmt;

/// Substrings that mark a raw model label as AI-generated.
pub const AI_KEYWORDS: [&str; 5] = ["artificial", "fake", "ai", "generated", "synthetic"];

/// The two-way taxonomy every raw label is folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Prediction {
    #[serde(rename = "AI Generated")]
    AiGenerated,
    #[serde(rename = "Real")]
    Real,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::AiGenerated => "AI Generated",
            Prediction::Real => "Real",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive keyword match; anything without an AI keyword is `Real`.
pub fn normalize(raw_label: &str) -> Prediction {
    let lowered = raw_label.to_lowercase();
    if AI_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        Prediction::AiGenerated
    } else {
        tracing::debug!(raw_label, "label matched no AI keyword, treating as real");
        Prediction::Real
    }
}
