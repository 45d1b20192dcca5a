use rand::Rng;
use serde::{Deserialize, Serialize};

/// Text analysis attached to a therapy session. Topics and indicators are a
/// fixed stand-in until a real text model is wired in; only the sentiment
/// varies between calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextAnalysis {
    pub sentiment_score: f64,
    pub key_topics: Vec<String>,
    pub emotional_indicators: Vec<String>,
    pub progress_indicators: Vec<String>,
    pub risk_factors: Vec<String>,
    pub word_count: usize,
}

pub fn analyze_text<R: Rng>(text: &str, rng: &mut R) -> TextAnalysis {
    TextAnalysis {
        sentiment_score: rng.gen::<f64>() * 2.0 - 1.0,
        key_topics: owned(&["ansiedad", "trabajo", "relaciones"]),
        emotional_indicators: owned(&["estrés", "preocupación"]),
        progress_indicators: owned(&["mejora en sueño", "mayor autoestima"]),
        risk_factors: Vec::new(),
        word_count: text.split_whitespace().count(),
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
