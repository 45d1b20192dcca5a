//! Simulated scoring for the three prediction kinds.
//!
//! Every draw goes through the caller's `Rng` so handlers use the thread rng
//! while tests pin a seed. The `*_from_draw` helpers hold the arithmetic and
//! take the random values directly.

use crate::domain::models::{PredictionKind, RiskLevel};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MODEL_VERSION: &str = "1.0.0";

const DEFAULT_MOOD: f64 = 5.0;
const MOOD_CONFIDENCE_BASE: f64 = 0.75;
const MOOD_CONFIDENCE_SPREAD: f64 = 0.2;
const INTERVENTION_CONFIDENCE_BASE: f64 = 0.8;
const INTERVENTION_CONFIDENCE_SPREAD: f64 = 0.15;

pub const RECOMMENDATIONS: [&str; 5] = [
    "Incrementar frecuencia de sesiones terapéuticas",
    "Implementar técnicas de mindfulness",
    "Mejorar higiene del sueño",
    "Aumentar actividad física",
    "Fortalecer red de apoyo social",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoodTrend {
    Improving,
    Declining,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub probability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodForecast {
    pub predicted_mood: f64,
    pub trend: MoodTrend,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterventionPlan {
    pub recommendations: Vec<String>,
    pub priority_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PredictionResult {
    Risk(RiskAssessment),
    Mood(MoodForecast),
    Intervention(InterventionPlan),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub result: PredictionResult,
    pub confidence: f64,
}

pub fn simulate<R: Rng>(
    kind: PredictionKind,
    features: &serde_json::Value,
    rng: &mut R,
) -> Simulation {
    match kind {
        PredictionKind::RiskLevel => risk_from_draw(rng.gen::<f64>()),
        PredictionKind::MoodForecast => {
            let current = current_mood(features);
            let noise = rng.gen::<f64>() * 2.0 - 1.0;
            let spread = rng.gen::<f64>();
            mood_from_draw(current, noise, spread)
        }
        PredictionKind::InterventionRecommendation => {
            let count = rng.gen_range(2..=4);
            let priority = rng.gen_range(1..=3);
            let spread = rng.gen::<f64>();
            intervention_from_draw(count, priority, spread)
        }
    }
}

/// The draw is reported as both the probability and the confidence, which
/// keeps new records comparable with the ones already stored.
pub fn risk_from_draw(draw: f64) -> Simulation {
    let risk_level = if draw > 0.7 {
        RiskLevel::High
    } else if draw > 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    Simulation {
        result: PredictionResult::Risk(RiskAssessment {
            risk_level,
            probability: draw,
        }),
        confidence: draw,
    }
}

/// `noise` is in [-1, 1), `spread` in [0, 1).
pub fn mood_from_draw(current: f64, noise: f64, spread: f64) -> Simulation {
    let forecast = (current + noise).clamp(1.0, 10.0);
    // equal forecasts count as declining
    let trend = if forecast > current {
        MoodTrend::Improving
    } else {
        MoodTrend::Declining
    };
    Simulation {
        result: PredictionResult::Mood(MoodForecast {
            predicted_mood: (forecast * 10.0).round() / 10.0,
            trend,
        }),
        confidence: MOOD_CONFIDENCE_BASE + spread * MOOD_CONFIDENCE_SPREAD,
    }
}

pub fn intervention_from_draw(count: usize, priority: u8, spread: f64) -> Simulation {
    let count = count.clamp(2, 4);
    Simulation {
        result: PredictionResult::Intervention(InterventionPlan {
            recommendations: RECOMMENDATIONS[..count].iter().map(|s| s.to_string()).collect(),
            priority_level: priority.clamp(1, 3),
        }),
        confidence: INTERVENTION_CONFIDENCE_BASE + spread * INTERVENTION_CONFIDENCE_SPREAD,
    }
}

/// Missing, non-numeric or zero scores fall back to the neutral mood.
fn current_mood(features: &serde_json::Value) -> f64 {
    features
        .get("mood_score")
        .and_then(|v| v.as_f64())
        .filter(|v| *v != 0.0 && v.is_finite())
        .unwrap_or(DEFAULT_MOOD)
}
