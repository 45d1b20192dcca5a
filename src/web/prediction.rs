use crate::domain::models::{MlPrediction, PredictionKind};
use crate::domain::prediction::{simulate, PredictionResult, MODEL_VERSION};
use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_HISTORY_LIMIT: i64 = 10;

#[derive(Deserialize)]
struct PredictionRequest {
    user_id: Option<String>,
    prediction_type: Option<String>,
    #[serde(default)]
    input_features: serde_json::Value,
}

#[derive(Serialize)]
struct PredictionResponse {
    success: bool,
    prediction: PredictionResult,
    confidence: f64,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct LatestQuery {
    user_id: Option<String>,
    prediction_type: Option<String>,
}

#[derive(Serialize)]
struct LatestResponse {
    success: bool,
    prediction: MlPrediction,
}

#[derive(Deserialize)]
struct HistoryQuery {
    user_id: Option<String>,
    prediction_type: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct HistoryResponse {
    success: bool,
    predictions: Vec<MlPrediction>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/ml-prediction", get(latest).post(predict))
        .route("/ml-prediction/history", get(history))
        .with_state(state)
}

fn parse_kind(raw: &str) -> Result<PredictionKind, ApiError> {
    PredictionKind::try_from(raw).map_err(|_| ApiError::bad_request("invalid prediction type"))
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{name} is required")))
}

async fn predict(
    State(state): State<SharedState>,
    Json(payload): Json<PredictionRequest>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let kind = parse_kind(payload.prediction_type.as_deref().unwrap_or_default())?;
    let user_id = required(payload.user_id, "user_id")?;
    let features = if payload.input_features.is_null() {
        serde_json::json!({})
    } else {
        payload.input_features
    };

    let simulation = simulate(kind, &features, &mut rand::thread_rng());

    let now = Utc::now();
    let record = MlPrediction {
        id: Uuid::new_v4(),
        user_id,
        prediction_date: now,
        prediction_type: kind,
        input_features: features,
        prediction_result: serde_json::to_value(&simulation.result)
            .map_err(|e| ApiError::Internal(e.into()))?,
        confidence_score: simulation.confidence,
        model_version: MODEL_VERSION.to_string(),
        created_at: now,
    };
    state.analytics.save_prediction(&record).await?;
    tracing::debug!("Stored {} prediction for {}", kind.as_str(), record.user_id);

    Ok(Json(PredictionResponse {
        success: true,
        prediction: simulation.result,
        confidence: simulation.confidence,
        timestamp: now,
    }))
}

async fn latest(
    State(state): State<SharedState>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<LatestResponse>, ApiError> {
    let (Some(user_id), Some(kind)) = (query.user_id, query.prediction_type) else {
        return Err(ApiError::bad_request("user_id and prediction_type are required"));
    };
    let kind = parse_kind(&kind)?;
    let prediction = state
        .analytics
        .latest_prediction(&user_id, kind)
        .await?
        .ok_or_else(|| ApiError::not_found("no predictions found"))?;
    Ok(Json(LatestResponse {
        success: true,
        prediction,
    }))
}

async fn history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user_id = required(query.user_id, "user_id")?;
    let kind = query.prediction_type.as_deref().map(parse_kind).transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 100);
    let predictions = state.analytics.predictions_for(&user_id, kind, limit).await?;
    Ok(Json(HistoryResponse {
        success: true,
        predictions,
    }))
}

#[cfg(test)]
mod tests {
    use crate::domain::prediction::RECOMMENDATIONS;
    use crate::web::test_support::{make_request, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_mood_forecast_round_trip() {
        let app = TestApp::new();
        let (status, posted) = app
            .send(make_request(
                "POST",
                "/ml-prediction",
                Some(json!({
                    "user_id": "u1",
                    "prediction_type": "mood_forecast",
                    "input_features": { "mood_score": 5 }
                })),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posted["success"], true);
        let mood = posted["prediction"]["predicted_mood"].as_f64().unwrap();
        assert!((4.0..=6.0).contains(&mood));
        assert_eq!((mood * 10.0).round() / 10.0, mood);
        let confidence = posted["confidence"].as_f64().unwrap();
        assert!((0.75..=0.95).contains(&confidence));

        let (status, fetched) = app
            .send(make_request(
                "GET",
                "/ml-prediction?user_id=u1&prediction_type=mood_forecast",
                None,
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let record = &fetched["prediction"];
        assert_eq!(record["prediction_result"], posted["prediction"]);
        assert_eq!(record["confidence_score"], posted["confidence"]);
        assert_eq!(record["model_version"], "1.0.0");
        assert_eq!(record["input_features"], json!({ "mood_score": 5 }));
    }

    #[tokio::test]
    async fn test_unknown_kind_persists_nothing() {
        let app = TestApp::new();
        let (status, body) = app
            .send(make_request(
                "POST",
                "/ml-prediction",
                Some(json!({ "user_id": "u1", "prediction_type": "sentiment", "input_features": {} })),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid prediction type");
        assert_eq!(app.analytics.touches(), 0);
    }

    #[tokio::test]
    async fn test_risk_probability_matches_confidence() {
        let app = TestApp::new();
        let (status, body) = app
            .send(make_request(
                "POST",
                "/ml-prediction",
                Some(json!({ "user_id": "u2", "prediction_type": "risk_level", "input_features": {} })),
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["prediction"]["probability"], body["confidence"]);
        let level = body["prediction"]["risk_level"].as_str().unwrap();
        assert!(["low", "medium", "high"].contains(&level));
    }

    #[tokio::test]
    async fn test_intervention_is_prefix() {
        let app = TestApp::new();
        let (_, body) = app
            .send(make_request(
                "POST",
                "/ml-prediction",
                Some(json!({ "user_id": "u3", "prediction_type": "intervention_recommendation" })),
                None,
            ))
            .await;
        let recs: Vec<String> = serde_json::from_value(body["prediction"]["recommendations"].clone()).unwrap();
        assert!((2..=4).contains(&recs.len()));
        assert_eq!(recs, RECOMMENDATIONS[..recs.len()].to_vec());
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let app = TestApp::new();
        let (status, _) = app
            .send(make_request("GET", "/ml-prediction?user_id=u1", None, None))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(make_request(
                "GET",
                "/ml-prediction?user_id=u1&prediction_type=risk_level",
                None,
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no predictions found");
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let app = TestApp::new();
        for kind in ["risk_level", "mood_forecast", "risk_level"] {
            app.send(make_request(
                "POST",
                "/ml-prediction",
                Some(json!({ "user_id": "u9", "prediction_type": kind, "input_features": {} })),
                None,
            ))
            .await;
        }
        let (status, body) = app
            .send(make_request(
                "GET",
                "/ml-prediction/history?user_id=u9&prediction_type=risk_level",
                None,
                None,
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let predictions = body["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), 2);
        let dates: Vec<chrono::DateTime<chrono::Utc>> = predictions
            .iter()
            .map(|p| serde_json::from_value(p["prediction_date"].clone()).unwrap())
            .collect();
        assert!(dates[0] >= dates[1]);
    }
}
