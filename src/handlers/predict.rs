use actix_web::{web, HttpResponse};
use std::sync::Arc;
use tracing::info;

use crate::AppState;
use f1predict::assumptions::Assumptions;
use f1predict::error::{validate_drivers, validate_track, AppError};
use f1predict::models::{PredictRequest, PredictResponse, PredictionResult};

const DISCLAIMER: &str = "Predictions are probabilistic estimates based on historical patterns";

/// Predict win probabilities for one race
pub async fn predict_race(
    state: web::Data<Arc<AppState>>,
    req: web::Json<PredictRequest>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    validate_track(&req.race.track)?;
    validate_drivers(&req.race.drivers)?;

    let predictor = state.predictor.as_ref().ok_or_else(|| {
        AppError::ModelUnavailable(
            state
                .load_error
                .clone()
                .unwrap_or_else(|| "model not loaded".to_string()),
        )
    })?;

    let assumptions = req.assumptions.map(Assumptions::from_json).transpose()?;

    let predictions = predictor.predict_race(
        &req.race.drivers,
        &req.race.track,
        &req.race.qualifying_positions,
        assumptions.as_ref(),
    )?;
    info!(
        "Predicted {} drivers at {}",
        predictions.len(),
        req.race.track
    );

    let response = PredictResponse {
        predictions: predictions.into_iter().map(round_probability).collect(),
        message: DISCLAIMER.to_string(),
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Round the percentage to 2 decimals for display
fn round_probability(mut prediction: PredictionResult) -> PredictionResult {
    prediction.win_probability = (prediction.win_probability * 100.0).round() / 100.0;
    prediction
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState {
            predictor: None,
            load_error: Some("model_metadata.json not found".to_string()),
            tracks: Vec::new(),
            drivers: Vec::new(),
        })
    }

    #[actix_web::test]
    async fn test_round_probability() {
        let rounded = round_probability(PredictionResult {
            driver: "VER".to_string(),
            track: "Monaco".to_string(),
            qualifying_position: 1,
            win_probability: 12.34567,
        });
        assert!((rounded.win_probability - 12.35).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_predict_without_model_is_unavailable() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .route("/api/predict", web::post().to(predict_race)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/predict")
            .set_json(serde_json::json!({"track": "Monaco", "drivers": ["VER"]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn test_predict_rejects_empty_drivers() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .route("/api/predict", web::post().to(predict_race)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/predict")
            .set_json(serde_json::json!({"track": "Monaco", "drivers": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
