use actix_web::{web, HttpResponse, Responder};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;
use f1predict::models::HealthResponse;

/// API index
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "message": "F1 Race Winner Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "predict": "/api/predict",
            "tracks": "/api/tracks",
            "drivers": "/api/drivers"
        }
    }))
}

/// Health check endpoint
pub async fn health_check(state: web::Data<Arc<AppState>>) -> impl Responder {
    let model_name = state.predictor.as_ref().map(|p| p.model_name().to_string());
    let response = HealthResponse {
        status: if model_name.is_some() { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: model_name.is_some(),
        model_name,
    };

    HttpResponse::Ok().json(response)
}
