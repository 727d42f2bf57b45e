use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

use crate::AppState;

/// Tracks a prediction can be requested for
pub async fn list_tracks(state: web::Data<Arc<AppState>>) -> impl Responder {
    HttpResponse::Ok().json(&state.tracks)
}

/// Known driver abbreviations
pub async fn list_drivers(state: web::Data<Arc<AppState>>) -> impl Responder {
    HttpResponse::Ok().json(&state.drivers)
}
