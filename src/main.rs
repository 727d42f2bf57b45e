use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod handlers;

use f1predict::config::AppConfig;
use f1predict::data::catalog::{known_drivers, known_tracks};
use f1predict::data::{HistoricalData, HistoryIndex};
use f1predict::predictor::RacePredictor;
use handlers::{catalog, health, predict};

/// Application state shared across handlers
pub struct AppState {
    pub predictor: Option<RacePredictor>,
    /// Why the predictor could not be built
    pub load_error: Option<String>,
    pub tracks: Vec<String>,
    pub drivers: Vec<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")?;

    let config = AppConfig::load().context("Failed to load configuration")?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    info!("Loading model from {:?}", config.paths.models);

    let loaded = RacePredictor::load(&config.paths.models, &config.paths.data);
    let (predictor, load_error) = match loaded {
        Ok(p) => {
            info!("Model {} loaded successfully", p.model_name());
            (Some(p), None)
        }
        Err(e) => {
            warn!("Failed to load model: {}. Predictions unavailable until trained.", e);
            (None, Some(e.to_string()))
        }
    };

    let (history_tracks, history_drivers) = match &predictor {
        Some(p) => (p.history().tracks(), p.history().drivers()),
        None => {
            let records = match HistoricalData::load_or_empty(&config.paths.data) {
                Ok(data) => data.into_records(),
                Err(e) => {
                    warn!("Failed to read historical data: {}", e);
                    Vec::new()
                }
            };
            let history = HistoryIndex::new(records);
            (history.tracks(), history.drivers())
        }
    };

    let app_state = Arc::new(AppState {
        predictor,
        load_error,
        tracks: known_tracks(&history_tracks),
        drivers: known_drivers(&history_drivers),
    });

    info!("Starting F1 prediction API server at http://{}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .route("/", web::get().to(health::index))
            .route("/health", web::get().to(health::health_check))
            .route("/api/predict", web::post().to(predict::predict_race))
            .route("/api/tracks", web::get().to(catalog::list_tracks))
            .route("/api/drivers", web::get().to(catalog::list_drivers))
    })
    .bind(&addr)?
    .run()
    .await?;

    Ok(())
}
