mod annotate;
mod config;
mod detect;
mod report;
mod routes;

use std::path::Path;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};

use crate::annotate::Annotator;
use crate::config::AppConfig;
use crate::detect::model::Detector;
use crate::routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let config = AppConfig::from_env();

    let detector = if Path::new(&config.model_path).exists() {
        match Detector::load(&config) {
            Ok(detector) => {
                log::info!("Model loaded from {}", config.model_path);
                Some(detector)
            }
            Err(e) => {
                log::error!("Failed to load model from {}: {e}", config.model_path);
                return Err(std::io::Error::other(format!("Model loading failed: {e}")));
            }
        }
    } else {
        log::warn!(
            "Model weights not found at '{}'. Copy the TorchScript export there and restart; \
             serving without a detector until then.",
            config.model_path
        );
        None
    };

    let annotator = Annotator::new().map_err(std::io::Error::other)?;

    std::fs::create_dir_all(&config.static_dir)?;

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    let detector = web::Data::new(detector);
    let annotator = web::Data::new(annotator);
    let static_dir = config.static_dir.clone();
    let app_config = web::Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(detector.clone())
            .app_data(annotator.clone())
            .app_data(app_config.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
