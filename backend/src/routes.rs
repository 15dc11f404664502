use std::io::Write;
use std::time::Instant;

use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{Error, HttpResponse, web};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde::Serialize;
use shared::{FullResponse, HealthResponse};
use uuid::Uuid;

use crate::annotate::{Annotator, encode_jpeg, to_data_uri};
use crate::config::AppConfig;
use crate::detect::model::Detector;
use crate::report::{assign_disc_levels, build_report};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

const ALLOWED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/jpg"];

pub fn configure_routes(cfg: &mut web::ServiceConfig, static_dir: String) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/predict/full").route(web::post().to(predict_full)))
        .service(Files::new("/static", static_dir));
}

async fn health(detector: web::Data<Option<Detector>>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".into(),
        model_loaded: detector.is_some(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn predict_full(
    detector: web::Data<Option<Detector>>,
    annotator: web::Data<Annotator>,
    config: web::Data<AppConfig>,
    mut payload: Multipart,
) -> Result<HttpResponse, Error> {
    let mut image_data = Vec::new();
    let mut image_name = String::from("upload");
    let mut content_type: Option<String> = None;

    // First non-empty file field wins.
    while let Ok(Some(mut field)) = payload.try_next().await {
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            data.write_all(&chunk?)?;
        }
        if data.is_empty() {
            continue;
        }
        content_type = field.content_type().map(|m| m.essence_str().to_string());
        if let Some(name) = field.content_disposition().and_then(|cd| cd.get_filename()) {
            image_name = name.to_string();
        }
        image_data = data;
        break;
    }

    match content_type.as_deref() {
        Some(ct) if ALLOWED_TYPES.contains(&ct) => {}
        _ => return bad_request("Please upload a JPEG or PNG image."),
    }
    if image_data.is_empty() {
        return bad_request("No image file found in the upload.");
    }

    let Some(detector) = detector.get_ref().as_ref() else {
        return Ok(HttpResponse::ServiceUnavailable().json(ErrorResponse {
            error: "Model not loaded. Copy the weights file and restart.".into(),
        }));
    };

    let start = Instant::now();

    let image = match image::load_from_memory(&image_data) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            warn!("Rejected unreadable upload '{}': {}", image_name, e);
            return bad_request("Could not read the image. Upload a valid JPEG or PNG.");
        }
    };

    let detections = match detector.inference(&image) {
        Ok(detections) => detections,
        Err(e) => {
            error!("Model inference error: {e}");
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: format!("Model inference error: {e}"),
            }));
        }
    };

    let labeled = assign_disc_levels(detections);
    let vis = annotator.annotate(&image, &labeled);
    let jpeg = match encode_jpeg(&vis) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to encode annotated image: {e}");
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to encode annotated image".into(),
            }));
        }
    };
    let annotated_image = to_data_uri(&jpeg);
    let annotated_url = save_annotated(&config.static_dir, &jpeg);

    let report = build_report(&labeled, &image_name, start.elapsed().as_secs_f64());
    info!(
        "Processed '{}': {} detections, status {}",
        image_name,
        labeled.len(),
        report.overall_status
    );

    Ok(HttpResponse::Ok().json(FullResponse {
        report,
        annotated_image,
        annotated_url,
    }))
}

fn save_annotated(static_dir: &str, jpeg: &[u8]) -> Option<String> {
    let file_name = format!("{}.jpg", Uuid::new_v4());
    let path = std::path::Path::new(static_dir).join(&file_name);
    match std::fs::write(&path, jpeg) {
        Ok(()) => Some(format!("/static/{file_name}")),
        Err(e) => {
            warn!("Failed to save annotated image to {}: {}", path.display(), e);
            None
        }
    }
}

fn bad_request(message: &str) -> Result<HttpResponse, Error> {
    Ok(HttpResponse::BadRequest().json(ErrorResponse {
        error: message.into(),
    }))
}
