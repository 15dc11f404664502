use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Runtime configuration, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Path to the TorchScript export of the detection model.
    pub model_path: String,
    /// Directory where annotated images are saved and served from.
    pub static_dir: String,
    pub port: String,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/best.torchscript".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            port: env::var("PORT").unwrap_or_else(|_| "8081".to_string()),
            conf_threshold: env_parse("CONF_THRESHOLD", 0.25),
            iou_threshold: env_parse("IOU_THRESHOLD", 0.45),
            input_size: env_parse("INPUT_SIZE", 640),
        }
    }
}

fn env_parse<T: FromStr + Display + Copy>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Invalid value '{raw}' for {key}, falling back to {default}");
            default
        }),
        Err(_) => default,
    }
}
