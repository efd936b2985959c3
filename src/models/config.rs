use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub max_image_bytes: u64,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api_base: env::var("PIXMATCH_API_BASE")
                .unwrap_or_else(|_| "http://127.0.0.1:5000/api".to_string()),
            request_timeout_secs: env::var("PIXMATCH_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(120),
            max_image_bytes: env::var("PIXMATCH_MAX_IMAGE_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(16_777_216),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}
