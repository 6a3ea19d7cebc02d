use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub limits: UploadLimits,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `*` allows any origin.
    pub cors_origin: String,
}

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_image_size: usize,
    pub max_pdf_size: usize,
    pub max_dimension: u32,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    /// Zero disables the retention sweep.
    pub artifact_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8002,
                cors_origin: "http://localhost:3000".to_string(),
            },
            limits: UploadLimits {
                max_image_size: 50 * 1024 * 1024,
                max_pdf_size: 100 * 1024 * 1024,
                max_dimension: 2048,
            },
            storage: StorageConfig {
                upload_dir: PathBuf::from("uploads"),
                artifact_ttl: Duration::from_secs(24 * 60 * 60),
                sweep_interval: Duration::from_secs(60 * 60),
            },
        }
    }
}

impl AppConfig {
    /// Reads the environment (and `.env` when present) over the defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: env_or("PORT", defaults.server.port),
                cors_origin: env::var("CORS_ORIGIN").unwrap_or(defaults.server.cors_origin),
            },
            limits: UploadLimits {
                max_image_size: env_or("MAX_IMAGE_SIZE", defaults.limits.max_image_size),
                max_pdf_size: env_or("MAX_PDF_SIZE", defaults.limits.max_pdf_size),
                max_dimension: env_or("MAX_DIMENSION", defaults.limits.max_dimension),
            },
            storage: StorageConfig {
                upload_dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.upload_dir),
                artifact_ttl: Duration::from_secs(env_or(
                    "ARTIFACT_TTL_SECS",
                    defaults.storage.artifact_ttl.as_secs(),
                )),
                sweep_interval: Duration::from_secs(
                    env_or("SWEEP_INTERVAL_SECS", defaults.storage.sweep_interval.as_secs()).max(1),
                ),
            },
        }
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn retention_enabled(&self) -> bool {
        !self.storage.artifact_ttl.is_zero()
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid value '{}' for {}, using {}", raw, key, default);
                default
            }
        },
        Err(_) => default,
    }
}
