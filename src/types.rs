use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF processing error: {0}")]
    Pdf(String),

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String, accepted: &'static str },

    #[error("File size {actual} exceeds limit {limit}")]
    FileTooLarge { actual: usize, limit: usize },

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Missing multipart field: {field}")]
    MissingFile { field: &'static str },

    #[error("Malformed upload: {0}")]
    Upload(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Image inspection failed: {0}")]
    Inspection(String),

    #[error("Artifact not found: {filename}")]
    NotFound { filename: String },
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl CompressionError {
    /// Short, client-facing title of the error.
    pub fn title(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "Unsupported format",
            Self::FileTooLarge { .. } => "File too large",
            Self::InvalidImage(_) => "Invalid image",
            Self::MissingFile { .. } => "No file uploaded",
            Self::Upload(_) => "Invalid upload",
            Self::NotFound { .. } => "File not found",
            Self::Compression(_) | Self::Image(_) => "Compression failed",
            Self::Pdf(_) => "PDF compression failed",
            Self::Inspection(_) => "Failed to get image info",
            Self::Io(_) => "Internal server error",
        }
    }

    /// Message safe to show to clients; server-side details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::UnsupportedFormat { format, accepted } => {
                format!("File type '{}' is not supported. Accepted types: {}", format, accepted)
            }
            Self::FileTooLarge { limit, .. } => {
                format!("File exceeds the maximum upload size of {}", format_file_size(*limit))
            }
            Self::InvalidImage(_) => "The uploaded file could not be read as an image".to_string(),
            Self::MissingFile { field } => {
                format!("Expected a multipart file field named '{}'", field)
            }
            Self::Upload(detail) => detail.clone(),
            Self::NotFound { filename } => format!("No compressed file named '{}'", filename),
            Self::Compression(_) | Self::Image(_) => "Failed to compress image".to_string(),
            Self::Pdf(_) => "Failed to compress PDF".to_string(),
            Self::Inspection(_) => "Failed to read image metadata".to_string(),
            Self::Io(_) => "An unexpected error occurred".to_string(),
        }
    }
}

impl ResponseError for CompressionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedFormat { .. }
            | Self::FileTooLarge { .. }
            | Self::InvalidImage(_)
            | Self::MissingFile { .. }
            | Self::Upload(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Compression(_)
            | Self::Image(_)
            | Self::Pdf(_)
            | Self::Inspection(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("❌ {}", self);
        } else {
            log::warn!("Rejected request: {}", self);
        }

        HttpResponse::build(status).json(ErrorBody {
            error: self.title().to_string(),
            message: self.client_message(),
        })
    }
}

/// A single file pulled out of a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub mime_type: String,
    pub content: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Outcome of one successful compression, before it is shaped into a response.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub output_filename: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub savings_percent: f64,
    pub compression_ratio: f64,
    pub output_mime_type: String,
    pub original_dimensions: Option<Dimensions>,
    pub output_dimensions: Option<Dimensions>,
    pub page_count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionStats {
    pub original_size: u64,
    pub compressed_size: u64,
    pub savings_percent: f64,
    pub compression_level: String,
    pub compression_description: String,
    pub compression_ratio: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub original_format: String,
    pub output_format: String,
    pub original_dimensions: Option<Dimensions>,
    pub output_dimensions: Option<Dimensions>,
    pub original_filename: String,
    pub processed_filename: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfMetadata {
    pub original_format: String,
    pub output_format: String,
    pub original_filename: String,
    pub processed_filename: String,
    pub page_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressResponse<M> {
    pub success: bool,
    pub preview_url: String,
    pub download_url: String,
    pub stats: CompressionStats,
    pub metadata: M,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub dimensions: Dimensions,
    pub format: String,
    pub has_alpha: bool,
    pub density: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfoResponse {
    pub filename: String,
    pub size: usize,
    pub mimetype: String,
    #[serde(flatten)]
    pub info: ImageInfo,
}

pub fn format_file_size(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log(THRESHOLD) as usize).min(UNITS.len() - 1);
    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if size.fract() == 0.0 {
        format!("{} {}", size, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
