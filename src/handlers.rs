use crate::compressor::Compressor;
use crate::config::AppConfig;
use crate::image_processor::IMAGE_MIME_TYPES;
use crate::pdf_processor::PDF_MIME_TYPES;
use crate::quality::CompressionLevel;
use crate::storage::{content_type_for, ArtifactStore};
use crate::types::*;
use crate::upload::{read_upload, UploadPolicy};
use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::http::header::{self, ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use std::io;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub config: AppConfig,
    pub compressor: Compressor,
}

impl AppState {
    pub async fn new(config: AppConfig) -> io::Result<Self> {
        let store = ArtifactStore::open(&config.storage.upload_dir).await?;
        let compressor = Compressor::new(store, config.limits.max_dimension);
        Ok(Self { config, compressor })
    }

    fn image_policy(&self) -> UploadPolicy {
        UploadPolicy {
            field: "image",
            allowed_types: IMAGE_MIME_TYPES,
            accepted_label: "image/jpeg, image/png, image/webp",
            max_size: self.config.limits.max_image_size,
        }
    }

    fn pdf_policy(&self) -> UploadPolicy {
        UploadPolicy {
            field: "pdf",
            allowed_types: PDF_MIME_TYPES,
            accepted_label: "application/pdf",
            max_size: self.config.limits.max_pdf_size,
        }
    }
}

type AppData = web::Data<AppState>;

/// Reads `level` from the query string without ever failing the request.
/// The first occurrence wins; anything unparseable counts as absent.
pub fn requested_level(req: &HttpRequest) -> CompressionLevel {
    let pairs = web::Query::<Vec<(String, String)>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();
    let level = pairs
        .iter()
        .find(|(key, _)| key == "level")
        .map(|(_, value)| value.as_str());

    CompressionLevel::from_query(level)
}

/// Mounts every endpoint under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health))
            .route("/upload", web::post().to(upload_image))
            .route("/pdf-compress", web::post().to(compress_pdf))
            .route("/uploads/{filename}", web::get().to(preview_file))
            .route("/download/{filename}", web::get().to(download_file))
            .route("/image-info", web::post().to(image_info))
            .route("/stats", web::get().to(storage_stats))
            .route("/cleanup", web::post().to(cleanup)),
    );
}

pub fn cors(config: &AppConfig) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600);

    if config.server.cors_origin == "*" {
        cors.allow_any_origin()
    } else {
        cors.allowed_origin(&config.server.cors_origin)
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "OK",
        "message": "Compression service is running",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn upload_image(
    req: HttpRequest,
    payload: Multipart,
    state: AppData,
) -> Result<HttpResponse, CompressionError> {
    let level = requested_level(&req);
    let file = read_upload(payload, &state.image_policy()).await?;
    let result = state.compressor.compress_image(&file, level).await?;

    log::info!(
        "✅ {} -> {} ({} -> {} bytes, {}% saved)",
        file.filename,
        result.output_filename,
        result.original_size,
        result.compressed_size,
        result.savings_percent
    );

    let metadata = ImageMetadata {
        original_format: file.mime_type.clone(),
        output_format: result.output_mime_type.clone(),
        original_dimensions: result.original_dimensions,
        output_dimensions: result.output_dimensions,
        original_filename: file.filename.clone(),
        processed_filename: result.output_filename.clone(),
    };
    Ok(HttpResponse::Ok().json(build_response(&result, level, metadata, None)))
}

async fn compress_pdf(
    req: HttpRequest,
    payload: Multipart,
    state: AppData,
) -> Result<HttpResponse, CompressionError> {
    let level = requested_level(&req);
    let file = read_upload(payload, &state.pdf_policy()).await?;
    let result = state.compressor.compress_pdf(&file, level).await?;

    let warning = (result.compressed_size >= result.original_size)
        .then(|| "The PDF could not be reduced further at this level".to_string());

    let metadata = PdfMetadata {
        original_format: file.mime_type.clone(),
        output_format: result.output_mime_type.clone(),
        original_filename: file.filename.clone(),
        processed_filename: result.output_filename.clone(),
        page_count: result.page_count.unwrap_or_default(),
    };
    Ok(HttpResponse::Ok().json(build_response(&result, level, metadata, warning)))
}

fn build_response<M>(
    result: &CompressionResult,
    level: CompressionLevel,
    metadata: M,
    warning: Option<String>,
) -> CompressResponse<M> {
    let setting = level.setting();
    CompressResponse {
        success: true,
        preview_url: format!("/api/uploads/{}", result.output_filename),
        download_url: format!("/api/download/{}", result.output_filename),
        stats: CompressionStats {
            original_size: result.original_size,
            compressed_size: result.compressed_size,
            savings_percent: result.savings_percent,
            compression_level: level.as_str().to_string(),
            compression_description: setting.description.to_string(),
            compression_ratio: result.compression_ratio,
        },
        metadata,
        warning,
    }
}

async fn preview_file(
    path: web::Path<String>,
    state: AppData,
) -> Result<HttpResponse, CompressionError> {
    let filename = path.into_inner();
    let file_path = state.compressor.store().resolve(&filename).await?;
    let content = tokio::fs::read(&file_path).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&filename))
        .insert_header((header::CACHE_CONTROL, "public, max-age=3600"))
        .body(content))
}

async fn download_file(
    path: web::Path<String>,
    state: AppData,
) -> Result<HttpResponse, CompressionError> {
    let filename = path.into_inner();
    log::info!("📥 Download requested for {}", filename);

    let file_path = state.compressor.store().resolve(&filename).await?;
    let content = tokio::fs::read(&file_path).await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&filename))
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .body(content))
}

async fn image_info(payload: Multipart, state: AppData) -> Result<HttpResponse, CompressionError> {
    let file = read_upload(payload, &state.image_policy()).await?;
    let info = state.compressor.inspect_image(&file).await?;

    Ok(HttpResponse::Ok().json(ImageInfoResponse {
        size: file.size(),
        filename: file.filename,
        mimetype: file.mime_type,
        info,
    }))
}

async fn storage_stats(state: AppData) -> Result<HttpResponse, CompressionError> {
    let stats = state.compressor.store().stats().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "artifactCount": stats.artifact_count,
        "totalBytes": stats.total_bytes,
        "retentionSeconds": state.config.storage.artifact_ttl.as_secs()
    })))
}

async fn cleanup(state: AppData) -> Result<HttpResponse, CompressionError> {
    let report = state
        .compressor
        .store()
        .sweep(state.config.storage.artifact_ttl)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}
