use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use image::{DynamicImage, GenericImageView, ImageOutputFormat, Rgb, RgbImage};
use media_compressor::{configure, AppConfig, AppState};
use pdf_writer::{Content, Pdf, Rect, Ref};
use serde_json::Value;
use std::io::Cursor;
use std::path::Path;

const BOUNDARY: &str = "----media-compressor-test-boundary";

fn multipart(field: &str, filename: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
    });
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), ImageOutputFormat::Png)
        .unwrap();
    output
}

fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, 90, (y % 256) as u8]));
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), ImageOutputFormat::Jpeg(95))
        .unwrap();
    output
}

fn sample_pdf(pages: i32) -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let mut pdf = Pdf::new();

    pdf.catalog(catalog_id).pages(page_tree_id);
    let page_ids: Vec<Ref> = (0..pages).map(|i| Ref::new(10 + i * 2)).collect();
    pdf.pages(page_tree_id).kids(page_ids.iter().copied()).count(pages);

    for page_id in &page_ids {
        let content_id = Ref::new(page_id.get() + 1);
        pdf.page(*page_id)
            .media_box(Rect::new(0.0, 0.0, 595.0, 842.0))
            .parent(page_tree_id)
            .contents(content_id);

        let mut content = Content::new();
        for i in 0..300 {
            let offset = (i % 50) as f32;
            content.rect(offset, offset, 100.0, 100.0).stroke();
        }
        pdf.stream(content_id, &content.finish());
    }

    pdf.finish()
}

fn config_for(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.upload_dir = dir.to_path_buf();
    config
}

fn stored_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

macro_rules! app {
    ($config:expr) => {{
        let state = web::Data::new(AppState::new($config).await.unwrap());
        test::init_service(App::new().app_data(state).configure(configure)).await
    }};
}

#[actix_web::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].is_string());
}

#[actix_web::test]
async fn png_upload_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let png = sample_png(120, 80);
    let (content_type, body) = multipart("image", "photo.png", "image/png", &png);
    let req = test::TestRequest::post()
        .uri("/api/upload?level=medium")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["stats"]["originalSize"], png.len() as u64);
    assert_eq!(json["stats"]["compressionLevel"], "medium");
    assert_eq!(json["stats"]["compressionDescription"], "Balanced compression - good quality");
    assert_eq!(json["metadata"]["originalFormat"], "image/png");
    assert_eq!(json["metadata"]["outputFormat"], "image/png");
    assert_eq!(json["metadata"]["originalFilename"], "photo.png");
    assert_eq!(json["metadata"]["originalDimensions"]["width"], 120);
    assert_eq!(json["metadata"]["originalDimensions"]["height"], 80);

    let compressed_size = json["stats"]["compressedSize"].as_u64().unwrap();
    let preview_url = json["previewUrl"].as_str().unwrap().to_string();
    assert!(preview_url.ends_with(".png"));

    let resp = test::call_service(&app, test::TestRequest::get().uri(&preview_url).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=3600"
    );
    let served = test::read_body(resp).await;
    assert_eq!(served.len() as u64, compressed_size);
    let decoded = image::load_from_memory(&served).unwrap();
    assert_eq!(decoded.dimensions(), (120, 80));
}

#[actix_web::test]
async fn savings_match_reported_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let jpeg = sample_jpeg(200, 150);
    let (content_type, body) = multipart("image", "shot.jpg", "image/jpeg", &jpeg);
    let req = test::TestRequest::post()
        .uri("/api/upload?level=high")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;

    let original = json["stats"]["originalSize"].as_f64().unwrap();
    let compressed = json["stats"]["compressedSize"].as_f64().unwrap();
    let expected = ((original - compressed) / original * 100.0 * 100.0).round() / 100.0;
    assert_eq!(json["stats"]["savingsPercent"].as_f64().unwrap(), expected);
    assert_eq!(json["metadata"]["outputFormat"], "image/jpeg");
    assert_eq!(json["stats"]["compressionLevel"], "high");
}

#[actix_web::test]
async fn oversized_images_are_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.limits.max_dimension = 50;
    let app = app!(config);

    let (content_type, body) = multipart("image", "wide.png", "image/png", &sample_png(200, 100));
    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(json["metadata"]["outputDimensions"]["width"], 50);
    assert_eq!(json["metadata"]["outputDimensions"]["height"], 25);
}

#[actix_web::test]
async fn unknown_level_uses_medium() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("image", "a.png", "image/png", &sample_png(10, 10));
    let req = test::TestRequest::post()
        .uri("/api/upload?level=ultra")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(json["stats"]["compressionLevel"], "medium");
    assert_eq!(json["stats"]["compressionDescription"], "Balanced compression - good quality");
}

#[actix_web::test]
async fn unsupported_type_is_rejected_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("image", "anim.gif", "image/gif", b"GIF89a....");
    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "Unsupported format");
    assert!(json["message"].is_string());
    assert_eq!(stored_files(dir.path()), 0);
}

#[actix_web::test]
async fn too_large_upload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.limits.max_image_size = 1024;
    let app = app!(config);

    let png = sample_png(256, 256);
    assert!(png.len() > 1024);
    let (content_type, body) = multipart("image", "big.png", "image/png", &png);
    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "File too large");
    assert_eq!(stored_files(dir.path()), 0);
}

#[actix_web::test]
async fn unreadable_image_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("image", "broken.png", "image/png", b"not a png at all");
    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "Invalid image");
    assert_eq!(stored_files(dir.path()), 0);
}

#[actix_web::test]
async fn missing_field_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("file", "a.png", "image/png", &sample_png(4, 4));
    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "No file uploaded");
}

#[actix_web::test]
async fn unknown_artifacts_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    for uri in [
        "/api/uploads/compressed_1700000000000_deadbeef.png",
        "/api/download/compressed_1700000000000_deadbeef.png",
        "/api/uploads/..%2FCargo.toml",
        "/api/download/secret.txt",
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", uri);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["error"], "File not found");
    }
}

#[actix_web::test]
async fn download_forces_attachment() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("image", "a.jpg", "image/jpeg", &sample_jpeg(32, 32));
    let req = test::TestRequest::post()
        .uri("/api/upload?level=low")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    let download_url = json["downloadUrl"].as_str().unwrap().to_string();
    let processed = json["metadata"]["processedFilename"].as_str().unwrap().to_string();

    let resp = test::call_service(&app, test::TestRequest::get().uri(&download_url).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains(&processed));
}

#[actix_web::test]
async fn pdf_compression_reports_pages() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let pdf = sample_pdf(3);
    let (content_type, body) = multipart("pdf", "report.pdf", "application/pdf", &pdf);
    let req = test::TestRequest::post()
        .uri("/api/pdf-compress?level=high")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["metadata"]["pageCount"], 3);
    assert_eq!(json["metadata"]["outputFormat"], "application/pdf");
    assert!(json["metadata"].get("originalDimensions").is_none());
    assert_eq!(json["stats"]["originalSize"], pdf.len() as u64);
    assert!(json["stats"]["compressedSize"].as_u64().unwrap() < pdf.len() as u64);
    assert!(json["previewUrl"].as_str().unwrap().ends_with(".pdf"));
    assert_eq!(stored_files(dir.path()), 1);
}

#[actix_web::test]
async fn pdf_endpoint_rejects_images() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("pdf", "a.png", "image/png", &sample_png(4, 4));
    let req = test::TestRequest::post()
        .uri("/api/pdf-compress")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(stored_files(dir.path()), 0);
}

#[actix_web::test]
async fn corrupt_pdf_is_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("pdf", "bad.pdf", "application/pdf", b"%PDF-1.7 nonsense");
    let req = test::TestRequest::post()
        .uri("/api/pdf-compress")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "PDF compression failed");
}

#[actix_web::test]
async fn image_info_does_not_persist() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let png = sample_png(30, 20);
    let (content_type, body) = multipart("image", "info.png", "image/png", &png);
    let req = test::TestRequest::post()
        .uri("/api/image-info")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(json["filename"], "info.png");
    assert_eq!(json["size"], png.len() as u64);
    assert_eq!(json["mimetype"], "image/png");
    assert_eq!(json["dimensions"]["width"], 30);
    assert_eq!(json["dimensions"]["height"], 20);
    assert_eq!(json["format"], "png");
    assert_eq!(json["hasAlpha"], false);
    assert!(json["density"].is_null());
    assert_eq!(stored_files(dir.path()), 0);
}

#[actix_web::test]
async fn stats_and_cleanup_track_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.storage.artifact_ttl = std::time::Duration::ZERO;
    let app = app!(config);

    let (content_type, body) = multipart("image", "a.png", "image/png", &sample_png(8, 8));
    let req = test::TestRequest::post()
        .uri("/api/upload")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let uploaded: Value = test::call_and_read_body_json(&app, req).await;

    let stats: Value =
        test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/stats").to_request()).await;
    assert_eq!(stats["artifactCount"], 1);
    assert_eq!(stats["totalBytes"], uploaded["stats"]["compressedSize"]);

    let report: Value =
        test::call_and_read_body_json(&app, test::TestRequest::post().uri("/api/cleanup").to_request()).await;
    assert_eq!(report["removed"], 1);
    assert_eq!(stored_files(dir.path()), 0);
}

#[actix_web::test]
async fn repeated_level_uses_first_value() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("image", "a.png", "image/png", &sample_png(10, 10));
    let req = test::TestRequest::post()
        .uri("/api/upload?level=low&level=high")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["stats"]["compressionLevel"], "low");
}

#[actix_web::test]
async fn malformed_query_falls_back_to_medium() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    for uri in ["/api/upload?level=%ZZ&&=", "/api/upload?level"] {
        let (content_type, body) = multipart("image", "a.png", "image/png", &sample_png(10, 10));
        let req = test::TestRequest::post()
            .uri(uri)
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{}", uri);

        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["stats"]["compressionLevel"], "medium");
    }

    let pdf = sample_pdf(1);
    let (content_type, body) = multipart("pdf", "doc.pdf", "application/pdf", &pdf);
    let req = test::TestRequest::post()
        .uri("/api/pdf-compress?level=high&level=low")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let json: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(json["stats"]["compressionLevel"], "high");
}

#[actix_web::test]
async fn already_optimized_pdf_succeeds_with_warning() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let (content_type, body) = multipart("pdf", "report.pdf", "application/pdf", &sample_pdf(2));
    let req = test::TestRequest::post()
        .uri("/api/pdf-compress?level=high")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let first: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(first["success"], true);
    assert!(first.get("warning").is_none());

    let preview_url = first["previewUrl"].as_str().unwrap().to_string();
    let optimized =
        test::call_and_read_body(&app, test::TestRequest::get().uri(&preview_url).to_request()).await;

    let (content_type, body) = multipart("pdf", "again.pdf", "application/pdf", &optimized);
    let req = test::TestRequest::post()
        .uri("/api/pdf-compress?level=high")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let second: Value = test::read_body_json(resp).await;
    assert_eq!(second["success"], true);
    assert_eq!(second["stats"]["originalSize"], optimized.len() as u64);
    assert!(second["stats"]["savingsPercent"].as_f64().unwrap() <= 0.0);
    assert!(second["warning"].is_string());
    assert_eq!(second["metadata"]["pageCount"], 2);
}

#[actix_web::test]
async fn webp_upload_stays_webp() {
    let dir = tempfile::tempdir().unwrap();
    let app = app!(config_for(dir.path()));

    let rgb = RgbImage::from_fn(64, 40, |x, y| Rgb([(x * 4) as u8, (y * 6) as u8, 120]));
    let source = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height())
        .encode(95.0)
        .to_vec();

    let (content_type, body) = multipart("image", "photo.webp", "image/webp", &source);
    let req = test::TestRequest::post()
        .uri("/api/upload?level=high")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["metadata"]["originalFormat"], "image/webp");
    assert_eq!(json["metadata"]["outputFormat"], "image/webp");
    assert_eq!(json["metadata"]["originalDimensions"]["width"], 64);
    let preview_url = json["previewUrl"].as_str().unwrap().to_string();
    assert!(preview_url.ends_with(".webp"));

    let resp = test::call_service(&app, test::TestRequest::get().uri(&preview_url).to_request()).await;
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/webp");
    let served = test::read_body(resp).await;
    assert_eq!(&served[0..4], b"RIFF");
    assert_eq!(&served[8..12], b"WEBP");
}

#[actix_web::test]
async fn too_large_pdf_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path());
    config.limits.max_pdf_size = 512;
    let app = app!(config);

    let pdf = sample_pdf(3);
    assert!(pdf.len() > 512);
    let (content_type, body) = multipart("pdf", "huge.pdf", "application/pdf", &pdf);
    let req = test::TestRequest::post()
        .uri("/api/pdf-compress")
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let json: Value = test::read_body_json(resp).await;
    assert_eq!(json["error"], "File too large");
    assert_eq!(stored_files(dir.path()), 0);
}
