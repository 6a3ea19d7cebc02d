use actix_web::{middleware::Logger, web, App, HttpServer};
use media_compressor::storage::run_retention;
use media_compressor::types::format_file_size;
use media_compressor::{configure, cors, AppConfig, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();

    log::info!("🦀 Starting media compression service");
    log::info!("📍 Address: {}", config.server_address());
    log::info!("📂 Artifact directory: {}", config.storage.upload_dir.display());
    log::info!(
        "📏 Limits: images {}, PDFs {}, max dimension {}px",
        format_file_size(config.limits.max_image_size),
        format_file_size(config.limits.max_pdf_size),
        config.limits.max_dimension
    );
    log::info!("🌐 CORS origin: {}", config.server.cors_origin);

    let state = web::Data::new(AppState::new(config.clone()).await?);

    if config.retention_enabled() {
        log::info!(
            "🧹 Artifacts expire after {}s (sweep every {}s)",
            config.storage.artifact_ttl.as_secs(),
            config.storage.sweep_interval.as_secs()
        );
        tokio::spawn(run_retention(
            state.compressor.store().clone(),
            config.storage.artifact_ttl,
            config.storage.sweep_interval,
        ));
    } else {
        log::warn!("Artifact retention disabled; compressed files are kept until cleaned up manually");
    }

    let bind_address = config.server_address();
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors(&config))
            .configure(configure)
    })
    .bind(bind_address)?
    .run()
    .await
}
