use crate::image_processor::{ImageKind, ImageProcessor};
use crate::pdf_processor::PdfProcessor;
use crate::quality::CompressionLevel;
use crate::storage::ArtifactStore;
use crate::types::*;
use tokio::task;

/// Runs one upload through probe, codec and storage.
#[derive(Debug, Clone)]
pub struct Compressor {
    image_processor: ImageProcessor,
    pdf_processor: PdfProcessor,
    store: ArtifactStore,
}

impl Compressor {
    pub fn new(store: ArtifactStore, max_dimension: u32) -> Self {
        Self {
            image_processor: ImageProcessor::new(max_dimension),
            pdf_processor: PdfProcessor::new(),
            store,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub async fn compress_image(
        &self,
        file: &UploadedFile,
        level: CompressionLevel,
    ) -> Result<CompressionResult, CompressionError> {
        let kind = ImageKind::from_mime(&file.mime_type).ok_or_else(|| {
            CompressionError::UnsupportedFormat {
                format: file.mime_type.clone(),
                accepted: "image/jpeg, image/png, image/webp",
            }
        })?;
        let original_dimensions = self.image_processor.probe(&file.content)?;
        let setting = level.setting();

        log::info!(
            "🖼️ Compressing {} ({}x{}, {} bytes) at level {}",
            file.filename,
            original_dimensions.width,
            original_dimensions.height,
            file.size(),
            level.as_str()
        );

        let processor = self.image_processor.clone();
        let content = file.content.clone();
        let encoded = task::spawn_blocking(move || processor.compress(&content, kind, setting))
            .await
            .map_err(|e| CompressionError::Compression(format!("Encoder task failed: {}", e)))??;

        let artifact = self.store.save(kind.extension(), &encoded.bytes).await?;
        let original_size = file.size() as u64;

        Ok(CompressionResult {
            output_filename: artifact.filename,
            original_size,
            compressed_size: artifact.size,
            savings_percent: savings_percent(original_size, artifact.size),
            compression_ratio: compression_ratio(original_size, artifact.size),
            output_mime_type: file.mime_type.clone(),
            original_dimensions: Some(original_dimensions),
            output_dimensions: Some(encoded.dimensions),
            page_count: None,
        })
    }

    pub async fn compress_pdf(
        &self,
        file: &UploadedFile,
        level: CompressionLevel,
    ) -> Result<CompressionResult, CompressionError> {
        log::info!(
            "📄 Compressing PDF {} ({} bytes) at level {}",
            file.filename,
            file.size(),
            level.as_str()
        );

        let processor = self.pdf_processor.clone();
        let content = file.content.clone();
        let profile = level.pdf_profile();
        let optimized = task::spawn_blocking(move || processor.optimize(&content, profile))
            .await
            .map_err(|e| CompressionError::Pdf(format!("Optimizer task failed: {}", e)))??;

        let artifact = self.store.save("pdf", &optimized.bytes).await?;
        let original_size = file.size() as u64;

        if artifact.size >= original_size {
            log::warn!(
                "⚠️ PDF {} did not shrink ({} -> {} bytes)",
                file.filename,
                original_size,
                artifact.size
            );
        }

        Ok(CompressionResult {
            output_filename: artifact.filename,
            original_size,
            compressed_size: artifact.size,
            savings_percent: savings_percent(original_size, artifact.size),
            compression_ratio: compression_ratio(original_size, artifact.size),
            output_mime_type: "application/pdf".to_string(),
            original_dimensions: None,
            output_dimensions: None,
            page_count: Some(optimized.page_count),
        })
    }

    pub async fn inspect_image(&self, file: &UploadedFile) -> Result<ImageInfo, CompressionError> {
        let processor = self.image_processor.clone();
        let content = file.content.clone();
        task::spawn_blocking(move || processor.inspect(&content))
            .await
            .map_err(|e| CompressionError::Inspection(e.to_string()))?
    }
}

/// Percentage of the original size saved, to two decimals. Negative when the output grew.
pub fn savings_percent(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    round2((original_size as f64 - compressed_size as f64) / original_size as f64 * 100.0)
}

/// Compressed size as a fraction of the original, to two decimals.
pub fn compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    round2(compressed_size as f64 / original_size as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
