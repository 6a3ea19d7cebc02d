use crate::quality::QualitySetting;
use crate::types::*;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageEncoder, ImageFormat, ImageOutputFormat};
use std::io::Cursor;

pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// Output encodings the service re-encodes into. The declared upload type decides which one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
}

impl ImageKind {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }
}

/// Re-encoded image plus the dimensions it was written with.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone)]
pub struct ImageProcessor {
    max_dimension: u32,
}

impl ImageProcessor {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Reads the dimensions from the image header without decoding pixel data.
    pub fn probe(&self, content: &[u8]) -> Result<Dimensions, CompressionError> {
        let reader = image::io::Reader::new(Cursor::new(content))
            .with_guessed_format()
            .map_err(|e| CompressionError::InvalidImage(e.to_string()))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| CompressionError::InvalidImage(e.to_string()))?;

        if width == 0 || height == 0 {
            return Err(CompressionError::InvalidImage(format!(
                "image reports empty dimensions {}x{}",
                width, height
            )));
        }
        Ok(Dimensions { width, height })
    }

    /// Decodes, bounds and re-encodes `content` as `kind`.
    pub fn compress(
        &self,
        content: &[u8],
        kind: ImageKind,
        setting: QualitySetting,
    ) -> Result<EncodedImage, CompressionError> {
        let img = image::load_from_memory(content)?;
        let (width, height) = img.dimensions();
        let (target_width, target_height) =
            calculate_target_dimensions(width, height, self.max_dimension);

        let img = if (target_width, target_height) != (width, height) {
            log::debug!(
                "Resizing {}x{} -> {}x{}",
                width,
                height,
                target_width,
                target_height
            );
            img.resize_exact(target_width, target_height, FilterType::Lanczos3)
        } else {
            img
        };

        let bytes = match kind {
            ImageKind::Jpeg => self.encode_jpeg(&img, setting.quality)?,
            ImageKind::Png => self.encode_png(&img)?,
            ImageKind::WebP => self.encode_webp(&img, setting.quality)?,
        };

        log::info!(
            "{:?} encoded at quality {}: {} -> {} bytes",
            kind,
            setting.quality,
            content.len(),
            bytes.len()
        );

        Ok(EncodedImage {
            bytes,
            dimensions: Dimensions {
                width: target_width,
                height: target_height,
            },
        })
    }

    /// Full metadata probe used by the image-info endpoint.
    pub fn inspect(&self, content: &[u8]) -> Result<ImageInfo, CompressionError> {
        let format = image::guess_format(content)
            .map_err(|e| CompressionError::Inspection(e.to_string()))?;
        let img = image::load_from_memory_with_format(content, format)
            .map_err(|e| CompressionError::Inspection(e.to_string()))?;
        let (width, height) = img.dimensions();

        Ok(ImageInfo {
            dimensions: Dimensions { width, height },
            format: format_name(format),
            has_alpha: img.color().has_alpha(),
            density: read_density(content),
        })
    }

    fn encode_jpeg(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
        let mut output = Vec::new();
        let mut cursor = Cursor::new(&mut output);

        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))?;
        Ok(output)
    }

    /// PNG is lossless, so the quality preset is ignored and the encoder always runs at maximum compression.
    fn encode_png(&self, img: &DynamicImage) -> Result<Vec<u8>, CompressionError> {
        let mut output = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut output, CompressionType::Best, PngFilter::Adaptive);

        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), image::ColorType::Rgba8)?;
        } else {
            let rgb = img.to_rgb8();
            encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)?;
        }
        Ok(output)
    }

    fn encode_webp(&self, img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
        // libwebp only accepts 8-bit RGB(A) buffers
        let normalized = if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };

        let encoder = webp::Encoder::from_image(&normalized)
            .map_err(|e| CompressionError::Compression(format!("WebP encoder setup failed: {}", e)))?;
        let memory = encoder.encode(quality as f32);
        Ok(memory.to_vec())
    }
}

/// Fits `width`x`height` inside a `max_dimension` square, preserving aspect ratio.
/// Images already inside the bound are returned unchanged.
pub fn calculate_target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale_factor = max_dimension as f64 / width.max(height) as f64;
    let new_width = std::cmp::max(1, (width as f64 * scale_factor).round() as u32);
    let new_height = std::cmp::max(1, (height as f64 * scale_factor).round() as u32);

    (new_width.min(max_dimension), new_height.min(max_dimension))
}

fn format_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        other => format!("{:?}", other).to_lowercase(),
    }
}

/// Horizontal resolution in dots per inch. EXIF wins, then the JFIF header, then PNG `pHYs`.
fn read_density(content: &[u8]) -> Option<u32> {
    exif_density(content)
        .or_else(|| jfif_density(content))
        .or_else(|| png_density(content))
}

fn exif_density(content: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(content);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::XResolution, exif::In::PRIMARY)?;

    let resolution = match field.value {
        exif::Value::Rational(ref values) => values.first()?.to_f64(),
        _ => return None,
    };

    // ResolutionUnit 3 is centimetres; 2 (inches) is the default
    let unit = exif
        .get_field(exif::Tag::ResolutionUnit, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(2);
    to_dpi(if unit == 3 { resolution * 2.54 } else { resolution })
}

/// APP0 right after SOI: `JFIF\0`, version, units, Xdensity, Ydensity.
fn jfif_density(content: &[u8]) -> Option<u32> {
    if content.len() < 18 || content[0..4] != [0xFF, 0xD8, 0xFF, 0xE0] || &content[6..11] != b"JFIF\0" {
        return None;
    }

    let density = u16::from_be_bytes([content[14], content[15]]) as f64;
    match content[13] {
        1 => to_dpi(density),
        2 => to_dpi(density * 2.54),
        // 0 only describes the pixel aspect ratio
        _ => None,
    }
}

/// Walks the chunks ahead of the image data looking for `pHYs`.
fn png_density(content: &[u8]) -> Option<u32> {
    const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    if !content.starts_with(&SIGNATURE) {
        return None;
    }

    let mut pos = SIGNATURE.len();
    while pos + 8 <= content.len() {
        let length = u32::from_be_bytes(content[pos..pos + 4].try_into().ok()?) as usize;
        let kind = &content[pos + 4..pos + 8];
        let data = content.get(pos + 8..pos.checked_add(8 + length)?)?;

        match kind {
            b"pHYs" if data.len() >= 9 => {
                let per_unit = u32::from_be_bytes(data[0..4].try_into().ok()?) as f64;
                // unit 1 is pixels per metre; 0 is aspect ratio only
                return if data[8] == 1 { to_dpi(per_unit * 0.0254) } else { None };
            }
            b"IDAT" | b"IEND" => return None,
            _ => {}
        }
        pos += 12 + length;
    }
    None
}

fn to_dpi(value: f64) -> Option<u32> {
    if value.is_finite() && value > 0.0 {
        Some(value.round() as u32)
    } else {
        None
    }
}
