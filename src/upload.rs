use crate::types::{CompressionError, UploadedFile};
use actix_multipart::Multipart;
use bytes::BytesMut;
use futures_util::StreamExt;

/// What a single upload endpoint accepts.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub field: &'static str,
    pub allowed_types: &'static [&'static str],
    pub accepted_label: &'static str,
    pub max_size: usize,
}

impl UploadPolicy {
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.allowed_types.contains(&mime_type)
    }
}

/// Pulls the policy's file field out of a multipart body.
///
/// The declared content type is checked before the body is read, and the size
/// ceiling is enforced chunk by chunk, so rejected uploads never reach a codec.
/// Other fields are drained and ignored.
pub async fn read_upload(
    mut payload: Multipart,
    policy: &UploadPolicy,
) -> Result<UploadedFile, CompressionError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| CompressionError::Upload(e.to_string()))?;

        let disposition = field.content_disposition();
        let name = disposition.get_name().map(str::to_owned);
        let filename = disposition
            .get_filename()
            .map(str::to_owned)
            .unwrap_or_else(|| policy.field.to_string());

        if name.as_deref() != Some(policy.field) {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| CompressionError::Upload(e.to_string()))?;
            }
            continue;
        }

        let mime_type = field
            .content_type()
            .map(|m| m.essence_str().to_ascii_lowercase())
            .unwrap_or_default();
        if !policy.accepts(&mime_type) {
            return Err(CompressionError::UnsupportedFormat {
                format: if mime_type.is_empty() {
                    "unknown".to_string()
                } else {
                    mime_type
                },
                accepted: policy.accepted_label,
            });
        }

        let mut content = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| CompressionError::Upload(e.to_string()))?;
            if content.len() + chunk.len() > policy.max_size {
                return Err(CompressionError::FileTooLarge {
                    actual: content.len() + chunk.len(),
                    limit: policy.max_size,
                });
            }
            content.extend_from_slice(&chunk);
        }

        log::info!(
            "📥 Received '{}' ({}, {} bytes)",
            filename,
            mime_type,
            content.len()
        );

        return Ok(UploadedFile {
            filename,
            mime_type,
            content: content.freeze(),
        });
    }

    Err(CompressionError::MissingFile {
        field: policy.field,
    })
}
