use serde::Serialize;

/// Named compression presets accepted by the upload endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySetting {
    pub level: CompressionLevel,
    pub quality: u8,
    pub description: &'static str,
}

/// Structural options applied to a PDF document, escalating with the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfProfile {
    pub strip_metadata: bool,
    pub drop_empty_streams: bool,
    pub prune_unused_objects: bool,
    pub compress_streams: bool,
}

const QUALITY_TABLE: [QualitySetting; 3] = [
    QualitySetting {
        level: CompressionLevel::Low,
        quality: 85,
        description: "Light compression - best visual quality",
    },
    QualitySetting {
        level: CompressionLevel::Medium,
        quality: 70,
        description: "Balanced compression - good quality",
    },
    QualitySetting {
        level: CompressionLevel::High,
        quality: 50,
        description: "Strong compression - smallest file size",
    },
];

impl CompressionLevel {
    /// Resolves the `level` query parameter. Missing or unknown values fall back to `Medium`.
    pub fn from_query(level: Option<&str>) -> Self {
        match level {
            Some("low") => Self::Low,
            Some("high") => Self::High,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn setting(&self) -> QualitySetting {
        QUALITY_TABLE
            .iter()
            .copied()
            .find(|s| s.level == *self)
            .unwrap_or(QUALITY_TABLE[1])
    }

    pub fn pdf_profile(&self) -> PdfProfile {
        match self {
            Self::Low => PdfProfile {
                strip_metadata: false,
                drop_empty_streams: true,
                prune_unused_objects: true,
                compress_streams: false,
            },
            Self::Medium => PdfProfile {
                strip_metadata: false,
                drop_empty_streams: true,
                prune_unused_objects: true,
                compress_streams: true,
            },
            Self::High => PdfProfile {
                strip_metadata: true,
                drop_empty_streams: true,
                prune_unused_objects: true,
                compress_streams: true,
            },
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::Medium
    }
}
