use crate::types::CompressionError;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use uuid::Uuid;

const ARTIFACT_PREFIX: &str = "compressed_";
const ARTIFACT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "pdf"];
const MAX_FILENAME_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub artifact_count: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub removed: usize,
    pub freed_bytes: u64,
}

/// Flat directory of compressed artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates the storage directory if needed and pins its canonical path.
    pub async fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        fs::create_dir_all(root.as_ref()).await?;
        let root = fs::canonicalize(root.as_ref()).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under a fresh name and reports the size read back from disk.
    pub async fn save(&self, extension: &str, bytes: &[u8]) -> Result<StoredArtifact, CompressionError> {
        let filename = generate_filename(extension);
        let path = self.root.join(&filename);
        fs::write(&path, bytes).await?;

        match fs::metadata(&path).await {
            Ok(meta) => {
                log::info!("💾 Stored {} ({} bytes)", filename, meta.len());
                Ok(StoredArtifact {
                    filename,
                    size: meta.len(),
                })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    log::warn!("Could not remove unverified artifact {}: {}", filename, cleanup);
                }
                Err(e.into())
            }
        }
    }

    /// Maps an untrusted filename to a path inside the storage root.
    pub async fn resolve(&self, filename: &str) -> Result<PathBuf, CompressionError> {
        let not_found = || CompressionError::NotFound {
            filename: filename.to_string(),
        };

        if !is_artifact_name(filename) {
            return Err(not_found());
        }

        let path = match fs::canonicalize(self.root.join(filename)).await {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        if !path.starts_with(&self.root) {
            log::warn!("Rejected artifact path outside storage root: {}", filename);
            return Err(not_found());
        }

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(not_found()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn stats(&self) -> io::Result<StorageStats> {
        let mut stats = StorageStats::default();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_str().map_or(false, is_artifact_name) {
                continue;
            }
            let meta = entry.metadata().await?;
            if meta.is_file() {
                stats.artifact_count += 1;
                stats.total_bytes += meta.len();
            }
        }
        Ok(stats)
    }

    /// Deletes artifacts whose last modification is at least `ttl` ago.
    pub async fn sweep(&self, ttl: Duration) -> io::Result<SweepReport> {
        let mut report = SweepReport::default();
        let now = SystemTime::now();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_str().map_or(false, is_artifact_name) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }

            let age = meta
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < ttl {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    report.removed += 1;
                    report.freed_bytes += meta.len();
                }
                // another sweep got there first
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        if report.removed > 0 {
            log::info!(
                "🧹 Removed {} expired artifacts ({} bytes)",
                report.removed,
                report.freed_bytes
            );
        }
        Ok(report)
    }
}

/// Runs [`ArtifactStore::sweep`] forever on a fixed interval.
pub async fn run_retention(store: ArtifactStore, ttl: Duration, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if let Err(e) = store.sweep(ttl).await {
            log::error!("Retention sweep failed: {}", e);
        }
    }
}

/// `compressed_<epoch-ms>_<random>.<ext>`; the random suffix keeps same-millisecond writes apart.
pub fn generate_filename(extension: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}_{}.{}",
        ARTIFACT_PREFIX,
        chrono::Utc::now().timestamp_millis(),
        &suffix[..8],
        extension
    )
}

pub fn is_artifact_name(name: &str) -> bool {
    if name.len() > MAX_FILENAME_LEN || !name.starts_with(ARTIFACT_PREFIX) {
        return false;
    }

    let Some((stem, extension)) = name.rsplit_once('.') else {
        return false;
    };

    stem.len() > ARTIFACT_PREFIX.len()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && ARTIFACT_EXTENSIONS.contains(&extension)
}

pub fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
