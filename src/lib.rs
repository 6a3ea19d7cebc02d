//! Media Compressor
//!
//! HTTP service that takes an uploaded JPEG, PNG, WebP or PDF, re-encodes it at one of
//! three compression levels and keeps the result on disk for preview and download.

pub mod compressor;
pub mod config;
pub mod handlers;
pub mod image_processor;
pub mod pdf_processor;
pub mod quality;
pub mod storage;
pub mod types;
pub mod upload;

pub use compressor::Compressor;
pub use config::AppConfig;
pub use handlers::{configure, cors, AppState};
pub use quality::CompressionLevel;
pub use types::*;
