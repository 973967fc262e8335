//! Optical character recognition for images and rendered pages.
//!
//! OCR is best-effort: [`recognize_or_empty`] turns every [`OcrError`] into an
//! empty string so a missing or broken OCR engine never fails ingestion.

use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Environment variable that overrides the tesseract executable.
pub const TESSERACT_CMD_ENV: &str = "TESSERACT_CMD";

/// Error type for OCR operations.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The OCR engine is not installed or cannot be started.
    #[error("ocr engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but reported a failure.
    #[error("ocr failed: {0}")]
    Failed(String),

    /// IO error while talking to the engine.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for OCR engines.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in encoded image bytes. Returns trimmed text.
    async fn recognize(&self, image_data: &[u8]) -> Result<String, OcrError>;

    /// Engine name for logging.
    fn name(&self) -> &str;
}

/// Run OCR, logging failures and returning `""` in their place.
pub async fn recognize_or_empty(engine: &dyn OcrEngine, image_data: &[u8]) -> String {
    match engine.recognize(image_data).await {
        Ok(text) => {
            debug!("OCR ({}) extracted {} characters", engine.name(), text.len());
            text
        }
        Err(OcrError::Unavailable(e)) => {
            warn!("OCR engine not available, proceeding without OCR text: {}", e);
            String::new()
        }
        Err(e) => {
            warn!("OCR error: {}", e);
            String::new()
        }
    }
}

/// OCR configuration.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Run OCR at all.
    pub enabled: bool,
    /// Tesseract executable.
    pub command: String,
    /// Tesseract language code.
    pub language: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: std::env::var(TESSERACT_CMD_ENV).unwrap_or_else(|_| "tesseract".to_string()),
            language: "eng".to_string(),
        }
    }
}

impl OcrConfig {
    /// Build the engine this configuration describes.
    pub fn build(&self) -> std::sync::Arc<dyn OcrEngine> {
        if self.enabled {
            std::sync::Arc::new(TesseractOcr::new(&self.command, &self.language))
        } else {
            std::sync::Arc::new(DisabledOcr)
        }
    }
}

/// OCR through the `tesseract` command line tool.
///
/// Image bytes go in on stdin and recognized text comes back on stdout.
pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image_data: &[u8]) -> Result<String, OcrError> {
        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    OcrError::Unavailable(format!("{}: {e}", self.command))
                }
                _ => OcrError::Io(e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(image_data).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// OCR engine that always returns empty text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    async fn recognize(&self, _image_data: &[u8]) -> Result<String, OcrError> {
        Ok(String::new())
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
