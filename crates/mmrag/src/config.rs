//! Configuration handling for mmrag.
//!
//! Loaded from `config.toml` in the config directory, or from `--config`.
//! Every field has a default, so a partial file (or none) is valid.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "MMRAG_CONFIG_DIR";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "MMRAG_DATA_DIR";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where uploads, rendered pages and vectors live.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StorageConfig {
    /// Data directory (default: `$MMRAG_DATA_DIR` or the XDG data dir)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Embedding backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// MiniLM + CLIP through Candle
    #[default]
    Local,
    /// Feature hashing; no model download, no semantic quality
    Hash,
}

/// Embedding-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Text encoder (Hugging Face model id); must be a BERT with hidden size 384
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Cross-modal encoder (Hugging Face model id); must be a CLIP ViT-B/32
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Batch size for embedding
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Use GPU if available
    #[serde(default = "default_use_gpu")]
    pub use_gpu: bool,
}

fn default_text_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_image_model() -> String {
    "openai/clip-vit-base-patch32".to_string()
}

fn default_batch_size() -> usize {
    32
}

fn default_use_gpu() -> bool {
    true
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            text_model: default_text_model(),
            image_model: default_image_model(),
            batch_size: default_batch_size(),
            use_gpu: default_use_gpu(),
        }
    }
}

/// Extraction-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionConfig {
    /// Page upscale factor when rendering PDFs
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    /// Directory holding the Pdfium shared library (default: system library)
    #[serde(default)]
    pub pdfium_library: Option<PathBuf>,

    /// Run OCR on images and rendered pages
    #[serde(default = "default_ocr_enabled")]
    pub ocr_enabled: bool,

    /// Tesseract executable (default: `$TESSERACT_CMD` or `tesseract`)
    #[serde(default)]
    pub ocr_command: Option<String>,

    /// Tesseract language code
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
}

fn default_render_scale() -> f32 {
    2.0
}

fn default_ocr_enabled() -> bool {
    true
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            render_scale: default_render_scale(),
            pdfium_library: None,
            ocr_enabled: default_ocr_enabled(),
            ocr_command: None,
            ocr_language: default_ocr_language(),
        }
    }
}

/// Query-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryConfig {
    /// Results returned when `--top-k` is not given
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Largest accepted `--top-k`
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    100
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load() -> anyhow::Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from a specific file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse TOML text.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.query.default_top_k == 0 || self.query.max_top_k == 0 {
            anyhow::bail!("query.default_top_k and query.max_top_k must be at least 1");
        }
        if self.query.default_top_k > self.query.max_top_k {
            anyhow::bail!("query.default_top_k exceeds query.max_top_k");
        }
        if !(self.extraction.render_scale.is_finite() && self.extraction.render_scale > 0.0) {
            anyhow::bail!("extraction.render_scale must be a positive number");
        }
        Ok(())
    }

    /// Default config file location.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Effective data directory.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.storage.data_dir.clone().or_else(data_dir)
    }

    /// A commented configuration file with every default spelled out.
    pub fn sample_toml() -> &'static str {
        r#"# mmrag configuration

[storage]
# Uploads, rendered pages and the vector database live here.
# data_dir = "/var/lib/mmrag"

[embedding]
# "local" (Candle MiniLM + CLIP) or "hash" (no model download).
# A data_dir is tied to the models that filled it; switching backend or
# models needs a fresh data_dir.
backend = "local"
# Any BERT checkpoint with hidden size 384.
text_model = "sentence-transformers/all-MiniLM-L6-v2"
# Any CLIP checkpoint with the ViT-B/32 layout (512-dim projections).
image_model = "openai/clip-vit-base-patch32"
batch_size = 32
use_gpu = true

[extraction]
render_scale = 2.0
# pdfium_library = "/opt/pdfium/lib"
ocr_enabled = true
# ocr_command = "/usr/bin/tesseract"
ocr_language = "eng"

[query]
default_top_k = 5
max_top_k = 100

[logging]
level = "info"
# file = "/var/log/mmrag.log"
"#
    }
}

/// Get the data directory for mmrag.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "mmrag").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the config directory for mmrag.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "mmrag").map(|dirs| dirs.config_dir().to_path_buf())
}
