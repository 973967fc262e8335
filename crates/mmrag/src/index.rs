//! Which embedding models built the vector index.
//!
//! Vectors from different models live in unrelated spaces even when their
//! widths agree (the `hash` backend uses MiniLM's and CLIP's widths), so the
//! model ids are recorded next to the tables and checked on every open.

use anyhow::{Context, Result};
use mmrag_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the record, inside the vector database directory.
pub const MANIFEST_FILE: &str = "models.json";

/// Model ids of the text and image collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexModels {
    pub text_model: String,
    pub image_model: String,
}

impl IndexModels {
    /// The models an embedding provider would write with.
    pub fn of(embedder: &EmbeddingProvider) -> Self {
        Self {
            text_model: embedder.text_model().to_string(),
            image_model: embedder.image_model().to_string(),
        }
    }

    /// Fail if `db_path` was built with other models; record these on first use.
    pub fn check_or_record(&self, db_path: &Path) -> Result<()> {
        let path = db_path.join(MANIFEST_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let recorded: Self = serde_json::from_str(&raw)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                if recorded != *self {
                    anyhow::bail!(
                        "vectors in {} were built with {} / {}, but {} / {} is configured; \
                         use another storage.data_dir or re-ingest into an empty one",
                        db_path.display(),
                        recorded.text_model,
                        recorded.image_model,
                        self.text_model,
                        self.image_model
                    );
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                std::fs::create_dir_all(db_path)
                    .with_context(|| format!("Failed to create {}", db_path.display()))?;
                std::fs::write(&path, serde_json::to_string_pretty(self)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn models(text: &str, image: &str) -> IndexModels {
        IndexModels {
            text_model: text.to_string(),
            image_model: image.to_string(),
        }
    }

    #[test]
    fn test_first_open_records_models() {
        let temp = tempdir().unwrap();
        let db = temp.path().join("vectors");
        let local = models(
            "sentence-transformers/all-MiniLM-L6-v2",
            "openai/clip-vit-base-patch32",
        );

        local.check_or_record(&db).unwrap();
        assert!(db.join(MANIFEST_FILE).exists());
        local.check_or_record(&db).unwrap();
    }

    #[test]
    fn test_other_models_rejected() {
        let temp = tempdir().unwrap();
        let db = temp.path().join("vectors");
        models("sentence-transformers/all-MiniLM-L6-v2", "openai/clip-vit-base-patch32")
            .check_or_record(&db)
            .unwrap();

        let err = models("hash", "hash").check_or_record(&db).unwrap_err();
        assert!(err.to_string().contains("all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join(MANIFEST_FILE), "{not json").unwrap();
        assert!(models("hash", "hash").check_or_record(temp.path()).is_err());
    }
}
