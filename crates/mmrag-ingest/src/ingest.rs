//! Upload ingestion: detect → store original → extract → embed → upsert.

use mmrag_core::{
    Document, Error, FileStore, FileType, Fragment, IngestReport, Modality, RecordMetadata,
    Result, Upload, VectorRecord, VectorStore, image_id, pdf_page_id, pdf_text_id, text_chunk_id,
};
use mmrag_embed::EmbeddingProvider;
use mmrag_extract::{Extractors, SourceFile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::files::sanitize_file_name;

/// Storage key of an uploaded original.
pub fn upload_key(doc_id: &Uuid, file_name: &str) -> String {
    format!("uploads/{doc_id}/{file_name}")
}

/// Storage key of a rendered PDF page.
pub fn page_key(doc_id: &Uuid, page: u32) -> String {
    format!("extracted/{doc_id}/page{page}.png")
}

struct TextPart {
    text: String,
    chunk_index: u32,
    page: Option<u32>,
}

struct ImagePart {
    data: Vec<u8>,
    page: Option<u32>,
    ocr_text: String,
}

/// The only writer of the vector store.
pub struct IngestionPipeline {
    /// Vector store
    store: Arc<dyn VectorStore>,
    /// Durable storage for originals and rendered pages
    files: Arc<dyn FileStore>,
    /// Embedding provider
    embedder: EmbeddingProvider,
    /// Per-format extractors
    extractors: Arc<Extractors>,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        files: Arc<dyn FileStore>,
        embedder: EmbeddingProvider,
        extractors: Arc<Extractors>,
    ) -> Self {
        Self {
            store,
            files,
            embedder,
            extractors,
        }
    }

    /// Ingest one upload.
    ///
    /// The upload's type is checked before anything is written. Every
    /// embedding is computed before the first upsert; if the image upsert
    /// fails after text records were written, those text records are
    /// deleted again. Files written for a failed upload are removed.
    ///
    /// # Errors
    ///
    /// `UnsupportedFormat` for anything but text, PNG/JPEG and PDF, or the
    /// first extraction, embedding, storage or I/O failure.
    pub async fn ingest(&self, upload: Upload) -> Result<IngestReport> {
        let file_type = FileType::detect(upload.content_type.as_deref(), &upload.file_name)
            .ok_or_else(|| {
                Error::UnsupportedFormat(format!(
                    "{} ({})",
                    upload.file_name,
                    upload.content_type.as_deref().unwrap_or("no content type")
                ))
            })?;

        info!(
            "Ingesting {} as {} ({} bytes)",
            upload.file_name,
            file_type,
            upload.data.len()
        );

        let file_name = sanitize_file_name(&upload.file_name);
        let mut doc = Document::new(file_type, PathBuf::new());
        doc.source_path = self
            .files
            .put(&upload_key(&doc.doc_id, &file_name), &upload.data)
            .await?;

        match self.process(&doc, &upload.data).await {
            Ok(report) => {
                info!(
                    "Ingested {} as {} ({} chunks, {} images, {} OCR chars)",
                    upload.file_name,
                    doc.doc_id,
                    report.chunk_count,
                    report.image_count,
                    report.ocr_chars
                );
                Ok(report)
            }
            Err(e) => {
                error!("Failed to ingest {}: {}", upload.file_name, e);
                self.discard_files(&doc.doc_id).await;
                Err(e)
            }
        }
    }

    async fn process(&self, doc: &Document, data: &[u8]) -> Result<IngestReport> {
        let fragments = self
            .extractors
            .extract(SourceFile::new(doc.file_type, data))
            .await?;
        let (texts, images) = partition(fragments);
        debug!(
            "Extracted {} text fragments and {} images from {}",
            texts.len(),
            images.len(),
            doc.doc_id
        );

        let text_inputs: Vec<&str> = texts.iter().map(|t| t.text.as_str()).collect();
        let text_vectors = self.embedder.embed_text(&text_inputs).await?;
        let image_inputs: Vec<&[u8]> = images.iter().map(|i| i.data.as_slice()).collect();
        let image_vectors = self.embedder.embed_image(&image_inputs).await?;

        let text_records: Vec<VectorRecord> = texts
            .into_iter()
            .zip(text_vectors)
            .map(|(part, vector)| text_record(doc, part, vector))
            .collect();

        let mut ocr_chars = 0;
        let mut image_records = Vec::with_capacity(images.len());
        for (part, vector) in images.into_iter().zip(image_vectors) {
            let image_path = match part.page {
                Some(page) => {
                    self.files
                        .put(&page_key(&doc.doc_id, page), &part.data)
                        .await?
                }
                None => doc.source_path.clone(),
            };
            ocr_chars += part.ocr_text.chars().count();
            image_records.push(image_record(doc, part, vector, &image_path));
        }

        if !text_records.is_empty() {
            self.store.upsert(Modality::Text, &text_records).await?;
        }
        if !image_records.is_empty() {
            if let Err(e) = self.store.upsert(Modality::Image, &image_records).await {
                if !text_records.is_empty() {
                    self.rollback_text(&doc.doc_id).await;
                }
                return Err(e.into());
            }
        }

        Ok(IngestReport {
            doc_id: doc.doc_id,
            file_type: doc.file_type,
            source_path: doc.source_path.clone(),
            chunk_count: text_records.len(),
            image_count: image_records.len(),
            ocr_chars,
        })
    }

    async fn rollback_text(&self, doc_id: &Uuid) {
        match self.store.delete_document(Modality::Text, doc_id).await {
            Ok(removed) => warn!("Rolled back {} text records of {}", removed, doc_id),
            Err(e) => warn!("Failed to roll back text records of {}: {}", doc_id, e),
        }
    }

    async fn discard_files(&self, doc_id: &Uuid) {
        for prefix in [format!("uploads/{doc_id}"), format!("extracted/{doc_id}")] {
            if let Err(e) = self.files.delete_prefix(&prefix).await {
                warn!("Failed to remove {}: {}", prefix, e);
            }
        }
    }
}

fn partition(fragments: Vec<Fragment>) -> (Vec<TextPart>, Vec<ImagePart>) {
    let mut texts = Vec::new();
    let mut images = Vec::new();
    for fragment in fragments {
        match fragment {
            Fragment::Text {
                text,
                chunk_index,
                page,
            } => texts.push(TextPart {
                text,
                chunk_index,
                page,
            }),
            Fragment::Image {
                data,
                page,
                ocr_text,
                ..
            } => images.push(ImagePart {
                data,
                page,
                ocr_text,
            }),
        }
    }
    (texts, images)
}

fn text_record(doc: &Document, part: TextPart, vector: Vec<f32>) -> VectorRecord {
    let id = match part.page {
        Some(page) => pdf_text_id(&doc.doc_id, page, part.chunk_index),
        None => text_chunk_id(&doc.doc_id, part.chunk_index),
    };
    let mut metadata = RecordMetadata::for_document(doc);
    metadata.chunk_index = Some(part.chunk_index);
    metadata.page = part.page;

    VectorRecord {
        id,
        vector,
        metadata,
        content: Some(part.text),
    }
}

fn image_record(doc: &Document, part: ImagePart, vector: Vec<f32>, image_path: &Path) -> VectorRecord {
    let id = match part.page {
        Some(page) => pdf_page_id(&doc.doc_id, page),
        None => image_id(&doc.doc_id),
    };
    let mut metadata = RecordMetadata::for_document(doc);
    metadata.page = part.page;
    metadata.ocr_text = Some(part.ocr_text);
    metadata.image_path = Some(image_path.to_string_lossy().into_owned());

    VectorRecord {
        id,
        vector,
        metadata,
        content: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::LocalFileStore;
    use async_trait::async_trait;
    use mmrag_core::{
        EmbedError, Embedder, EmbeddingConfig, ExtractError, StoreError, StoreStats, StoredHit,
    };
    use mmrag_embed::HashEmbedder;
    use mmrag_extract::testing::{PngPageRenderer, build_pdf, test_png};
    use mmrag_extract::{DisabledOcr, OcrEngine, OcrError};
    use mmrag_store::MemoryStore;
    use tempfile::{TempDir, tempdir};

    const TEXT_DIM: usize = 64;
    const IMAGE_DIM: usize = 32;

    // ==================== Mocks ====================

    struct FixedOcr(&'static str);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize(&self, _image_data: &[u8]) -> std::result::Result<String, OcrError> {
            Ok(self.0.to_string())
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    /// An encoder whose weights never load.
    struct UnavailableEmbedder {
        dimension: usize,
    }

    #[async_trait]
    impl Embedder for UnavailableEmbedder {
        fn model_name(&self) -> &str {
            "unavailable"
        }
        fn dimension(&self) -> usize {
            self.dimension
        }
        fn modalities(&self) -> &[Modality] {
            &[Modality::Text, Modality::Image]
        }
        async fn embed_text(
            &self,
            _texts: &[&str],
            _config: &EmbeddingConfig,
        ) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
            Err(EmbedError::ModelUnavailable("weights not downloaded".to_string()))
        }
        async fn embed_image(
            &self,
            _image_data: &[u8],
            _config: &EmbeddingConfig,
        ) -> std::result::Result<Vec<f32>, EmbedError> {
            Err(EmbedError::ModelUnavailable("weights not downloaded".to_string()))
        }
    }

    /// Delegates to a `MemoryStore` but refuses image writes.
    struct FailingImageStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl VectorStore for FailingImageStore {
        async fn init(&self) -> std::result::Result<(), StoreError> {
            self.inner.init().await
        }
        fn dimension(&self, collection: Modality) -> usize {
            self.inner.dimension(collection)
        }
        async fn upsert(
            &self,
            collection: Modality,
            records: &[VectorRecord],
        ) -> std::result::Result<(), StoreError> {
            match collection {
                Modality::Image => Err(StoreError::Insert("disk full".to_string())),
                Modality::Text => self.inner.upsert(collection, records).await,
            }
        }
        async fn query(
            &self,
            collection: Modality,
            vector: &[f32],
            top_k: usize,
        ) -> std::result::Result<Vec<StoredHit>, StoreError> {
            self.inner.query(collection, vector, top_k).await
        }
        async fn get(
            &self,
            collection: Modality,
            id: &str,
        ) -> std::result::Result<Option<VectorRecord>, StoreError> {
            self.inner.get(collection, id).await
        }
        async fn count(&self, collection: Modality) -> std::result::Result<u64, StoreError> {
            self.inner.count(collection).await
        }
        async fn delete_document(
            &self,
            collection: Modality,
            doc_id: &Uuid,
        ) -> std::result::Result<u64, StoreError> {
            self.inner.delete_document(collection, doc_id).await
        }
        async fn stats(&self) -> std::result::Result<StoreStats, StoreError> {
            self.inner.stats().await
        }
    }

    // ==================== Helpers ====================

    fn provider() -> EmbeddingProvider {
        EmbeddingProvider::new(
            Arc::new(HashEmbedder::new(TEXT_DIM)),
            Arc::new(HashEmbedder::cross_modal(IMAGE_DIM)),
        )
        .unwrap()
    }

    fn pipeline_with(
        store: Arc<dyn VectorStore>,
        ocr: Arc<dyn OcrEngine>,
    ) -> (TempDir, IngestionPipeline) {
        pipeline_with_embedder(store, ocr, provider())
    }

    fn pipeline_with_embedder(
        store: Arc<dyn VectorStore>,
        ocr: Arc<dyn OcrEngine>,
        embedder: EmbeddingProvider,
    ) -> (TempDir, IngestionPipeline) {
        let temp = tempdir().unwrap();
        let files = Arc::new(LocalFileStore::new(temp.path()));
        let extractors = Arc::new(Extractors::new(ocr, Arc::new(PngPageRenderer), 2.0));
        let pipeline = IngestionPipeline::new(store, files, embedder, extractors);
        (temp, pipeline)
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_ingest_text_file() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let (temp, pipeline) = pipeline_with(store.clone(), Arc::new(DisabledOcr));

        let upload = Upload::new(
            "notes.txt",
            b"First paragraph.\n\nSecond paragraph.\n\n\n\nThird.".to_vec(),
        );
        let report = pipeline.ingest(upload).await.unwrap();

        assert_eq!(report.file_type, FileType::Text);
        assert_eq!(report.chunk_count, 3);
        assert_eq!(report.image_count, 0);
        assert_eq!(store.count(Modality::Text).await.unwrap(), 3);
        assert_eq!(store.count(Modality::Image).await.unwrap(), 0);

        let expected_path = temp
            .path()
            .join(format!("uploads/{}/notes.txt", report.doc_id));
        assert_eq!(report.source_path, expected_path);
        assert!(expected_path.exists());

        for i in 0..3u32 {
            let record = store
                .get(Modality::Text, &text_chunk_id(&report.doc_id, i))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(record.metadata.chunk_index, Some(i));
            assert_eq!(record.metadata.page, None);
            assert_eq!(record.metadata.file_type, FileType::Text);
            assert_eq!(record.vector.len(), TEXT_DIM);
        }
        let last = store
            .get(Modality::Text, &text_chunk_id(&report.doc_id, 2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.content.as_deref(), Some("Third."));
    }

    #[tokio::test]
    async fn test_ingest_image_with_ocr() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let (_temp, pipeline) = pipeline_with(store.clone(), Arc::new(FixedOcr("INVOICE 42")));

        let upload = Upload::new("blob", test_png(0)).with_content_type("image/png");
        let report = pipeline.ingest(upload).await.unwrap();

        assert_eq!(report.file_type, FileType::Image);
        assert_eq!(report.chunk_count, 0);
        assert_eq!(report.image_count, 1);
        assert_eq!(report.ocr_chars, "INVOICE 42".len());

        let record = store
            .get(Modality::Image, &image_id(&report.doc_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.metadata.ocr_text.as_deref(), Some("INVOICE 42"));
        assert_eq!(record.metadata.page, None);
        assert_eq!(
            record.metadata.image_path.as_deref(),
            Some(report.source_path.to_string_lossy().as_ref())
        );
        assert_eq!(record.vector.len(), IMAGE_DIM);
    }

    #[tokio::test]
    async fn test_ingest_image_without_ocr() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let (_temp, pipeline) = pipeline_with(store.clone(), Arc::new(DisabledOcr));

        let report = pipeline
            .ingest(Upload::new("photo.png", test_png(0)))
            .await
            .unwrap();

        assert_eq!(report.ocr_chars, 0);
        let record = store
            .get(Modality::Image, &image_id(&report.doc_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.metadata.ocr_text.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_unsupported_format_writes_nothing() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let (temp, pipeline) = pipeline_with(store.clone(), Arc::new(DisabledOcr));

        let upload = Upload::new("archive.zip", vec![1, 2, 3]).with_content_type("application/zip");
        let result = pipeline.ingest(upload).await;

        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
        assert!(!temp.path().join("uploads").exists());
        assert_eq!(store.stats().await.unwrap().documents, 0);
    }

    #[tokio::test]
    async fn test_empty_text_fails_and_removes_upload() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let (temp, pipeline) = pipeline_with(store.clone(), Arc::new(DisabledOcr));

        let result = pipeline.ingest(Upload::new("empty.txt", b"  \n\n ".to_vec())).await;

        assert!(matches!(result, Err(Error::Extraction(ExtractError::Empty(_)))));
        assert_eq!(entries(&temp.path().join("uploads")), 0);
    }

    #[tokio::test]
    async fn test_corrupt_image_is_extraction_failure() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let (_temp, pipeline) = pipeline_with(store.clone(), Arc::new(DisabledOcr));

        let result = pipeline
            .ingest(Upload::new("broken.jpg", b"not a jpeg".to_vec()))
            .await;

        assert!(matches!(result, Err(Error::Extraction(_))));
        assert_eq!(store.count(Modality::Image).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_image_write_failure_surfaces() {
        let store = Arc::new(FailingImageStore {
            inner: MemoryStore::new(TEXT_DIM, IMAGE_DIM),
        });
        let (_temp, pipeline) = pipeline_with(store.clone(), Arc::new(DisabledOcr));

        let result = pipeline
            .ingest(Upload::new("photo.png", test_png(0)))
            .await;

        assert!(matches!(result, Err(Error::Store(StoreError::Insert(_)))));
        assert_eq!(store.count(Modality::Image).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_pdf_pages() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let (temp, pipeline) = pipeline_with(store.clone(), Arc::new(FixedOcr("scanned")));

        let pdf = build_pdf(&[Some("Page one text"), None, Some("Page three text")]);
        let report = pipeline.ingest(Upload::new("report.pdf", pdf)).await.unwrap();

        assert_eq!(report.file_type, FileType::Pdf);
        assert_eq!(report.chunk_count, 2);
        assert_eq!(report.image_count, 3);
        assert_eq!(report.ocr_chars, 3 * "scanned".len());

        let first = store
            .get(Modality::Text, &pdf_text_id(&report.doc_id, 0, 0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.metadata.page, Some(0));
        assert!(first.content.unwrap().contains("Page one"));

        let last = store
            .get(Modality::Text, &pdf_text_id(&report.doc_id, 2, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last.metadata.chunk_index, Some(1));

        for page in 0..3u32 {
            let record = store
                .get(Modality::Image, &pdf_page_id(&report.doc_id, page))
                .await
                .unwrap()
                .unwrap();
            let expected = temp.path().join(page_key(&report.doc_id, page));
            assert_eq!(
                record.metadata.image_path.as_deref(),
                Some(expected.to_string_lossy().as_ref())
            );
            assert!(expected.exists());
            assert_eq!(record.metadata.file_type, FileType::Pdf);
        }
    }

    #[tokio::test]
    async fn test_image_write_failure_rolls_back_text() {
        let store = Arc::new(FailingImageStore {
            inner: MemoryStore::new(TEXT_DIM, IMAGE_DIM),
        });
        let (temp, pipeline) = pipeline_with(store.clone(), Arc::new(DisabledOcr));

        let pdf = build_pdf(&[Some("Some text")]);
        let result = pipeline.ingest(Upload::new("doc.pdf", pdf)).await;

        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(store.count(Modality::Text).await.unwrap(), 0);
        assert_eq!(entries(&temp.path().join("extracted")), 0);
    }

    #[tokio::test]
    async fn test_model_unavailable_aborts_document() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let embedder = EmbeddingProvider::new(
            Arc::new(UnavailableEmbedder { dimension: TEXT_DIM }),
            Arc::new(UnavailableEmbedder { dimension: IMAGE_DIM }),
        )
        .unwrap();
        let (temp, pipeline) =
            pipeline_with_embedder(store.clone(), Arc::new(DisabledOcr), embedder);

        let result = pipeline
            .ingest(Upload::new("notes.txt", b"First.\n\nSecond.".to_vec()))
            .await;

        assert!(matches!(
            result,
            Err(Error::Embedding(EmbedError::ModelUnavailable(_)))
        ));
        assert_eq!(store.count(Modality::Text).await.unwrap(), 0);
        assert_eq!(store.count(Modality::Image).await.unwrap(), 0);
        assert_eq!(entries(&temp.path().join("uploads")), 0);
    }

    #[tokio::test]
    async fn test_image_model_unavailable_writes_no_text() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let embedder = EmbeddingProvider::new(
            Arc::new(HashEmbedder::new(TEXT_DIM)),
            Arc::new(UnavailableEmbedder { dimension: IMAGE_DIM }),
        )
        .unwrap();
        let (temp, pipeline) =
            pipeline_with_embedder(store.clone(), Arc::new(DisabledOcr), embedder);

        let pdf = build_pdf(&[Some("Text that embeds fine"), None]);
        let result = pipeline.ingest(Upload::new("paper.pdf", pdf)).await;

        assert!(matches!(
            result,
            Err(Error::Embedding(EmbedError::ModelUnavailable(_)))
        ));
        assert_eq!(store.count(Modality::Text).await.unwrap(), 0);
        assert_eq!(store.count(Modality::Image).await.unwrap(), 0);
        assert_eq!(entries(&temp.path().join("uploads")), 0);
        assert_eq!(entries(&temp.path().join("extracted")), 0);
    }

    #[tokio::test]
    async fn test_reupload_gets_new_doc_id() {
        let store = Arc::new(MemoryStore::new(TEXT_DIM, IMAGE_DIM));
        let (_temp, pipeline) = pipeline_with(store.clone(), Arc::new(DisabledOcr));

        let first = pipeline
            .ingest(Upload::new("a.txt", b"same text".to_vec()))
            .await
            .unwrap();
        let second = pipeline
            .ingest(Upload::new("a.txt", b"same text".to_vec()))
            .await
            .unwrap();

        assert_ne!(first.doc_id, second.doc_id);
        assert_eq!(store.count(Modality::Text).await.unwrap(), 2);
        assert_eq!(store.stats().await.unwrap().documents, 2);
    }

    #[test]
    fn test_record_ids() {
        let doc = Document::new(FileType::Pdf, PathBuf::from("/tmp/a.pdf"));
        let text = text_record(
            &doc,
            TextPart {
                text: "hi".to_string(),
                chunk_index: 4,
                page: Some(2),
            },
            vec![1.0],
        );
        assert_eq!(text.id, format!("pdftext::{}::p2::c4", doc.doc_id));

        let image = image_record(
            &doc,
            ImagePart {
                data: Vec::new(),
                page: Some(2),
                ocr_text: String::new(),
            },
            vec![1.0],
            Path::new("/tmp/page2.png"),
        );
        assert_eq!(image.id, format!("pdfimg::{}::p2", doc.doc_id));
        assert_eq!(image.metadata.image_path.as_deref(), Some("/tmp/page2.png"));
        assert_eq!(image.metadata.chunk_index, None);
    }

    #[test]
    fn test_storage_keys() {
        let doc_id = Uuid::nil();
        assert_eq!(
            upload_key(&doc_id, "a.pdf"),
            "uploads/00000000-0000-0000-0000-000000000000/a.pdf"
        );
        assert_eq!(
            page_key(&doc_id, 3),
            "extracted/00000000-0000-0000-0000-000000000000/page3.png"
        );
    }
}
