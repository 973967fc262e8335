//! `LanceDB` implementation of `VectorStore`.

use arrow_array::builder::{FixedSizeListBuilder, Float32Builder};
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray, UInt32Array,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table, connect};
use mmrag_core::{
    FileType, Modality, RecordMetadata, StoreError, StoreStats, StoredHit, VectorRecord,
    VectorStore,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::schema::{collection_schema, table_name, vector_width};
use crate::{check_dimensions, check_query};

/// LanceDB-based vector store with one table per collection.
pub struct LanceStore {
    /// Path to the `LanceDB` database directory
    db_path: PathBuf,
    text_dim: usize,
    image_dim: usize,
    /// Database connection (lazy initialized)
    connection: RwLock<Option<Connection>>,
    /// Open table handles
    tables: RwLock<HashMap<Modality, Table>>,
    /// Serializes writers
    write_lock: Mutex<()>,
}

impl LanceStore {
    /// Create a new `LanceStore`.
    #[must_use]
    pub fn new(db_path: PathBuf, text_dim: usize, image_dim: usize) -> Self {
        Self {
            db_path,
            text_dim,
            image_dim,
            connection: RwLock::new(None),
            tables: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the database path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Reject an existing table whose vectors have a different width.
    async fn check_existing_width(&self, collection: Modality) -> Result<(), StoreError> {
        let table = self.get_table(collection).await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| StoreError::Schema(format!("Failed to read {collection} schema: {e}")))?;
        let actual = vector_width(&schema).ok_or_else(|| {
            StoreError::Schema(format!("{} has no fixed-size vector column", table_name(collection)))
        })?;
        let expected = self.dimension(collection);
        if actual != expected {
            return Err(StoreError::DimensionMismatch {
                collection,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Get or create connection.
    async fn get_connection(&self) -> Result<Connection, StoreError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut conn = self.connection.write().await;
        if let Some(ref c) = *conn {
            return Ok(c.clone());
        }
        let db_path_str = self.db_path.to_string_lossy().to_string();
        let new_conn = connect(&db_path_str)
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to connect to LanceDB: {e}")))?;
        *conn = Some(new_conn.clone());
        Ok(new_conn)
    }

    /// Get or open a collection table.
    async fn get_table(&self, collection: Modality) -> Result<Table, StoreError> {
        {
            let tables = self.tables.read().await;
            if let Some(t) = tables.get(&collection) {
                return Ok(t.clone());
            }
        }

        let conn = self.get_connection().await?;
        let mut tables = self.tables.write().await;
        if let Some(t) = tables.get(&collection) {
            return Ok(t.clone());
        }
        let table = conn
            .open_table(table_name(collection))
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to open {collection} table: {e}")))?;
        tables.insert(collection, table.clone());
        Ok(table)
    }

    /// Convert records to an Arrow `RecordBatch`.
    fn records_to_batch(
        &self,
        collection: Modality,
        records: &[VectorRecord],
    ) -> Result<RecordBatch, StoreError> {
        let dim = self.dimension(collection);
        let schema = Arc::new(collection_schema(dim));

        let ids = StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()));
        let doc_ids =
            StringArray::from_iter_values(records.iter().map(|r| r.metadata.doc_id.to_string()));
        let file_types =
            StringArray::from_iter_values(records.iter().map(|r| r.metadata.file_type.as_str()));
        let source_paths =
            StringArray::from_iter_values(records.iter().map(|r| r.metadata.source_path.as_str()));
        let uploaded_at = StringArray::from_iter_values(
            records.iter().map(|r| r.metadata.uploaded_at.to_rfc3339()),
        );
        let chunk_indices: UInt32Array = records.iter().map(|r| r.metadata.chunk_index).collect();
        let pages: UInt32Array = records.iter().map(|r| r.metadata.page).collect();
        let ocr_texts: StringArray = records
            .iter()
            .map(|r| r.metadata.ocr_text.as_deref())
            .collect();
        let image_paths: StringArray = records
            .iter()
            .map(|r| r.metadata.image_path.as_deref())
            .collect();
        let contents: StringArray = records.iter().map(|r| r.content.as_deref()).collect();
        let vectors = build_vector_array(records.iter().map(|r| r.vector.as_slice()), dim)?;

        let columns: Vec<ArrayRef> = vec![
            Arc::new(ids),
            Arc::new(doc_ids),
            Arc::new(file_types),
            Arc::new(source_paths),
            Arc::new(uploaded_at),
            Arc::new(chunk_indices),
            Arc::new(pages),
            Arc::new(ocr_texts),
            Arc::new(image_paths),
            Arc::new(contents),
            vectors,
        ];

        RecordBatch::try_new(schema, columns)
            .map_err(|e| StoreError::Insert(format!("Failed to build record batch: {e}")))
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn init(&self) -> Result<(), StoreError> {
        info!("Initializing LanceDB at {:?}", self.db_path);

        tokio::fs::create_dir_all(&self.db_path)
            .await
            .map_err(|e| StoreError::Init(format!("Failed to create db directory: {e}")))?;

        let conn = self.get_connection().await?;
        let tables = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to list tables: {e}")))?;

        for collection in Modality::ALL {
            let name = table_name(collection);
            if tables.iter().any(|t| t == name) {
                self.check_existing_width(collection).await?;
                continue;
            }
            info!("Creating {} table", name);
            let schema = Arc::new(collection_schema(self.dimension(collection)));
            conn.create_empty_table(name, schema)
                .execute()
                .await
                .map_err(|e| StoreError::Init(format!("Failed to create {name} table: {e}")))?;
        }

        info!("LanceDB initialized successfully");
        Ok(())
    }

    fn dimension(&self, collection: Modality) -> usize {
        match collection {
            Modality::Text => self.text_dim,
            Modality::Image => self.image_dim,
        }
    }

    async fn upsert(&self, collection: Modality, records: &[VectorRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        check_dimensions(collection, self.dimension(collection), records)?;

        debug!("Upserting {} records into {}", records.len(), collection);

        let table = self.get_table(collection).await?;
        let batch = self.records_to_batch(collection, records)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let _guard = self.write_lock.lock().await;
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(batches))
            .await
            .map_err(|e| StoreError::Insert(format!("Failed to upsert records: {e}")))?;

        debug!("Successfully upserted {} records", records.len());
        Ok(())
    }

    async fn query(
        &self,
        collection: Modality,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<StoredHit>, StoreError> {
        check_query(collection, self.dimension(collection), vector, top_k)?;

        let table = self.get_table(collection).await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count rows: {e}")))?;
        if rows == 0 {
            return Ok(Vec::new());
        }

        let mut results = table
            .vector_search(vector.to_vec())
            .map_err(|e| StoreError::Query(format!("Failed to create search query: {e}")))?
            .distance_type(DistanceType::Cosine)
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to execute search: {e}")))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fetch results: {e}")))?
        {
            hits.extend(batch_to_hits(&batch)?);
        }

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);

        debug!("Found {} hits in {}", hits.len(), collection);
        Ok(hits)
    }

    async fn get(&self, collection: Modality, id: &str) -> Result<Option<VectorRecord>, StoreError> {
        let table = self.get_table(collection).await?;
        let mut results = table
            .query()
            .only_if(format!("id = '{}'", id.replace('\'', "''")))
            .limit(1)
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query record: {e}")))?;

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fetch record: {e}")))?
        {
            if let Some(record) = batch_to_records(&batch)?.into_iter().next() {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    async fn count(&self, collection: Modality) -> Result<u64, StoreError> {
        let table = self.get_table(collection).await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count rows: {e}")))?;
        Ok(rows as u64)
    }

    async fn delete_document(&self, collection: Modality, doc_id: &Uuid) -> Result<u64, StoreError> {
        let table = self.get_table(collection).await?;
        let predicate = format!("doc_id = '{doc_id}'");

        let _guard = self.write_lock.lock().await;
        let matching = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| StoreError::Delete(format!("Failed to count records: {e}")))?;
        if matching > 0 {
            table
                .delete(&predicate)
                .await
                .map_err(|e| StoreError::Delete(format!("Failed to delete records: {e}")))?;
        }
        Ok(matching as u64)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        let mut documents = HashSet::new();

        for collection in Modality::ALL {
            let table = self.get_table(collection).await?;
            let mut results = table
                .query()
                .select(Select::columns(&["doc_id"]))
                .execute()
                .await
                .map_err(|e| StoreError::Query(format!("Failed to scan {collection}: {e}")))?;

            let mut rows = 0u64;
            while let Some(batch) = results
                .try_next()
                .await
                .map_err(|e| StoreError::Query(format!("Failed to scan {collection}: {e}")))?
            {
                rows += batch.num_rows() as u64;
                let doc_ids = string_column(&batch, "doc_id")?;
                for i in 0..batch.num_rows() {
                    documents.insert(doc_ids.value(i).to_string());
                }
            }

            match collection {
                Modality::Text => stats.text_records = rows,
                Modality::Image => stats.image_records = rows,
            }
        }

        stats.documents = documents.len() as u64;
        Ok(stats)
    }
}

fn build_vector_array<'a>(
    vectors: impl Iterator<Item = &'a [f32]>,
    dim: usize,
) -> Result<ArrayRef, StoreError> {
    let width = i32::try_from(dim).map_err(|_| StoreError::Schema(format!("dimension {dim} too large")))?;
    let mut builder = FixedSizeListBuilder::new(Float32Builder::new(), width);
    for vector in vectors {
        builder.values().append_slice(vector);
        builder.append(true);
    }
    Ok(Arc::new(builder.finish()))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::Schema(format!("missing column {name}")))
}

fn optional_string(column: Option<&StringArray>, i: usize) -> Option<String> {
    column.and_then(|c| (!c.is_null(i)).then(|| c.value(i).to_string()))
}

fn optional_u32(column: Option<&UInt32Array>, i: usize) -> Option<u32> {
    column.and_then(|c| (!c.is_null(i)).then(|| c.value(i)))
}

/// Decode the metadata and content columns of every row.
fn batch_to_metadata(batch: &RecordBatch) -> Result<Vec<(String, RecordMetadata, Option<String>)>, StoreError> {
    let ids = string_column(batch, "id")?;
    let doc_ids = string_column(batch, "doc_id")?;
    let file_types = string_column(batch, "file_type")?;
    let source_paths = string_column(batch, "source_path")?;
    let uploaded = string_column(batch, "uploaded_at")?;
    let chunk_indices = batch
        .column_by_name("chunk_index")
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
    let pages = batch
        .column_by_name("page")
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
    let ocr_texts = batch
        .column_by_name("ocr_text")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());
    let image_paths = batch
        .column_by_name("image_path")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());
    let contents = batch
        .column_by_name("content")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let doc_id = Uuid::parse_str(doc_ids.value(i))
            .map_err(|e| StoreError::Schema(format!("invalid doc_id: {e}")))?;
        let file_type: FileType = file_types.value(i).parse().map_err(StoreError::Schema)?;
        let uploaded_at = DateTime::parse_from_rfc3339(uploaded.value(i))
            .map_err(|e| StoreError::Schema(format!("invalid uploaded_at: {e}")))?
            .with_timezone(&Utc);

        let metadata = RecordMetadata {
            doc_id,
            file_type,
            source_path: source_paths.value(i).to_string(),
            uploaded_at,
            chunk_index: optional_u32(chunk_indices, i),
            page: optional_u32(pages, i),
            ocr_text: optional_string(ocr_texts, i),
            image_path: optional_string(image_paths, i),
        };
        rows.push((ids.value(i).to_string(), metadata, optional_string(contents, i)));
    }
    Ok(rows)
}

fn batch_to_hits(batch: &RecordBatch) -> Result<Vec<StoredHit>, StoreError> {
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| StoreError::Query("Missing _distance column".to_string()))?;

    Ok(batch_to_metadata(batch)?
        .into_iter()
        .enumerate()
        .map(|(i, (id, metadata, content))| StoredHit {
            id,
            distance: distances.value(i),
            metadata,
            content,
        })
        .collect())
}

fn batch_to_records(batch: &RecordBatch) -> Result<Vec<VectorRecord>, StoreError> {
    let vectors = batch
        .column_by_name("vector")
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
        .ok_or_else(|| StoreError::Schema("missing vector column".to_string()))?;

    batch_to_metadata(batch)?
        .into_iter()
        .enumerate()
        .map(|(i, (id, metadata, content))| {
            let values = vectors.value(i);
            let values = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| StoreError::Schema("vector items are not f32".to_string()))?;
            Ok(VectorRecord {
                id,
                vector: values.values().to_vec(),
                metadata,
                content,
            })
        })
        .collect()
}
