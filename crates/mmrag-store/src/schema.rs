//! Arrow schema for the per-modality `LanceDB` tables.

use arrow_schema::{DataType, Field, Schema};
use mmrag_core::Modality;
use std::sync::Arc;

/// Table backing a collection.
#[must_use]
pub fn table_name(collection: Modality) -> &'static str {
    match collection {
        Modality::Text => "documents_text",
        Modality::Image => "documents_image",
    }
}

/// Schema shared by both collections; only the vector width differs.
#[must_use]
pub fn collection_schema(embedding_dim: usize) -> Schema {
    Schema::new(vec![
        // Identity
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        // Document metadata
        Field::new("file_type", DataType::Utf8, false),
        Field::new("source_path", DataType::Utf8, false),
        Field::new("uploaded_at", DataType::Utf8, false),
        // Position
        Field::new("chunk_index", DataType::UInt32, true),
        Field::new("page", DataType::UInt32, true),
        // Image metadata
        Field::new("ocr_text", DataType::Utf8, true),
        Field::new("image_path", DataType::Utf8, true),
        // Chunk text
        Field::new("content", DataType::Utf8, true),
        // Embedding
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                i32::try_from(embedding_dim).unwrap_or(i32::MAX),
            ),
            false,
        ),
    ])
}

/// Width of the `vector` column, if the schema has one.
#[must_use]
pub fn vector_width(schema: &Schema) -> Option<usize> {
    match schema.field_with_name("vector").ok()?.data_type() {
        DataType::FixedSizeList(_, width) => usize::try_from(*width).ok(),
        _ => None,
    }
}
