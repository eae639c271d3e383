use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use tracing::{debug, info};

use crate::ollama::Embedder;

const TABLE_NAME: &str = "docs";

/// A stored document returned from a nearest-neighbor query.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub id: String,
    pub content: String,
    pub score: f32,
}

/// Nearest-neighbor document store, queried and populated with raw text.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn add_document(&self, id: &str, text: &str) -> Result<()>;

    /// Returns up to `limit` stored documents, most similar first.
    async fn query(&self, text: &str, limit: usize) -> Result<Vec<ScoredDocument>>;
}

/// Document index backed by a LanceDB table on local disk.
///
/// Text is embedded through the injected [`Embedder`] on both the insert
/// and the query path, so callers only ever deal in strings.
pub struct KnowledgeIndex {
    connection: Connection,
    embedder: Arc<dyn Embedder>,
    dimension: usize,
}

impl KnowledgeIndex {
    /// Open (or create) the index directory and its `docs` table.
    pub async fn open(dir: &Path, embedder: Arc<dyn Embedder>, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create index directory {}", dir.display()))?;

        let uri = dir.to_string_lossy().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .with_context(|| format!("Failed to open vector index at {}", dir.display()))?;

        let index = Self {
            connection,
            embedder,
            dimension,
        };
        index.ensure_table().await?;

        info!("Vector index ready at {}", dir.display());
        Ok(index)
    }

    async fn ensure_table(&self) -> Result<()> {
        let tables = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list index tables")?;

        if tables.contains(&TABLE_NAME.to_string()) {
            debug!("Index table '{}' already exists", TABLE_NAME);
            return Ok(());
        }

        info!("Creating index table '{}'", TABLE_NAME);
        self.connection
            .create_empty_table(TABLE_NAME, self.schema())
            .execute()
            .await
            .context("Failed to create index table")?;

        Ok(())
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    fn build_batch(&self, id: &str, vector: &[f32], content: &str) -> Result<RecordBatch> {
        let values = Float32Array::from(vector.to_vec());
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(item_field, self.dimension as i32, Arc::new(values), None)
                .context("Failed to build vector column")?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(vec![id])),
            Arc::new(vector_array),
            Arc::new(StringArray::from(vec![content])),
            Arc::new(StringArray::from(vec![chrono::Utc::now().to_rfc3339()])),
        ];

        RecordBatch::try_new(self.schema(), arrays).context("Failed to build record batch")
    }
}

#[async_trait]
impl DocumentIndex for KnowledgeIndex {
    async fn add_document(&self, id: &str, text: &str) -> Result<()> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .context("Failed to embed document")?;

        if vector.len() != self.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            );
        }

        let batch = self.build_batch(id, &vector, text)?;
        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open index table")?;

        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .context("Failed to insert document")?;

        debug!("Stored document {}", id);
        Ok(())
    }

    async fn query(&self, text: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
        let vector = self
            .embedder
            .embed(text)
            .await
            .context("Failed to embed query")?;

        let table = self
            .connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open index table")?;

        let mut stream = table
            .vector_search(vector.as_slice())
            .context("Failed to build vector search")?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let mut documents = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .context("Failed to read search results")?
        {
            documents.extend(parse_batch(&batch)?);
        }

        debug!("Query matched {} document(s)", documents.len());
        Ok(documents)
    }
}

fn parse_batch(batch: &RecordBatch) -> Result<Vec<ScoredDocument>> {
    let ids = batch
        .column_by_name("id")
        .ok_or_else(|| anyhow::anyhow!("Missing id column"))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow::anyhow!("Invalid id column type"))?;

    let contents = batch
        .column_by_name("content")
        .ok_or_else(|| anyhow::anyhow!("Missing content column"))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow::anyhow!("Invalid content column type"))?;

    let distances = batch
        .column_by_name("_distance")
        .map(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut documents = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let distance = distances
            .flatten()
            .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        documents.push(ScoredDocument {
            id: ids.value(row).to_string(),
            content: contents.value(row).to_string(),
            // Convert distance to similarity score (higher is better)
            score: 1.0 - distance,
        });
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_DIMENSION: usize = 8;

    /// Deterministic embedder: folds the text's bytes into the vector so
    /// identical strings map to identical points and most others don't.
    struct ByteFoldEmbedder;

    #[async_trait]
    impl Embedder for ByteFoldEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut vector = vec![0.0f32; TEST_DIMENSION];
            for (i, byte) in text.bytes().enumerate() {
                vector[i % TEST_DIMENSION] += byte as f32 / 255.0;
            }
            Ok(vector)
        }
    }

    struct NarrowEmbedder;

    #[async_trait]
    impl Embedder for NarrowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; 3])
        }
    }

    async fn open_test_index(dir: &TempDir) -> KnowledgeIndex {
        KnowledgeIndex::open(dir.path(), Arc::new(ByteFoldEmbedder), TEST_DIMENSION)
            .await
            .expect("should open index")
    }

    #[tokio::test]
    async fn query_on_empty_index_returns_no_documents() {
        let dir = TempDir::new().expect("should create temp dir");
        let index = open_test_index(&dir).await;

        let results = index.query("anything", 1).await.expect("query should succeed");

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn stored_document_is_returned_by_query() {
        let dir = TempDir::new().expect("should create temp dir");
        let index = open_test_index(&dir).await;

        index
            .add_document("doc-1", "Paris is the capital of France")
            .await
            .expect("should store document");

        let results = index
            .query("Paris is the capital of France", 1)
            .await
            .expect("query should succeed");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "doc-1");
        assert_eq!(results[0].content, "Paris is the capital of France");
    }

    #[tokio::test]
    async fn nearest_document_ranks_first() {
        let dir = TempDir::new().expect("should create temp dir");
        let index = open_test_index(&dir).await;

        index
            .add_document("doc-1", "the quick brown fox")
            .await
            .expect("should store document");
        index
            .add_document("doc-2", "an entirely different sentence about cheese")
            .await
            .expect("should store document");

        let results = index
            .query("the quick brown fox", 2)
            .await
            .expect("query should succeed");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "the quick brown fox");
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn limit_caps_result_count() {
        let dir = TempDir::new().expect("should create temp dir");
        let index = open_test_index(&dir).await;

        for (id, text) in [("a", "first entry"), ("b", "second entry"), ("c", "third entry")] {
            index.add_document(id, text).await.expect("should store document");
        }

        let results = index.query("first entry", 1).await.expect("query should succeed");

        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn mismatched_embedding_dimension_is_rejected() {
        let dir = TempDir::new().expect("should create temp dir");
        let index = KnowledgeIndex::open(dir.path(), Arc::new(NarrowEmbedder), TEST_DIMENSION)
            .await
            .expect("should open index");

        let result = index.add_document("doc-1", "some text").await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn index_persists_across_reopen() {
        let dir = TempDir::new().expect("should create temp dir");

        {
            let index = open_test_index(&dir).await;
            index
                .add_document("doc-1", "durable fact")
                .await
                .expect("should store document");
        }

        let reopened = open_test_index(&dir).await;
        let results = reopened
            .query("durable fact", 1)
            .await
            .expect("query should succeed");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "durable fact");
    }
}
