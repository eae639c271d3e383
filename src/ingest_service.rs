use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

use crate::index::DocumentIndex;

/// Stores ad-hoc documents in the index under fresh identifiers.
pub struct IngestService {
    index: Arc<dyn DocumentIndex>,
}

impl IngestService {
    pub fn new(index: Arc<dyn DocumentIndex>) -> Self {
        Self { index }
    }

    /// Insert one document and return its generated identifier.
    ///
    /// Not idempotent: the same text stored twice gets two ids and two rows.
    pub async fn ingest(&self, text: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();

        self.index
            .add_document(&id, text)
            .await
            .context("Vector index insert failed")?;

        info!("Stored document {}", id);
        Ok(id)
    }
}
