use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::index::DocumentIndex;
use crate::ollama::TextGenerator;

/// Answers a question from the single most similar stored document.
pub struct QueryService {
    index: Arc<dyn DocumentIndex>,
    generator: Arc<dyn TextGenerator>,
    model: String,
}

impl QueryService {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        generator: Arc<dyn TextGenerator>,
        model: String,
    ) -> Self {
        Self {
            index,
            generator,
            model,
        }
    }

    /// Retrieve the top-1 document, fold it into the prompt and generate.
    ///
    /// A miss on the index is not an error: the prompt is built with an
    /// empty context. Collaborator failures propagate to the caller.
    pub async fn answer(&self, question: &str) -> Result<String> {
        let matches = self
            .index
            .query(question, 1)
            .await
            .context("Vector index query failed")?;

        let context = matches.first().map(|doc| doc.content.as_str()).unwrap_or("");
        debug!("Retrieved {} byte context for question", context.len());

        let prompt = build_prompt(context, question);

        self.generator
            .generate(&self.model, &prompt)
            .await
            .context("Generation request failed")
    }
}

fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer clearly and concisely:",
        context, question
    )
}
