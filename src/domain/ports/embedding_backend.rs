//! EmbeddingBackend: the optional external vectorizer for FailureIndex.
//! When absent, the index falls back to its built-in token-hash vectorizer.

use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}
