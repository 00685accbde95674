//! JSON file document provider.
//!
//! Reads a JSON array of documents from disk (the format `ingest fetch`
//! writes), so fetching from the data APIs and loading into the vector
//! store can run as separate steps.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{DocumentProvider, ProviderError, ProviderResult};
use crate::models::Document;

/// Provider over a local JSON file containing `[Document, ...]`.
pub struct JsonFileProvider {
    path: PathBuf,
    documents: Vec<Document>,
}

impl JsonFileProvider {
    /// Read and parse the file eagerly, failing fast on malformed input.
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await?;
        let documents: Vec<Document> = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::ParseError(format!("{}: {e}", path.display())))?;

        Ok(Self { path, documents })
    }

    /// Serialize documents into the file format this provider reads.
    pub fn to_json(documents: &[Document]) -> ProviderResult<String> {
        serde_json::to_string_pretty(documents)
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentProvider for JsonFileProvider {
    async fn fetch_documents(&self) -> ProviderResult<Vec<Document>> {
        Ok(self.documents.clone())
    }

    async fn count_documents(&self) -> ProviderResult<usize> {
        Ok(self.documents.len())
    }

    fn name(&self) -> &str {
        "JSON file"
    }
}
