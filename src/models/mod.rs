//! Core data models for the document search system.
//!
//! This module contains the fundamental data structures used across the
//! application: document metadata as stored in the vector database, and the
//! per-request search result view.

use serde::{Deserialize, Serialize};

/// Where a document came from.
///
/// The corpus mixes research papers (OpenAlex) and patents (PatentsView);
/// results carry the category so clients can badge them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    /// Research paper from OpenAlex
    Paper,

    /// Patent from PatentsView
    Patent,
}

impl SourceCategory {
    /// Stable string form, matching the serialized representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::Paper => "paper",
            SourceCategory::Patent => "patent",
        }
    }
}

/// Metadata for a single ingested document.
///
/// Documents are created by the ingestion pipeline and never mutated by the
/// search path. The identifier is unique within the corpus (an OpenAlex work
/// id or a PatentsView patent id) and keys the vector stored alongside this
/// metadata in the collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Corpus-unique identifier
    pub id: String,

    /// Document title
    pub title: String,

    /// Abstract or summary text
    pub abstract_text: String,

    /// Publication or grant year, when the source reported one
    pub year: Option<i32>,

    /// Originating corpus
    pub source: SourceCategory,
}

/// A single search result: document metadata plus its relevance score.
///
/// Constructed fresh for every request, never persisted. The score is the
/// cosine similarity reported by the vector database; callers should rely on
/// its ordering, not its exact numeric mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The document metadata
    pub document: Document,

    /// Cosine similarity to the query embedding (higher is better)
    pub score: f32,
}

impl SearchResult {
    pub fn new(document: Document, score: f32) -> Self {
        Self { document, score }
    }
}
