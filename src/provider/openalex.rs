//! OpenAlex research-paper provider.
//!
//! Pages through the OpenAlex `/works` endpoint for a set of search terms,
//! keeping journal articles that carry an abstract. OpenAlex returns
//! abstracts as an inverted index (word → positions); the provider
//! reconstructs the plain text before handing documents to the pipeline.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{DocumentProvider, ProviderError, ProviderResult};
use crate::embedding::normalize_text;
use crate::models::{Document, SourceCategory};

/// Public OpenAlex API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// Maximum page size the API accepts.
const PER_PAGE: usize = 200;

/// Delay between result pages; OpenAlex asks for polite pacing.
const PAGE_DELAY: Duration = Duration::from_millis(500);

/// Delay between distinct search terms.
const TERM_DELAY: Duration = Duration::from_secs(2);

/// Works with shorter abstracts carry too little signal to embed.
const MIN_ABSTRACT_CHARS: usize = 50;

const MIN_TITLE_CHARS: usize = 10;

#[derive(Debug, Deserialize)]
struct WorksPage {
    results: Vec<Work>,
}

/// The subset of an OpenAlex work record this provider reads.
#[derive(Debug, Deserialize)]
struct Work {
    id: Option<String>,
    title: Option<String>,
    publication_date: Option<String>,
    abstract_inverted_index: Option<HashMap<String, Vec<u32>>>,
}

/// OpenAlex-backed document provider.
pub struct OpenAlexProvider {
    client: reqwest::Client,
    base_url: String,
    search_terms: Vec<String>,
    max_per_term: usize,
}

impl OpenAlexProvider {
    /// Create a provider fetching up to `max_per_term` works for each of the
    /// given search terms.
    pub fn new(search_terms: Vec<String>, max_per_term: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("techdoc-search/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            search_terms,
            max_per_term,
        }
    }

    /// Point the provider at a different API root (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_term(&self, term: &str) -> ProviderResult<Vec<Work>> {
        let mut works: Vec<Work> = Vec::new();
        let mut page = 1usize;

        while works.len() < self.max_per_term {
            let per_page = PER_PAGE.min(self.max_per_term - works.len());
            debug!(term, page, per_page, "fetching OpenAlex page");

            let response = self
                .client
                .get(format!("{}/works", self.base_url))
                .query(&[
                    ("search", term),
                    ("filter", "type:journal-article,has_abstract:true"),
                    ("sort", "cited_by_count:desc"),
                    ("per-page", per_page.to_string().as_str()),
                    ("page", page.to_string().as_str()),
                ])
                .send()
                .await
                .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

            if !response.status().is_success() {
                return Err(ProviderError::ApiError(format!(
                    "OpenAlex returned {} for term '{term}'",
                    response.status()
                )));
            }

            let body: WorksPage = response
                .json()
                .await
                .map_err(|e| ProviderError::ParseError(e.to_string()))?;

            if body.results.is_empty() {
                break;
            }

            let fetched = body.results.len();
            works.extend(body.results);

            if fetched < per_page {
                break;
            }

            page += 1;
            tokio::time::sleep(PAGE_DELAY).await;
        }

        Ok(works)
    }
}

#[async_trait]
impl DocumentProvider for OpenAlexProvider {
    async fn fetch_documents(&self) -> ProviderResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut seen_titles = HashSet::new();

        for (i, term) in self.search_terms.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(TERM_DELAY).await;
            }

            let works = self.fetch_term(term).await?;
            let before = documents.len();

            for work in &works {
                let Some(document) = document_from_work(work) else {
                    continue;
                };
                if seen_titles.insert(normalize_text(&document.title)) {
                    documents.push(document);
                }
            }

            info!(
                term,
                fetched = works.len(),
                kept = documents.len() - before,
                "OpenAlex term done"
            );
        }

        if documents.is_empty() {
            warn!("OpenAlex returned no usable works");
        }

        Ok(documents)
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }
}

/// Rebuild plain abstract text from OpenAlex's inverted index.
///
/// The index maps each word to the list of positions it occupies; sorting
/// (position, word) pairs restores the original order.
fn reconstruct_abstract(index: &HashMap<String, Vec<u32>>) -> String {
    let mut words: Vec<(u32, &str)> = Vec::new();
    for (word, positions) in index {
        for &position in positions {
            words.push((position, word.as_str()));
        }
    }
    words.sort();

    words
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Convert a raw work into a document, or `None` when it lacks a usable id,
/// title, or abstract.
fn document_from_work(work: &Work) -> Option<Document> {
    let title = work.title.as_deref()?.trim();
    if title.chars().count() <= MIN_TITLE_CHARS {
        return None;
    }

    let abstract_text = reconstruct_abstract(work.abstract_inverted_index.as_ref()?);
    if abstract_text.chars().count() < MIN_ABSTRACT_CHARS {
        return None;
    }

    // OpenAlex ids are URLs like https://openalex.org/W2100837269
    let id = work.id.as_deref()?.rsplit('/').next()?.trim();
    if id.is_empty() {
        return None;
    }

    let year = work.publication_date.as_deref().and_then(parse_year);

    Some(Document {
        id: id.to_string(),
        title: title.to_string(),
        abstract_text,
        year,
        source: SourceCategory::Paper,
    })
}

/// Year prefix of an ISO date string (`2016-06-27` → 2016).
fn parse_year(date: &str) -> Option<i32> {
    date.split('-').next()?.parse().ok()
}
