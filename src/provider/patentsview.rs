//! PatentsView patent provider.
//!
//! Pages through the PatentsView query API. The API takes its query (`q`),
//! field list (`f`), and options (`o`) as JSON-encoded query parameters and
//! answers with a page of patent records.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{DocumentProvider, ProviderError, ProviderResult};
use crate::models::{Document, SourceCategory};

/// Public PatentsView API root.
pub const DEFAULT_BASE_URL: &str = "https://api.patentsview.org";

/// Maximum page size the API accepts.
const PER_PAGE: usize = 1000;

const PAGE_DELAY: Duration = Duration::from_millis(100);

/// Patents with shorter abstracts carry too little signal to embed.
const MIN_ABSTRACT_CHARS: usize = 50;

const REQUESTED_FIELDS: [&str; 4] = [
    "patent_id",
    "patent_title",
    "patent_abstract",
    "patent_date",
];

#[derive(Debug, Deserialize)]
struct PatentsPage {
    #[serde(default)]
    patents: Vec<PatentRecord>,
}

/// The subset of a PatentsView record this provider reads.
#[derive(Debug, Deserialize)]
struct PatentRecord {
    patent_id: Option<String>,
    patent_title: Option<String>,
    patent_abstract: Option<String>,
    patent_date: Option<String>,
}

/// PatentsView-backed document provider.
pub struct PatentsViewProvider {
    client: reqwest::Client,
    base_url: String,
    search_term: String,
    max_results: usize,
}

impl PatentsViewProvider {
    /// Create a provider fetching up to `max_results` patents whose titles
    /// match the search term.
    pub fn new(search_term: impl Into<String>, max_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("techdoc-search/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            search_term: search_term.into(),
            max_results,
        }
    }

    /// Point the provider at a different API root (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn fetch_page(&self, page: usize, per_page: usize) -> ProviderResult<Vec<PatentRecord>> {
        let q = serde_json::json!({ "_text_any": { "patent_title": self.search_term } });
        let f = serde_json::json!(REQUESTED_FIELDS);
        let o = serde_json::json!({ "per_page": per_page, "page": page });

        debug!(page, per_page, "fetching PatentsView page");

        let response = self
            .client
            .get(format!("{}/patents/query", self.base_url))
            .query(&[
                ("q", q.to_string().as_str()),
                ("f", f.to_string().as_str()),
                ("o", o.to_string().as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "PatentsView returned {}",
                response.status()
            )));
        }

        let body: PatentsPage = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(body.patents)
    }
}

#[async_trait]
impl DocumentProvider for PatentsViewProvider {
    async fn fetch_documents(&self) -> ProviderResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut page = 1usize;

        while documents.len() < self.max_results {
            let per_page = PER_PAGE.min(self.max_results - documents.len());
            let records = self.fetch_page(page, per_page).await?;

            if records.is_empty() {
                break;
            }

            let fetched = records.len();
            documents.extend(records.iter().filter_map(document_from_patent));

            if fetched < per_page {
                break;
            }

            page += 1;
            tokio::time::sleep(PAGE_DELAY).await;
        }

        documents.truncate(self.max_results);
        info!(count = documents.len(), "PatentsView fetch done");

        if documents.is_empty() {
            warn!("PatentsView returned no usable patents");
        }

        Ok(documents)
    }

    fn name(&self) -> &str {
        "PatentsView"
    }
}

/// Convert a raw patent record into a document, or `None` when required
/// fields are missing or the abstract is too thin.
fn document_from_patent(record: &PatentRecord) -> Option<Document> {
    let id = record.patent_id.as_deref()?.trim();
    if id.is_empty() {
        return None;
    }

    let title = record.patent_title.as_deref()?.trim();
    if title.is_empty() {
        return None;
    }

    let abstract_text = record.patent_abstract.as_deref()?.trim();
    if abstract_text.chars().count() < MIN_ABSTRACT_CHARS {
        return None;
    }

    let year = record
        .patent_date
        .as_deref()
        .and_then(|date| date.split('-').next()?.parse().ok());

    Some(Document {
        id: id.to_string(),
        title: title.to_string(),
        abstract_text: abstract_text.to_string(),
        year,
        source: SourceCategory::Patent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> PatentRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_document_from_patent() {
        let record = record(json!({
            "patent_id": "10123456",
            "patent_title": "Method and System for Adaptive Signal Processing",
            "patent_abstract": "An apparatus and method for adaptively processing sensor signals in real time.",
            "patent_date": "2018-11-13",
        }));

        let document = document_from_patent(&record).unwrap();
        assert_eq!(document.id, "10123456");
        assert_eq!(document.year, Some(2018));
        assert_eq!(document.source, SourceCategory::Patent);
    }

    #[test]
    fn test_document_from_patent_requires_abstract() {
        let missing = record(json!({
            "patent_id": "10123457",
            "patent_title": "A Title",
            "patent_date": "2019-01-01",
        }));
        assert!(document_from_patent(&missing).is_none());

        let thin = record(json!({
            "patent_id": "10123458",
            "patent_title": "A Title",
            "patent_abstract": "Too short.",
            "patent_date": "2019-01-01",
        }));
        assert!(document_from_patent(&thin).is_none());
    }

    #[test]
    fn test_document_from_patent_tolerates_missing_date() {
        let record = record(json!({
            "patent_id": "10123459",
            "patent_title": "A Title",
            "patent_abstract": "An apparatus and method for adaptively processing sensor signals in real time.",
        }));

        let document = document_from_patent(&record).unwrap();
        assert!(document.year.is_none());
    }

    #[test]
    fn test_patents_page_parses_api_shape() {
        let body: PatentsPage = serde_json::from_value(json!({
            "patents": [
                {
                    "patent_id": "9999999",
                    "patent_title": "Widget",
                    "patent_abstract": null,
                    "patent_date": "2015-03-03"
                }
            ],
            "count": 1,
            "total_patent_count": 812
        }))
        .unwrap();

        assert_eq!(body.patents.len(), 1);
        assert!(body.patents[0].patent_abstract.is_none());
    }
}
