//! Semantic Scholar research source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Record, RecordBuilder, SourceType};
use crate::sources::{check_status, paginate, Page, Source, SourceError};
use crate::utils::citekey::make_citekey;
use crate::utils::text::strip_markup;
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// The search endpoint caps `limit` at 100
const PAGE_SIZE: usize = 100;

const FIELDS: &str = "title,abstract,year,authors,venue,journal,externalIds,url,publicationVenue";

/// Semantic Scholar research source
///
/// Works anonymously; an API key raises the shared rate limit.
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl SemanticScholarSource {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: SEMANTIC_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            retry: api_retry_config(),
        })
    }

    /// Point the source at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_page(&self, query: &str, offset: usize, rows: usize) -> Result<Page, SourceError> {
        let url = format!("{}/paper/search", self.base_url);
        let params = vec![
            ("query", query.to_string()),
            ("offset", offset.to_string()),
            ("limit", rows.to_string()),
            ("fields", FIELDS.to_string()),
        ];

        let client = Arc::clone(&self.client);
        let response = with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            let api_key = self.api_key.clone();
            async move {
                let mut request = client.get(&url).query(&params);
                if let Some(key) = api_key {
                    request = request.header("x-api-key", key);
                }

                let response = request.send().await.map_err(|e| {
                    SourceError::Network(format!("Failed to search Semantic Scholar: {}", e))
                })?;

                check_status(response, "Semantic Scholar")
            }
        })
        .await?;

        let data: S2SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let returned = data.data.len();
        let records = data.data.into_iter().filter_map(parse_paper).collect();
        Ok(Page::new(records, returned))
    }
}

fn parse_paper(paper: S2Paper) -> Option<Record> {
    let title = paper
        .title
        .as_deref()
        .map(strip_markup)
        .filter(|t| !t.is_empty())?;

    let authors: Vec<String> = paper.authors.iter().filter_map(|a| a.name.clone()).collect();
    let surname = authors.first().and_then(|n| n.split_whitespace().last());
    let citekey = make_citekey(surname, paper.year, None);

    let venue = paper
        .journal
        .as_ref()
        .and_then(|j| j.name.clone())
        .or_else(|| paper.publication_venue.as_ref().and_then(|v| v.name.clone()))
        .or(paper.venue)
        .unwrap_or_default();

    let journal = paper.journal.unwrap_or_default();

    Some(
        RecordBuilder::new(citekey, title, SourceType::SemanticScholar)
            .abstract_text(paper.r#abstract.as_deref().map(strip_markup).unwrap_or_default())
            .year(paper.year)
            .authors(authors)
            .venue(venue)
            .volume(journal.volume.unwrap_or_default())
            .pages(journal.pages.map(|p| p.trim().to_string()).unwrap_or_default())
            .doi(paper.external_ids.and_then(|ids| ids.doi).unwrap_or_default())
            .url(paper.url.unwrap_or_default())
            .build(),
    )
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn id(&self) -> &str {
        "semantic"
    }

    fn name(&self) -> &str {
        "Semantic Scholar"
    }

    fn source_type(&self) -> SourceType {
        SourceType::SemanticScholar
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Record>, SourceError> {
        paginate(limit, PAGE_SIZE, move |offset, rows| {
            self.fetch_page(query, offset, rows)
        })
        .await
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
struct S2Paper {
    title: Option<String>,
    r#abstract: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<S2Author>,
    venue: Option<String>,
    journal: Option<S2Journal>,
    #[serde(rename = "publicationVenue")]
    publication_venue: Option<S2Venue>,
    #[serde(rename = "externalIds")]
    external_ids: Option<S2ExternalIds>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Author {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct S2Journal {
    name: Option<String>,
    volume: Option<String>,
    pages: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2Venue {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}
