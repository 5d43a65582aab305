//! OpenAlex works source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Record, RecordBuilder, SourceType};
use crate::sources::{check_status, paginate, Page, Source, SourceError};
use crate::utils::citekey::make_citekey;
use crate::utils::text::strip_markup;
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

const PAGE_SIZE: usize = 50;

/// OpenAlex research source
///
/// Free-text `search=` over the works endpoint. OpenAlex ships abstracts as an
/// inverted index, which is rebuilt into running text here.
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: Arc<HttpClient>,
    base_url: String,
    email: Option<String>,
    retry: RetryConfig,
}

impl OpenAlexSource {
    /// Create a new OpenAlex source; an email joins the polite pool
    pub fn new(email: Option<String>) -> Result<Self, SourceError> {
        let user_agent = HttpClient::polite_user_agent(email.as_deref());
        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(&user_agent)?),
            base_url: OPENALEX_API_BASE.to_string(),
            email,
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
        let url = format!("{}/works", self.base_url);
        // OpenAlex pages are 1-based and sized by per-page
        let page = offset / rows.max(1) + 1;
        let mut params: Vec<(&str, String)> = vec![
            ("search", query.to_string()),
            ("per-page", rows.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(email) = &self.email {
            params.push(("mailto", email.clone()));
        }

        let client = Arc::clone(&self.client);
        let response = with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            async move {
                let response = client
                    .get(&url)
                    .query(&params)
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to search OpenAlex: {}", e)))?;

                check_status(response, "OpenAlex")
            }
        })
        .await?;

        let data: WorksResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let returned = data.results.len();
        let records = data.results.into_iter().filter_map(parse_work).collect();
        Ok(Page::new(records, returned))
    }
}

/// Rebuild running text from `{"word": [positions...]}`
fn rebuild_abstract(index: &HashMap<String, Vec<usize>>) -> String {
    let mut positioned: Vec<(usize, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    positioned.sort_by_key(|(p, _)| *p);
    positioned
        .into_iter()
        .map(|(_, w)| w)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_work(work: OAWork) -> Option<Record> {
    let title = work
        .title
        .or(work.display_name)
        .as_deref()
        .map(strip_markup)
        .filter(|t| !t.is_empty())?;

    let authors: Vec<String> = work
        .authorships
        .iter()
        .filter_map(|a| a.author.display_name.clone())
        .collect();

    // "Jane Q. Smith" -> "Smith"
    let surname = authors.first().and_then(|n| n.split_whitespace().last());
    let citekey = make_citekey(surname, work.publication_year, None);

    let abstract_text = work
        .abstract_inverted_index
        .as_ref()
        .map(rebuild_abstract)
        .map(|a| strip_markup(&a))
        .unwrap_or_default();

    let location = work.primary_location.unwrap_or_default();
    let venue = location
        .source
        .as_ref()
        .and_then(|s| s.display_name.clone())
        .unwrap_or_default();
    let publisher = location
        .source
        .as_ref()
        .and_then(|s| s.host_organization_name.clone())
        .unwrap_or_default();

    let biblio = work.biblio.unwrap_or_default();
    let pages = match (biblio.first_page, biblio.last_page) {
        (Some(first), Some(last)) if first != last => format!("{}-{}", first, last),
        (Some(first), _) => first,
        _ => String::new(),
    };

    Some(
        RecordBuilder::new(citekey, title, SourceType::OpenAlex)
            .abstract_text(abstract_text)
            .year(work.publication_year)
            .authors(authors)
            .venue(venue)
            .publisher(publisher)
            .volume(biblio.volume.unwrap_or_default())
            .issue(biblio.issue.unwrap_or_default())
            .pages(pages)
            .doi(work.doi.unwrap_or_default())
            .url(location.landing_page_url.or(work.id).unwrap_or_default())
            .build(),
    )
}

#[async_trait]
impl Source for OpenAlexSource {
    fn id(&self) -> &str {
        "openalex"
    }

    fn name(&self) -> &str {
        "OpenAlex"
    }

    fn source_type(&self) -> SourceType {
        SourceType::OpenAlex
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Record>, SourceError> {
        paginate(limit, PAGE_SIZE, move |offset, rows| {
            self.fetch_page(query, offset, rows)
        })
        .await
    }
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<OAWork>,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    id: Option<String>,
    doi: Option<String>,
    title: Option<String>,
    display_name: Option<String>,
    publication_year: Option<i32>,
    #[serde(default)]
    authorships: Vec<OAAuthorship>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    primary_location: Option<OALocation>,
    biblio: Option<OABiblio>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    author: OAAuthor,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OALocation {
    landing_page_url: Option<String>,
    source: Option<OASource>,
}

#[derive(Debug, Deserialize)]
struct OASource {
    display_name: Option<String>,
    host_organization_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OABiblio {
    volume: Option<String>,
    issue: Option<String>,
    first_page: Option<String>,
    last_page: Option<String>,
}
