//! Crossref metadata source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Record, RecordBuilder, SourceType};
use crate::sources::{check_status, paginate, Page, Source, SourceError};
use crate::utils::citekey::make_citekey;
use crate::utils::text::strip_markup;
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

const PAGE_SIZE: usize = 50;

const SELECT_FIELDS: &str = "DOI,title,author,issued,published-print,published-online,abstract,container-title,publisher,volume,issue,page,URL";

/// Crossref metadata source
///
/// Searches the Crossref Works API with a bibliographic query, retrying once
/// with a plain free-text query when that finds nothing. Citekeys carry a
/// title word (`Smith2020Deep`) to keep Crossref's large result sets apart.
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: Arc<HttpClient>,
    base_url: String,
    mailto: Option<String>,
    retry: RetryConfig,
}

impl CrossRefSource {
    /// Create a new Crossref source, joining the polite pool when a contact
    /// address is given
    pub fn new(mailto: Option<String>) -> Result<Self, SourceError> {
        let user_agent = HttpClient::polite_user_agent(mailto.as_deref());
        Ok(Self {
            client: Arc::new(HttpClient::with_user_agent(&user_agent)?),
            base_url: CROSSREF_API_BASE.to_string(),
            mailto,
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

    async fn fetch_page(
        &self,
        query_field: &'static str,
        query: &str,
        offset: usize,
        rows: usize,
    ) -> Result<Page, SourceError> {
        let url = format!("{}/works", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            (query_field, query.to_string()),
            ("rows", rows.to_string()),
            ("offset", offset.to_string()),
            ("select", SELECT_FIELDS.to_string()),
        ];
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.clone()));
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
                    .map_err(|e| SourceError::Network(format!("Failed to search CrossRef: {}", e)))?;

                check_status(response, "CrossRef")
            }
        })
        .await?;

        let data: CRResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let returned = data.message.items.len();
        let records = data.message.items.into_iter().filter_map(parse_item).collect();
        Ok(Page::new(records, returned))
    }
}

/// Map one Crossref work into a record; works without a title are skipped
fn parse_item(item: CRItem) -> Option<Record> {
    let title = item
        .title
        .first()
        .map(|t| strip_markup(t))
        .filter(|t| !t.is_empty())?;

    let year = [&item.issued, &item.published_print, &item.published_online]
        .into_iter()
        .flatten()
        .find_map(CRDate::year);

    let surname = item
        .author
        .first()
        .and_then(|a| a.family.as_deref().or(a.name.as_deref()));
    let citekey = make_citekey(surname, year, Some(&title));

    let authors: Vec<String> = item.author.iter().filter_map(CRAuthor::display_name).collect();

    let abstract_text = item
        .r#abstract
        .as_deref()
        .map(strip_markup)
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| title.clone());

    Some(
        RecordBuilder::new(citekey, title, SourceType::CrossRef)
            .abstract_text(abstract_text)
            .year(year)
            .authors(authors)
            .venue(item.container_title.into_iter().next().unwrap_or_default())
            .publisher(item.publisher.unwrap_or_default())
            .volume(item.volume.unwrap_or_default())
            .issue(item.issue.unwrap_or_default())
            .pages(item.page.unwrap_or_default())
            .doi(item.doi.unwrap_or_default())
            .url(item.url.unwrap_or_default())
            .build(),
    )
}

#[async_trait]
impl Source for CrossRefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "Crossref"
    }

    fn source_type(&self) -> SourceType {
        SourceType::CrossRef
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Record>, SourceError> {
        let records = paginate(limit, PAGE_SIZE, move |offset, rows| {
            self.fetch_page("query.bibliographic", query, offset, rows)
        })
        .await?;

        if !records.is_empty() {
            return Ok(records);
        }

        tracing::debug!("CrossRef bibliographic query found nothing, retrying as free text");
        paginate(limit, PAGE_SIZE, move |offset, rows| {
            self.fetch_page("query", query, offset, rows)
        })
        .await
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<CRItem>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
    /// Organizational authors carry only a name
    name: Option<String>,
}

impl CRAuthor {
    fn display_name(&self) -> Option<String> {
        match (&self.given, &self.family) {
            (Some(given), Some(family)) => Some(format!("{} {}", given, family)),
            (None, Some(family)) => Some(family.clone()),
            (Some(given), None) => Some(given.clone()),
            (None, None) => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CRAuthor>,
    issued: Option<CRDate>,
    #[serde(rename = "published-print")]
    published_print: Option<CRDate>,
    #[serde(rename = "published-online")]
    published_online: Option<CRDate>,
    r#abstract: Option<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    publisher: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    page: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl CRDate {
    fn year(&self) -> Option<i32> {
        self.date_parts.first()?.first().copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    fn source(server: &Server) -> CrossRefSource {
        CrossRefSource::new(Some("me@example.org".to_string()))
            .unwrap()
            .with_base_url(server.url())
            .with_retry(fast_retry())
    }

    fn works(items: serde_json::Value) -> String {
        json!({ "status": "ok", "message": { "items": items } }).to_string()
    }

    #[tokio::test]
    async fn test_fetch_parses_items() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query.bibliographic".into(), "soil carbon".into()),
                Matcher::UrlEncoded("mailto".into(), "me@example.org".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(works(json!([
                {
                    "DOI": "10.1000/soil",
                    "title": ["A <i>deep</i> look at soil carbon"],
                    "author": [{"given": "Jane", "family": "Smith"}, {"name": "Soil Consortium"}],
                    "issued": {"date-parts": [[2020, 3]]},
                    "abstract": "<jats:p>Carbon &amp; soils.</jats:p>",
                    "container-title": ["Nature"],
                    "volume": "581"
                },
                {
                    "title": ["Untitled year"],
                    "issued": {"date-parts": [[null]]}
                },
                { "DOI": "10.1000/no-title" }
            ])))
            .create_async()
            .await;

        let records = source(&server).fetch("soil carbon", 10).await.unwrap();
        mock.assert_async().await;

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.citekey, "Smith2020Deep");
        assert_eq!(first.title, "A deep look at soil carbon");
        assert_eq!(first.r#abstract.as_deref(), Some("Carbon & soils."));
        assert_eq!(first.authors, vec!["Jane Smith", "Soil Consortium"]);
        assert_eq!(first.venue.as_deref(), Some("Nature"));
        assert_eq!(first.doi.as_deref(), Some("10.1000/soil"));
        assert_eq!(first.source, SourceType::CrossRef);

        let second = &records[1];
        assert_eq!(second.citekey, "AnonNdUntitled");
        assert_eq!(second.r#abstract.as_deref(), Some("Untitled year"));
        assert!(second.doi.is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_free_text_query() {
        let mut server = Server::new_async().await;
        let bibliographic = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("query.bibliographic".into(), "rare".into()))
            .with_status(200)
            .with_body(works(json!([])))
            .create_async()
            .await;
        let free_text = server
            .mock("GET", "/works")
            .match_query(Matcher::UrlEncoded("query".into(), "rare".into()))
            .with_status(200)
            .with_body(works(json!([{ "title": ["Rare events"], "author": [{"family": "Kim"}], "issued": {"date-parts": [[2019]]} }])))
            .create_async()
            .await;

        let records = source(&server).fetch("rare", 10).await.unwrap();
        bibliographic.assert_async().await;
        free_text.assert_async().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].citekey, "Kim2019Rare");
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let result = source(&server).fetch("anything", 5).await;
        mock.assert_async().await;
        assert!(matches!(result, Err(SourceError::Status { status: 503, .. })));
    }

    #[test]
    fn test_date_parts_year() {
        let date: CRDate = serde_json::from_value(json!({"date-parts": [[2018, 1, 2]]})).unwrap();
        assert_eq!(date.year(), Some(2018));
        let empty: CRDate = serde_json::from_value(json!({"date-parts": [[null]]})).unwrap();
        assert_eq!(empty.year(), None);
    }
}
