//! Elsevier Scopus search source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Record, RecordBuilder, SourceType};
use crate::sources::{check_status, paginate, qualify, FieldSyntax, Page, Source, SourceError};
use crate::utils::citekey::make_citekey;
use crate::utils::text::strip_markup;
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

const SCOPUS_API_BASE: &str = "https://api.elsevier.com";

/// Scopus caps `count` at 25 for standard-view keys
const PAGE_SIZE: usize = 25;

const QUERY_SYNTAX: FieldSyntax = FieldSyntax {
    wrapper: "TITLE-ABS-KEY",
    delimiter: '(',
    tags: &[
        "ALL", "TITLE-ABS-KEY", "TITLE-ABS-KEY-AUTH", "TITLE-ABS", "TITLE", "ABS", "KEY",
        "AUTHKEY", "INDEXTERMS", "AUTH", "AUTHOR-NAME", "AUTHLASTNAME", "AUTHFIRST", "AU-ID",
        "AFFIL", "AFFILORG", "AFFILCITY", "AFFILCOUNTRY", "SRCTITLE", "EXACTSRCTITLE", "DOI",
        "ISSN", "ISBN", "PUBYEAR", "LANGUAGE", "DOCTYPE", "SUBJAREA", "REF", "FUND-SPONSOR",
    ],
};

/// Scopus search source
///
/// Requires an Elsevier API key; an institutional token is sent when
/// configured. Bare topics are wrapped in `TITLE-ABS-KEY(...)`.
#[derive(Debug, Clone)]
pub struct ScopusSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    inst_token: Option<String>,
    retry: RetryConfig,
}

impl ScopusSource {
    pub fn new(api_key: Option<String>, inst_token: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: SCOPUS_API_BASE.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            inst_token: inst_token.filter(|t| !t.trim().is_empty()),
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
        api_key: &str,
        query: &str,
        offset: usize,
        rows: usize,
    ) -> Result<Page, SourceError> {
        let url = format!("{}/content/search/scopus", self.base_url);
        let params = vec![
            ("query", query.to_string()),
            ("count", rows.to_string()),
            ("start", offset.to_string()),
        ];

        let client = Arc::clone(&self.client);
        let response = with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            let api_key = api_key.to_string();
            let inst_token = self.inst_token.clone();
            async move {
                let mut request = client
                    .get(&url)
                    .query(&params)
                    .header("X-ELS-APIKey", api_key)
                    .header("Accept", "application/json");
                if let Some(token) = inst_token {
                    request = request.header("X-ELS-Insttoken", token);
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| SourceError::Network(format!("Failed to search Scopus: {}", e)))?;

                check_status(response, "Scopus")
            }
        })
        .await?;

        let data: ScopusResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        // An empty result set comes back as a single entry carrying "error"
        let entries: Vec<ScopusEntry> = data
            .search_results
            .entry
            .into_iter()
            .filter(|e| e.error.is_none())
            .collect();

        let returned = entries.len();
        let records = entries.into_iter().filter_map(parse_entry).collect();
        Ok(Page::new(records, returned))
    }
}

fn parse_entry(entry: ScopusEntry) -> Option<Record> {
    let title = entry.title.as_deref().map(strip_markup).filter(|t| !t.is_empty())?;

    let year = entry
        .cover_date
        .as_deref()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse::<i32>().ok());

    // dc:creator is "Surname, Given" or "Surname G."
    let surname = entry.creator.as_deref().and_then(|c| match c.split_once(',') {
        Some((surname, _)) => Some(surname.trim()),
        None => c.split_whitespace().next(),
    });
    let citekey = make_citekey(surname, year, None);

    let authors: Vec<String> = if entry.author.is_empty() {
        entry.creator.clone().into_iter().collect()
    } else {
        entry.author.iter().filter_map(|a| a.authname.clone()).collect()
    };

    Some(
        RecordBuilder::new(citekey, title, SourceType::Scopus)
            .abstract_text(entry.description.as_deref().map(strip_markup).unwrap_or_default())
            .year(year)
            .authors(authors)
            .venue(entry.publication_name.unwrap_or_default())
            .volume(entry.volume.unwrap_or_default())
            .issue(entry.issue.unwrap_or_default())
            .pages(entry.page_range.unwrap_or_default())
            .doi(entry.doi.unwrap_or_default())
            .url(
                entry
                    .link
                    .iter()
                    .find(|l| l.rel.as_deref() == Some("scopus"))
                    .and_then(|l| l.href.clone())
                    .unwrap_or_default(),
            )
            .build(),
    )
}

#[async_trait]
impl Source for ScopusSource {
    fn id(&self) -> &str {
        "scopus"
    }

    fn name(&self) -> &str {
        "Scopus"
    }

    fn source_type(&self) -> SourceType {
        SourceType::Scopus
    }

    fn requires_credentials(&self) -> bool {
        true
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<Vec<Record>, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::MissingCredentials("ELSEVIER_API_KEY".to_string()))?;

        let query = qualify(query, &QUERY_SYNTAX);
        let query = query.as_str();
        paginate(limit, PAGE_SIZE, move |offset, rows| {
            self.fetch_page(api_key, query, offset, rows)
        })
        .await
    }
}

// ===== Scopus API Types =====

#[derive(Debug, Deserialize)]
struct ScopusResponse {
    #[serde(rename = "search-results")]
    search_results: ScopusResults,
}

#[derive(Debug, Deserialize)]
struct ScopusResults {
    #[serde(default)]
    entry: Vec<ScopusEntry>,
}

#[derive(Debug, Deserialize)]
struct ScopusEntry {
    error: Option<String>,
    #[serde(rename = "dc:title")]
    title: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
    #[serde(rename = "dc:description")]
    description: Option<String>,
    #[serde(rename = "prism:doi")]
    doi: Option<String>,
    #[serde(rename = "prism:coverDate")]
    cover_date: Option<String>,
    #[serde(rename = "prism:publicationName")]
    publication_name: Option<String>,
    #[serde(rename = "prism:volume")]
    volume: Option<String>,
    #[serde(rename = "prism:issueIdentifier")]
    issue: Option<String>,
    #[serde(rename = "prism:pageRange")]
    page_range: Option<String>,
    #[serde(default)]
    author: Vec<ScopusAuthor>,
    #[serde(default)]
    link: Vec<ScopusLink>,
}

#[derive(Debug, Deserialize)]
struct ScopusAuthor {
    authname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScopusLink {
    #[serde(rename = "@ref")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let source = ScopusSource::new(None, None)
            .unwrap()
            .with_base_url(server.url());
        assert!(!source.has_credentials());

        let result = source.fetch("soil", 10).await;
        assert!(matches!(result, Err(SourceError::MissingCredentials(k)) if k == "ELSEVIER_API_KEY"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_parses_entries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/content/search/scopus")
            .match_header("X-ELS-APIKey", "key-123")
            .match_header("X-ELS-Insttoken", "inst")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "TITLE-ABS-KEY(soil carbon)".into()),
                Matcher::UrlEncoded("start".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "search-results": {
                        "opensearch:totalResults": "2",
                        "entry": [
                            {
                                "dc:title": "Soil carbon stocks",
                                "dc:creator": "Lee, J.",
                                "prism:doi": "10.1016/j.soil.2021.1",
                                "prism:coverDate": "2021-06-01",
                                "prism:publicationName": "Geoderma",
                                "link": [{"@ref": "scopus", "@href": "https://www.scopus.com/x"}]
                            },
                            {
                                "dc:title": "No date paper",
                                "dc:description": "An <b>abstract</b>"
                            }
                        ]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let source = ScopusSource::new(Some("key-123".into()), Some("inst".into()))
            .unwrap()
            .with_base_url(server.url())
            .with_retry(fast_retry());
        let records = source.fetch("soil carbon", 10).await.unwrap();
        mock.assert_async().await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].citekey, "Lee2021");
        assert_eq!(records[0].venue.as_deref(), Some("Geoderma"));
        assert_eq!(records[0].authors, vec!["Lee, J."]);
        assert_eq!(records[0].url.as_deref(), Some("https://www.scopus.com/x"));
        assert_eq!(records[1].citekey, "AnonNd");
        assert_eq!(records[1].r#abstract.as_deref(), Some("An abstract"));
        assert_eq!(records[1].source, SourceType::Scopus);
    }

    #[tokio::test]
    async fn test_empty_result_set() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/content/search/scopus")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"search-results": {"entry": [{"@_fa": "true", "error": "Result set was empty"}]}})
                    .to_string(),
            )
            .create_async()
            .await;

        let source = ScopusSource::new(Some("k".into()), None)
            .unwrap()
            .with_base_url(server.url());
        let records = source.fetch("nothing", 10).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/content/search/scopus")
            .match_query(Matcher::Any)
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let source = ScopusSource::new(Some("bad".into()), None)
            .unwrap()
            .with_base_url(server.url())
            .with_retry(fast_retry());
        let result = source.fetch("x", 5).await;
        mock.assert_async().await;
        assert!(matches!(result, Err(SourceError::Status { status: 401, .. })));
    }

    #[test]
    fn test_query_is_field_qualified_once() {
        assert_eq!(qualify("AUTHLASTNAME(lee)", &QUERY_SYNTAX), "AUTHLASTNAME(lee)");
        assert_eq!(qualify("CRISPR(cas9) screens", &QUERY_SYNTAX), "TITLE-ABS-KEY(CRISPR(cas9) screens)");
    }
}
