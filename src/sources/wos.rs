//! Clarivate Web of Science source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{Record, RecordBuilder, SourceType};
use crate::sources::{check_status, paginate, qualify, FieldSyntax, Page, Source, SourceError};
use crate::utils::citekey::make_citekey;
use crate::utils::text::strip_markup;
use crate::utils::{api_retry_config, with_retry, HttpClient, RetryConfig};

const WOS_API_BASE: &str = "https://api.clarivate.com/api/wos";

/// The expanded API returns at most 100 records per request
const PAGE_SIZE: usize = 50;

const QUERY_SYNTAX: FieldSyntax = FieldSyntax {
    wrapper: "TS=",
    delimiter: '=',
    tags: &[
        "TS", "TI", "AB", "AU", "AI", "AK", "KP", "SO", "PY", "DO", "OG", "OO", "CU", "SU",
        "WC", "UT", "DT", "LA", "FO", "FG", "GP", "ED", "IS", "PMID", "ALL",
    ],
};

/// Web of Science source
///
/// Uses the Web of Science Expanded API against the `WOK` database. Bare
/// topics are wrapped in a `TS=(...)` topic search.
#[derive(Debug, Clone)]
pub struct WosSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl WosSource {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: WOS_API_BASE.to_string(),
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

    async fn fetch_page(
        &self,
        api_key: &str,
        query: &str,
        offset: usize,
        rows: usize,
    ) -> Result<Page, SourceError> {
        let url = format!("{}/v1", self.base_url);
        let params = vec![
            ("databaseId", "WOK".to_string()),
            ("usrQuery", query.to_string()),
            ("count", rows.to_string()),
            // 1-based
            ("firstRecord", (offset + 1).to_string()),
        ];

        let client = Arc::clone(&self.client);
        let response = with_retry(self.retry, || {
            let client = Arc::clone(&client);
            let url = url.clone();
            let params = params.clone();
            let api_key = api_key.to_string();
            async move {
                let response = client
                    .get(&url)
                    .query(&params)
                    .header("X-ApiKey", api_key)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .map_err(|e| {
                        SourceError::Network(format!("Failed to search Web of Science: {}", e))
                    })?;

                check_status(response, "Web of Science")
            }
        })
        .await?;

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Parse(format!("Failed to parse JSON: {}", e)))?;

        let recs = parse_recs(&data)?;
        let returned = recs.len();
        let records = recs.into_iter().filter_map(parse_rec).collect();
        Ok(Page::new(records, returned))
    }
}

/// Pull `Data.Records.records.REC` out of a response
///
/// An empty result set has `"records": ""`, and a single hit may come back as
/// an object rather than a list.
fn parse_recs(data: &serde_json::Value) -> Result<Vec<WosRec>, SourceError> {
    match data.pointer("/Data/Records/records/REC") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(value) => {
            let recs: OneOrMany<WosRec> = serde_json::from_value(value.clone())?;
            Ok(recs.into_vec())
        }
    }
}

fn parse_rec(rec: WosRec) -> Option<Record> {
    let summary = rec.static_data.summary;

    let titles = summary.titles.title.into_vec();
    let title = titles
        .iter()
        .find(|t| t.kind.as_deref() == Some("item"))
        .or_else(|| titles.iter().find(|t| t.content.is_some()))
        .and_then(|t| t.content.as_ref())
        .map(|t| strip_markup(&t.to_text()))
        .filter(|t| !t.is_empty())?;
    let venue = titles
        .iter()
        .find(|t| t.kind.as_deref() == Some("source"))
        .and_then(|t| t.content.as_ref())
        .map(|t| t.to_text());

    let year = summary
        .pub_info
        .as_ref()
        .and_then(|p| p.pubyear.as_ref())
        .and_then(|y| y.to_text().trim().parse::<i32>().ok());

    let names = summary.names.name.into_vec();
    let surname = names.first().and_then(|n| n.last_name.as_deref());
    let citekey = make_citekey(surname, year, None);

    let authors: Vec<String> = names
        .iter()
        .map(|n| match (&n.first_name, &n.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (None, Some(last)) => last.clone(),
            _ => n.display_name.clone().unwrap_or_default(),
        })
        .collect();

    let abstract_text = summary
        .abstracts
        .and_then(|a| a.r#abstract.into_vec().into_iter().next())
        .and_then(|a| a.abstract_text)
        .map(|t| {
            t.p.into_vec()
                .iter()
                .map(|p| p.to_text())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .map(|t| strip_markup(&t))
        .unwrap_or_default();

    let doi = rec
        .dynamic_data
        .and_then(|d| d.cluster_related)
        .and_then(|c| c.identifiers)
        .and_then(|ids| {
            ids.identifier.into_vec().into_iter().find(|id| {
                id.kind
                    .as_deref()
                    .is_some_and(|k| k.to_lowercase().contains("doi"))
            })
        })
        .and_then(|id| id.value);

    let pub_info = summary.pub_info.unwrap_or_default();

    Some(
        RecordBuilder::new(citekey, title, SourceType::WebOfScience)
            .abstract_text(abstract_text)
            .year(year)
            .authors(authors)
            .venue(venue.unwrap_or_default())
            .volume(pub_info.vol.map(|v| v.to_text()).unwrap_or_default())
            .issue(pub_info.issue.map(|v| v.to_text()).unwrap_or_default())
            .pages(pub_info.page.and_then(|p| p.content).unwrap_or_default())
            .doi(doi.unwrap_or_default())
            .build(),
    )
}

#[async_trait]
impl Source for WosSource {
    fn id(&self) -> &str {
        "wos"
    }

    fn name(&self) -> &str {
        "Web of Science"
    }

    fn source_type(&self) -> SourceType {
        SourceType::WebOfScience
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
            .ok_or_else(|| SourceError::MissingCredentials("WOS_API_KEY".to_string()))?;

        let query = qualify(query, &QUERY_SYNTAX);
        let query = query.as_str();
        paginate(limit, PAGE_SIZE, move |offset, rows| {
            self.fetch_page(api_key, query, offset, rows)
        })
        .await
    }
}

// ===== Web of Science API Types =====

/// WoS serializes single-element lists as bare objects
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(t) => vec![t],
        }
    }
}

/// Scalar that WoS emits as either a string or a number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(i64),
}

impl Scalar {
    fn to_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WosRec {
    static_data: WosStatic,
    dynamic_data: Option<WosDynamic>,
}

#[derive(Debug, Deserialize)]
struct WosStatic {
    summary: WosSummary,
}

#[derive(Debug, Deserialize)]
struct WosSummary {
    #[serde(default)]
    titles: WosTitles,
    #[serde(default)]
    names: WosNames,
    pub_info: Option<WosPubInfo>,
    abstracts: Option<WosAbstracts>,
}

#[derive(Debug, Default, Deserialize)]
struct WosTitles {
    #[serde(default)]
    title: OneOrMany<WosTitle>,
}

#[derive(Debug, Deserialize)]
struct WosTitle {
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
struct WosNames {
    #[serde(default)]
    name: OneOrMany<WosName>,
}

#[derive(Debug, Deserialize)]
struct WosName {
    first_name: Option<String>,
    last_name: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WosPubInfo {
    pubyear: Option<Scalar>,
    vol: Option<Scalar>,
    issue: Option<Scalar>,
    page: Option<WosPage>,
}

#[derive(Debug, Default, Deserialize)]
struct WosPage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WosAbstracts {
    #[serde(rename = "abstract", default)]
    r#abstract: OneOrMany<WosAbstract>,
}

#[derive(Debug, Deserialize)]
struct WosAbstract {
    abstract_text: Option<WosAbstractText>,
}

#[derive(Debug, Deserialize)]
struct WosAbstractText {
    #[serde(default)]
    p: OneOrMany<Scalar>,
}

#[derive(Debug, Deserialize)]
struct WosDynamic {
    cluster_related: Option<WosClusterRelated>,
}

#[derive(Debug, Deserialize)]
struct WosClusterRelated {
    identifiers: Option<WosIdentifiers>,
}

#[derive(Debug, Deserialize)]
struct WosIdentifiers {
    #[serde(default)]
    identifier: OneOrMany<WosIdentifier>,
}

#[derive(Debug, Deserialize)]
struct WosIdentifier {
    #[serde(rename = "type")]
    kind: Option<String>,
    value: Option<String>,
}
