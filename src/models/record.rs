//! Record model representing one bibliographic entry from any provider.

use serde::{Deserialize, Serialize};

/// The metadata provider a record was retrieved from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "crossref")]
    CrossRef,
    #[serde(rename = "scopus")]
    Scopus,
    #[serde(rename = "wos")]
    WebOfScience,
    #[serde(rename = "openalex")]
    OpenAlex,
    #[serde(rename = "semantic")]
    SemanticScholar,
    #[serde(untagged)]
    Other(String),
}

impl SourceType {
    /// Returns the display name of the source
    pub fn name(&self) -> &str {
        match self {
            SourceType::CrossRef => "Crossref",
            SourceType::Scopus => "Scopus",
            SourceType::WebOfScience => "Web of Science",
            SourceType::OpenAlex => "OpenAlex",
            SourceType::SemanticScholar => "Semantic Scholar",
            SourceType::Other(s) => s,
        }
    }

    /// Returns the source identifier (the provider tag carried by records)
    pub fn id(&self) -> &str {
        match self {
            SourceType::CrossRef => "crossref",
            SourceType::Scopus => "scopus",
            SourceType::WebOfScience => "wos",
            SourceType::OpenAlex => "openalex",
            SourceType::SemanticScholar => "semantic",
            SourceType::Other(s) => s,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A canonical bibliographic record
///
/// Every source adapter maps its provider payload into this one shape. The
/// citekey is synthesized by the adapter and may be rewritten exactly once by
/// [`dedupe_citekeys`](crate::utils::dedupe_citekeys).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Short human-readable key (surname + year + optional disambiguator)
    pub citekey: String,

    /// Work title
    pub title: String,

    /// Plain-text abstract, markup stripped
    pub r#abstract: Option<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Author display names, in byline order
    #[serde(default)]
    pub authors: Vec<String>,

    /// Journal, proceedings or other container title
    pub venue: Option<String>,

    pub publisher: Option<String>,

    pub volume: Option<String>,

    pub issue: Option<String>,

    pub pages: Option<String>,

    /// Digital Object Identifier (not validated)
    pub doi: Option<String>,

    /// Landing page URL when the provider exposes one
    pub url: Option<String>,

    /// Provider the record came from
    pub source: SourceType,
}

impl Record {
    /// Create a new record with required fields
    pub fn new(citekey: String, title: String, source: SourceType) -> Self {
        Self {
            citekey,
            title,
            r#abstract: None,
            year: None,
            authors: Vec::new(),
            venue: None,
            publisher: None,
            volume: None,
            issue: None,
            pages: None,
            doi: None,
            url: None,
            source,
        }
    }

    /// Year as displayed in citations
    pub fn year_label(&self) -> String {
        self.year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n.d.".to_string())
    }
}

/// Builder for constructing Record objects
///
/// Optional setters ignore blank strings so adapters can feed provider fields
/// straight through without checking for emptiness first.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl RecordBuilder {
    /// Create a new builder with required fields
    pub fn new(citekey: impl Into<String>, title: impl Into<String>, source: SourceType) -> Self {
        Self {
            record: Record::new(citekey.into(), title.into(), source),
        }
    }

    /// Set abstract
    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.record.r#abstract = non_blank(abstract_text);
        self
    }

    /// Set publication year
    pub fn year(mut self, year: Option<i32>) -> Self {
        self.record.year = year;
        self
    }

    /// Set authors
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.record.authors = authors.into_iter().filter_map(non_blank).collect();
        self
    }

    /// Set venue
    pub fn venue(mut self, venue: impl Into<String>) -> Self {
        self.record.venue = non_blank(venue);
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.record.publisher = non_blank(publisher);
        self
    }

    pub fn volume(mut self, volume: impl Into<String>) -> Self {
        self.record.volume = non_blank(volume);
        self
    }

    pub fn issue(mut self, issue: impl Into<String>) -> Self {
        self.record.issue = non_blank(issue);
        self
    }

    pub fn pages(mut self, pages: impl Into<String>) -> Self {
        self.record.pages = non_blank(pages);
        self
    }

    /// Set DOI, dropping any resolver prefix providers like to include
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.record.doi = non_blank(doi).map(|d| {
            d.trim_start_matches("https://doi.org/")
                .trim_start_matches("http://doi.org/")
                .trim_start_matches("http://dx.doi.org/")
                .to_string()
        });
        self
    }

    /// Set landing page URL
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.record.url = non_blank(url);
        self
    }

    /// Build the Record
    pub fn build(self) -> Record {
        self.record
    }
}
