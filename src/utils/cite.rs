//! Citation formatting in various styles.
//!
//! Supports a raw `citekey – DOI` listing, BibTeX and an APA 7th flavored
//! reference line. Rendering is best-effort: fields a record lacks are
//! omitted, never printed empty.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{CitationEntry, Record};

/// Citation style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationStyle {
    /// `citekey – DOI`
    Raw,
    /// BibTeX
    Bibtex,
    /// APA 7th edition
    Apa7,
}

/// Requested style name is not one of the supported styles
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported citation style: {0}")]
pub struct UnsupportedStyle(pub String);

impl CitationStyle {
    /// All supported styles
    pub const ALL: [CitationStyle; 3] = [CitationStyle::Raw, CitationStyle::Bibtex, CitationStyle::Apa7];

    /// Style identifier as accepted by [`FromStr`]
    pub fn id(&self) -> &'static str {
        match self {
            CitationStyle::Raw => "raw",
            CitationStyle::Bibtex => "bibtex",
            CitationStyle::Apa7 => "apa7",
        }
    }
}

impl FromStr for CitationStyle {
    type Err = UnsupportedStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Ok(CitationStyle::Raw),
            "bibtex" => Ok(CitationStyle::Bibtex),
            "apa7" => Ok(CitationStyle::Apa7),
            _ => Err(UnsupportedStyle(s.to_string())),
        }
    }
}

impl fmt::Display for CitationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationStyle::Raw => write!(f, "Raw"),
            CitationStyle::Bibtex => write!(f, "BibTeX"),
            CitationStyle::Apa7 => write!(f, "APA 7th"),
        }
    }
}

/// Format a record citation in the specified style
pub fn format_citation(record: &Record, style: CitationStyle) -> String {
    match style {
        CitationStyle::Raw => format_raw(record),
        CitationStyle::Bibtex => format_bibtex(record),
        CitationStyle::Apa7 => format_apa7(record),
    }
}

/// Format a reference list, parsing the style name first
///
/// An unknown style fails before anything is rendered.
pub fn format_references(records: &[Record], style: &str) -> Result<Vec<String>, UnsupportedStyle> {
    let style: CitationStyle = style.parse()?;
    Ok(records.iter().map(|r| format_citation(r, style)).collect())
}

fn format_raw(record: &Record) -> String {
    match &record.doi {
        Some(doi) => format!("{} – {}", record.citekey, doi),
        None => record.citekey.clone(),
    }
}

/// Generate a BibTeX entry
///
/// `@article` when the record has a venue, `@misc` otherwise.
fn format_bibtex(record: &Record) -> String {
    let entry_type = if record.venue.is_some() { "article" } else { "misc" };

    let mut fields: Vec<(&str, String)> = Vec::new();
    if !record.authors.is_empty() {
        fields.push(("author", record.authors.join(" and ")));
    }
    fields.push(("title", record.title.clone()));

    let optional = [
        ("journal", &record.venue),
        ("volume", &record.volume),
        ("number", &record.issue),
        ("pages", &record.pages),
        ("publisher", &record.publisher),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            fields.push((name, value.clone()));
        }
    }

    fields.push(("year", record.year_label()));
    if let Some(doi) = &record.doi {
        fields.push(("doi", doi.clone()));
    }

    let body = fields
        .iter()
        .map(|(name, value)| format!("  {} = {{{}}}", name, value))
        .collect::<Vec<_>>()
        .join(",\n");

    format!("@{}{{{},\n{}\n}}", entry_type, record.citekey, body)
}

fn with_period(text: &str) -> String {
    if text.ends_with(['.', '?', '!']) {
        text.to_string()
    } else {
        format!("{}.", text)
    }
}

/// `Citekey. (Year). *Title*. Venue. https://doi.org/DOI`
fn format_apa7(record: &Record) -> String {
    let title = if record.title.trim().is_empty() {
        "[No title]"
    } else {
        record.title.trim()
    };

    let mut parts = vec![
        format!("{}.", record.citekey),
        format!("({}).", record.year_label()),
        with_period(&format!("*{}*", title)),
    ];
    if let Some(venue) = &record.venue {
        parts.push(with_period(venue));
    }
    if let Some(doi) = &record.doi {
        parts.push(format!("https://doi.org/{}", doi));
    }
    parts.join(" ")
}

/// Structured citation data for JSON output
pub fn structured_citation(record: &Record) -> CitationEntry {
    CitationEntry {
        citekey: record.citekey.clone(),
        title: record.title.clone(),
        doi: record.doi.clone(),
        url: record.url.clone(),
        authors: record.authors.clone(),
        year: record.year,
        venue: record.venue.clone(),
        publisher: record.publisher.clone(),
        volume: record.volume.clone(),
        issue: record.issue.clone(),
        pages: record.pages.clone(),
        source: record.source.id().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordBuilder, SourceType};

    fn sample() -> Record {
        RecordBuilder::new("Smith2020", "Soil carbon dynamics", SourceType::CrossRef)
            .authors(["Jane Smith", "Wei Li"])
            .year(Some(2020))
            .venue("Nature")
            .volume("581")
            .issue("7")
            .pages("12-19")
            .doi("10.1038/abc")
            .build()
    }

    fn no_doi() -> Record {
        RecordBuilder::new("Lee2021", "Untitled work", SourceType::Scopus).build()
    }

    #[test]
    fn test_parse_style() {
        assert_eq!("raw".parse::<CitationStyle>().unwrap(), CitationStyle::Raw);
        assert_eq!("BibTeX".parse::<CitationStyle>().unwrap(), CitationStyle::Bibtex);
        assert_eq!("apa7".parse::<CitationStyle>().unwrap(), CitationStyle::Apa7);
        assert_eq!(
            "mla".parse::<CitationStyle>(),
            Err(UnsupportedStyle("mla".to_string()))
        );
    }

    #[test]
    fn test_raw() {
        assert_eq!(format_citation(&sample(), CitationStyle::Raw), "Smith2020 – 10.1038/abc");
        assert_eq!(format_citation(&no_doi(), CitationStyle::Raw), "Lee2021");
    }

    #[test]
    fn test_bibtex_article() {
        let bib = format_citation(&sample(), CitationStyle::Bibtex);
        assert!(bib.starts_with("@article{Smith2020,\n"));
        assert!(bib.contains("  author = {Jane Smith and Wei Li}"));
        assert!(bib.contains("  journal = {Nature}"));
        assert!(bib.contains("  number = {7}"));
        assert!(bib.contains("  doi = {10.1038/abc}"));
        assert!(bib.ends_with("\n}"));
    }

    #[test]
    fn test_bibtex_misc_without_venue() {
        let bib = format_citation(&no_doi(), CitationStyle::Bibtex);
        assert!(bib.starts_with("@misc{Lee2021,"));
        assert!(bib.contains("year = {n.d.}"));
        assert!(!bib.contains("journal"));
        assert!(!bib.contains("author"));
    }

    #[test]
    fn test_apa7() {
        assert_eq!(
            format_citation(&sample(), CitationStyle::Apa7),
            "Smith2020. (2020). *Soil carbon dynamics*. Nature. https://doi.org/10.1038/abc"
        );
        assert_eq!(
            format_citation(&no_doi(), CitationStyle::Apa7),
            "Lee2021. (n.d.). *Untitled work*."
        );
    }

    #[test]
    fn test_missing_doi_never_rendered_empty() {
        for style in CitationStyle::ALL {
            let text = format_citation(&no_doi(), style);
            assert!(!text.contains("doi"), "{style}: {text}");
            assert!(!text.contains("None"), "{style}: {text}");
            assert!(!text.contains("{}"), "{style}: {text}");
        }
    }

    #[test]
    fn test_format_references_unknown_style() {
        let records = vec![sample(), no_doi()];
        assert!(format_references(&records, "chicago").is_err());
        assert_eq!(format_references(&records, "raw").unwrap().len(), 2);
    }

    #[test]
    fn test_structured_citation_fields() {
        let record = sample();
        let entry = structured_citation(&record);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["title"], "Soil carbon dynamics");
        assert_eq!(json["doi"], "10.1038/abc");
        assert_eq!(json["year"], 2020);
        assert_eq!(json["authors"][1], "Wei Li");
        assert_eq!(json["source"], "crossref");
    }
}
