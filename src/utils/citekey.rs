//! Citekey synthesis and recovery.
//!
//! A citekey is the lead author's surname, the publication year (`Nd` when
//! unknown) and, for some providers, a capitalized word taken from the title:
//! `Smith2020`, `Smith2020Deep`. The deduplicator may append a lowercase
//! suffix (`Smith2020a`).

use regex::Regex;
use std::sync::OnceLock;

/// Surname used when a record has no usable author
pub const ANON_SURNAME: &str = "Anon";

/// Key assigned to records that reach deduplication with an empty citekey
pub const PLACEHOLDER_CITEKEY: &str = "AnonNd";

/// Normalize a surname into a key fragment
///
/// Non-letters are dropped (`O'Brien` → `OBrien`, `van der Berg` →
/// `VanderBerg`) and the first letter is upper-cased.
pub fn surname_fragment(surname: Option<&str>) -> String {
    let letters: String = surname
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect();
    if letters.is_empty() {
        return ANON_SURNAME.to_string();
    }
    capitalize_first(&letters)
}

/// First title word longer than two characters that starts with a letter, capitalized
pub fn title_fragment(title: &str) -> Option<String> {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|w| w.len() > 2 && w.starts_with(|c: char| c.is_ascii_alphabetic()))
        .map(|w| {
            let lower = w.to_lowercase();
            capitalize_first(&lower)
        })
}

/// Build a citekey from its parts
pub fn make_citekey(surname: Option<&str>, year: Option<i32>, title: Option<&str>) -> String {
    let year = year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Nd".to_string());
    let mut key = format!("{}{}", surname_fragment(surname), year);
    if let Some(title) = title {
        key.push_str(&title_fragment(title).unwrap_or_else(|| "Work".to_string()));
    }
    key
}

/// Disambiguation suffix for the zero-based position within a bucket
///
/// `0 → a`, `25 → z`, `26 → aa`, `27 → ab`, …
pub fn suffix_for(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn marker_group_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^()]+)\)").ok()).as_ref()
}

fn citekey_token_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\p{Lu}\p{L}+(?:\d{3,4}|Nd)(?:\p{Lu}[\p{Ll}\d]+)?\p{Ll}*$").ok())
        .as_ref()
}

/// Whether a token has the shape of a citekey
pub fn is_citekey(token: &str) -> bool {
    citekey_token_regex().is_some_and(|re| re.is_match(token))
}

/// A parenthesized group in which every `;`-separated token is a citekey
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerGroup {
    /// Byte range of the whole group, parentheses included
    pub span: std::ops::Range<usize>,
    pub keys: Vec<String>,
}

/// Find citation marker groups such as `(Smith2020)` or `(Lee2021a; Kim2022)`
///
/// Parentheses whose contents are not all citekeys are ignored.
pub fn marker_groups(text: &str) -> Vec<MarkerGroup> {
    let Some(re) = marker_group_regex() else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?.as_str();
            let keys: Vec<String> = inner.split(';').map(|t| t.trim().to_string()).collect();
            if keys.iter().all(|k| is_citekey(k)) {
                Some(MarkerGroup {
                    span: whole.range(),
                    keys,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Recover the citekeys cited in `text`, first-seen order, without repeats
///
/// Tokens are collected from every parenthesized group; in a mixed group the
/// citekey-shaped tokens still count.
pub fn extract_citekeys(text: &str) -> Vec<String> {
    let Some(re) = marker_group_regex() else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut keys = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(inner) = caps.get(1) else { continue };
        for token in inner.as_str().split(';').map(str::trim) {
            if is_citekey(token) && seen.insert(token.to_string()) {
                keys.push(token.to_string());
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_citekey() {
        assert_eq!(make_citekey(Some("Smith"), Some(2020), None), "Smith2020");
        assert_eq!(
            make_citekey(Some("Smith"), Some(2020), Some("A deep dive into soils")),
            "Smith2020Deep"
        );
        assert_eq!(make_citekey(None, None, None), "AnonNd");
        assert_eq!(make_citekey(Some("o'brien"), Some(1999), Some("on it")), "Obrien1999Work");
    }

    #[test]
    fn test_title_fragment() {
        assert_eq!(title_fragment("COVID-19 vaccines"), Some("Covid".to_string()));
        assert_eq!(title_fragment("On a ML"), None);
        assert_eq!(title_fragment("2019 novel coronavirus outbreak"), Some("Novel".to_string()));
        assert_eq!(title_fragment("2019 100 km"), None);
    }

    #[test]
    fn test_generated_keys_are_recoverable() {
        let titles = [
            "2019 novel coronavirus outbreak",
            "3D printing of soils",
            "1234",
            "COVID-19 vaccines",
            "A deep dive into soils",
        ];
        for title in titles {
            for year in [Some(2020), None] {
                let key = make_citekey(Some("Smith"), year, Some(title));
                assert!(is_citekey(&key), "{} should be a citekey", key);
                let text = format!("Cases rose ({}).", key);
                assert_eq!(extract_citekeys(&text), vec![key]);
            }
        }
    }

    #[test]
    fn test_suffix_sequence() {
        assert_eq!(suffix_for(0), "a");
        assert_eq!(suffix_for(1), "b");
        assert_eq!(suffix_for(25), "z");
        assert_eq!(suffix_for(26), "aa");
        assert_eq!(suffix_for(27), "ab");
        assert_eq!(suffix_for(52), "ba");
    }

    #[test]
    fn test_is_citekey() {
        assert!(is_citekey("Smith2021"));
        assert!(is_citekey("Lee2022a"));
        assert!(is_citekey("Smith2020Deep"));
        assert!(is_citekey("Smith2020Deepb"));
        assert!(is_citekey("Müller2019"));
        assert!(is_citekey("SmithNd"));
        assert!(is_citekey("SmithNdWorkb"));
        assert!(!is_citekey("see Smith2021"));
        assert!(!is_citekey("2021"));
        assert!(!is_citekey("e.g."));
    }

    #[test]
    fn test_extract_citekeys() {
        let text = "Warming is observed (Smith2021). Others agree (Lee2022a; Kim2023) \
                    but not all (Smith2021; e.g. trials) and (in 2020).";
        assert_eq!(extract_citekeys(text), vec!["Smith2021", "Lee2022a", "Kim2023"]);
    }

    #[test]
    fn test_marker_groups_require_all_keys() {
        let text = "A (Smith2021) b (Lee2022a; see below) c (Kim2023; Park2020)";
        let groups = marker_groups(text);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].keys, vec!["Smith2021"]);
        assert_eq!(&text[groups[0].span.clone()], "(Smith2021)");
        assert_eq!(groups[1].keys, vec!["Kim2023", "Park2020"]);
    }
}
