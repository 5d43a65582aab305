//! Reconcile a draft's citekeys with the retrieved records.

use std::collections::{HashMap, HashSet};

use crate::models::{Draft, Record};
use crate::utils::citekey::marker_groups;

/// Records the draft actually cites
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Cited records, in the draft's reference order
    pub selected: Vec<Record>,
    /// Citekey to DOI for selected records that carry one
    pub doi_map: HashMap<String, String>,
}

impl Resolution {
    pub fn is_selected(&self, citekey: &str) -> bool {
        self.selected.iter().any(|r| r.citekey == citekey)
    }
}

/// Map the draft's references back to records
///
/// Lookup runs over the full record set, not just the records shown to the
/// generator. References with no matching record are dropped.
pub fn resolve(draft: &Draft, records: &[Record]) -> Resolution {
    let by_key: HashMap<&str, &Record> = records.iter().map(|r| (r.citekey.as_str(), r)).collect();

    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    let mut unresolved = 0usize;
    for key in &draft.references {
        let key = key.trim();
        if !seen.insert(key) {
            continue;
        }
        match by_key.get(key) {
            Some(record) => selected.push((*record).clone()),
            None => {
                tracing::debug!("Unresolved citekey: {}", key);
                unresolved += 1;
            }
        }
    }
    if unresolved > 0 {
        tracing::warn!("Dropped {} citekeys with no matching record", unresolved);
    }

    let doi_map = selected
        .iter()
        .filter_map(|r| r.doi.as_ref().map(|doi| (r.citekey.clone(), doi.clone())))
        .collect();

    Resolution { selected, doi_map }
}

/// Rewrite fully resolved marker groups as `[Key][DOI]; [Key2]`
///
/// A group containing any key that was not selected is left as written.
pub fn enrich_markers(text: &str, resolution: &Resolution) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for group in marker_groups(text) {
        if !group.keys.iter().all(|k| resolution.is_selected(k)) {
            continue;
        }
        out.push_str(&text[cursor..group.span.start]);
        let rendered: Vec<String> = group
            .keys
            .iter()
            .map(|key| match resolution.doi_map.get(key) {
                Some(doi) => format!("[{}][{}]", key, doi),
                None => format!("[{}]", key),
            })
            .collect();
        out.push_str(&rendered.join("; "));
        cursor = group.span.end;
    }

    out.push_str(&text[cursor..]);
    out
}
