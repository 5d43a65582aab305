//! Citekey deduplication for records merged across sources.

use std::collections::{HashMap, HashSet};

use crate::models::Record;
use crate::utils::citekey::{suffix_for, PLACEHOLDER_CITEKEY};

/// Make citekeys unique across a merged record set
///
/// Records are grouped by citekey, groups kept in first-occurrence order with
/// their members contiguous. A key held by a single record is left alone;
/// every member of a larger group, the first included, gets a lowercase
/// suffix in encounter order (`Lee2021a`, `Lee2021b`, …). A suffix that
/// would reproduce another group's key is skipped. Records with an empty
/// citekey are grouped under [`PLACEHOLDER_CITEKEY`].
///
/// Records are never merged or dropped: the output has the same length as
/// the input.
pub fn dedupe_citekeys(records: Vec<Record>) -> Vec<Record> {
    let mut order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<Record>> = HashMap::new();

    for mut record in records {
        if record.citekey.trim().is_empty() {
            record.citekey = PLACEHOLDER_CITEKEY.to_string();
        }
        let key = record.citekey.clone();
        buckets
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record);
    }

    let mut taken: HashSet<String> = order.iter().cloned().collect();
    let mut out = Vec::with_capacity(buckets.values().map(Vec::len).sum());

    for key in order {
        let Some(members) = buckets.remove(&key) else {
            continue;
        };

        if members.len() == 1 {
            out.extend(members);
            continue;
        }

        tracing::debug!("Disambiguating {} records sharing citekey {}", members.len(), key);

        let mut next = 0usize;
        for mut record in members {
            let candidate = loop {
                let candidate = format!("{}{}", key, suffix_for(next));
                next += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            taken.insert(candidate.clone());
            record.citekey = candidate;
            out.push(record);
        }
    }

    out
}
