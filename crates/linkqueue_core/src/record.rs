use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label written to the CSV `Type` column for records gathered from
/// connection search pages.
pub const SECOND_DEGREE: &str = "2nd_degree";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "mutualConnections", default)]
    pub extra_info: String,
    pub timestamp: DateTime<Utc>,
}

impl ExtractedRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            url: self.url.clone(),
            source: self.source.clone(),
        }
    }

    fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// Natural key of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub url: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaveSummary {
    pub saved: usize,
    pub updated: usize,
    /// Diagnostic only: input minus saved minus updated, which also counts
    /// records dropped for missing a URL.
    pub duplicates: usize,
}

impl SaveSummary {
    pub fn changed(&self) -> bool {
        self.saved > 0 || self.updated > 0
    }
}

/// Deduplicated record storage keyed by `(url, source)`, preserving first
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ExtractedRecord>", into = "Vec<ExtractedRecord>")]
pub struct RecordSet {
    records: Vec<ExtractedRecord>,
    index: HashMap<RecordKey, usize>,
}

impl RecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&ExtractedRecord> {
        self.index.get(key).map(|&slot| &self.records[slot])
    }

    pub fn records(&self) -> &[ExtractedRecord] {
        &self.records
    }

    /// Merges `incoming` with last-write-wins per key.
    pub fn merge(&mut self, incoming: Vec<ExtractedRecord>) -> SaveSummary {
        let input_len = incoming.len();
        let mut summary = SaveSummary::default();

        for record in incoming {
            if !record.has_url() {
                continue;
            }
            let key = record.key();
            match self.index.get(&key) {
                Some(&slot) => {
                    self.records[slot] = record;
                    summary.updated += 1;
                }
                None => {
                    self.index.insert(key, self.records.len());
                    self.records.push(record);
                    summary.saved += 1;
                }
            }
        }

        summary.duplicates = input_len.saturating_sub(summary.saved + summary.updated);
        summary
    }

    /// Records ordered by source, then name, as exported.
    pub fn sorted_for_export(&self) -> Vec<&ExtractedRecord> {
        let mut sorted: Vec<_> = self.records.iter().collect();
        sorted.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.name.cmp(&b.name)));
        sorted
    }
}

impl From<Vec<ExtractedRecord>> for RecordSet {
    fn from(records: Vec<ExtractedRecord>) -> Self {
        let mut set = RecordSet::new();
        set.merge(records);
        set
    }
}

impl From<RecordSet> for Vec<ExtractedRecord> {
    fn from(set: RecordSet) -> Self {
        set.records
    }
}
