use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info};
use linkqueue_core::{ExtractedRecord, RecordSet, SaveSummary, SECOND_DEGREE};
use tokio::sync::Mutex;

use crate::store::Storage;
use crate::types::PageExtraction;
use crate::EngineError;

/// Serializes read-merge-write cycles against the stored record set so
/// concurrent saves never drop each other's rows.
pub struct RecordSaver {
    storage: Storage,
    lock: Mutex<()>,
}

impl RecordSaver {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            lock: Mutex::new(()),
        }
    }

    pub async fn save(&self, records: Vec<ExtractedRecord>) -> Result<SaveSummary, EngineError> {
        if records.is_empty() {
            return Ok(SaveSummary::default());
        }
        let _guard = self.lock.lock().await;
        let mut stored = self.storage.load_records().await?;
        let total = self.storage.load_total().await?;

        let summary = stored.merge(records);
        if summary.changed() {
            self.storage
                .save_records_and_total(&stored, total + summary.saved as u64)
                .await?;
        }
        engine_info!(
            "Saved {} new, {} updated, {} duplicate records",
            summary.saved,
            summary.updated,
            summary.duplicates
        );
        Ok(summary)
    }

    pub async fn all(&self) -> Result<RecordSet, EngineError> {
        let _guard = self.lock.lock().await;
        Ok(self.storage.load_records().await?)
    }

    pub async fn total(&self) -> Result<u64, EngineError> {
        Ok(self.storage.load_total().await?)
    }
}

/// Stamps scraped rows with their source and the extraction time.
///
/// The queue's source name wins over what the page reports; rows without
/// either are filed under "Unknown".
pub fn records_from_extraction(
    extraction: &PageExtraction,
    source_override: Option<&str>,
    at: DateTime<Utc>,
) -> Vec<ExtractedRecord> {
    let source = source_override
        .or(extraction.source_connection.as_deref())
        .filter(|source| !source.trim().is_empty())
        .unwrap_or("Unknown");
    engine_debug!(
        "Converting {} scraped rows for {}",
        extraction.profiles.len(),
        source
    );
    extraction
        .profiles
        .iter()
        .map(|profile| ExtractedRecord {
            kind: SECOND_DEGREE.to_string(),
            source: source.to_string(),
            name: profile.name.clone(),
            url: profile.url.clone(),
            extra_info: profile.mutual_connections.clone(),
            timestamp: at,
        })
        .collect()
}
