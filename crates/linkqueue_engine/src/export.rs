use std::path::{Path, PathBuf};

use linkqueue_core::{ExtractedRecord, RecordSet};

use crate::persist::{write_atomic, PersistError};
use crate::EngineError;

pub const CSV_HEADER: [&str; 6] = [
    "Type",
    "Source",
    "Name",
    "URL",
    "Mutual_Connections",
    "Timestamp",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub record_count: usize,
    pub output_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no data to export")]
    NoData,
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

impl From<ExportError> for EngineError {
    fn from(err: ExportError) -> Self {
        EngineError::Export(err.to_string())
    }
}

/// Writes every stored record as CSV, sorted by source then name.
pub fn export_csv(records: &RecordSet, path: &Path) -> Result<ExportSummary, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }
    let content = render_csv(records)?;
    write_atomic(path, &content)?;
    Ok(ExportSummary {
        record_count: records.len(),
        output_path: path.to_path_buf(),
    })
}

/// Every field quoted, header first, one record per line.
pub fn render_csv(records: &RecordSet) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for record in records.sorted_for_export() {
        writer.write_record(record_fields(record))?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Csv(err.into_error().into()))
}

fn record_fields(record: &ExtractedRecord) -> [String; 6] {
    [
        record.kind.clone(),
        record.source.clone(),
        record.name.clone(),
        record.url.clone(),
        record.extra_info.clone(),
        record.timestamp.to_rfc3339(),
    ]
}

/// Default export file name, stamped with the current date.
pub fn default_export_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("connections-{}.csv", now.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use linkqueue_core::SECOND_DEGREE;

    fn record(source: &str, name: &str) -> ExtractedRecord {
        ExtractedRecord {
            kind: SECOND_DEGREE.to_string(),
            source: source.to_string(),
            name: name.to_string(),
            url: format!("https://www.linkedin.com/in/{}/", name.to_lowercase()),
            extra_info: String::new(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap(),
        }
    }

    #[test]
    fn quotes_are_doubled_and_rows_sorted() {
        let set = RecordSet::from(vec![
            record("Zed", "Amy"),
            record("Alpha", "Say \"Hi\""),
        ]);
        let csv = String::from_utf8(render_csv(&set).unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "\"Type\",\"Source\",\"Name\",\"URL\",\"Mutual_Connections\",\"Timestamp\""
        );
        assert!(lines[1].starts_with("\"2nd_degree\",\"Alpha\",\"Say \"\"Hi\"\"\""));
        assert!(lines[2].contains("\"Zed\",\"Amy\""));
        assert!(lines[2].ends_with("\"2024-03-01T08:30:00+00:00\""));
    }

    #[test]
    fn commas_and_line_breaks_stay_inside_their_field() {
        let mut tricky = record("Acme, Inc.", "Jane");
        tricky.extra_info = "12 mutual\nconnections, incl. \"Bo\"".to_string();
        let bytes = render_csv(&RecordSet::from(vec![tricky.clone()])).unwrap();

        let mut reader = csv::ReaderBuilder::new().from_reader(bytes.as_slice());
        let header = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();

        assert_eq!(header.iter().collect::<Vec<_>>(), CSV_HEADER.to_vec());
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], "Acme, Inc.");
        assert_eq!(&rows[0][4], tricky.extra_info);
    }

    #[test]
    fn empty_set_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let err = export_csv(&RecordSet::new(), &dir.path().join("out.csv")).unwrap_err();
        assert!(matches!(err, ExportError::NoData));
    }

    #[test]
    fn writes_file_and_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let summary = export_csv(&RecordSet::from(vec![record("A", "Bo")]), &path).unwrap();

        assert_eq!(summary.record_count, 1);
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 2);
    }
}
