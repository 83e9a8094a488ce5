use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{PortalStatus, SubmissionRecord};

/// File name of the submission sheet inside the data directory
pub const SHEET_FILE: &str = "submissions.csv";

/// File name of the persisted accept/reject flag
pub const STATUS_FILE: &str = "status.json";

/// Column layout of the submission sheet
const SHEET_HEADER: &str = "Name,RollNo,Batch,FileLink,DateTime";

/// Number of records shown in the dashboard summary
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no submission found for roll number '{0}'")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] std::io::Error),
}

/// The authoritative set of submission records, persisted as one CSV sheet,
/// with the accept/reject flag in a small JSON file next to it.
///
/// Every operation reads the sheet fresh from disk; nothing is cached
/// between requests. Mutations rewrite the whole sheet, so they are
/// serialized through a single writer lock. Without it two concurrent
/// upserts would race and the later rewrite would silently drop the
/// earlier writer's row.
pub struct SubmissionRegistry {
    sheet_path: PathBuf,
    status_path: PathBuf,
    write_lock: Mutex<()>,
}

impl SubmissionRegistry {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            sheet_path: data_dir.join(SHEET_FILE),
            status_path: data_dir.join(STATUS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the full sheet in stored order (oldest first).
    pub async fn list_all(&self) -> Vec<SubmissionRecord> {
        self.read_records().await
    }

    /// Returns the most recent `limit` records, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<SubmissionRecord> {
        self.read_records()
            .await
            .into_iter()
            .rev()
            .take(limit)
            .collect()
    }

    /// Exact-match lookup by roll number.
    pub async fn find_by_roll_no(&self, roll_no: &str) -> Option<SubmissionRecord> {
        self.read_records()
            .await
            .into_iter()
            .find(|r| r.roll_no == roll_no)
    }

    /// Inserts the record, replacing any existing record with the same roll
    /// number. The replaced record loses its position: the new one is
    /// appended at the end of the sheet.
    pub async fn upsert(
        &self,
        record: SubmissionRecord,
    ) -> Result<SubmissionRecord, RegistryError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_records().await;
        records.retain(|r| r.roll_no != record.roll_no);
        records.push(record.clone());
        self.write_records(&records).await?;

        Ok(record)
    }

    /// Removes the record for the given roll number and returns it.
    /// The stored blob is the caller's responsibility.
    pub async fn remove(&self, roll_no: &str) -> Result<SubmissionRecord, RegistryError> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_records().await;
        let Some(idx) = records.iter().position(|r| r.roll_no == roll_no) else {
            return Err(RegistryError::NotFound(roll_no.to_string()));
        };

        let removed = records.remove(idx);
        self.write_records(&records).await?;

        Ok(removed)
    }

    /// Whether new uploads are currently accepted. Defaults to true when the
    /// flag file has never been written.
    pub async fn is_accepting(&self) -> bool {
        self.status().await.accepting_submissions
    }

    pub async fn status(&self) -> PortalStatus {
        self.read_status().await
    }

    pub async fn set_accepting(&self, accepting: bool) -> Result<PortalStatus, RegistryError> {
        let _guard = self.write_lock.lock().await;

        let status = PortalStatus {
            accepting_submissions: accepting,
        };
        self.write_status(status).await?;
        Ok(status)
    }

    /// Flips the accept flag and returns the new state.
    pub async fn toggle(&self) -> Result<PortalStatus, RegistryError> {
        let _guard = self.write_lock.lock().await;

        let current = self.read_status().await;
        let flipped = PortalStatus {
            accepting_submissions: !current.accepting_submissions,
        };
        self.write_status(flipped).await?;
        Ok(flipped)
    }

    /// Re-encodes the current records as a CSV document, header included,
    /// for the bulk-download endpoint.
    pub async fn export_sheet(&self) -> String {
        encode_sheet(&self.read_records().await)
    }

    /// Reads the sheet from disk. A missing or unreadable sheet is treated
    /// as an empty registry rather than an error.
    async fn read_records(&self) -> Vec<SubmissionRecord> {
        match tokio::fs::read_to_string(&self.sheet_path).await {
            Ok(text) => decode_sheet(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!("Submission sheet unreadable, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Rewrites the whole sheet. Written to a sibling temp file first and
    /// renamed into place, so a crash mid-write never leaves a torn sheet.
    async fn write_records(&self, records: &[SubmissionRecord]) -> Result<(), RegistryError> {
        let tmp = self.sheet_path.with_extension("tmp");
        tokio::fs::write(&tmp, encode_sheet(records)).await?;
        tokio::fs::rename(&tmp, &self.sheet_path).await?;
        Ok(())
    }

    async fn read_status(&self) -> PortalStatus {
        match tokio::fs::read_to_string(&self.status_path).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!("Status file corrupt, using default: {}", e);
                PortalStatus::default()
            }),
            Err(_) => PortalStatus::default(),
        }
    }

    async fn write_status(&self, status: PortalStatus) -> Result<(), RegistryError> {
        let body = serde_json::to_string_pretty(&status).map_err(std::io::Error::other)?;
        let tmp = self.status_path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.status_path).await?;
        Ok(())
    }
}

fn encode_sheet(records: &[SubmissionRecord]) -> String {
    let mut out = String::with_capacity(64 + records.len() * 80);
    out.push_str(SHEET_HEADER);
    out.push('\n');
    for record in records {
        out.push_str(&encode_row(record));
        out.push('\n');
    }
    out
}

/// Encodes one record as a CSV line. The sheet parser is line oriented, so
/// any stray line break inside a field is flattened to a space first.
fn encode_row(record: &SubmissionRecord) -> String {
    let fields = [
        &record.name,
        &record.roll_no,
        &record.batch,
        &record.file_link,
        &record.submitted_at,
    ];
    fields
        .iter()
        .map(|f| csv_quote(&f.replace(['\r', '\n'], " ")))
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_sheet(text: &str) -> Vec<SubmissionRecord> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if idx == 0 && line == SHEET_HEADER {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_csv_record(line);
        if fields.len() < 5 {
            tracing::warn!("Skipping malformed sheet row {}: {:?}", idx + 1, line);
            continue;
        }
        records.push(SubmissionRecord {
            name: fields[0].clone(),
            roll_no: fields[1].clone(),
            batch: fields[2].clone(),
            file_link: fields[3].clone(),
            submitted_at: fields[4].clone(),
        });
    }
    records
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == ',' && !in_quotes {
            out.push(buf);
            buf = String::new();
            i += 1;
            continue;
        }
        buf.push(ch);
        i += 1;
    }
    out.push(buf);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(roll_no: &str, name: &str, batch: &str) -> SubmissionRecord {
        SubmissionRecord {
            name: name.to_string(),
            roll_no: roll_no.to_string(),
            batch: batch.to_string(),
            file_link: format!("/uploads/{}.py", roll_no),
            submitted_at: "25/8/2026, 10:00:00 am".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_roll_no() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        registry.upsert(record("101", "Asha", "A")).await.unwrap();
        registry.upsert(record("101", "Asha B.", "B")).await.unwrap();

        let all = registry.list_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Asha B.");
        assert_eq!(all[0].batch, "B");
    }

    #[tokio::test]
    async fn test_upsert_moves_record_to_end() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        registry.upsert(record("101", "Asha", "A")).await.unwrap();
        registry.upsert(record("102", "Bela", "A")).await.unwrap();
        registry.upsert(record("101", "Asha", "B")).await.unwrap();

        let all = registry.list_all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].roll_no, "102");
        assert_eq!(all[1].roll_no, "101");
    }

    #[tokio::test]
    async fn test_find_returns_stored_record() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        let stored = registry.upsert(record("101", "Asha", "A")).await.unwrap();
        let found = registry.find_by_roll_no("101").await.unwrap();
        assert_eq!(found, stored);
    }

    #[tokio::test]
    async fn test_find_on_empty_registry() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        assert!(registry.find_by_roll_no("999").await.is_none());
        assert!(registry.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_present_and_absent() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        registry.upsert(record("101", "Asha", "A")).await.unwrap();
        registry.upsert(record("102", "Bela", "A")).await.unwrap();

        let removed = registry.remove("102").await.unwrap();
        assert_eq!(removed.roll_no, "102");

        let all = registry.list_all().await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].roll_no, "101");
        assert!(registry.find_by_roll_no("102").await.is_none());

        let err = registry.remove("102").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
        assert_eq!(registry.list_all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_recent_returns_newest_first() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        for i in 1..=7 {
            registry
                .upsert(record(&format!("10{}", i), "Student", ""))
                .await
                .unwrap();
        }

        let recent = registry.recent(RECENT_LIMIT).await;
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].roll_no, "107");
        assert_eq!(recent[4].roll_no, "103");
    }

    #[tokio::test]
    async fn test_status_defaults_to_accepting() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        assert!(registry.is_accepting().await);

        let status = registry.set_accepting(false).await.unwrap();
        assert!(!status.accepting_submissions);
        assert!(!registry.is_accepting().await);

        let status = registry.toggle().await.unwrap();
        assert!(status.accepting_submissions);
        assert!(registry.is_accepting().await);
    }

    #[tokio::test]
    async fn test_corrupt_sheet_reads_as_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(SHEET_FILE), [0xff, 0xfe, 0x00, 0x42]).unwrap();

        let registry = SubmissionRegistry::new(dir.path());
        assert!(registry.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_status_defaults_to_accepting() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(STATUS_FILE), "{not json").unwrap();

        let registry = SubmissionRegistry::new(dir.path());
        assert!(registry.is_accepting().await);
    }

    #[tokio::test]
    async fn test_fields_with_commas_and_quotes_round_trip() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        let mut r = record("101", "Doe, Jane \"JD\"", "A, late");
        registry.upsert(r.clone()).await.unwrap();

        let found = registry.find_by_roll_no("101").await.unwrap();
        assert_eq!(found, r);

        // Line breaks cannot survive the line-oriented sheet; they flatten
        r = record("102", "Line\nBreak", "");
        registry.upsert(r).await.unwrap();
        let found = registry.find_by_roll_no("102").await.unwrap();
        assert_eq!(found.name, "Line Break");
    }

    #[tokio::test]
    async fn test_export_sheet_always_has_header() {
        let dir = tempdir().unwrap();
        let registry = SubmissionRegistry::new(dir.path());

        let empty = registry.export_sheet().await;
        assert_eq!(empty, "Name,RollNo,Batch,FileLink,DateTime\n");

        registry.upsert(record("101", "Asha", "A")).await.unwrap();
        let sheet = registry.export_sheet().await;
        assert!(sheet.starts_with("Name,RollNo,Batch,FileLink,DateTime\n"));
        assert!(sheet.contains("Asha,101,A,/uploads/101.py,"));
    }

    #[test]
    fn test_parse_csv_record() {
        assert_eq!(parse_csv_record("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_csv_record("a,\"b,c\",d"), vec!["a", "b,c", "d"]);
        assert_eq!(parse_csv_record("\"say \"\"hi\"\"\""), vec!["say \"hi\""]);
        assert_eq!(parse_csv_record(""), vec![""]);
        assert_eq!(parse_csv_record("trailing,"), vec!["trailing", ""]);
    }

    #[test]
    fn test_csv_quote() {
        assert_eq!(csv_quote("plain"), "plain");
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
        assert_eq!(csv_quote("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
