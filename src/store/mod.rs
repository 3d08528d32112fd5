//! Result store module
//!
//! Flat directory of `<year>-<unix-nanos>.json` files, each holding one JSON
//! object per result row.

use hyper::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::query::ResultRow;

/// File suffix of stored results
const RESULT_EXT: &str = ".json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result not found: {0}")]
    NotFound(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode row: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub struct ResultStore {
    data_path: PathBuf,
}

impl ResultStore {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
        }
    }

    /// Create the data directory if it does not exist yet
    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        match fs::metadata(&self.data_path).await {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(&self.data_path, e)),
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder
            .create(&self.data_path)
            .await
            .map_err(|e| StoreError::io(&self.data_path, e))
    }

    fn result_path(&self, id: &str) -> PathBuf {
        self.data_path.join(format!("{id}{RESULT_EXT}"))
    }

    /// Persist `rows` under a fresh id and return that id
    pub async fn write(&self, year: i32, rows: &[ResultRow]) -> Result<String, StoreError> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let id = format!("{year}-{nanos}");
        let path = self.result_path(&id);

        let mut buf = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buf, row)?;
            buf.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(&buf)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        file.flush().await.map_err(|e| StoreError::io(&path, e))?;

        Ok(id)
    }

    /// Ids of all stored results, in directory iteration order
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = fs::read_dir(&self.data_path)
            .await
            .map_err(|e| StoreError::io(&self.data_path, e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.data_path, e))?
        {
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(|n| n.strip_suffix(RESULT_EXT)) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    /// Raw bytes of a stored result, unparsed
    pub async fn read(&self, id: &str) -> Result<Bytes, StoreError> {
        let path = self.result_path(id);
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_rows() -> Vec<ResultRow> {
        vec![
            ResultRow {
                series_id: Some("LNS14000000".to_string()),
                year: Some(2017),
                period: Some("M01".to_string()),
                value: Some(4.7),
                footnote_codes: None,
                date: NaiveDate::from_ymd_opt(2017, 1, 31),
                series_title: Some("Unemployment Rate".to_string()),
            },
            ResultRow {
                series_id: Some("LNS14000001".to_string()),
                ..ResultRow::default()
            },
            ResultRow::default(),
        ]
    }

    #[tokio::test]
    async fn test_write_then_read_preserves_rows_and_nulls() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());
        let rows = sample_rows();

        let id = store.write(2017, &rows).await.unwrap();
        let (year, nanos) = id.split_once('-').unwrap();
        assert_eq!(year, "2017");
        assert!(!nanos.is_empty() && nanos.chars().all(|c| c.is_ascii_digit()));

        let data = store.read(&id).await.unwrap();
        let text = std::str::from_utf8(&data).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), rows.len());

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert!(first["footnote_codes"].is_null());
        assert_eq!(first["date"], "2017-01-31");
        assert_eq!(first["year"], 2017);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert!(second["value"].is_null());
        assert!(second["year"].is_null());

        let decoded: Vec<ResultRow> = lines
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(decoded, rows);
    }

    #[tokio::test]
    async fn test_write_empty_rows_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());
        let id = store.write(1999, &[]).await.unwrap();
        assert!(store.read(&id).await.unwrap().is_empty());
        assert_eq!(store.list().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_list_only_json_files() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());
        assert!(store.list().await.unwrap().is_empty());

        for name in ["2016-1234.json", "2017-1234.json", "2017-1235.json", "2017-1235.png"] {
            std::fs::write(dir.path().join(name), b"{}").unwrap();
        }

        let mut ids = store.list().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["2016-1234", "2017-1234", "2017-1235"]);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());
        let err = store.read("2015-1234").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "2015-1234"));
    }

    #[tokio::test]
    async fn test_read_returns_bytes_verbatim() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("2017-1234.json"), b"{2017-1234}").unwrap();
        let store = ResultStore::new(dir.path());
        assert_eq!(&store.read("2017-1234").await.unwrap()[..], b"{2017-1234}");
    }

    #[tokio::test]
    async fn test_write_into_missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new(dir.path().join("absent"));
        let err = store.write(2017, &sample_rows()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[tokio::test]
    async fn test_ensure_dir_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("results");
        let store = ResultStore::new(&target);
        store.ensure_dir().await.unwrap();
        assert!(target.is_dir());
        // second call is a no-op
        store.ensure_dir().await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
