//! The persisted post index: one listing record per line, in crawl order.
//!
//! The crawl appends records as they arrive and flushes after each one, so a
//! crawl that fails halfway leaves every record it saw on disk. Readers scan
//! the file front to back.

use crate::error::{Error, Result};
use crate::models::ListingRecord;
use futures::stream::{self, Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, instrument};

pub const INDEX_FILE_NAME: &str = "posts.jsonl";

/// Append-only writer for the index file.
#[derive(Debug)]
pub struct IndexWriter {
    file: File,
    path: PathBuf,
    written: u64,
}

impl IndexWriter {
    /// Start a fresh index at `path`, discarding any previous content.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        Ok(Self {
            file,
            path,
            written: 0,
        })
    }

    /// Write one record as a JSON line and flush it to disk.
    pub async fn append(&mut self, record: &ListingRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Lazily read the index at `path` in file order. Blank lines are skipped.
///
/// A line that is not a valid record yields an error naming the line number.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn read_index(
    path: impl AsRef<Path>,
) -> Result<impl Stream<Item = Result<ListingRecord>>> {
    let file = File::open(path.as_ref()).await?;
    let lines = BufReader::new(file).lines();

    Ok(stream::try_unfold((lines, 0u64), |(mut lines, mut line_no)| async move {
        loop {
            let Some(line) = lines.next_line().await? else {
                debug!(lines = line_no, "finished reading index");
                return Ok::<_, Error>(None);
            };
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str::<ListingRecord>(&line).map_err(|e| {
                Error::InvalidRecord(format!("index line {line_no}: {e}"))
            })?;
            return Ok(Some((record, (lines, line_no))));
        }
    }))
}

/// Keep only the records tagged with the hub `alias`, preserving order.
pub fn filter_by_hub<S>(records: S, alias: &str) -> impl Stream<Item = Result<ListingRecord>> + use<S>
where
    S: Stream<Item = Result<ListingRecord>>,
{
    let alias = alias.to_owned();
    records.try_filter(move |record| futures::future::ready(record.has_hub(&alias)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PostId;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(id: u64, hubs: &[&str]) -> ListingRecord {
        let hubs: Vec<_> = hubs.iter().map(|alias| json!({"alias": alias})).collect();
        ListingRecord::try_from(json!({"id": id.to_string(), "hubs": hubs, "titleHtml": format!("Post {id}")}))
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_keeps_crawl_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);

        let records = vec![record(3, &["python"]), record(1, &[]), record(2, &["rust", "python"])];
        let mut writer = IndexWriter::create(&path).await.unwrap();
        for r in &records {
            writer.append(r).await.unwrap();
        }
        assert_eq!(writer.written(), 3);
        assert_eq!(writer.path(), path.as_path());

        let read: Vec<ListingRecord> = read_index(&path).await.unwrap().try_collect().await.unwrap();
        assert_eq!(read, records);

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(raw.lines().count(), 3);
        assert!(raw.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_create_truncates_previous_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        tokio::fs::write(&path, "{\"id\": \"old\"}\n").await.unwrap();

        let mut writer = IndexWriter::create(&path).await.unwrap();
        writer.append(&record(9, &[])).await.unwrap();

        let read: Vec<ListingRecord> = read_index(&path).await.unwrap().try_collect().await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].id(), &PostId::from("9"));
    }

    #[tokio::test]
    async fn test_filter_by_hub() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        let mut writer = IndexWriter::create(&path).await.unwrap();
        for r in [
            record(1, &["python"]),
            record(2, &["javascript"]),
            record(3, &[]),
            record(4, &["devops", "python"]),
            record(5, &["python3"]),
        ] {
            writer.append(&r).await.unwrap();
        }

        let matching: Vec<ListingRecord> = filter_by_hub(read_index(&path).await.unwrap(), "python")
            .try_collect()
            .await
            .unwrap();
        let ids: Vec<_> = matching.iter().map(|r| r.id().to_string()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[tokio::test]
    async fn test_blank_lines_skipped_and_bad_lines_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        tokio::fs::write(&path, "{\"id\": 1}\n\n{\"id\": 2}\nnot json\n")
            .await
            .unwrap();

        let results: Vec<Result<ListingRecord>> = futures::StreamExt::collect(read_index(&path).await.unwrap()).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().id(), &PostId::from(1u64));
        assert_eq!(results[1].as_ref().unwrap().id(), &PostId::from(2u64));
        let err = results[2].as_ref().unwrap_err().to_string();
        assert!(err.contains("index line 4"), "{err}");
    }

    #[tokio::test]
    async fn test_missing_index_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_index(dir.path().join("nope.jsonl")).await.err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }
}
