//! Table dump service.
//!
//! Walks the query endpoint page by page with the returned cursor and writes
//! every record as one JSON line. Each page is written before the next one is
//! requested, so an aborted run keeps everything fetched so far.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::client::XataClient;
use crate::error::{AppError, AppResult};
use crate::models::{record_line, QueryRequest, QueryResponse};

/// Anything that can serve query pages.
pub trait PageSource {
    fn fetch(
        &self,
        request: &QueryRequest,
    ) -> impl std::future::Future<Output = AppResult<QueryResponse>> + Send;
}

impl PageSource for XataClient {
    async fn fetch(&self, request: &QueryRequest) -> AppResult<QueryResponse> {
        self.query(request).await
    }
}

/// Outcome of a completed dump.
#[derive(Debug, Clone, Serialize)]
pub struct DumpSummary {
    pub pages: u64,
    pub records: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DumpSummary {
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Dumps every page from `source` into `writer`, one record per line.
pub async fn dump_table<S, W>(source: &S, writer: &mut W, page_size: u32) -> AppResult<DumpSummary>
where
    S: PageSource + Sync,
    W: AsyncWrite + Unpin + Send,
{
    let started_at = Utc::now();
    let mut pages = 0u64;
    let mut records = 0u64;

    let mut page = source.fetch(&QueryRequest::first(page_size)).await?;
    // Every cursor handed out so far; a repeat means the pages cycle.
    let mut seen: HashSet<String> = HashSet::new();

    loop {
        pages += 1;
        records += write_records(writer, &page).await?;
        writer.flush().await?;
        tracing::debug!(page = pages, total_records = records, "Page written");

        if !page.has_more() {
            break;
        }

        let cursor = page
            .cursor()
            .ok_or_else(|| {
                AppError::Protocol(format!("page {pages} reports more data but has no cursor"))
            })?
            .to_string();
        if !seen.insert(cursor.clone()) {
            return Err(AppError::Protocol(format!(
                "cursor '{cursor}' repeated after page {pages}"
            )));
        }

        page = source.fetch(&QueryRequest::after(page_size, cursor.as_str())).await?;
    }

    writer.flush().await?;

    Ok(DumpSummary {
        pages,
        records,
        started_at,
        finished_at: Utc::now(),
    })
}

/// Creates (or truncates) `path` and dumps the table into it.
pub async fn dump_to_file<S>(source: &S, path: &Path, page_size: u32) -> AppResult<DumpSummary>
where
    S: PageSource + Sync,
{
    let file = File::create(path).await?;
    let mut writer = BufWriter::new(file);
    let summary = dump_table(source, &mut writer, page_size).await;
    // Keep whatever was written even when the run failed midway.
    writer.shutdown().await?;
    summary
}

async fn write_records<W>(writer: &mut W, page: &QueryResponse) -> AppResult<u64>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut written = 0u64;
    for record in &page.records {
        let mut line = record_line(record)?;
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    /// Serves canned pages and records every request it receives.
    struct FakeSource {
        pages: Mutex<VecDeque<AppResult<QueryResponse>>>,
        requests: Mutex<Vec<QueryRequest>>,
    }

    impl FakeSource {
        fn new(pages: Vec<AppResult<serde_json::Value>>) -> Self {
            let pages = pages
                .into_iter()
                .map(|p| p.map(|v| serde_json::from_value(v).unwrap()))
                .collect();
            Self {
                pages: Mutex::new(pages),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<QueryRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl PageSource for FakeSource {
        async fn fetch(&self, request: &QueryRequest) -> AppResult<QueryResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Protocol("no more canned pages".to_string())))
        }
    }

    fn lines(buf: &[u8]) -> Vec<String> {
        String::from_utf8(buf.to_vec())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_single_page() {
        let source = FakeSource::new(vec![Ok(json!({
            "meta": {"page": {"cursor": "c1", "more": false}},
            "records": [{"id": "a", "xata": {"version": 0}}, {"id": "b", "xata": {"version": 1}}]
        }))]);
        let mut out = Vec::new();

        let summary = dump_table(&source, &mut out, 200).await.unwrap();

        assert_eq!(summary.pages, 1);
        assert_eq!(summary.records, 2);
        assert_eq!(lines(&out), vec![r#"{"id":"a"}"#, r#"{"id":"b"}"#]);
        assert_eq!(source.requests(), vec![QueryRequest::first(200)]);
    }

    #[tokio::test]
    async fn test_follows_cursors_in_order() {
        let source = FakeSource::new(vec![
            Ok(json!({"meta": {"page": {"cursor": "c1", "more": true}}, "records": [{"id": "a"}]})),
            Ok(json!({"meta": {"page": {"cursor": "c2", "more": true}}, "records": [{"id": "b"}]})),
            Ok(json!({"meta": {"page": {"cursor": "c3", "more": false}}, "records": [{"id": "c"}]})),
        ]);
        let mut out = Vec::new();

        let summary = dump_table(&source, &mut out, 2).await.unwrap();

        assert_eq!(summary.pages, 3);
        assert_eq!(summary.records, 3);
        assert_eq!(
            source.requests(),
            vec![
                QueryRequest::first(2),
                QueryRequest::after(2, "c1"),
                QueryRequest::after(2, "c2"),
            ]
        );
        assert_eq!(
            lines(&out),
            vec![r#"{"id":"a"}"#, r#"{"id":"b"}"#, r#"{"id":"c"}"#]
        );
    }

    #[tokio::test]
    async fn test_empty_table() {
        let source = FakeSource::new(vec![Ok(json!({"meta": {"page": {"more": false}}, "records": []}))]);
        let mut out = Vec::new();

        let summary = dump_table(&source, &mut out, 200).await.unwrap();

        assert_eq!(summary.records, 0);
        assert!(out.is_empty());
        assert!(summary.elapsed_ms() >= 0);
    }

    #[tokio::test]
    async fn test_more_without_cursor_fails() {
        let source = FakeSource::new(vec![Ok(json!({
            "meta": {"page": {"more": true}},
            "records": [{"id": "a"}]
        }))]);
        let mut out = Vec::new();

        let err = dump_table(&source, &mut out, 200).await.unwrap_err();

        assert!(matches!(err, AppError::Protocol(_)));
        // The page itself was still written.
        assert_eq!(lines(&out), vec![r#"{"id":"a"}"#]);
    }

    #[tokio::test]
    async fn test_repeated_cursor_fails() {
        let source = FakeSource::new(vec![
            Ok(json!({"meta": {"page": {"cursor": "same", "more": true}}, "records": []})),
            Ok(json!({"meta": {"page": {"cursor": "same", "more": true}}, "records": []})),
        ]);
        let mut out = Vec::new();

        let err = dump_table(&source, &mut out, 200).await.unwrap_err();
        assert!(err.to_string().contains("repeated"));
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_cycling_cursors_fail() {
        let source = FakeSource::new(vec![
            Ok(json!({"meta": {"page": {"cursor": "A", "more": true}}, "records": [{"id": "1"}]})),
            Ok(json!({"meta": {"page": {"cursor": "B", "more": true}}, "records": [{"id": "2"}]})),
            Ok(json!({"meta": {"page": {"cursor": "A", "more": true}}, "records": [{"id": "1"}]})),
            Ok(json!({"meta": {"page": {"cursor": "B", "more": true}}, "records": [{"id": "2"}]})),
        ]);
        let mut out = Vec::new();

        let err = dump_table(&source, &mut out, 200).await.unwrap_err();

        assert!(matches!(err, AppError::Protocol(ref msg) if msg.contains("'A'")));
        assert_eq!(
            source.requests(),
            vec![
                QueryRequest::first(200),
                QueryRequest::after(200, "A"),
                QueryRequest::after(200, "B"),
            ]
        );
        assert_eq!(lines(&out).len(), 3);
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_written_pages() {
        let source = FakeSource::new(vec![
            Ok(json!({"meta": {"page": {"cursor": "c1", "more": true}}, "records": [{"id": "a"}]})),
            Err(AppError::UpstreamStatus {
                status: 503,
                body: "unavailable".to_string(),
            }),
        ]);
        let mut out = Vec::new();

        let err = dump_table(&source, &mut out, 200).await.unwrap_err();

        assert!(matches!(err, AppError::UpstreamStatus { status: 503, .. }));
        assert_eq!(lines(&out), vec![r#"{"id":"a"}"#]);
    }

    #[tokio::test]
    async fn test_dump_to_file_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        tokio::fs::write(&path, "stale line\nanother\n").await.unwrap();

        let source = FakeSource::new(vec![Ok(json!({
            "meta": {"page": {"more": false}},
            "records": [{"id": "fresh"}]
        }))]);

        let summary = dump_to_file(&source, &path, 50).await.unwrap();
        assert_eq!(summary.records, 1);

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(content, "{\"id\":\"fresh\"}\n");
    }
}
