// File: crates/timechart-http/src/lib.rs
// Summary: reqwest-backed store client speaking the JSON routes under `/api`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use timechart_core::backend::{
    parse_data_response, parse_dataset_list, CommentEnvelope, CommentsResponse, CreatedResponse, WirePoint,
};
use timechart_core::{Backend, BackendError, BackendFuture, Comment, CommentQuery, Dataset, Point};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// Client for a chart store reachable over HTTP.
///
/// Futures need a tokio runtime to be polled on.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

/// Time parameters go out as naive UTC with milliseconds, which every
/// ISO-8601 reader accepts.
fn wire_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

#[derive(Serialize)]
struct Upload<'a> {
    data: Vec<UploadSet<'a>>,
}

#[derive(Serialize)]
struct UploadSet<'a> {
    dataset_id: &'a str,
    points: Vec<WirePoint>,
}

impl HttpBackend {
    pub fn new(base: &str) -> Result<Self, BackendError> {
        Self::with_timeout(base, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base: &str, timeout: Duration) -> Result<Self, BackendError> {
        let base = Url::parse(base).map_err(|e| BackendError::Transport(format!("bad base url {base:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Transport(format!("{base} cannot be a base url")));
        }
        let client = Client::builder().timeout(timeout).build().map_err(transport)?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    /// `GET /api/data/{id}?start&end`
    pub fn data_url(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Url {
        let mut url = self.endpoint(&["data", id]);
        url.query_pairs_mut().append_pair("start", &wire_time(start)).append_pair("end", &wire_time(end));
        url
    }

    /// `GET /api/comment?start&end[&tags]`; `tags` is omitted when the filter is empty.
    pub fn comments_url(&self, query: &CommentQuery) -> Url {
        let mut url = self.endpoint(&["comment"]);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("start", &wire_time(query.start)).append_pair("end", &wire_time(query.end));
            if !query.tags.is_empty() {
                pairs.append_pair("tags", &query.tags.join(","));
            }
        }
        url
    }

    /// `GET /api/datasets?text`
    pub fn search_url(&self, text: &str) -> Url {
        let mut url = self.endpoint(&["datasets"]);
        url.query_pairs_mut().append_pair("text", text);
        url
    }

    pub fn delete_url(&self, id: i64) -> Url {
        self.endpoint(&["comment", "delete", &id.to_string()])
    }

    /// Bulk-load points with `POST /api/data`.
    pub fn upload<'a>(&self, datasets: impl IntoIterator<Item = (&'a str, &'a [Point])>) -> BackendFuture<()> {
        let body = Upload {
            data: datasets
                .into_iter()
                .map(|(dataset_id, points)| UploadSet { dataset_id, points: points.iter().map(WirePoint::from).collect() })
                .collect(),
        };
        let count: usize = body.data.iter().map(|d| d.points.len()).sum();
        let request = self.client.post(self.endpoint(&["data"])).json(&body);
        async move {
            checked(request.send().await.map_err(transport)?).await?;
            debug!(points = count, "uploaded points");
            Ok(())
        }
        .boxed_local()
    }
}

/// Pass 2xx responses through. A 400 carries the store's `message` as a rejection.
async fn checked(resp: Response) -> Result<Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::BAD_REQUEST {
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);
        return Err(BackendError::Rejected(message));
    }
    Err(BackendError::Status(status.as_u16()))
}

async fn text_of(resp: Response) -> Result<String, BackendError> {
    checked(resp).await?.text().await.map_err(transport)
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))
}

impl Backend for HttpBackend {
    /// Error replies carry no `dataset`/`points`, so they parse to `None` like any
    /// other incomplete body. Only transport failures are errors.
    fn fetch_dataset(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> BackendFuture<Option<Dataset>> {
        let id = id.to_string();
        let request = self.client.get(self.data_url(&id, start, end));
        async move {
            let resp = request.send().await.map_err(transport)?;
            let status = resp.status();
            let body = resp.text().await.map_err(transport)?;
            if !status.is_success() {
                warn!(dataset = %id, status = status.as_u16(), body = %body, "data query failed");
            }
            Ok(parse_data_response(&id, &body))
        }
        .boxed_local()
    }

    /// A store that cannot answer the query gets no annotations, not a failed refresh.
    fn fetch_comments(&self, query: &CommentQuery) -> BackendFuture<Vec<Comment>> {
        let request = self.client.get(self.comments_url(query));
        async move {
            let resp = request.send().await.map_err(transport)?;
            if !resp.status().is_success() {
                warn!(status = resp.status().as_u16(), "comment query failed; showing none");
                return Ok(Vec::new());
            }
            let body = resp.text().await.map_err(transport)?;
            Ok(decode::<CommentsResponse>(&body)?.comments)
        }
        .boxed_local()
    }

    fn create_comment(&self, comment: &Comment) -> BackendFuture<i64> {
        let request = self.client.post(self.endpoint(&["comment", "new"])).json(&CommentEnvelope { comment });
        async move {
            let body = text_of(request.send().await.map_err(transport)?).await?;
            Ok(decode::<CreatedResponse>(&body)?.id)
        }
        .boxed_local()
    }

    fn update_comment(&self, comment: &Comment) -> BackendFuture<()> {
        let request = self.client.put(self.endpoint(&["comment", "edit"])).json(&CommentEnvelope { comment });
        async move {
            checked(request.send().await.map_err(transport)?).await?;
            Ok(())
        }
        .boxed_local()
    }

    fn delete_comment(&self, id: i64) -> BackendFuture<()> {
        let request = self.client.delete(self.delete_url(id));
        async move {
            checked(request.send().await.map_err(transport)?).await?;
            Ok(())
        }
        .boxed_local()
    }

    fn search_datasets(&self, text: &str) -> BackendFuture<Vec<String>> {
        let request = self.client.get(self.search_url(text));
        async move {
            let body = text_of(request.send().await.map_err(transport)?).await?;
            parse_dataset_list(&body)
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn t(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, secs).unwrap()
    }

    #[test]
    fn urls_follow_the_store_routes() {
        let b = HttpBackend::new("http://localhost:5000").unwrap();
        assert_eq!(
            b.data_url("cpu load", t(0), t(5)).as_str(),
            "http://localhost:5000/api/data/cpu%20load?start=2024-01-01T00%3A00%3A00.000&end=2024-01-01T00%3A00%3A05.000"
        );
        assert_eq!(b.delete_url(7).as_str(), "http://localhost:5000/api/comment/delete/7");
        assert_eq!(b.search_url("a&b").as_str(), "http://localhost:5000/api/datasets?text=a%26b");
    }

    #[test]
    fn base_path_and_tag_filter() {
        let b = HttpBackend::new("https://example.org/chart/?x=1").unwrap();
        let mut q = CommentQuery { start: t(0), end: t(1), tags: vec![] };
        assert!(!b.comments_url(&q).as_str().contains("tags"));
        q.tags = vec!["ops".into(), "db".into()];
        let url = b.comments_url(&q);
        assert!(url.as_str().starts_with("https://example.org/chart/api/comment?"));
        assert!(url.as_str().ends_with("&tags=ops%2Cdb"));
    }

    #[test]
    fn rejects_unusable_base() {
        assert!(HttpBackend::new("not a url").is_err());
        assert!(HttpBackend::new("mailto:ops@example.org").is_err());
    }

    /// Consume the request head and its body so closing the socket does not reset it.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap_or(0)))
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + length {
                    return;
                }
            }
        }
    }

    /// Serve one canned response on a local port, returning the base url.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn data_response_is_parsed() {
        let base = serve_once("200 OK", r#"{"data":{"dataset":"temp","points":[{"date":"2024-01-01T00:00:00","value":3.5}]}}"#).await;
        let b = HttpBackend::new(&base).unwrap();
        let d = b.fetch_dataset("temp", t(0), t(10)).await.unwrap().expect("complete body");
        assert_eq!(d.points, vec![Point::raw(t(0), 3.5)]);
    }

    #[tokio::test]
    async fn data_error_reply_is_dropped_not_failed() {
        let base = serve_once("400 BAD REQUEST", r#"{"message":"Invalid or missing start/end times"}"#).await;
        let b = HttpBackend::new(&base).unwrap();
        assert_eq!(b.fetch_dataset("temp", t(0), t(10)).await, Ok(None));
    }

    #[tokio::test]
    async fn rejection_message_is_surfaced() {
        let base = serve_once("400 BAD REQUEST", r#"{"message":"semicolons are not allowed"}"#).await;
        let b = HttpBackend::new(&base).unwrap();
        let err = b.create_comment(&Comment::new(t(0), "a;b", vec![])).await.unwrap_err();
        assert_eq!(err, BackendError::Rejected("semicolons are not allowed".into()));
    }

    #[tokio::test]
    async fn failed_comment_query_shows_nothing() {
        let base = serve_once("500 INTERNAL SERVER ERROR", "{}").await;
        let b = HttpBackend::new(&base).unwrap();
        let q = CommentQuery { start: t(0), end: t(1), tags: vec![] };
        assert!(b.fetch_comments(&q).await.unwrap().is_empty());
    }
}
