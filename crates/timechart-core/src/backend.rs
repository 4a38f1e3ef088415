// File: crates/timechart-core/src/backend.rs
// Summary: Asynchronous data-store contract and the JSON shapes it speaks.

use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::BackendError;
use crate::series::{format_timestamp, parse_timestamp, Dataset, Point};

/// Most comments a single query returns.
pub const MAX_COMMENT_HITS: usize = 20;

pub type BackendFuture<T> = LocalBoxFuture<'static, Result<T, BackendError>>;

/// A user-authored, timestamped note. `id` is assigned by the store on creation;
/// new comments are sent with `id == 0`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub id: i64,
    #[serde(serialize_with = "ser_timestamp", deserialize_with = "de_timestamp")]
    pub date: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Comment {
    pub fn new(date: DateTime<Utc>, text: impl Into<String>, tags: Vec<String>) -> Self {
        Self { id: 0, date, text: text.into(), tags }
    }

    /// Whether every tag in `filter` is carried by this comment.
    pub fn has_tags(&self, filter: &[String]) -> bool {
        filter.iter().all(|t| self.tags.contains(t))
    }
}

/// Time window and tag filter for a comment query.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub tags: Vec<String>,
}

/// The store the chart reads datasets and annotations from.
///
/// Futures are `'static` so the engine can queue them; implementations clone
/// whatever handles they need into the future.
pub trait Backend {
    /// `Ok(None)` when the store answered with an incomplete body.
    fn fetch_dataset(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> BackendFuture<Option<Dataset>>;

    fn fetch_comments(&self, query: &CommentQuery) -> BackendFuture<Vec<Comment>>;

    /// Returns the id the store assigned.
    fn create_comment(&self, comment: &Comment) -> BackendFuture<i64>;

    fn update_comment(&self, comment: &Comment) -> BackendFuture<()>;

    fn delete_comment(&self, id: i64) -> BackendFuture<()>;

    /// Dataset ids matching free text, in the store's order.
    fn search_datasets(&self, text: &str) -> BackendFuture<Vec<String>>;
}

fn ser_timestamp<S: Serializer>(t: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(*t))
}

fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let text = String::deserialize(d)?;
    parse_timestamp(&text).map_err(serde::de::Error::custom)
}

/// One point as the store sends it. Aggregates carry `mean_value`/`min_value`/`max_value`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WirePoint {
    Aggregate {
        #[serde(serialize_with = "ser_timestamp", deserialize_with = "de_timestamp")]
        date: DateTime<Utc>,
        mean_value: f64,
        min_value: f64,
        max_value: f64,
    },
    Raw {
        #[serde(serialize_with = "ser_timestamp", deserialize_with = "de_timestamp")]
        date: DateTime<Utc>,
        value: f64,
    },
}

impl From<WirePoint> for Point {
    fn from(p: WirePoint) -> Self {
        match p {
            WirePoint::Raw { date, value } => Point::raw(date, value),
            WirePoint::Aggregate { date, mean_value, min_value, max_value } => {
                Point::aggregate(date, mean_value, min_value, max_value)
            }
        }
    }
}

impl From<&Point> for WirePoint {
    fn from(p: &Point) -> Self {
        match *p {
            Point::Raw { timestamp, value } => WirePoint::Raw { date: timestamp, value },
            Point::Aggregate { timestamp, mean, min, max } => {
                WirePoint::Aggregate { date: timestamp, mean_value: mean, min_value: min, max_value: max }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DataResponse {
    pub data: Option<DataBody>,
}

#[derive(Debug, Deserialize)]
pub struct DataBody {
    /// Descriptor of the dataset; only its presence is checked.
    pub dataset: Option<serde_json::Value>,
    pub points: Option<Vec<WirePoint>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentsResponse {
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Serialize)]
pub struct CommentEnvelope<'a> {
    pub comment: &'a Comment,
}

/// Turn a `/data` body into a dataset. Bodies missing `dataset` or `points`, or
/// that are not valid JSON, are logged and yield `None`.
pub fn parse_data_response(id: &str, body: &str) -> Option<Dataset> {
    let resp: DataResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            warn!(dataset = id, error = %e, "dropping unparsable data response");
            return None;
        }
    };
    match resp.data {
        Some(DataBody { dataset: Some(d), points: Some(points) }) if !d.is_null() => {
            Some(Dataset::with_points(id, points.into_iter().map(Point::from).collect()))
        }
        _ => {
            warn!(dataset = id, "dropping data response without dataset or points");
            None
        }
    }
}

/// Parse a `/datasets` body: either a bare list of ids or `{ "datasets": [...] }`.
pub fn parse_dataset_list(body: &str) -> Result<Vec<String>, BackendError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Listing {
        Bare(Vec<String>),
        Wrapped { datasets: Vec<String> },
    }
    match serde_json::from_str::<Listing>(body) {
        Ok(Listing::Bare(ids)) | Ok(Listing::Wrapped { datasets: ids }) => Ok(ids),
        Err(e) => Err(BackendError::Malformed(e.to_string())),
    }
}
