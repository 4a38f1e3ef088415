// File: crates/timechart-core/src/view.rs
// Summary: Shareable view state: visible window plus per-axis dataset ids, as URL query parameters.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use url::form_urlencoded;

use crate::error::ChartError;
use crate::series::{format_timestamp, parse_timestamp};

#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub left: Vec<String>,
    pub right: Vec<String>,
}

/// Result of reading a link. `alert` is set only when the link's start is not
/// before its end; every other bad parameter silently falls back.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedLink {
    pub view: ViewState,
    pub alert: Option<ChartError>,
}

impl ViewState {
    /// The trailing `window_secs` ending at `now`, with no datasets.
    pub fn trailing(now: DateTime<Utc>, window_secs: i64) -> Self {
        Self { start: now - Duration::seconds(window_secs), end: now, left: Vec::new(), right: Vec::new() }
    }

    pub fn to_query(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("start", &format_timestamp(self.start))
            .append_pair("end", &format_timestamp(self.end))
            .append_pair("left", &self.left.join(","))
            .append_pair("right", &self.right.join(","))
            .finish()
    }

    /// Read a query string (a leading `?` or a whole URL is accepted), taking
    /// each missing or unreadable parameter from `defaults`.
    pub fn from_query(query: &str, defaults: &ViewState) -> ParsedLink {
        let query = query.split_once('?').map_or(query, |(_, q)| q);
        let mut start = None;
        let mut end = None;
        let mut left = None;
        let mut right = None;
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "start" => start = read_time("start", &value),
                "end" => end = read_time("end", &value),
                "left" => left = Some(split_ids(&value)),
                "right" => right = Some(split_ids(&value)),
                other => warn!(param = other, "ignoring unknown link parameter"),
            }
        }

        let mut alert = None;
        let mut start = start.unwrap_or(defaults.start);
        let mut end = end.unwrap_or(defaults.end);
        if start >= end {
            alert = Some(ChartError::InvalidRange { start: format_timestamp(start), end: format_timestamp(end) });
            start = defaults.start;
            end = defaults.end;
        }

        let left = left.unwrap_or_else(|| defaults.left.clone());
        let mut right = right.unwrap_or_else(|| defaults.right.clone());
        right.retain(|id| !left.contains(id));
        ParsedLink { view: ViewState { start, end, left, right }, alert }
    }
}

fn read_time(name: &str, value: &str) -> Option<DateTime<Utc>> {
    match parse_timestamp(value) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!(param = name, error = %e, "falling back to default");
            None
        }
    }
}

/// Comma-separated ids, trimmed, empties and repeats dropped.
fn split_ids(value: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|have| have == id) {
            out.push(id.to_string());
        }
    }
    out
}
