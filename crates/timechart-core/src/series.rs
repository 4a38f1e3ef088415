// File: crates/timechart-core/src/series.rs
// Summary: Dataset model: raw and aggregate points keyed by timestamp.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::ChartError;

/// One sample of a dataset. A point is either a raw reading or a server-side
/// aggregate of several readings, never both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Point {
    Raw { timestamp: DateTime<Utc>, value: f64 },
    Aggregate { timestamp: DateTime<Utc>, mean: f64, min: f64, max: f64 },
}

impl Point {
    pub fn raw(timestamp: DateTime<Utc>, value: f64) -> Self {
        Point::Raw { timestamp, value }
    }

    pub fn aggregate(timestamp: DateTime<Utc>, mean: f64, min: f64, max: f64) -> Self {
        Point::Aggregate { timestamp, mean, min, max }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match *self {
            Point::Raw { timestamp, .. } | Point::Aggregate { timestamp, .. } => timestamp,
        }
    }

    /// Timestamp as fractional milliseconds since the Unix epoch.
    #[inline]
    pub fn time_ms(&self) -> f64 {
        to_ms(self.timestamp())
    }

    /// Raw value when present, otherwise the aggregate mean.
    #[inline]
    pub fn value(&self) -> f64 {
        match *self {
            Point::Raw { value, .. } => value,
            Point::Aggregate { mean, .. } => mean,
        }
    }

    pub fn min(&self) -> f64 {
        match *self {
            Point::Raw { value, .. } => value,
            Point::Aggregate { min, .. } => min,
        }
    }

    pub fn max(&self) -> f64 {
        match *self {
            Point::Raw { value, .. } => value,
            Point::Aggregate { max, .. } => max,
        }
    }
}

/// A named series for the currently requested window. Refreshes replace `points`
/// wholesale.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub id: String,
    pub points: Vec<Point>,
}

impl Dataset {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), points: Vec::new() }
    }

    pub fn with_points(id: impl Into<String>, points: Vec<Point>) -> Self {
        Self { id: id.into(), points }
    }

    /// Points whose timestamp lies in `[start_ms, end_ms]`.
    pub fn points_within(&self, start_ms: f64, end_ms: f64) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(move |p| {
            let t = p.time_ms();
            t >= start_ms && t <= end_ms
        })
    }

    /// Values of points whose timestamp lies in the half-open `[start_ms, end_ms)`.
    pub fn values_in(&self, start_ms: f64, end_ms: f64) -> Vec<f64> {
        self.points
            .iter()
            .filter(|p| {
                let t = p.time_ms();
                t >= start_ms && t < end_ms
            })
            .map(Point::value)
            .collect()
    }
}

#[inline]
pub fn to_ms(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 + f64::from(t.timestamp_subsec_nanos() % 1_000_000) / 1e6
}

/// Inverse of [`to_ms`]; `None` when out of chrono's range or not finite.
pub fn from_ms(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    let whole = ms.floor();
    let nanos = ((ms - whole) * 1e6).round() as u32;
    DateTime::<Utc>::from_timestamp_millis(whole as i64)
        .map(|t| t + chrono::Duration::nanoseconds(i64::from(nanos.min(999_999))))
}

/// Parse ISO-8601 text: RFC 3339 with an offset, or a naive date-time (or bare
/// date) taken as UTC.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, ChartError> {
    let s = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
        .ok_or_else(|| ChartError::InvalidTimestamp(text.to_string()))
}

/// RFC 3339 in UTC with millisecond precision, as used on the wire and in links.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
