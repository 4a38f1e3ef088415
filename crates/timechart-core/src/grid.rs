// File: crates/timechart-core/src/grid.rs
// Summary: Axis label layout: "nice" numeric spacing and the three-regime time labeller.

use crate::series::from_ms;

/// Snap targets for base-10 spacing (normalized into `[1, 10)`).
pub const DECIMAL_LADDER: [f64; 4] = [2.0, 2.5, 5.0, 10.0];
/// Snap targets for base-60 spacing (seconds, minutes, hours).
pub const SEXAGESIMAL_LADDER: [f64; 8] = [2.0, 2.5, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0];

pub const SECOND_MS: f64 = 1_000.0;
pub const DAY_MS: f64 = 86_400_000.0;
const TWO_SECONDS_MS: f64 = 2.0 * SECOND_MS;
const TWO_DAYS_MS: f64 = 2.0 * DAY_MS;

/// Round `raw` up to a nice interval of the form `k * base^n`, `k` taken from `ladder`.
pub fn nice_spacing(raw: f64, base: f64, ladder: &[f64]) -> f64 {
    let mut factor = base.powf((raw.ln() / base.ln()).floor());
    // log rounding can land one exponent off
    while raw / factor >= base {
        factor *= base;
    }
    while raw / factor < 1.0 {
        factor /= base;
    }
    let normalized = raw / factor;
    let k = ladder.iter().copied().find(|&k| k >= normalized).unwrap_or(base);
    k * factor
}

/// Label positions for a numeric domain.
///
/// Returns at most `max_labels` ascending values, each `< max`, spaced by a nice
/// decimal interval. Empty for a zero-width (or inverted) domain.
pub fn value_labels(min: f64, max: f64, max_labels: usize) -> Vec<f64> {
    if max_labels == 0 || !min.is_finite() || !max.is_finite() || max <= min {
        return Vec::new();
    }
    let spacing = nice_spacing((max - min) / max_labels as f64, 10.0, &DECIMAL_LADDER);
    let first = (min / spacing).ceil() * spacing;
    spaced(first, spacing, max, max_labels)
}

fn spaced(first: f64, spacing: f64, max: f64, max_labels: usize) -> Vec<f64> {
    (0..max_labels)
        .map(|i| first + i as f64 * spacing)
        .take_while(|&v| v < max)
        .collect()
}

/// Text for a value label, with as many decimals as the spacing needs.
pub fn format_value(v: f64, spacing: f64) -> String {
    if !(spacing.is_finite() && spacing > 0.0) {
        return format!("{v}");
    }
    let mut decimals = (-spacing.log10().floor()).max(0.0) as usize;
    // 2.5 * 10^n needs one digit more than its magnitude
    if ((spacing / 10f64.powf(spacing.log10().floor())) - 2.5).abs() < 1e-9 {
        decimals += 1;
    }
    let s = format!("{:.*}", decimals, v);
    if s.starts_with('-') && s[1..].chars().all(|c| c == '0' || c == '.') { s[1..].to_string() } else { s }
}

/// How a time label is rendered; chosen by the span of the domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeLabelFormat {
    /// Sub-two-second spans: `HH:MM:SS.mmm`.
    TimeOfDay,
    /// Up to two days: `YYYY-MM-DD HH:MM:SS`.
    Timestamp,
    /// Up to two days with sub-second spacing: `YYYY-MM-DD HH:MM:SS.mmm`.
    TimestampMillis,
    /// Longer spans: `YYYY-MM-DD`.
    Date,
}

impl TimeLabelFormat {
    pub fn for_span(span_ms: f64) -> Self {
        if span_ms < TWO_SECONDS_MS {
            TimeLabelFormat::TimeOfDay
        } else if span_ms <= TWO_DAYS_MS {
            TimeLabelFormat::Timestamp
        } else {
            TimeLabelFormat::Date
        }
    }

    fn pattern(self) -> &'static str {
        match self {
            TimeLabelFormat::TimeOfDay => "%H:%M:%S%.3f",
            TimeLabelFormat::Timestamp => "%Y-%m-%d %H:%M:%S",
            TimeLabelFormat::TimestampMillis => "%Y-%m-%d %H:%M:%S%.3f",
            TimeLabelFormat::Date => "%Y-%m-%d",
        }
    }

    pub fn format(self, at_ms: f64) -> String {
        from_ms(at_ms)
            .map(|t| t.format(self.pattern()).to_string())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimeLabel {
    /// Position in milliseconds since the Unix epoch.
    pub at_ms: f64,
    pub text: String,
}

/// Label positions and texts for a time domain given in epoch milliseconds.
///
/// Spans under two seconds use decimal spacing on milliseconds; spans up to two
/// days use a base-60 ladder anchored at the start of the (UTC) day containing
/// `start_ms`; longer spans use decimal spacing on whole days.
pub fn time_labels(start_ms: f64, end_ms: f64, max_labels: usize) -> Vec<TimeLabel> {
    let span = end_ms - start_ms;
    if max_labels == 0 || !span.is_finite() || span <= 0.0 {
        return Vec::new();
    }
    let mut format = TimeLabelFormat::for_span(span);
    let positions = match format {
        TimeLabelFormat::TimeOfDay => value_labels(start_ms, end_ms, max_labels),
        TimeLabelFormat::Timestamp | TimeLabelFormat::TimestampMillis => {
            let raw_s = span / max_labels as f64 / SECOND_MS;
            let spacing = nice_spacing(raw_s, 60.0, &SEXAGESIMAL_LADDER) * SECOND_MS;
            if spacing < SECOND_MS {
                format = TimeLabelFormat::TimestampMillis;
            }
            let day_start = start_ms - start_ms.rem_euclid(DAY_MS);
            let first = day_start + ((start_ms - day_start) / spacing).ceil() * spacing;
            spaced(first, spacing, end_ms, max_labels)
        }
        TimeLabelFormat::Date => {
            let raw_days = span / max_labels as f64 / DAY_MS;
            let spacing_days = nice_spacing(raw_days, 10.0, &DECIMAL_LADDER).ceil().max(1.0);
            let first_day = (start_ms / DAY_MS / spacing_days).ceil() * spacing_days;
            spaced(first_day * DAY_MS, spacing_days * DAY_MS, end_ms, max_labels)
        }
    };
    positions
        .into_iter()
        .map(|at_ms| TimeLabel { at_ms, text: format.format(at_ms) })
        .collect()
}
