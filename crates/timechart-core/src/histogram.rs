// File: crates/timechart-core/src/histogram.rs
// Summary: Equal-width distribution binning of one dataset over the visible window.

use crate::series::Dataset;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    pub buckets: Vec<Bucket>,
    pub total: usize,
}

impl Histogram {
    /// Bin `values` into at most `max_bars` equal-width buckets. The bucket count is
    /// capped by the number of distinct values. `None` for empty input.
    pub fn from_values(mut values: Vec<f64>, max_bars: usize) -> Option<Self> {
        values.retain(|v| v.is_finite());
        if values.is_empty() || max_bars == 0 {
            return None;
        }
        values.sort_by(f64::total_cmp);
        let mut distinct = values.clone();
        distinct.dedup();
        let bucket_count = distinct.len().min(max_bars);
        let (min, max) = (values[0], values[values.len() - 1]);
        let width = (max - min) / bucket_count as f64;

        let mut buckets: Vec<Bucket> = (0..bucket_count)
            .map(|i| Bucket {
                lower: min + i as f64 * width,
                upper: if i + 1 == bucket_count { max } else { min + (i + 1) as f64 * width },
                count: 0,
            })
            .collect();
        // single sequential pass; the last bucket is closed on the right
        let mut i = 0;
        for v in &values {
            while i + 1 < bucket_count && *v >= buckets[i].upper {
                i += 1;
            }
            buckets[i].count += 1;
        }
        Some(Self { buckets, total: values.len() })
    }

    /// Histogram of `dataset`'s values with timestamps in `[start_ms, end_ms)`.
    pub fn for_window(dataset: &Dataset, start_ms: f64, end_ms: f64, max_bars: usize) -> Option<Self> {
        Self::from_values(dataset.values_in(start_ms, end_ms), max_bars)
    }

    pub fn max_count(&self) -> usize {
        self.buckets.iter().map(|b| b.count).max().unwrap_or(0)
    }

    /// Bar heights for a panel `available` pixels tall; the tallest bar fills
    /// `fill_fraction` of it.
    pub fn bar_heights(&self, available: f64, fill_fraction: f64) -> Vec<f64> {
        let tallest = self.max_count();
        if tallest == 0 {
            return vec![0.0; self.buckets.len()];
        }
        let unit = available * fill_fraction / tallest as f64;
        self.buckets.iter().map(|b| b.count as f64 * unit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_count_capped_by_distinct_values() {
        let h = Histogram::from_values(vec![1.0, 1.0, 2.0, 3.0, 3.0, 3.0, 5.0], 5).unwrap();
        assert_eq!(h.buckets.len(), 4);
        assert_eq!(h.total, 7);
        let counts: Vec<usize> = h.buckets.iter().map(|b| b.count).collect();
        // width 1.0: [1,2) [2,3) [3,4) [4,5]
        assert_eq!(counts, vec![2, 1, 3, 1]);
    }

    #[test]
    fn bucket_count_capped_by_max_bars() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let h = Histogram::from_values(values, 10).unwrap();
        assert_eq!(h.buckets.len(), 10);
        assert!(h.buckets.iter().all(|b| b.count == 10));
    }

    #[test]
    fn single_value_is_one_bucket() {
        let h = Histogram::from_values(vec![4.0, 4.0, 4.0], 8).unwrap();
        assert_eq!(h.buckets.len(), 1);
        assert_eq!(h.buckets[0].count, 3);
    }

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(Histogram::from_values(Vec::new(), 5), None);
    }

    #[test]
    fn tallest_bar_fills_fraction() {
        let h = Histogram::from_values(vec![1.0, 1.0, 2.0], 2).unwrap();
        let heights = h.bar_heights(100.0, 0.9);
        assert!((heights[0] - 90.0).abs() < 1e-9);
        assert!((heights[1] - 45.0).abs() < 1e-9);
    }
}
