//! Sample sources: the boundary to the data import layer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// One curve value at one depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Value(f64),
    /// Explicit gap; the curve has no value at this depth.
    NoData,
}

impl Reading {
    /// Wrap a raw value, mapping NaN and infinities to [`Reading::NoData`].
    pub fn from_raw(value: f64) -> Self {
        if value.is_finite() {
            Reading::Value(value)
        } else {
            Reading::NoData
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Reading::NoData)
    }
}

/// Curve readings at one depth.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthSample {
    pub depth: f64,
    pub values: BTreeMap<String, Reading>,
}

impl DepthSample {
    pub fn new(depth: f64) -> Self {
        Self {
            depth,
            values: BTreeMap::new(),
        }
    }

    /// Add a curve value; non-finite values become [`Reading::NoData`].
    pub fn with_value(mut self, curve: impl Into<String>, value: f64) -> Self {
        self.values.insert(curve.into(), Reading::from_raw(value));
        self
    }

    pub fn reading(&self, curve: &str) -> Option<Reading> {
        self.values.get(curve).copied()
    }

    /// Map every non-finite value to [`Reading::NoData`].
    pub(crate) fn normalize(&mut self) {
        for reading in self.values.values_mut() {
            if let Reading::Value(v) = *reading {
                *reading = Reading::from_raw(v);
            }
        }
    }
}

/// Result of reading a depth interval.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleRead {
    Samples(Vec<DepthSample>),
    /// The source has nothing for this interval, or could not read it.
    NoData,
}

/// Supplies depth-indexed samples on demand.
///
/// Implementations must not panic or block indefinitely; any failure is
/// reported as [`SampleRead::NoData`]. Loads may run on a background thread.
pub trait SampleSource: Send + Sync {
    /// Samples with `from <= depth < to`, sorted by depth.
    fn read_samples(&self, from: f64, to: f64) -> SampleRead;

    /// Deepest depth the source can supply, if known.
    fn max_depth(&self) -> Option<f64> {
        None
    }
}

/// A source backed by an in-memory sample list.
#[derive(Debug, Default)]
pub struct InMemorySource {
    samples: Vec<DepthSample>,
    reads: AtomicU64,
}

impl InMemorySource {
    /// Create a source; samples are sorted by depth and non-finite depths dropped.
    pub fn new(mut samples: Vec<DepthSample>) -> Self {
        samples.retain(|s| s.depth.is_finite());
        samples.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        Self {
            samples,
            reads: AtomicU64::new(0),
        }
    }

    /// A single curve from `(depth, value)` pairs.
    pub fn from_curve(curve: &str, points: &[(f64, f64)]) -> Self {
        Self::new(
            points
                .iter()
                .map(|(depth, value)| DepthSample::new(*depth).with_value(curve, *value))
                .collect(),
        )
    }

    /// A synthetic log: one sample every `step_m` down to `max_depth`, one
    /// smooth curve per name.
    pub fn synthetic(max_depth: f64, step_m: f64, curves: &[&str]) -> Self {
        if !(step_m > 0.0 && max_depth.is_finite()) {
            return Self::default();
        }
        let count = (max_depth / step_m).floor() as usize + 1;
        let samples = (0..count)
            .map(|i| {
                let depth = i as f64 * step_m;
                curves
                    .iter()
                    .enumerate()
                    .fold(DepthSample::new(depth), |sample, (k, curve)| {
                        let phase = k as f64 * 0.7;
                        let value = 50.0 + 40.0 * (depth / 7.0 + phase).sin();
                        sample.with_value(*curve, value)
                    })
            })
            .collect();
        Self::new(samples)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of `read_samples` calls served.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl SampleSource for InMemorySource {
    fn read_samples(&self, from: f64, to: f64) -> SampleRead {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let start = self.samples.partition_point(|s| s.depth < from);
        let end = self.samples.partition_point(|s| s.depth < to);
        if start >= end {
            return SampleRead::NoData;
        }
        SampleRead::Samples(self.samples[start..end].to_vec())
    }

    fn max_depth(&self) -> Option<f64> {
        self.samples.last().map(|s| s.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_normalizes_non_finite() {
        assert_eq!(Reading::from_raw(1.5), Reading::Value(1.5));
        assert!(Reading::from_raw(f64::NAN).is_no_data());
        assert!(Reading::from_raw(f64::INFINITY).is_no_data());
    }

    #[test]
    fn test_in_memory_half_open_interval() {
        let source = InMemorySource::from_curve("GR", &[(0.0, 1.0), (5.0, 2.0), (10.0, 3.0)]);
        let SampleRead::Samples(samples) = source.read_samples(0.0, 10.0) else {
            panic!("expected samples");
        };
        let depths: Vec<f64> = samples.iter().map(|s| s.depth).collect();
        assert_eq!(depths, vec![0.0, 5.0]);
        assert_eq!(source.read_count(), 1);
    }

    #[test]
    fn test_in_memory_no_data_outside() {
        let source = InMemorySource::from_curve("GR", &[(0.0, 1.0)]);
        assert_eq!(source.read_samples(100.0, 200.0), SampleRead::NoData);
    }

    #[test]
    fn test_synthetic_covers_depth() {
        let source = InMemorySource::synthetic(100.0, 0.5, &["GR", "RHOB"]);
        assert_eq!(source.len(), 201);
        assert_eq!(source.max_depth(), Some(100.0));
    }
}
