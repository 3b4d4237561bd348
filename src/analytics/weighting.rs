//! Elementwise weighting of slices.

use crate::analytics::windows::Slice;
use crate::window_spec::{WeightEntry, WindowSpec};

/// One position of a weighted slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightedValue {
    /// Sample multiplied by its weight.
    Value(f64),
    /// The sample was missing (input gap or padding).
    Missing,
    /// The window ignores this offset.
    Ignored,
}

impl WeightedValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            WeightedValue::Value(value) => Some(*value),
            WeightedValue::Missing | WeightedValue::Ignored => None,
        }
    }

    /// Excluded positions take no part in any statistic, not even as a count.
    pub fn is_excluded(&self) -> bool {
        !matches!(self, WeightedValue::Value(_))
    }
}

/// A slice after multiplication by the window weights.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSlice {
    center: usize,
    values: Vec<WeightedValue>,
}

impl WeightedSlice {
    pub fn center(&self) -> usize {
        self.center
    }

    pub fn values(&self) -> &[WeightedValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The values that take part in the reduction.
    pub fn included_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(WeightedValue::value).collect()
    }
}

/// Multiplies each sample of `slice` by the matching window entry.
///
/// An ignored offset yields `Ignored` whether or not a sample is present; a
/// missing sample under a numeric weight yields `Missing`.
pub fn apply_weights(slice: &Slice, window: &WindowSpec) -> WeightedSlice {
    debug_assert_eq!(slice.len(), window.len());

    let values = slice
        .values()
        .iter()
        .zip(window.entries())
        .map(|(sample, entry)| match (entry, sample) {
            (WeightEntry::Ignore, _) => WeightedValue::Ignored,
            (WeightEntry::Weight(_), None) => WeightedValue::Missing,
            (WeightEntry::Weight(weight), Some(value)) => {
                WeightedValue::Value(value * weight.into_inner())
            }
        })
        .collect();

    WeightedSlice {
        center: slice.center(),
        values,
    }
}
