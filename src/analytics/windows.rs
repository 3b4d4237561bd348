//! Centered slicing that supplies slices to the weighting stage.

use crate::time_series::Sample;
use crate::window_spec::WindowSpec;
use std::ops::Range;

/// The input values covered by the window centered on one position.
///
/// Offsets that fall before the start or past the end of the input hold
/// `None`, exactly like gaps in the input itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    center: usize,
    values: Vec<Sample>,
    partial: bool,
}

impl Slice {
    /// Index of the input position this slice is centered on.
    pub fn center(&self) -> usize {
        self.center
    }

    pub fn values(&self) -> &[Sample] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when the window reaches past either end of the input.
    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

/// Odd-length window centered on each position in turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CenteredWindow {
    len: usize,
}

impl CenteredWindow {
    /// Creates the slicer matching a validated window specification.
    ///
    /// `WindowSpec` guarantees an odd, non-zero length, so every slice has a
    /// single center.
    pub fn for_window(window: &WindowSpec) -> Self {
        CenteredWindow { len: window.len() }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of offsets on each side of the center.
    pub fn radius(&self) -> usize {
        self.len / 2
    }

    /// Extracts the slice centered on `index`.
    pub fn slice_at(&self, data: &[Sample], index: usize) -> Slice {
        let radius = self.radius();
        let values = (0..self.len)
            .map(|offset| {
                (index + offset)
                    .checked_sub(radius)
                    .and_then(|position| data.get(position).copied().flatten())
            })
            .collect();

        Slice {
            center: index,
            values,
            partial: index < radius || index + radius >= data.len(),
        }
    }

    /// Iterates over the slices for every position of `data`, in index order.
    pub fn slices<'a>(&'a self, data: &'a [Sample]) -> impl Iterator<Item = Slice> + 'a {
        (0..data.len()).map(move |index| self.slice_at(data, index))
    }

    /// Applies the given function to the slice centered on each index.
    pub fn apply<F, T>(&self, data: &[Sample], mut primitive: F) -> Vec<T>
    where
        F: FnMut(&Slice) -> T,
    {
        if data.is_empty() {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(data.len());
        for slice in self.slices(data) {
            result.push(primitive(&slice));
        }
        result
    }

    /// Positions whose slice lies entirely inside an input of `data_len`
    /// values. Empty when the window is longer than the input.
    pub fn full_window_range(&self, data_len: usize) -> Range<usize> {
        let radius = self.radius();
        if data_len > 2 * radius {
            radius..data_len - radius
        } else {
            0..0
        }
    }
}
