//! Weighted Sliding-Window Analytics
//!
//! This module composes the three stages of the transform:
//!
//! 1. [`windows`]: slice the input around every position, padding past the
//!    ends with missing values
//! 2. [`weighting`]: multiply each slice by the window weights, marking
//!    missing and ignored offsets as excluded
//! 3. [`calculators`]: reduce each weighted slice with the chosen statistic
//!
//! Every output position depends only on its own neighbourhood, so the
//! parallel entry point produces exactly the same values as the sequential
//! one.

pub mod calculators;
pub mod primitives;
pub mod weighting;
pub mod windows;

use crate::analytics::calculators::Statistic;
use crate::analytics::weighting::{apply_weights, WeightedSlice};
use crate::analytics::windows::{CenteredWindow, Slice};
use crate::time_series::Sample;
use crate::window_spec::{WindowError, WindowSpec};
use rayon::prelude::*;
use std::ops::Range;
use tracing::{debug, trace};

/// Errors raised while validating a transform request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Window is empty, even-length, or has an unparseable entry
    InvalidWindow(WindowError),
    /// Statistic name is not one of `mean`, `sum`, `std`
    UnknownStatistic(String),
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformError::InvalidWindow(err) => write!(f, "Invalid window: {}", err),
            TransformError::UnknownStatistic(name) => write!(
                f,
                "Unknown statistic {:?}; expected one of mean, std, sum",
                name
            ),
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransformError::InvalidWindow(err) => Some(err),
            TransformError::UnknownStatistic(_) => None,
        }
    }
}

impl From<WindowError> for TransformError {
    fn from(err: WindowError) -> Self {
        TransformError::InvalidWindow(err)
    }
}

/// Full record of one transform: every intermediate slice alongside the
/// output.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedAnalysis {
    pub window: WindowSpec,
    pub statistic: Statistic,
    /// Raw slices, one per input position
    pub slices: Vec<Slice>,
    /// Weighted slices, one per input position
    pub weighted: Vec<WeightedSlice>,
    /// Statistic per input position
    pub output: Vec<Sample>,
    /// Positions computed from a full window; the rest are edge results
    pub full_window_range: Range<usize>,
}

impl WindowedAnalysis {
    /// Indices whose output came from a window reaching past the input.
    pub fn partial_positions(&self) -> Vec<usize> {
        (0..self.output.len())
            .filter(|index| !self.full_window_range.contains(index))
            .collect()
    }
}

fn reduce_slice(slice: &Slice, window: &WindowSpec, statistic: Statistic) -> Sample {
    let weighted = apply_weights(slice, window);
    let value = statistic.reduce(&weighted);
    trace!(
        position = slice.center(),
        partial = slice.is_partial(),
        value = ?value,
        "reduced weighted slice"
    );
    value
}

/// Applies a weighted sliding window to a sequence.
///
/// # Arguments
/// * `input` - Samples in order; `None` marks missing data
/// * `window` - Validated window specification
/// * `statistic` - Reduction applied to every weighted slice
///
/// # Returns
/// One value per input position, in input order.
///
/// # Behavior
/// - Output length always equals input length
/// - Missing samples and ignored offsets are left out of the statistic
///   entirely, shrinking the count used by `mean` and `std`
/// - The first and last `window.radius()` outputs come from partial windows;
///   they are computed all the same
/// - `sum` of a fully excluded slice is `Some(0.0)`; `mean` gives `None`, and
///   `std` gives `None` with fewer than two included values
///
/// # Examples
/// ```
/// use weighslide::analytics::{calculators::Statistic, transform};
/// use weighslide::window_spec::WindowSpec;
///
/// let window = WindowSpec::parse("[2, 5, 2]").unwrap();
/// let input: Vec<Option<f64>> = [0.0, 0.0, 1.0].iter().copied().map(Some).collect();
/// let output = transform(&input, &window, Statistic::Mean);
///
/// assert_eq!(output.len(), 3);
/// assert_eq!(output[0], Some(0.0));
/// ```
pub fn transform(input: &[Sample], window: &WindowSpec, statistic: Statistic) -> Vec<Sample> {
    debug!(
        input_len = input.len(),
        window = %window,
        statistic = %statistic,
        "applying weighted window"
    );

    let slicer = CenteredWindow::for_window(window);
    slicer.apply(input, |slice| reduce_slice(slice, window, statistic))
}

/// Parallel variant of [`transform`].
///
/// Positions are evaluated on the rayon thread pool. The result is
/// bit-identical to the sequential version.
pub fn transform_par(input: &[Sample], window: &WindowSpec, statistic: Statistic) -> Vec<Sample> {
    debug!(
        input_len = input.len(),
        window = %window,
        statistic = %statistic,
        "applying weighted window in parallel"
    );

    let slicer = CenteredWindow::for_window(window);
    (0..input.len())
        .into_par_iter()
        .map(|index| reduce_slice(&slicer.slice_at(input, index), window, statistic))
        .collect()
}

/// Runs the transform and keeps every intermediate slice.
///
/// Used to produce the sliced and weighted output tables; prefer
/// [`transform`] when only the statistic is needed.
pub fn transform_detailed(
    input: &[Sample],
    window: &WindowSpec,
    statistic: Statistic,
) -> WindowedAnalysis {
    let slicer = CenteredWindow::for_window(window);
    let slices: Vec<Slice> = slicer.slices(input).collect();
    let weighted: Vec<WeightedSlice> = slices
        .iter()
        .map(|slice| apply_weights(slice, window))
        .collect();
    let output = weighted
        .iter()
        .map(|weighted_slice| statistic.reduce(weighted_slice))
        .collect();

    WindowedAnalysis {
        window: window.clone(),
        statistic,
        slices,
        weighted,
        output,
        full_window_range: slicer.full_window_range(input.len()),
    }
}

/// Parallel variant of [`transform_detailed`].
pub fn transform_detailed_par(
    input: &[Sample],
    window: &WindowSpec,
    statistic: Statistic,
) -> WindowedAnalysis {
    let slicer = CenteredWindow::for_window(window);
    let (slices, weighted): (Vec<Slice>, Vec<WeightedSlice>) = (0..input.len())
        .into_par_iter()
        .map(|index| {
            let slice = slicer.slice_at(input, index);
            let weighted = apply_weights(&slice, window);
            (slice, weighted)
        })
        .unzip();
    let output = weighted
        .par_iter()
        .map(|weighted_slice| statistic.reduce(weighted_slice))
        .collect();

    WindowedAnalysis {
        window: window.clone(),
        statistic,
        slices,
        weighted,
        output,
        full_window_range: slicer.full_window_range(input.len()),
    }
}

/// Parses the window and statistic, then transforms.
///
/// Both descriptions are validated once, before any position is computed.
///
/// # Errors
/// Returns `TransformError::InvalidWindow` for an empty, even-length or
/// unparseable window and `TransformError::UnknownStatistic` for names other
/// than `mean`, `sum` and `std`.
pub fn transform_raw(
    input: &[Sample],
    window: &str,
    statistic: &str,
) -> Result<Vec<Sample>, TransformError> {
    let window = WindowSpec::parse(window)?;
    let statistic: Statistic = statistic.parse()?;
    Ok(transform(input, &window, statistic))
}
