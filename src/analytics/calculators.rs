use crate::analytics::primitives::{mean, sample_std_dev, sum};
use crate::analytics::weighting::WeightedSlice;
use crate::analytics::TransformError;
use crate::time_series::Sample;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stateless reduction of the included values of a weighted slice.
pub trait WindowReducer: Send + Sync {
    fn name(&self) -> &'static str;
    fn reduce(&self, values: &[f64]) -> Sample;
}

pub struct SumReducer;

impl WindowReducer for SumReducer {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn reduce(&self, values: &[f64]) -> Sample {
        Some(sum(values))
    }
}

pub struct MeanReducer;

impl WindowReducer for MeanReducer {
    fn name(&self) -> &'static str {
        "mean"
    }

    fn reduce(&self, values: &[f64]) -> Sample {
        mean(values)
    }
}

pub struct SampleStdDevReducer;

impl WindowReducer for SampleStdDevReducer {
    fn name(&self) -> &'static str {
        "std"
    }

    fn reduce(&self, values: &[f64]) -> Sample {
        sample_std_dev(values)
    }
}

/// Statistic applied to each weighted slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    /// Mean of included values; missing when none are included
    Mean,
    /// Sum of included values; `0.0` when none are included
    Sum,
    /// Sample standard deviation; missing with fewer than two included values
    Std,
}

impl Statistic {
    pub const ALL: [Statistic; 3] = [Statistic::Mean, Statistic::Sum, Statistic::Std];

    /// Reducer implementing this statistic.
    pub fn reducer(&self) -> &'static dyn WindowReducer {
        match self {
            Statistic::Mean => &MeanReducer,
            Statistic::Sum => &SumReducer,
            Statistic::Std => &SampleStdDevReducer,
        }
    }

    pub fn name(&self) -> &'static str {
        self.reducer().name()
    }

    /// Reduces a weighted slice, skipping missing and ignored positions.
    pub fn reduce(&self, weighted: &WeightedSlice) -> Sample {
        self.reducer().reduce(&weighted.included_values())
    }
}

impl FromStr for Statistic {
    type Err = TransformError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mean" => Ok(Statistic::Mean),
            "sum" => Ok(Statistic::Sum),
            "std" => Ok(Statistic::Std),
            _ => Err(TransformError::UnknownStatistic(value.to_string())),
        }
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
