//! Numerical-stability statistics over one cross-run sample set.
//!
//! The significant digit number follows Parker's definition,
//! `s = -log_b |sigma / mu|`, with two special cases: a zero mean gives 0,
//! and identical values across every run get the full mantissa width.

use crate::parser::schema::{Observation, SizeTag};
use crate::utils::config::DEFAULT_SDN_BASE;
use crate::utils::error::StatsError;
use serde::Serialize;
use std::cmp::Ordering;

/// Observations found at the same sequence position in every run
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    /// Sequence position inside the trace (not inside the slice)
    pub position: u64,
    /// One observation per run, in run order
    pub observations: Vec<Observation>,
}

/// Statistics for one program point, one row of the output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedStat {
    pub hash: u64,
    #[serde(rename = "type")]
    pub size_tag: SizeTag,
    pub time: u64,
    pub max: f64,
    pub min: f64,
    pub median: f64,
    pub mean: f64,
    pub std: f64,
    pub significant_digit_number: f64,
}

/// Knobs of the statistics engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsOptions {
    /// Reject sample sets mixing hashes or size tags
    pub data_checking: bool,
    /// Base of the significant digit number
    pub sdn_base: f64,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            data_checking: false,
            sdn_base: DEFAULT_SDN_BASE,
        }
    }
}

/// Compute the statistics of a sample set
///
/// **Public** - main entry point of the statistics engine
///
/// Hash, size tag and time are taken from the first observation.
///
/// # Errors
/// * `StatsError::EmptySampleSet` - no observation at all
/// * `StatsError::Consistency` - mixed hashes or sizes while `data_checking` is on
pub fn compute_stats(set: &SampleSet, options: &StatsOptions) -> Result<AggregatedStat, StatsError> {
    let first = set
        .observations
        .first()
        .ok_or(StatsError::EmptySampleSet(set.position))?;

    if options.data_checking {
        check_consistency(set)?;
    }

    let values: Vec<f64> = set.observations.iter().map(|o| o.value).collect();

    // Bit-identical runs must give a std of exactly zero, which summation
    // does not guarantee (3 x 0.1 does not average back to 0.1).
    let identical = values
        .iter()
        .all(|v| v.to_bits() == values[0].to_bits());
    let (mean, std) = if identical {
        (values[0], 0.0)
    } else {
        let mean = mean(&values);
        (mean, std(mean, &values))
    };

    Ok(AggregatedStat {
        hash: first.call_site_hash,
        size_tag: first.size_tag,
        time: first.timestamp,
        max: max(&values),
        min: min(&values),
        median: median(&values),
        mean,
        std,
        significant_digit_number: significant_digit_number(
            mean,
            std,
            first.size_tag,
            options.sdn_base,
        ),
    })
}

fn check_consistency(set: &SampleSet) -> Result<(), StatsError> {
    let first = &set.observations[0];
    for (run, observation) in set.observations.iter().enumerate().skip(1) {
        if observation.call_site_hash != first.call_site_hash {
            return Err(StatsError::Consistency {
                position: set.position,
                reason: format!(
                    "run {} has hash {} where run 0 has {}",
                    run, observation.call_site_hash, first.call_site_hash
                ),
            });
        }
        if observation.size_tag != first.size_tag {
            return Err(StatsError::Consistency {
                position: set.position,
                reason: format!(
                    "run {} has a {}-byte value where run 0 has {}",
                    run, observation.size_tag, first.size_tag
                ),
            });
        }
    }
    Ok(())
}

/// Arithmetic mean
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Largest value; NaN as soon as any value is NaN
pub fn max(values: &[f64]) -> f64 {
    extremum(values, f64::NEG_INFINITY, f64::max)
}

/// Smallest value; NaN as soon as any value is NaN
pub fn min(values: &[f64]) -> f64 {
    extremum(values, f64::INFINITY, f64::min)
}

// `f64::max` and `f64::min` alone would skip NaN
fn extremum(values: &[f64], init: f64, pick: fn(f64, f64) -> f64) -> f64 {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    values.iter().copied().fold(init, pick)
}

/// Population standard deviation around `mean`
pub fn std(mean: f64, values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median, averaging the two middle values of an even-sized set
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Significant digit number in `base`
pub fn significant_digit_number(mean: f64, std: f64, size_tag: SizeTag, base: f64) -> f64 {
    if std != 0.0 {
        if mean != 0.0 {
            -(std / mean).abs().log(base)
        } else {
            0.0
        }
    } else {
        size_tag.max_bits() as f64 * 2f64.log(base)
    }
}
