//! Parallel computation implementations for statistical operations
//!
//! Each reduction walks the lanes along the reduced axis in parallel. Lanes
//! are visited in row-major order of the remaining axes, so the output keeps
//! the input's axis order minus the reduced one.

use log::debug;
use ndarray::{ArrayD, ArrayView1, Axis, Zip};

/// Computes the NaN-skipping mean along an axis using parallel processing
pub fn parallel_mean_axis(data: &ArrayD<f64>, axis: usize) -> ArrayD<f64> {
    debug!(
        "Averaging {} lanes of length {} across {} threads",
        data.len() / data.len_of(Axis(axis)).max(1),
        data.len_of(Axis(axis)),
        rayon::current_num_threads()
    );
    Zip::from(data.lanes(Axis(axis))).par_map_collect(nan_mean)
}

/// Computes the NaN-skipping minimum along an axis
pub fn parallel_min_axis(data: &ArrayD<f64>, axis: usize) -> ArrayD<f64> {
    Zip::from(data.lanes(Axis(axis))).par_map_collect(|lane| {
        finite_fold(lane, f64::INFINITY, f64::min)
    })
}

/// Computes the NaN-skipping maximum along an axis
pub fn parallel_max_axis(data: &ArrayD<f64>, axis: usize) -> ArrayD<f64> {
    Zip::from(data.lanes(Axis(axis))).par_map_collect(|lane| {
        finite_fold(lane, f64::NEG_INFINITY, f64::max)
    })
}

fn nan_mean(lane: ArrayView1<'_, f64>) -> f64 {
    let (sum, count) = lane
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0_f64, 0_usize), |(sum, count), &v| (sum + v, count + 1));
    if count > 0 {
        sum / count as f64
    } else {
        f64::NAN // Return NaN if all values were invalid
    }
}

fn finite_fold(lane: ArrayView1<'_, f64>, init: f64, f: fn(f64, f64) -> f64) -> f64 {
    let mut seen = false;
    let result = lane.iter().filter(|v| v.is_finite()).fold(init, |acc, &v| {
        seen = true;
        f(acc, v)
    });
    if seen {
        result
    } else {
        f64::NAN
    }
}
