//! Summary statistics of a reduced map field

use crate::errors::{OceanClimoError, Result};
use ndarray::{ArrayView2, Zip};
use std::fmt;

/// Summary statistics shown alongside a map panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    /// Mean weighted by grid-cell area
    pub mean: f64,
    /// Root-mean-square difference against the reference. Not computed yet.
    pub rms: Option<f64>,
}

impl FieldStats {
    /// Compute min, max and area-weighted mean over the finite cells of `field`
    ///
    /// # Errors
    ///
    /// Fails if `area` and `field` have different shapes.
    pub fn compute(field: ArrayView2<'_, f64>, area: ArrayView2<'_, f64>) -> Result<Self> {
        if field.shape() != area.shape() {
            return Err(OceanClimoError::Statistics(format!(
                "area weights with shape {:?} do not match field with shape {:?}",
                area.shape(),
                field.shape()
            )));
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut weighted_sum = 0.0_f64;
        let mut weight_total = 0.0_f64;
        Zip::from(&field).and(&area).for_each(|&value, &weight| {
            if value.is_finite() {
                min = min.min(value);
                max = max.max(value);
                if weight.is_finite() {
                    weighted_sum += value * weight;
                    weight_total += weight;
                }
            }
        });

        if min > max {
            return Ok(Self {
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                rms: None,
            });
        }
        let mean = if weight_total > 0.0 {
            weighted_sum / weight_total
        } else {
            f64::NAN
        };
        Ok(Self {
            min,
            max,
            mean,
            rms: None,
        })
    }
}

impl fmt::Display for FieldStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min={:.2}, max={:.2}, mean={:.2}, rms=",
            self.min, self.max, self.mean
        )?;
        match self.rms {
            Some(rms) => write!(f, "{rms:.2}"),
            None => f.write_str("TBD"),
        }
    }
}
