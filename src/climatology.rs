//! Time-period and depth selection, reduction to a single map field
//!
//! A request names a canonical variable, a depth selector and a time period.
//! The engine resolves the on-disk name through the source's dictionary,
//! checks the period against the periods the source offers, selects depth
//! (nearest level or inclusive range), averages the period's time slots and,
//! for a range, averages over depth last.

use crate::catalog::Grid;
use crate::data_source::DataSource;
use crate::dataset::TIME_DIM;
use crate::errors::{OceanClimoError, Result};
use crate::statistics::{FieldStats, StatOperation, StatisticalReduction};
use log::debug;
use ndarray::{Array2, ArrayD, Axis, Ix2};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Averaging window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimePeriod {
    Ann,
    Djf,
    Mam,
    Jja,
    Son,
}

impl TimePeriod {
    pub const ALL: [Self; 5] = [Self::Ann, Self::Djf, Self::Mam, Self::Jja, Self::Son];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ann => "ANN",
            Self::Djf => "DJF",
            Self::Mam => "MAM",
            Self::Jja => "JJA",
            Self::Son => "SON",
        }
    }

    /// Zero-based month indices of the period in a twelve-month climatology
    #[must_use]
    pub fn month_indices(self) -> Vec<usize> {
        match self {
            Self::Ann => (0..12).collect(),
            Self::Djf => vec![11, 0, 1],
            Self::Mam => (2..5).collect(),
            Self::Jja => (5..8).collect(),
            Self::Son => (8..11).collect(),
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimePeriod {
    type Err = OceanClimoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| OceanClimoError::config(format!("'{s}' is not a known time period")))
    }
}

/// Vertical selection: one level by nearest match, or the mean over an
/// inclusive range given as `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DepthSelector {
    Level(f64),
    Range([f64; 2]),
}

impl DepthSelector {
    /// Label used in plot file names: `100m` or `0-100m`
    #[must_use]
    pub fn depth_str(&self) -> String {
        match self {
            Self::Level(d) => format!("{d:.0}m"),
            Self::Range([lo, hi]) => format!("{lo:.0}-{hi:.0}m"),
        }
    }

    #[must_use]
    pub const fn is_range(&self) -> bool {
        matches!(self, Self::Range(_))
    }
}

/// One field request against one source
#[derive(Debug, Clone, Copy)]
pub struct ClimoRequest<'a> {
    /// Canonical variable name
    pub variable: &'a str,
    pub depth: DepthSelector,
    pub period: TimePeriod,
    /// Compute min/max/area-weighted mean alongside the field
    pub with_stats: bool,
}

/// Reduced field and the coordinates needed to draw it
#[derive(Debug, Clone, PartialEq)]
pub struct ClimoField {
    pub field: Array2<f64>,
    pub lon: ArrayD<f64>,
    pub lat: ArrayD<f64>,
    pub stats: Option<FieldStats>,
}

/// Reduces source data to map fields on one grid
#[derive(Debug, Clone, Copy)]
pub struct ClimatologyEngine {
    grid: Grid,
}

impl ClimatologyEngine {
    #[must_use]
    pub const fn new(grid: Grid) -> Self {
        Self { grid }
    }

    #[must_use]
    pub const fn grid(&self) -> Grid {
        self.grid
    }

    /// Produce the time- and depth-reduced field for one request
    ///
    /// The source is only read.
    ///
    /// # Errors
    ///
    /// Lookup errors for an unknown variable, a period the source does not
    /// offer, a missing variable, dimension or coordinate, or a depth range
    /// containing no level.
    pub fn compute(&self, source: &DataSource, request: &ClimoRequest<'_>) -> Result<ClimoField> {
        let source_name = source.name();
        let on_disk = source.var_dict().lookup(source_name, request.variable)?;

        let periods = source.time_periods();
        let time_indices = periods
            .get(&request.period)
            .ok_or_else(|| invalid_period(source_name, request.period))?;

        let ds = source.dataset();
        let var = ds.require(source_name, on_disk)?;
        let depth_name = self.grid.depth_coord();
        debug!(
            "Selecting {on_disk} from {source_name} at {} for {}",
            request.depth.depth_str(),
            request.period
        );

        let mut dims = var.dims.clone();
        let depth_axis = axis(&dims, on_disk, depth_name)?;
        let depth_values: Vec<f64> = ds
            .require(source_name, depth_name)?
            .data
            .iter()
            .copied()
            .collect();

        let mut data = match request.depth {
            DepthSelector::Level(target) => {
                let level = nearest_index(&depth_values, target).ok_or_else(|| {
                    OceanClimoError::DimensionNotFound {
                        var: on_disk.to_string(),
                        dim: depth_name.to_string(),
                    }
                })?;
                dims.remove(depth_axis);
                var.data.index_axis(Axis(depth_axis), level).to_owned()
            }
            DepthSelector::Range([lo, hi]) => {
                let levels: Vec<usize> = depth_values
                    .iter()
                    .enumerate()
                    .filter(|&(_, &z)| z >= lo && z <= hi)
                    .map(|(i, _)| i)
                    .collect();
                if levels.is_empty() {
                    return Err(OceanClimoError::EmptyDepthRange {
                        source_name: source_name.to_string(),
                        lo,
                        hi,
                    });
                }
                var.data.select(Axis(depth_axis), &levels)
            }
        };

        let time_axis = axis(&dims, on_disk, TIME_DIM)?;
        let time_len = data.len_of(Axis(time_axis));
        if time_indices.iter().any(|&i| i >= time_len) {
            return Err(invalid_period(source_name, request.period));
        }
        data = data
            .select(Axis(time_axis), time_indices)
            .reduce_along_axis(time_axis, StatOperation::Mean)?;
        dims.remove(time_axis);

        if request.depth.is_range() {
            let depth_axis = axis(&dims, on_disk, depth_name)?;
            data = data.reduce_along_axis(depth_axis, StatOperation::Mean)?;
            dims.remove(depth_axis);
        }

        let field = data.into_dimensionality::<Ix2>()?;
        let lon = ds.require(source_name, self.grid.lon_name())?.data.clone();
        let lat = ds.require(source_name, self.grid.lat_name())?.data.clone();

        let stats = if request.with_stats {
            let area = ds
                .require(source_name, self.grid.area_name())?
                .data
                .view()
                .into_dimensionality::<Ix2>()?;
            Some(FieldStats::compute(field.view(), area)?)
        } else {
            None
        };

        Ok(ClimoField {
            field,
            lon,
            lat,
            stats,
        })
    }
}

fn invalid_period(source_name: &str, period: TimePeriod) -> OceanClimoError {
    OceanClimoError::InvalidTimePeriod {
        source_name: source_name.to_string(),
        period: period.to_string(),
    }
}

fn axis(dims: &[String], var: &str, dim: &str) -> Result<usize> {
    dims.iter()
        .position(|d| d == dim)
        .ok_or_else(|| OceanClimoError::DimensionNotFound {
            var: var.to_string(),
            dim: dim.to_string(),
        })
}

/// Index of the coordinate value closest to `target`, ignoring NaN
fn nearest_index(values: &[f64], target: f64) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .min_by(|(_, a), (_, b)| (*a - target).abs().total_cmp(&(*b - target).abs()))
        .map(|(i, _)| i)
}
