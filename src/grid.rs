//! Grid handling at the rendering boundary
//!
//! POP's displaced-pole grid stores longitudes that jump inside a row, which
//! map projections cannot contour directly. [`adjust_pop_grid`] rolls each
//! row into a monotone window and appends a cyclic column.

use crate::catalog::Grid;
use crate::errors::{OceanClimoError, Result};
use ndarray::{concatenate, s, Array2, ArrayD, ArrayView2, Axis, Ix1, Ix2};

/// Number of columns of the nominal one-degree POP grid
const POP_GX1_COLUMNS: usize = 320;

/// First row of the gx1 tripole seam
const POP_GX1_SEAM_ROW: usize = 367;

/// Coordinates and field ready to hand to a renderer
#[derive(Debug, Clone, PartialEq)]
pub struct PlotGrid {
    pub lon: Array2<f64>,
    pub lat: Array2<f64>,
    pub field: Array2<f64>,
}

/// Panel layout `(nrow, ncol)` for `n` panels with `ncol` close to `sqrt(n)`
#[must_use]
pub fn plot_dims(n: usize) -> (usize, usize) {
    let ncol = ((n as f64).sqrt() as usize).max(1);
    let nrow = n / ncol + (n % ncol).min(1);
    (nrow, ncol)
}

/// Periodic longitude shift for POP grids
///
/// Returns arrays with one more column than the input: the window
/// `[ni/2 - 1, ni/2 - 1 + ni)` of the doubled grid plus a cyclic column.
pub fn adjust_pop_grid(
    tlon: ArrayView2<'_, f64>,
    tlat: ArrayView2<'_, f64>,
    field: ArrayView2<'_, f64>,
) -> Result<PlotGrid> {
    if tlon.shape() != tlat.shape() || tlon.shape() != field.shape() {
        return Err(OceanClimoError::Merge {
            message: format!(
                "POP coordinates {:?}/{:?} do not match field {:?}",
                tlon.shape(),
                tlat.shape(),
                field.shape()
            ),
        });
    }
    let (nj, ni) = tlon.dim();
    if ni == 0 || nj == 0 {
        return Ok(PlotGrid {
            lon: tlon.to_owned(),
            lat: tlat.to_owned(),
            field: field.to_owned(),
        });
    }
    let x_left = (ni / 2).saturating_sub(1);

    let west_edge = tlon.column(0).iter().copied().fold(f64::INFINITY, f64::min);
    let shifted = tlon.mapv(|v| if v >= west_edge { v - 360.0 } else { v });
    let mut lon = periodic_window(shifted.view(), shifted.mapv(|v| v + 360.0).view(), x_left)?;

    let gx1 = ni == POP_GX1_COLUMNS;
    // the first column is corrected only below the last three rows,
    // the cyclic column on every row from the seam up
    if gx1 && nj > POP_GX1_SEAM_ROW + 3 {
        lon.slice_mut(s![POP_GX1_SEAM_ROW..nj - 3, 0])
            .mapv_inplace(|v| v + 360.0);
    }
    lon.mapv_inplace(|v| v - 360.0);
    let first = lon.column(0).mapv(|v| v + 360.0);
    let mut lon = append_column(lon, first.view())?;
    if gx1 && nj > POP_GX1_SEAM_ROW {
        lon.slice_mut(s![POP_GX1_SEAM_ROW.., ni]).mapv_inplace(|v| v - 360.0);
    }
    // identical cyclic longitudes confuse contouring
    lon.column_mut(0).mapv_inplace(|v| v - 1e-8);

    let lat = periodic_window(tlat, tlat, x_left)?;
    let lat = append_column(lat.clone(), lat.column(0))?;

    let field = periodic_window(field, field, x_left)?;
    let field = append_column(field.clone(), field.column(0))?;

    Ok(PlotGrid { lon, lat, field })
}

/// Two-dimensional plotting coordinates for a reduced field
///
/// POP fields get [`adjust_pop_grid`]; regular grids with 1-D `lon`/`lat`
/// are expanded to a mesh.
pub fn plot_grid(grid: Grid, lon: &ArrayD<f64>, lat: &ArrayD<f64>, field: Array2<f64>) -> Result<PlotGrid> {
    match grid {
        Grid::PopGx1v7 => {
            let tlon = lon.view().into_dimensionality::<Ix2>()?;
            let tlat = lat.view().into_dimensionality::<Ix2>()?;
            adjust_pop_grid(tlon, tlat, field.view())
        }
        Grid::OneDegree if lon.ndim() == 1 && lat.ndim() == 1 => {
            let lon = lon.view().into_dimensionality::<Ix1>()?;
            let lat = lat.view().into_dimensionality::<Ix1>()?;
            let (ny, nx) = field.dim();
            if lon.len() != nx || lat.len() != ny {
                return Err(OceanClimoError::Merge {
                    message: format!(
                        "coordinates ({}, {}) do not match field {:?}",
                        lat.len(),
                        lon.len(),
                        field.shape()
                    ),
                });
            }
            Ok(PlotGrid {
                lon: Array2::from_shape_fn((ny, nx), |(_, i)| lon[i]),
                lat: Array2::from_shape_fn((ny, nx), |(j, _)| lat[j]),
                field,
            })
        }
        Grid::OneDegree => Ok(PlotGrid {
            lon: lon.view().into_dimensionality::<Ix2>()?.to_owned(),
            lat: lat.view().into_dimensionality::<Ix2>()?.to_owned(),
            field,
        }),
    }
}

/// Columns `[x_left, x_left + ni)` of `left` and `right` placed side by side
fn periodic_window<'a>(
    left: ArrayView2<'a, f64>,
    right: ArrayView2<'a, f64>,
    x_left: usize,
) -> Result<Array2<f64>> {
    let ni = left.ncols();
    let doubled = concatenate(Axis(1), &[left, right])?;
    Ok(doubled.slice(s![.., x_left..x_left + ni]).to_owned())
}

fn append_column(array: Array2<f64>, column: ndarray::ArrayView1<'_, f64>) -> Result<Array2<f64>> {
    let column = column.insert_axis(Axis(1));
    Ok(concatenate(Axis(1), &[array.view(), column.view()])?)
}
