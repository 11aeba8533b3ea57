//! NetCDF I/O: opening one or many files as a [`Dataset`] and writing one back
//!
//! Numeric variables are read as `f64` with `_FillValue`/`missing_value`
//! masked to NaN. Times are left as raw offsets (no calendar decoding).
//! Non-numeric variables are skipped.

use crate::dataset::{AttrValue, Dataset, Variable};
use crate::errors::Result;
use chrono::Utc;
use log::debug;
use ndarray::{ArrayD, IxDyn};
use netcdf::AttributeValue;
use std::collections::BTreeMap;
use std::{fs, path::Path};

const MASK_ATTRS: [&str; 2] = ["_FillValue", "missing_value"];

/// Open a single NetCDF file into memory
pub fn open_dataset(path: &Path) -> Result<Dataset> {
    let file = netcdf::open(path)?;
    let mut ds = Dataset::new();

    for attr in file.attributes() {
        if let Some(value) = attr.value().ok().and_then(convert_attribute) {
            ds.attrs.insert(attr.name().to_string(), value);
        }
    }

    for var in file.variables() {
        let name = var.name().to_string();
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        let values = match var.get_values::<f64, _>(..) {
            Ok(values) => values,
            Err(e) => {
                debug!("skipping non-numeric variable '{name}' in {}: {e}", path.display());
                continue;
            }
        };

        let mut attrs = BTreeMap::new();
        for attr in var.attributes() {
            if let Some(value) = attr.value().ok().and_then(convert_attribute) {
                attrs.insert(attr.name().to_string(), value);
            }
        }

        let mut data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
        for key in MASK_ATTRS {
            if let Some(fill) = attrs.remove(key).and_then(|v| v.as_f64()) {
                data.mapv_inplace(|v| if v == fill { f64::NAN } else { v });
            }
        }

        let mut variable = Variable::new(dims, data)?;
        variable.attrs = attrs;
        ds.insert(&name, variable)?;
    }

    Ok(ds)
}

/// Open several files as one dataset concatenated along `time`, in the
/// given order
pub fn open_mfdataset<P: AsRef<Path>>(paths: &[P]) -> Result<Dataset> {
    debug!("Opening {} files", paths.len());
    let datasets = paths
        .iter()
        .map(|p| open_dataset(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Dataset::concat_time(datasets)
}

/// Write a dataset to a new NetCDF file, replacing any existing file
///
/// A `history` attribute recording the write time is added.
pub fn write_dataset(ds: &Dataset, output_path: &Path) -> Result<()> {
    if output_path.exists() {
        fs::remove_file(output_path)?;
    }
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = netcdf::create(output_path)?;

    for (dim_name, dim_len) in ds.dims() {
        file.add_dimension(&dim_name, dim_len)?;
    }

    for (name, var) in ds.variables() {
        let dim_refs: Vec<&str> = var.dims.iter().map(String::as_str).collect();
        let mut new_var = file.add_variable::<f64>(name, &dim_refs)?;
        if var.data.iter().any(|v| v.is_nan()) {
            new_var.put_attribute("_FillValue", f64::NAN)?;
        }
        for (key, value) in &var.attrs {
            put_attribute(&mut new_var, key, value)?;
        }
        new_var.put(var.data.view(), ..)?;
    }

    for (key, value) in &ds.attrs {
        if key != "history" {
            match value {
                AttrValue::Text(s) => file.add_attribute(key, s.as_str())?,
                AttrValue::Texts(ss) => file.add_attribute(key, ss.join(", "))?,
                AttrValue::Number(v) => file.add_attribute(key, *v)?,
                AttrValue::Numbers(vs) => file.add_attribute(key, vs.clone())?,
            };
        }
    }
    file.add_attribute(
        "history",
        format!("Created by ocean-climo on {}", Utc::now().to_rfc3339()),
    )?;

    Ok(())
}

fn put_attribute(var: &mut netcdf::VariableMut<'_>, key: &str, value: &AttrValue) -> Result<()> {
    match value {
        AttrValue::Text(s) => var.put_attribute(key, s.as_str())?,
        AttrValue::Texts(ss) => var.put_attribute(key, ss.clone())?,
        AttrValue::Number(v) => var.put_attribute(key, *v)?,
        AttrValue::Numbers(vs) => var.put_attribute(key, vs.clone())?,
    };
    Ok(())
}

/// Convert a NetCDF attribute into the dataset's attribute model
fn convert_attribute(value: AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::Str(s) => Some(AttrValue::Text(s)),
        AttributeValue::Strs(ss) => Some(AttrValue::Texts(ss)),
        AttributeValue::Double(v) => Some(AttrValue::Number(v)),
        AttributeValue::Float(v) => Some(AttrValue::Number(f64::from(v))),
        AttributeValue::Int(v) => Some(AttrValue::Number(f64::from(v))),
        AttributeValue::Short(v) => Some(AttrValue::Number(f64::from(v))),
        AttributeValue::Uint(v) => Some(AttrValue::Number(f64::from(v))),
        AttributeValue::Ushort(v) => Some(AttrValue::Number(f64::from(v))),
        AttributeValue::Uchar(v) => Some(AttrValue::Number(f64::from(v))),
        AttributeValue::Schar(v) => Some(AttrValue::Number(f64::from(v))),
        AttributeValue::Doubles(vs) => Some(AttrValue::Numbers(vs)),
        AttributeValue::Floats(vs) => Some(AttrValue::Numbers(vs.into_iter().map(f64::from).collect())),
        AttributeValue::Ints(vs) => Some(AttrValue::Numbers(vs.into_iter().map(f64::from).collect())),
        AttributeValue::Shorts(vs) => Some(AttrValue::Numbers(vs.into_iter().map(f64::from).collect())),
        _ => None,
    }
}
