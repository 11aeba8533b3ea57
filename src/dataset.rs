//! In-memory labeled dataset
//!
//! A [`Dataset`] is a collection of named [`Variable`]s, each an n-dimensional
//! array with named dimensions and string/numeric attributes. Dimension
//! lengths are shared across the collection: inserting a variable whose
//! dimension length disagrees with one already present is a merge error.

use crate::errors::{OceanClimoError, Result};
use ndarray::{concatenate, ArrayD, ArrayViewD, Axis, IxDyn};
use std::collections::BTreeMap;

/// Name of the time dimension shared by every source
pub const TIME_DIM: &str = "time";

/// Conventional name of the time-bounds companion variable
pub const TIME_BOUND: &str = "time_bound";

/// Attribute value attached to a variable or dataset
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Texts(Vec<String>),
    Number(f64),
    Numbers(Vec<f64>),
}

impl AttrValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Numbers(vs) if vs.len() == 1 => Some(vs[0]),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(vs: Vec<f64>) -> Self {
        Self::Numbers(vs)
    }
}

/// One named n-dimensional array
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Variable {
    /// Create a variable, checking that every array axis has a dimension name
    pub fn new<S: Into<String>>(dims: Vec<S>, data: ArrayD<f64>) -> Result<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(OceanClimoError::Merge {
                message: format!(
                    "{} dimension names given for an array with {} dimensions",
                    dims.len(),
                    data.ndim()
                ),
            });
        }
        Ok(Self {
            dims,
            data,
            attrs: BTreeMap::new(),
        })
    }

    /// One-dimensional coordinate-style variable
    #[must_use]
    pub fn from_vec(dim: &str, values: Vec<f64>) -> Self {
        let len = values.len();
        Self {
            dims: vec![dim.to_string()],
            data: ArrayD::from_shape_vec(IxDyn(&[len]), values)
                .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0]))),
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_str)
    }

    /// The `units` attribute, when it is a string
    #[must_use]
    pub fn units(&self) -> Option<&str> {
        self.attr_str("units")
    }

    #[must_use]
    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    /// Axis index of a named dimension
    #[must_use]
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// Length of a named dimension, if the variable has it
    #[must_use]
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.axis_of(dim).map(|axis| self.data.len_of(Axis(axis)))
    }

    fn dim_lengths(&self) -> impl Iterator<Item = (&str, usize)> {
        self.dims
            .iter()
            .zip(self.data.shape())
            .map(|(d, &len)| (d.as_str(), len))
    }
}

/// Collection of variables sharing named dimensions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    variables: BTreeMap<String, Variable>,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Dataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimension name → length over every variable
    #[must_use]
    pub fn dims(&self) -> BTreeMap<String, usize> {
        let mut dims = BTreeMap::new();
        for var in self.variables.values() {
            for (dim, len) in var.dim_lengths() {
                dims.entry(dim.to_string()).or_insert(len);
            }
        }
        dims
    }

    #[must_use]
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.variables.values().find_map(|v| v.dim_len(dim))
    }

    /// Length of the time dimension, 0 when absent
    #[must_use]
    pub fn time_len(&self) -> usize {
        self.dim_len(TIME_DIM).unwrap_or(0)
    }

    /// Add or replace a variable
    ///
    /// # Errors
    ///
    /// Fails with [`OceanClimoError::Merge`] if one of its dimensions already
    /// exists in the dataset with a different length.
    pub fn insert(&mut self, name: &str, var: Variable) -> Result<()> {
        for (dim, len) in var.dim_lengths() {
            let existing = self
                .variables
                .iter()
                .filter(|(other, _)| other.as_str() != name)
                .find_map(|(_, v)| v.dim_len(dim));
            if let Some(existing) = existing {
                if existing != len {
                    return Err(OceanClimoError::Merge {
                        message: format!(
                            "dimension '{dim}' of '{name}' has length {len}, dataset has {existing}"
                        ),
                    });
                }
            }
        }
        self.variables.insert(name.to_string(), var);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Variable that downstream selection needs; absence is fatal
    ///
    /// # Errors
    ///
    /// [`OceanClimoError::VariableNotFound`] naming the source and variable.
    pub fn require(&self, source_name: &str, name: &str) -> Result<&Variable> {
        self.get(name).ok_or_else(|| OceanClimoError::VariableNotFound {
            source_name: source_name.to_string(),
            var: name.to_string(),
        })
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.get_mut(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.variables.remove(name)
    }

    /// Variable names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn variables_mut(&mut self) -> impl Iterator<Item = (&str, &mut Variable)> {
        self.variables.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables without a time dimension
    #[must_use]
    pub fn static_vars(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter(|(_, v)| !v.has_dim(TIME_DIM))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Drop the named variables; names not present are ignored
    pub fn drop_vars<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.variables.remove(name.as_ref());
        }
    }

    /// Rename a variable and, like a coordinate rename, every dimension of
    /// the same name
    pub fn rename(&mut self, old: &str, new: &str) {
        if old == new {
            return;
        }
        if let Some(var) = self.variables.remove(old) {
            self.variables.insert(new.to_string(), var);
        }
        for var in self.variables.values_mut() {
            for dim in &mut var.dims {
                if dim == old {
                    *dim = new.to_string();
                }
            }
        }
    }

    /// Merge another dataset into this one, aligned on shared dimensions
    ///
    /// Variables present in both must be identical. Attributes of `self` win.
    ///
    /// # Errors
    ///
    /// [`OceanClimoError::Merge`] on mismatched dimension lengths or
    /// conflicting values for a shared variable. `self` is left unchanged.
    pub fn merge(&mut self, other: Dataset) -> Result<()> {
        let dims = self.dims();
        for (dim, len) in other.dims() {
            if let Some(&existing) = dims.get(&dim) {
                if existing != len {
                    return Err(OceanClimoError::Merge {
                        message: format!(
                            "cannot align dimension '{dim}': lengths {existing} and {len}"
                        ),
                    });
                }
            }
        }
        if let Some(name) = other.variables.iter().find_map(|(name, var)| {
            self.variables
                .get(name)
                .filter(|existing| !same_values(existing, var))
                .map(|_| name)
        }) {
            return Err(OceanClimoError::Merge {
                message: format!("conflicting values for variable '{name}'"),
            });
        }
        for (name, var) in other.variables {
            self.variables.entry(name).or_insert(var);
        }
        for (key, value) in other.attrs {
            self.attrs.entry(key).or_insert(value);
        }
        Ok(())
    }

    /// Concatenate datasets along `time`
    ///
    /// Time-varying variables are joined in the given order; variables
    /// without a time dimension are taken from the first dataset.
    pub fn concat_time(datasets: Vec<Dataset>) -> Result<Dataset> {
        let mut iter = datasets.into_iter();
        let Some(mut combined) = iter.next() else {
            return Ok(Dataset::new());
        };
        let rest: Vec<Dataset> = iter.collect();
        if rest.is_empty() {
            return Ok(combined);
        }

        let time_varying: Vec<String> = combined
            .variables
            .iter()
            .filter(|(_, v)| v.has_dim(TIME_DIM))
            .map(|(k, _)| k.clone())
            .collect();

        for name in time_varying {
            let Some(first) = combined.variables.get(&name) else {
                continue;
            };
            let axis = first.axis_of(TIME_DIM).unwrap_or(0);
            let mut views: Vec<ArrayViewD<'_, f64>> = vec![first.data.view()];
            for ds in &rest {
                let part = ds.get(&name).ok_or_else(|| OceanClimoError::Merge {
                    message: format!("variable '{name}' missing from a file being concatenated"),
                })?;
                if part.dims != first.dims {
                    return Err(OceanClimoError::Merge {
                        message: format!("dimensions of '{name}' differ between files"),
                    });
                }
                views.push(part.data.view());
            }
            let joined = concatenate(Axis(axis), &views).map_err(|e| OceanClimoError::Merge {
                message: format!("cannot concatenate '{name}' along time: {e}"),
            })?;
            if let Some(var) = combined.variables.get_mut(&name) {
                var.data = joined;
            }
        }
        Ok(combined)
    }
}

fn same_values(a: &Variable, b: &Variable) -> bool {
    a.dims == b.dims
        && a.data.shape() == b.data.shape()
        && a
            .data
            .iter()
            .zip(b.data.iter())
            .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}
