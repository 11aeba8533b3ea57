//! Zarr I/O operations
//!
//! Cached climatologies are stored as Zarr v2 directory stores: one
//! sub-directory per variable holding `.zarray` metadata, `.zattrs`
//! attributes (dimension names under `_ARRAY_DIMENSIONS`) and raw,
//! uncompressed chunk files named by their chunk-grid index.

use crate::dataset::{AttrValue, Dataset, Variable, TIME_DIM};
use crate::errors::{OceanClimoError, Result};
use chrono::Utc;
use log::{debug, info};
use ndarray::{indices, ArrayD, Dimension, IxDyn, Slice};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const DIMENSIONS_KEY: &str = "_ARRAY_DIMENSIONS";

/// Zarr data source
#[derive(Debug, Clone)]
pub struct ZarrSource {
    /// Local filesystem path
    pub path: PathBuf,
}

impl ZarrSource {
    pub fn from_path(path: &Path) -> Self {
        ZarrSource {
            path: path.to_path_buf(),
        }
    }
}

/// Contents of a `.zarray` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub zarr_format: u8,
    pub shape: Vec<usize>,
    pub chunks: Vec<usize>,
    pub dtype: String,
    pub compressor: Option<JsonValue>,
    pub fill_value: JsonValue,
    pub order: String,
    pub filters: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_separator: Option<String>,
}

impl ArrayMetadata {
    fn fill(&self) -> f64 {
        match &self.fill_value {
            JsonValue::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            JsonValue::String(s) if s == "Infinity" => f64::INFINITY,
            JsonValue::String(s) if s == "-Infinity" => f64::NEG_INFINITY,
            _ => f64::NAN,
        }
    }

    fn separator(&self) -> &str {
        self.dimension_separator.as_deref().unwrap_or(".")
    }

    fn chunk_grid(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(&self.chunks)
            .map(|(&len, &chunk)| len.div_ceil(chunk.max(1)))
            .collect()
    }
}

/// Element type of raw chunk bytes, decoded from a numpy-style dtype string
#[derive(Debug, Clone, Copy)]
struct Dtype {
    kind: char,
    size: usize,
    big_endian: bool,
}

impl Dtype {
    fn parse(dtype: &str) -> Result<Self> {
        let mut chars = dtype.chars();
        let order = chars.next();
        let kind = chars.next();
        let size = chars.as_str().parse::<usize>().ok();
        match (order, kind, size) {
            (Some(order @ ('<' | '>' | '|')), Some(kind @ ('f' | 'i' | 'u')), Some(size))
                if matches!((kind, size), ('f', 4 | 8) | ('i' | 'u', 1 | 2 | 4 | 8)) =>
            {
                Ok(Self {
                    kind,
                    size,
                    big_endian: order == '>',
                })
            }
            _ => Err(OceanClimoError::Zarr(format!("unsupported dtype '{dtype}'"))),
        }
    }

    fn decode(self, bytes: &[u8]) -> Vec<f64> {
        bytes
            .chunks_exact(self.size)
            .map(|b| {
                let mut raw = [0u8; 8];
                raw[..self.size].copy_from_slice(b);
                if self.big_endian {
                    raw[..self.size].reverse();
                }
                match (self.kind, self.size) {
                    ('f', 4) => f64::from(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
                    ('f', _) => f64::from_le_bytes(raw),
                    ('i', 1) => f64::from(raw[0] as i8),
                    ('i', 2) => f64::from(i16::from_le_bytes([raw[0], raw[1]])),
                    ('i', 4) => f64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
                    ('i', _) => i64::from_le_bytes(raw) as f64,
                    ('u', 1) => f64::from(raw[0]),
                    ('u', 2) => f64::from(u16::from_le_bytes([raw[0], raw[1]])),
                    ('u', 4) => f64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
                    _ => u64::from_le_bytes(raw) as f64,
                }
            })
            .collect()
    }
}

/// Zarr reader for accessing a directory store
pub struct ZarrReader {
    source: ZarrSource,
}

impl ZarrReader {
    /// Create a new ZarrReader from a source
    pub fn new(source: ZarrSource) -> Result<Self> {
        if !source.path.is_dir() {
            return Err(OceanClimoError::Zarr(format!(
                "Zarr store path is not a directory: {}",
                source.path.display()
            )));
        }
        Ok(ZarrReader { source })
    }

    /// List all arrays in the store, sorted by name
    pub fn list_arrays(&self) -> Result<Vec<String>> {
        let mut arrays = Vec::new();
        for entry in fs::read_dir(&self.source.path)? {
            let path = entry?.path();
            if path.join(".zarray").exists() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    arrays.push(name.to_string());
                }
            }
        }
        arrays.sort();
        Ok(arrays)
    }

    /// Get array metadata
    pub fn array_metadata(&self, array_name: &str) -> Result<ArrayMetadata> {
        let zarray_path = self.source.path.join(array_name).join(".zarray");
        if !zarray_path.exists() {
            return Err(OceanClimoError::Zarr(format!(
                "Array metadata file not found: {}",
                zarray_path.display()
            )));
        }
        let metadata: ArrayMetadata = serde_json::from_str(&fs::read_to_string(&zarray_path)?)?;
        if metadata.shape.len() != metadata.chunks.len() {
            return Err(OceanClimoError::Zarr(format!(
                "shape and chunks of '{array_name}' have different ranks"
            )));
        }
        Ok(metadata)
    }

    /// Read an entire array, assembling its chunks
    ///
    /// Missing chunks and elements equal to the fill value become NaN.
    pub fn read_array(&self, array_name: &str) -> Result<ArrayD<f64>> {
        let meta = self.array_metadata(array_name)?;
        if meta.compressor.as_ref().is_some_and(|c| !c.is_null()) {
            return Err(OceanClimoError::Zarr(format!(
                "compressed array '{array_name}' is not supported"
            )));
        }
        if meta.order != "C" {
            return Err(OceanClimoError::Zarr(format!(
                "array '{array_name}' uses unsupported order '{}'",
                meta.order
            )));
        }
        let dtype = Dtype::parse(&meta.dtype)?;
        let fill = meta.fill();
        let array_path = self.source.path.join(array_name);

        let mut out = ArrayD::from_elem(IxDyn(&meta.shape), f64::NAN);
        for chunk_index in indices(IxDyn(&meta.chunk_grid())) {
            let chunk_index = chunk_index.slice();
            let chunk_path = array_path.join(chunk_key(chunk_index, meta.separator()));
            if !chunk_path.exists() {
                continue;
            }
            let values = dtype.decode(&fs::read(&chunk_path)?);
            let chunk = ArrayD::from_shape_vec(IxDyn(&meta.chunks), values).map_err(|e| {
                OceanClimoError::Zarr(format!(
                    "chunk {} of '{array_name}' has the wrong size: {e}",
                    chunk_path.display()
                ))
            })?;

            let (start, end) = chunk_region(chunk_index, &meta.chunks, &meta.shape);
            out.slice_each_axis_mut(|ax| {
                let i = ax.axis.index();
                Slice::from(start[i]..end[i])
            })
            .assign(&chunk.slice_each_axis(|ax| {
                let i = ax.axis.index();
                Slice::from(0..end[i] - start[i])
            }));
        }

        if fill.is_finite() {
            out.mapv_inplace(|v| if v == fill { f64::NAN } else { v });
        }
        Ok(out)
    }

    /// Dimension names and remaining attributes of an array
    pub fn array_attributes(
        &self,
        array_name: &str,
    ) -> Result<(Vec<String>, BTreeMap<String, AttrValue>)> {
        let mut attrs = read_attrs(&self.source.path.join(array_name).join(".zattrs"))?;
        let dims = match attrs.remove(DIMENSIONS_KEY) {
            Some(JsonValue::Array(names)) => names
                .iter()
                .map(|n| n.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    OceanClimoError::Zarr(format!("non-string dimension name in '{array_name}'"))
                })?,
            _ => {
                return Err(OceanClimoError::Zarr(format!(
                    "array '{array_name}' has no {DIMENSIONS_KEY} attribute"
                )))
            }
        };
        Ok((dims, json_to_attrs(attrs)))
    }

    /// Read every array of the store into one dataset
    pub fn read_dataset(&self) -> Result<Dataset> {
        let mut ds = Dataset::new();
        ds.attrs = json_to_attrs(read_attrs(&self.source.path.join(".zattrs"))?);
        for name in self.list_arrays()? {
            let (dims, attrs) = self.array_attributes(&name)?;
            let mut variable = Variable::new(dims, self.read_array(&name)?)?;
            variable.attrs = attrs;
            ds.insert(&name, variable)?;
        }
        debug!(
            "Read {} arrays from {}",
            ds.len(),
            self.source.path.display()
        );
        Ok(ds)
    }
}

/// Zarr writer for creating a directory store
pub struct ZarrWriter {
    source: ZarrSource,
}

impl ZarrWriter {
    /// Create the store directory (replacing an existing store) and its group metadata
    pub fn create(source: ZarrSource) -> Result<Self> {
        if source.path.exists() {
            fs::remove_dir_all(&source.path)?;
        }
        fs::create_dir_all(&source.path)?;
        fs::write(
            source.path.join(".zgroup"),
            serde_json::to_string_pretty(&serde_json::json!({ "zarr_format": 2 }))?,
        )?;
        Ok(ZarrWriter { source })
    }

    /// Write one variable as an array of little-endian `f64` chunks
    ///
    /// Without an explicit `chunk_shape`, time-varying variables are chunked
    /// one time step at a time and everything else is a single chunk.
    pub fn write_array(
        &self,
        array_name: &str,
        variable: &Variable,
        chunk_shape: Option<Vec<usize>>,
    ) -> Result<()> {
        let shape = variable.data.shape().to_vec();
        let chunks: Vec<usize> = chunk_shape
            .unwrap_or_else(|| default_chunks(variable))
            .into_iter()
            .map(|c| c.max(1))
            .collect();
        if chunks.len() != shape.len() {
            return Err(OceanClimoError::Zarr(format!(
                "chunk shape {chunks:?} does not match array shape {shape:?}"
            )));
        }

        let array_path = self.source.path.join(array_name);
        fs::create_dir_all(&array_path)?;

        let metadata = ArrayMetadata {
            zarr_format: 2,
            shape: shape.clone(),
            chunks: chunks.clone(),
            dtype: "<f8".to_string(),
            compressor: None,
            fill_value: JsonValue::String("NaN".to_string()),
            order: "C".to_string(),
            filters: None,
            dimension_separator: None,
        };
        fs::write(
            array_path.join(".zarray"),
            serde_json::to_string_pretty(&metadata)?,
        )?;

        let mut attrs = attrs_to_json(&variable.attrs);
        attrs.insert(
            DIMENSIONS_KEY.to_string(),
            JsonValue::Array(
                variable
                    .dims
                    .iter()
                    .map(|d| JsonValue::String(d.clone()))
                    .collect(),
            ),
        );
        fs::write(
            array_path.join(".zattrs"),
            serde_json::to_string_pretty(&JsonValue::Object(attrs))?,
        )?;

        let grid: Vec<Vec<usize>> = indices(IxDyn(&metadata.chunk_grid()))
            .into_iter()
            .map(|ix| ix.slice().to_vec())
            .collect();
        debug!(
            "Writing '{array_name}' shape {shape:?} as {} chunks of {chunks:?}",
            grid.len()
        );

        // Write chunks in parallel
        grid.par_iter().try_for_each(|chunk_index| {
            let (start, end) = chunk_region(chunk_index, &chunks, &shape);
            let mut chunk = ArrayD::from_elem(IxDyn(&chunks), f64::NAN);
            chunk
                .slice_each_axis_mut(|ax| Slice::from(0..end[ax.axis.index()] - start[ax.axis.index()]))
                .assign(&variable.data.slice_each_axis(|ax| {
                    let i = ax.axis.index();
                    Slice::from(start[i]..end[i])
                }));
            let bytes: Vec<u8> = chunk.iter().flat_map(|v| v.to_le_bytes()).collect();
            fs::write(array_path.join(chunk_key(chunk_index, ".")), bytes)
                .map_err(OceanClimoError::Io)
        })
    }

    /// Write every variable of a dataset, stamping a `history` attribute
    pub fn write_dataset(&self, ds: &Dataset) -> Result<()> {
        info!("writing {}", self.source.path.display());
        let mut attrs = attrs_to_json(&ds.attrs);
        attrs.insert(
            "history".to_string(),
            JsonValue::String(format!(
                "created by ocean-climo on {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S")
            )),
        );
        fs::write(
            self.source.path.join(".zattrs"),
            serde_json::to_string_pretty(&JsonValue::Object(attrs))?,
        )?;
        for (name, variable) in ds.variables() {
            self.write_array(name, variable, None)?;
        }
        Ok(())
    }
}

/// Open a whole store as a dataset
pub fn open_zarr(path: &Path) -> Result<Dataset> {
    ZarrReader::new(ZarrSource::from_path(path))?.read_dataset()
}

/// Write a whole dataset to a fresh store
pub fn write_zarr(ds: &Dataset, path: &Path) -> Result<()> {
    ZarrWriter::create(ZarrSource::from_path(path))?.write_dataset(ds)
}

fn default_chunks(variable: &Variable) -> Vec<usize> {
    let mut chunks = variable.data.shape().to_vec();
    if let Some(axis) = variable.axis_of(TIME_DIM) {
        chunks[axis] = 1;
    }
    chunks
}

fn chunk_key(chunk_index: &[usize], separator: &str) -> String {
    if chunk_index.is_empty() {
        return "0".to_string();
    }
    chunk_index
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Start (inclusive) and end (exclusive) of a chunk within the array,
/// clipped to the array edge
fn chunk_region(chunk_index: &[usize], chunks: &[usize], shape: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let start: Vec<usize> = chunk_index.iter().zip(chunks).map(|(&i, &c)| i * c).collect();
    let end: Vec<usize> = start
        .iter()
        .zip(chunks)
        .zip(shape)
        .map(|((&s, &c), &len)| (s + c).min(len))
        .collect();
    (start, end)
}

fn read_attrs(path: &Path) -> Result<Map<String, JsonValue>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    match serde_json::from_str(&fs::read_to_string(path)?)? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(OceanClimoError::Zarr(format!(
            "{} is not a JSON object",
            path.display()
        ))),
    }
}

fn json_to_attrs(map: Map<String, JsonValue>) -> BTreeMap<String, AttrValue> {
    map.into_iter()
        .filter_map(|(key, value)| {
            let attr = match value {
                JsonValue::String(s) => AttrValue::Text(s),
                JsonValue::Number(n) => AttrValue::Number(n.as_f64()?),
                JsonValue::Array(items) => {
                    if let Some(numbers) = items.iter().map(JsonValue::as_f64).collect::<Option<Vec<_>>>() {
                        AttrValue::Numbers(numbers)
                    } else {
                        AttrValue::Texts(
                            items
                                .iter()
                                .map(|v| v.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()?,
                        )
                    }
                }
                _ => return None,
            };
            Some((key, attr))
        })
        .collect()
}

fn attrs_to_json(attrs: &BTreeMap<String, AttrValue>) -> Map<String, JsonValue> {
    attrs
        .iter()
        .map(|(key, value)| {
            let json = match value {
                AttrValue::Text(s) => JsonValue::String(s.clone()),
                AttrValue::Texts(ss) => {
                    JsonValue::Array(ss.iter().cloned().map(JsonValue::String).collect())
                }
                AttrValue::Number(v) => serde_json::json!(v),
                AttrValue::Numbers(vs) => serde_json::json!(vs),
            };
            (key.clone(), json)
        })
        .collect()
}
