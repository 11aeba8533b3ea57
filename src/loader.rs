//! Opening resolved file sets into a single tagged dataset
//!
//! Every loader returns a [`LoadedDataset`]: the merged dataset, the files it
//! came from, the time-bounds variable (if any) and the climatology class the
//! file layout implies. Time-varying variables that no downstream request can
//! use are pruned right after opening.

use crate::catalog::{reanalysis_code, reanalysis_file_paths, DatasetFormat, Grid, ReanalysisFrequency};
use crate::dataset::{Dataset, TIME_BOUND, TIME_DIM};
use crate::errors::{OceanClimoError, Result};
use crate::netcdf_io::{open_dataset, open_mfdataset};
use crate::resolver::{require_files, resolve_files};
use crate::var_dict::VariableDictionary;
use crate::zarr_io::open_zarr;
use log::debug;
use std::path::{Path, PathBuf};

/// Name the reanalysis gives its vertical coordinate
const REANALYSIS_DEPTH: &str = "depth";

/// Climatological time semantics of a loaded dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimoClass {
    /// Raw time series, not yet averaged
    History,
    /// Twelve monthly means
    MonthlyClimo,
    /// Annual means
    AnnualClimo,
}

impl ClimoClass {
    #[must_use]
    pub const fn is_annual(self) -> bool {
        matches!(self, Self::AnnualClimo)
    }

    #[must_use]
    pub const fn is_monthly(self) -> bool {
        matches!(self, Self::MonthlyClimo)
    }
}

/// Result of opening one source
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub dataset: Dataset,
    pub climo: ClimoClass,
    /// Files in the order they were concatenated
    pub files: Vec<PathBuf>,
    /// Time-bounds companion of `time`, when one was found
    pub time_bound: Option<String>,
}

/// Where and how a model source's files are laid out
#[derive(Debug, Clone)]
pub struct ModelFiles<'a> {
    pub format: DatasetFormat,
    pub dirin: &'a Path,
    pub case: &'a str,
    pub stream: &'a str,
    pub datestrs: &'a [String],
}

/// Where a reanalysis source's files are and which of them to read
#[derive(Debug, Clone)]
pub struct ReanalysisFiles<'a> {
    pub dirin: &'a Path,
    /// Single file under `dirin` holding every variable
    pub filename: Option<&'a str>,
    pub freq: ReanalysisFrequency,
    pub grid: Grid,
}

/// Time-bounds variable of a dataset
///
/// The name referenced by the `bounds` attribute of `time` wins; otherwise
/// the conventional `time_bound` is used if present.
#[must_use]
pub fn time_bound_name(ds: &Dataset) -> Option<String> {
    if let Some(bounds) = ds.get(TIME_DIM).and_then(|t| t.attr_str("bounds")) {
        return Some(bounds.to_string());
    }
    ds.contains(TIME_BOUND).then(|| TIME_BOUND.to_string())
}

/// Drop every time-varying variable outside the retain set
///
/// The retain set is `time`, the time bounds, every on-disk name of the
/// dictionary and every static variable.
pub fn prune_time_varying(ds: &mut Dataset, time_bound: Option<&str>, var_dict: &VariableDictionary) {
    let static_vars = ds.static_vars();
    debug!("static vars: {static_vars:?}");

    let mut keep: Vec<&str> = vec![TIME_DIM];
    keep.extend(time_bound);
    keep.extend(var_dict.on_disk_names());
    keep.extend(static_vars.iter().map(String::as_str));
    debug!("keep vars: {keep:?}");

    let drop: Vec<String> = ds
        .variables()
        .filter(|(name, var)| var.has_dim(TIME_DIM) && !keep.contains(name))
        .map(|(name, _)| name.to_string())
        .collect();
    debug!("dropping vars: {drop:?}");
    ds.drop_vars(&drop);
}

/// Open model output in one of its four layouts
///
/// `variables` are the canonical names requested by the run; only the
/// `single_variable` layout needs them, to build one file set per variable.
pub fn load_model(
    source_name: &str,
    files: &ModelFiles<'_>,
    variables: &[String],
    var_dict: &VariableDictionary,
) -> Result<LoadedDataset> {
    let climo = match files.format {
        DatasetFormat::Hist | DatasetFormat::SingleVariable => ClimoClass::History,
        DatasetFormat::MonClimo => ClimoClass::MonthlyClimo,
        DatasetFormat::AnnClimo => ClimoClass::AnnualClimo,
    };

    if files.format == DatasetFormat::SingleVariable {
        let mut dataset = Dataset::new();
        let mut all_files = Vec::new();
        for variable in variables {
            let on_disk = var_dict.lookup(source_name, variable)?;
            let templates = model_templates(files, Some(on_disk))?;
            let paths = resolve_files(&templates)?;
            dataset.merge(open_logged(&paths)?)?;
            all_files.extend(paths);
        }
        let time_bound = time_bound_name(&dataset);
        return Ok(LoadedDataset {
            dataset,
            climo,
            files: all_files,
            time_bound,
        });
    }

    let templates = model_templates(files, None)?;
    let paths = resolve_files(&templates)?;
    let mut dataset = open_logged(&paths)?;
    let time_bound = time_bound_name(&dataset);
    prune_time_varying(&mut dataset, time_bound.as_deref(), var_dict);

    Ok(LoadedDataset {
        dataset,
        climo,
        files: paths,
        time_bound,
    })
}

/// Open reanalysis files
///
/// With an explicit file name, that one file is read. Otherwise one file set
/// per requested variable is resolved from the catalog, its analyzed field
/// (`<code>_an`) renamed to the dictionary's on-disk name and the remaining
/// `<code>_` auxiliaries dropped before merging. Variables the dictionary
/// does not know are skipped here and fail later, at lookup.
pub fn load_reanalysis(
    source_name: &str,
    files: &ReanalysisFiles<'_>,
    variables: &[String],
    var_dict: &VariableDictionary,
) -> Result<LoadedDataset> {
    let climo = match files.freq {
        ReanalysisFrequency::Ann => ClimoClass::AnnualClimo,
        ReanalysisFrequency::Mon => ClimoClass::MonthlyClimo,
        other => {
            return Err(OceanClimoError::config(format!(
                "reanalysis frequency must be 'ann' or 'mon', got '{other}' for '{source_name}'"
            )))
        }
    };

    let (mut dataset, all_files) = match files.filename {
        Some(filename) => {
            let paths = require_files(vec![files.dirin.join(filename)])?;
            debug!("Reading {}", paths[0].display());
            (open_dataset(&paths[0])?, paths)
        }
        None => {
            let mut dataset = Dataset::new();
            let mut all_files = Vec::new();
            for variable in variables {
                let Some(on_disk) = var_dict.get(variable) else {
                    continue;
                };
                let code = reanalysis_code(variable).ok_or_else(|| {
                    OceanClimoError::config(format!(
                        "no reanalysis file code for '{variable}' in '{source_name}'"
                    ))
                })?;

                let paths = require_files(reanalysis_file_paths(
                    files.dirin,
                    code,
                    files.freq,
                    files.grid,
                )?)?;
                let mut part = open_logged(&paths)?;

                let analyzed = format!("{code}_an");
                if part.contains(&analyzed) && on_disk != analyzed {
                    part.rename(&analyzed, on_disk);
                }
                let prefix = format!("{code}_");
                let auxiliaries: Vec<String> = part
                    .names()
                    .filter(|name| name.starts_with(&prefix))
                    .map(str::to_string)
                    .collect();
                part.drop_vars(&auxiliaries);

                dataset.merge(part)?;
                all_files.extend(paths);
            }
            (dataset, all_files)
        }
    };

    if dataset.contains(REANALYSIS_DEPTH) && !dataset.contains(files.grid.depth_coord()) {
        dataset.rename(REANALYSIS_DEPTH, files.grid.depth_coord());
    }
    let time_bound = time_bound_name(&dataset);

    Ok(LoadedDataset {
        dataset,
        climo,
        files: all_files,
        time_bound,
    })
}

/// Open a climatology cached by a previous run
pub fn load_cached(store: &Path) -> Result<LoadedDataset> {
    debug!("Opening cached climatology {}", store.display());
    let dataset = open_zarr(store)?;
    let time_bound = time_bound_name(&dataset);
    Ok(LoadedDataset {
        dataset,
        climo: ClimoClass::MonthlyClimo,
        files: vec![store.to_path_buf()],
        time_bound,
    })
}

fn model_templates(files: &ModelFiles<'_>, on_disk: Option<&str>) -> Result<Vec<String>> {
    files
        .datestrs
        .iter()
        .map(|datestr| {
            files
                .format
                .file_template(files.dirin, files.case, files.stream, datestr, on_disk)
        })
        .collect()
}

fn open_logged(paths: &[PathBuf]) -> Result<Dataset> {
    debug!("Opening {} files: ", paths.len());
    for (n, path) in paths.iter().enumerate() {
        debug!("{}: {}", n + 1, path.display());
    }
    open_mfdataset(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Variable;
    use ndarray::Array2;

    #[test]
    fn test_bounds_attribute_wins() {
        let mut ds = Dataset::new();
        ds.insert(
            "time",
            Variable::from_vec("time", vec![31.0]).with_attr("bounds", "time_bnds"),
        )
        .unwrap();
        ds.insert(
            "time_bound",
            Variable::new(vec!["time", "d2"], Array2::zeros((1, 2)).into_dyn()).unwrap(),
        )
        .unwrap();
        assert_eq!(time_bound_name(&ds).as_deref(), Some("time_bnds"));

        ds.insert("time", Variable::from_vec("time", vec![31.0])).unwrap();
        assert_eq!(time_bound_name(&ds).as_deref(), Some("time_bound"));

        ds.remove("time_bound");
        assert_eq!(time_bound_name(&ds), None);
    }

    #[test]
    fn test_prune_keeps_requested_and_static() {
        let mut ds = Dataset::new();
        ds.insert("time", Variable::from_vec("time", vec![31.0, 59.0])).unwrap();
        ds.insert("TAREA", Variable::from_vec("nlon", vec![1.0, 1.0, 1.0])).unwrap();
        for name in ["NO3", "TEMP", "time_bound"] {
            let var = Variable::new(vec!["time", "nlon"], Array2::zeros((2, 3)).into_dyn()).unwrap();
            ds.insert(name, var).unwrap();
        }

        let dict = VariableDictionary::from_pairs([("nitrate", "NO3")]);
        prune_time_varying(&mut ds, Some("time_bound"), &dict);
        assert_eq!(
            ds.names().collect::<Vec<_>>(),
            vec!["NO3", "TAREA", "time", "time_bound"]
        );
    }

    #[test]
    fn test_reanalysis_rejects_quarterly_frequency() {
        let files = ReanalysisFiles {
            dirin: Path::new("/obs"),
            filename: None,
            freq: ReanalysisFrequency::Jfm,
            grid: Grid::OneDegree,
        };
        let err = load_reanalysis("WOA", &files, &[], &VariableDictionary::reanalysis_defaults())
            .unwrap_err();
        assert!(err.is_configuration_error());
    }
}
