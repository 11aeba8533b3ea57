//! Data sources: one opened, normalized dataset per configured source
//!
//! A [`DataSource`] is built once by one of its constructors and owns its
//! dataset, variable dictionary and climatology class. After construction
//! only two steps mutate it: the single unit conversion (done by every
//! constructor) and, for raw model output, [`DataSource::compute_mon_climatology`].
//! Requests against the source afterwards only read it.

use crate::catalog::{DatasetFormat, Grid, ReanalysisFrequency, SourceType, DEPTH_COORD};
use crate::climatology::TimePeriod;
use crate::config::{ModelSourceConfig, Operation, ReanalysisSourceConfig, RunConfig, SourceConfig};
use crate::dataset::{Dataset, Variable, TIME_DIM};
use crate::errors::{OceanClimoError, Result};
use crate::loader::{
    load_cached, load_model, load_reanalysis, ClimoClass, LoadedDataset, ModelFiles,
    ReanalysisFiles,
};
use crate::netcdf_io::write_dataset;
use crate::statistics::{StatOperation, StatisticalReduction};
use crate::units::{UnitConformer, UnitProfile};
use crate::var_dict::VariableDictionary;
use crate::zarr_io::write_zarr;
use log::{debug, info};
use ndarray::{stack, ArrayD, ArrayViewD, Axis, IxDyn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// First day of each month in a 365-day calendar, plus the year length
const MONTH_START_DAYS: [f64; 13] = [
    0.0, 31.0, 59.0, 90.0, 120.0, 151.0, 181.0, 212.0, 243.0, 273.0, 304.0, 334.0, 365.0,
];

/// Calendars whose years are all 365 days long
const NOLEAP_CALENDARS: [&str; 2] = ["noleap", "365_day"];

/// What a source is and how it was read
#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    /// Climatology written by a previous run
    CachedClimo { store: PathBuf },
    /// Model output in one of its layouts
    ModelHistory { format: DatasetFormat },
    /// Reanalysis product at one frequency
    Reanalysis {
        product: SourceType,
        freq: ReanalysisFrequency,
    },
}

impl SourceKind {
    const fn unit_profile(&self) -> UnitProfile {
        match self {
            Self::CachedClimo { .. } => UnitProfile::Cached,
            Self::ModelHistory { .. } => UnitProfile::Model,
            Self::Reanalysis { .. } => UnitProfile::Reanalysis,
        }
    }
}

/// One opened source
#[derive(Debug, Clone)]
pub struct DataSource {
    name: String,
    kind: SourceKind,
    dataset: Dataset,
    var_dict: VariableDictionary,
    climo: ClimoClass,
    files: Vec<PathBuf>,
    time_bound: Option<String>,
    units_conformed: bool,
}

impl DataSource {
    /// Wrap an already loaded dataset without converting units
    #[must_use]
    pub fn from_loaded(
        name: &str,
        kind: SourceKind,
        var_dict: VariableDictionary,
        loaded: LoadedDataset,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            dataset: loaded.dataset,
            var_dict,
            climo: loaded.climo,
            files: loaded.files,
            time_bound: loaded.time_bound,
            units_conformed: false,
        }
    }

    /// Open a climatology cached by a previous run, with its dictionary
    pub fn cached(name: &str, store: &Path, var_dict_path: &Path) -> Result<Self> {
        info!("Opening {}", store.display());
        let var_dict = VariableDictionary::from_json_file(var_dict_path)?;
        let loaded = load_cached(store)?;
        let kind = SourceKind::CachedClimo {
            store: store.to_path_buf(),
        };
        Self::from_loaded(name, kind, var_dict, loaded).conformed()
    }

    /// Open model output in the layout best suited to `operation`
    pub fn model(
        name: &str,
        config: &ModelSourceConfig,
        operation: Operation,
        variables: &[String],
    ) -> Result<Self> {
        let (format, location) = config.choose_format(operation)?;
        info!("Opening {name} as {format} from {}", location.dirin.display());
        let datestrs = config.datestr.to_vec();
        let files = ModelFiles {
            format,
            dirin: &location.dirin,
            case: &config.case,
            stream: &location.stream,
            datestrs: &datestrs,
        };
        let var_dict = VariableDictionary::model_defaults();
        let loaded = load_model(name, &files, variables, &var_dict)?;
        Self::from_loaded(name, SourceKind::ModelHistory { format }, var_dict, loaded).conformed()
    }

    /// Open a reanalysis product
    pub fn reanalysis(
        name: &str,
        product: SourceType,
        config: &ReanalysisSourceConfig,
        grid: Grid,
        variables: &[String],
    ) -> Result<Self> {
        let location = config.location(name)?;
        let grid = config.grid.unwrap_or(grid);
        info!("Opening {name} ({}) on {grid}", product.as_str());
        let files = ReanalysisFiles {
            dirin: &location.dirin,
            filename: location.filename.as_deref(),
            freq: config.freq,
            grid,
        };
        let var_dict = VariableDictionary::reanalysis_defaults();
        let loaded = load_reanalysis(name, &files, variables, &var_dict)?;
        let kind = SourceKind::Reanalysis {
            product,
            freq: config.freq,
        };
        Self::from_loaded(name, kind, var_dict, loaded).conformed()
    }

    /// Build a source from its `data_sources` entry
    pub fn from_config(name: &str, source: &SourceConfig, run: &RunConfig) -> Result<Self> {
        match source {
            SourceConfig::Cesm(model) => {
                Self::model(name, model, run.operation, &run.variable_list)
            }
            SourceConfig::Woa2013(reanalysis) | SourceConfig::Woa2005(reanalysis) => {
                Self::reanalysis(
                    name,
                    source.source_type(),
                    reanalysis,
                    run.grid,
                    &run.variable_list,
                )
            }
        }
    }

    fn conformed(mut self) -> Result<Self> {
        self.conform_units()?;
        Ok(self)
    }

    /// Normalize units for this source's kind
    ///
    /// # Errors
    ///
    /// [`OceanClimoError::UnitsAlreadyConformed`] on every call after the
    /// first; values are left untouched.
    pub fn conform_units(&mut self) -> Result<Vec<String>> {
        if self.units_conformed {
            return Err(OceanClimoError::UnitsAlreadyConformed {
                source_name: self.name.clone(),
            });
        }
        let scaled = UnitConformer::new(self.kind.unit_profile(), DEPTH_COORD).conform(&mut self.dataset);
        self.units_conformed = true;
        Ok(scaled)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> &SourceKind {
        &self.kind
    }

    #[must_use]
    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[must_use]
    pub const fn var_dict(&self) -> &VariableDictionary {
        &self.var_dict
    }

    /// Files read, in concatenation order
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub fn time_bound(&self) -> Option<&str> {
        self.time_bound.as_deref()
    }

    #[must_use]
    pub const fn climo(&self) -> ClimoClass {
        self.climo
    }

    #[must_use]
    pub const fn is_annual_climatology(&self) -> bool {
        self.climo.is_annual()
    }

    #[must_use]
    pub const fn is_monthly_climatology(&self) -> bool {
        self.climo.is_monthly()
    }

    #[must_use]
    pub const fn units_conformed(&self) -> bool {
        self.units_conformed
    }

    /// Time periods this source can serve, with the time slots each averages
    ///
    /// Cached and annual sources offer only `ANN` over every stored slot;
    /// monthly sources offer the year and the four seasons.
    #[must_use]
    pub fn time_periods(&self) -> BTreeMap<TimePeriod, Vec<usize>> {
        let pass_through = matches!(self.kind, SourceKind::CachedClimo { .. })
            || self.climo == ClimoClass::AnnualClimo;
        if pass_through {
            BTreeMap::from([(TimePeriod::Ann, (0..self.dataset.time_len()).collect())])
        } else {
            TimePeriod::ALL
                .into_iter()
                .map(|period| (period, period.month_indices()))
                .collect()
        }
    }

    /// Average raw model output into a twelve-month climatology
    ///
    /// Time steps are grouped by the calendar month of their time-bound
    /// midpoint on a 365-day calendar. Every time-varying variable is
    /// averaged per month; the bounds keep the earliest start and latest end
    /// of each month. Sources that are already climatologies are left alone.
    ///
    /// Returns whether anything was computed.
    ///
    /// # Errors
    ///
    /// - [`OceanClimoError::MissingTimeBounds`] for raw output without bounds
    /// - [`OceanClimoError::TimeEncoding`] unless `time` is in days since
    ///   January 1 on a `noleap`/`365_day` calendar
    /// - [`OceanClimoError::IncompleteYears`] unless the series covers whole
    ///   years with every month present
    pub fn compute_mon_climatology(&mut self) -> Result<bool> {
        if !matches!(self.kind, SourceKind::ModelHistory { .. }) || self.climo != ClimoClass::History {
            debug!("{} is already a climatology", self.name);
            return Ok(false);
        }
        let missing = || OceanClimoError::MissingTimeBounds {
            source_name: self.name.clone(),
        };
        let tb_name = self.time_bound.clone().ok_or_else(missing)?;
        let bounds = self.dataset.get(&tb_name).ok_or_else(missing)?;
        check_time_encoding(&self.name, self.dataset.get(TIME_DIM))?;

        let months = months_of_bounds(bounds)?;
        if months.len() % 12 != 0 {
            return Err(OceanClimoError::IncompleteYears {
                source_name: self.name.clone(),
                message: format!(
                    "time axis of length {} is not evenly divisible by 12",
                    months.len()
                ),
            });
        }
        let groups: Vec<Vec<usize>> = (0..12)
            .map(|m| {
                months
                    .iter()
                    .enumerate()
                    .filter(|&(_, &month)| month == m)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();
        let absent: Vec<usize> = (1..=12).filter(|m| groups[m - 1].is_empty()).collect();
        if !absent.is_empty() {
            return Err(OceanClimoError::IncompleteYears {
                source_name: self.name.clone(),
                message: format!("no time steps fall in months {absent:?}"),
            });
        }
        debug!(
            "Grouping {} time steps of {} into months: {:?}",
            months.len(),
            self.name,
            groups.iter().map(Vec::len).collect::<Vec<_>>()
        );

        let mut climo = Dataset::new();
        climo.attrs = self.dataset.attrs.clone();
        for (name, var) in self.dataset.variables() {
            let Some(axis) = var.axis_of(TIME_DIM) else {
                climo.insert(name, var.clone())?;
                continue;
            };
            let data = if name == tb_name {
                monthly_bounds(&var.data, axis, &groups)?
            } else {
                group_reduce(&var.data, axis, &groups, StatOperation::Mean)?
            };
            let mut averaged = Variable::new(var.dims.clone(), data)?;
            averaged.attrs = var.attrs.clone();
            climo.insert(name, averaged)?;
        }

        info!("Computed monthly climatology for {}", self.name);
        self.dataset = climo;
        self.climo = ClimoClass::MonthlyClimo;
        Ok(true)
    }

    /// Write the dataset and its variable dictionary for later runs
    ///
    /// The store format follows the extension: `.zarr` or `.nc`.
    pub fn cache_dataset(&self, cached_location: &Path, cached_var_dict: &Path) -> Result<()> {
        let ext = cached_location.extension().and_then(|e| e.to_str());
        if !matches!(ext, Some("zarr" | "nc")) {
            return Err(OceanClimoError::config(format!(
                "Unknown output file extension: {}",
                cached_location.display()
            )));
        }

        self.var_dict.to_json_file(cached_var_dict)?;

        if let Some(diro) = cached_location.parent() {
            if !diro.exists() {
                info!("creating {}", diro.display());
                fs::create_dir_all(diro)?;
            }
        }
        info!("writing {}", cached_location.display());
        if ext == Some("zarr") {
            write_zarr(&self.dataset, cached_location)
        } else {
            write_dataset(&self.dataset, cached_location)
        }
    }
}

/// Accept only `days since <year>-01-01` on a 365-day calendar
fn check_time_encoding(source_name: &str, time: Option<&Variable>) -> Result<()> {
    let units = time.and_then(Variable::units).unwrap_or_default();
    let calendar = time.and_then(|t| t.attr_str("calendar")).unwrap_or_default();

    let starts_on_new_year = units
        .strip_prefix("days since ")
        .and_then(|date| date.split_whitespace().next())
        .and_then(|date| date.split_once('-'))
        .is_some_and(|(year, rest)| {
            !year.is_empty() && year.chars().all(|c| c.is_ascii_digit()) && rest == "01-01"
        });
    if starts_on_new_year && NOLEAP_CALENDARS.contains(&calendar) {
        return Ok(());
    }
    Err(OceanClimoError::TimeEncoding {
        source_name: source_name.to_string(),
        units: units.to_string(),
        calendar: calendar.to_string(),
    })
}

/// Calendar month (0-11) of each time step's bounds midpoint
fn months_of_bounds(bounds: &Variable) -> Result<Vec<usize>> {
    let time_axis = bounds.axis_of(TIME_DIM).unwrap_or(0);
    if bounds.data.ndim() != 2 {
        return Err(OceanClimoError::DimensionNotFound {
            var: bounds.dims.join(","),
            dim: "bounds".to_string(),
        });
    }
    bounds
        .data
        .axis_iter(Axis(time_axis))
        .map(|pair| {
            let (Some(&start), Some(&end)) = (pair.iter().next(), pair.iter().last()) else {
                return Err(OceanClimoError::Statistics("empty time bounds".to_string()));
            };
            let day = ((start + end) / 2.0).rem_euclid(365.0);
            MONTH_START_DAYS
                .windows(2)
                .position(|w| day >= w[0] && day < w[1])
                .ok_or_else(|| {
                    OceanClimoError::Statistics(format!("time bounds [{start}, {end}] are not finite"))
                })
        })
        .collect()
}

/// Reduce each group of indices along `axis`; empty groups become NaN
fn group_reduce(
    data: &ArrayD<f64>,
    axis: usize,
    groups: &[Vec<usize>],
    operation: StatOperation,
) -> Result<ArrayD<f64>> {
    let mut reduced_shape = data.shape().to_vec();
    reduced_shape.remove(axis);

    let reduced = groups
        .iter()
        .map(|indices| {
            if indices.is_empty() {
                Ok(ArrayD::from_elem(IxDyn(&reduced_shape), f64::NAN))
            } else {
                data.select(Axis(axis), indices)
                    .reduce_along_axis(axis, operation)
            }
        })
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<ArrayViewD<'_, f64>> = reduced.iter().map(|a| a.view()).collect();
    Ok(stack(Axis(axis), &views)?)
}

/// Earliest lower bound and latest upper bound of each month
fn monthly_bounds(data: &ArrayD<f64>, axis: usize, groups: &[Vec<usize>]) -> Result<ArrayD<f64>> {
    let mut lower = group_reduce(data, axis, groups, StatOperation::Min)?;
    let upper = group_reduce(data, axis, groups, StatOperation::Max)?;
    let edge = Axis(lower.ndim() - 1);
    if edge.index() != axis && lower.len_of(edge) > 1 {
        let last = lower.len_of(edge) - 1;
        lower
            .index_axis_mut(edge, last)
            .assign(&upper.index_axis(edge, last));
    }
    Ok(lower)
}
