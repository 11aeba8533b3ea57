//! Run configuration
//!
//! The YAML file maps directly onto [`RunConfig`]; `serde` does the type
//! checking and [`RunConfig::validate`] the cross-field checks. A minimal file:
//!
//! ```yaml
//! short_name: bgc_state
//! dirout: /scratch/diags
//! grid: POP_gx1v7
//! operation: plot_ann_climo
//! variable_list: [nitrate, oxygen]
//! depth_list: [0, [0, 200]]
//! reference: WOA2013
//! data_sources:
//!   WOA2013:
//!     source: woa2013
//!     ann_climo:
//!       dirin: /obs/woa2013
//!   CESM:
//!     source: cesm
//!     case: b.e21.B1850.f09_g17
//!     datestr: "0051-0060"
//!     dataset_format:
//!       ann_climo:
//!         dirin: /model/climo
//!         stream: pop.h
//! ```

use crate::catalog::{DatasetFormat, Grid, ReanalysisFrequency, SourceType};
use crate::climatology::{DepthSelector, TimePeriod};
use crate::errors::{OceanClimoError, Result};
use log::debug;
use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Analysis to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Maps of annual-mean climatologies
    PlotAnnClimo,
    /// Maps of annual and seasonal climatologies
    PlotMonClimo,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlotAnnClimo => "plot_ann_climo",
            Self::PlotMonClimo => "plot_mon_climo",
        }
    }

    /// Climatology tag used in cache file names
    #[must_use]
    pub const fn climo_str(self) -> &'static str {
        match self {
            Self::PlotAnnClimo => "ann_climo",
            Self::PlotMonClimo => "mon_climo",
        }
    }

    #[must_use]
    pub fn default_time_periods(self) -> Vec<TimePeriod> {
        match self {
            Self::PlotAnnClimo => vec![TimePeriod::Ann],
            Self::PlotMonClimo => TimePeriod::ALL.to_vec(),
        }
    }

    /// Model layouts that can serve this operation, most preferred first
    #[must_use]
    pub const fn model_formats(self) -> &'static [DatasetFormat] {
        match self {
            Self::PlotAnnClimo => &[
                DatasetFormat::AnnClimo,
                DatasetFormat::MonClimo,
                DatasetFormat::SingleVariable,
                DatasetFormat::Hist,
            ],
            Self::PlotMonClimo => &[
                DatasetFormat::MonClimo,
                DatasetFormat::Hist,
                DatasetFormat::SingleVariable,
            ],
        }
    }
}

/// Directory and stream of one model layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormatLocation {
    pub dirin: PathBuf,
    pub stream: String,
}

/// Date string or list of date strings (glob patterns allowed)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DateStrings {
    One(String),
    Many(Vec<String>),
}

impl DateStrings {
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// Parameters of a model source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelSourceConfig {
    pub case: String,
    pub datestr: DateStrings,
    pub dataset_format: BTreeMap<DatasetFormat, FormatLocation>,
}

impl ModelSourceConfig {
    /// First configured layout that can serve `operation`
    pub fn choose_format(&self, operation: Operation) -> Result<(DatasetFormat, &FormatLocation)> {
        operation
            .model_formats()
            .iter()
            .find_map(|format| self.dataset_format.get(format).map(|loc| (*format, loc)))
            .ok_or_else(|| {
                OceanClimoError::config(format!(
                    "Can not find appropriate dataset format for {} in case {}",
                    operation.as_str(),
                    self.case
                ))
            })
    }
}

/// Location of reanalysis files for one frequency
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClimoLocation {
    pub dirin: PathBuf,
    /// Single file holding every variable
    #[serde(default)]
    pub filename: Option<String>,
}

/// Parameters of a reanalysis source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReanalysisSourceConfig {
    #[serde(default)]
    pub freq: ReanalysisFrequency,
    /// Overrides the run grid
    #[serde(default)]
    pub grid: Option<Grid>,
    #[serde(default)]
    pub ann_climo: Option<ClimoLocation>,
    #[serde(default)]
    pub mon_climo: Option<ClimoLocation>,
}

impl ReanalysisSourceConfig {
    /// The `<freq>_climo` block matching `freq`
    pub fn location(&self, source_name: &str) -> Result<&ClimoLocation> {
        let block = match self.freq {
            ReanalysisFrequency::Ann => self.ann_climo.as_ref(),
            ReanalysisFrequency::Mon => self.mon_climo.as_ref(),
            _ => None,
        };
        block.ok_or_else(|| {
            OceanClimoError::config(format!(
                "Can not find '{}_climo' in '{source_name}' section of data_sources",
                self.freq
            ))
        })
    }
}

/// One entry of `data_sources`, tagged by its `source` key
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceConfig {
    Cesm(ModelSourceConfig),
    Woa2013(ReanalysisSourceConfig),
    Woa2005(ReanalysisSourceConfig),
}

impl SourceConfig {
    #[must_use]
    pub const fn source_type(&self) -> SourceType {
        match self {
            Self::Cesm(_) => SourceType::Cesm,
            Self::Woa2013(_) => SourceType::Woa2013,
            Self::Woa2005(_) => SourceType::Woa2005,
        }
    }
}

/// Top-level run configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Tag used in plot and cache file names
    pub short_name: String,
    /// Plots go to `<dirout>/plots`
    pub dirout: PathBuf,
    pub grid: Grid,
    pub operation: Operation,
    /// Canonical variable names
    pub variable_list: Vec<String>,
    pub depth_list: Vec<DepthSelector>,
    /// _(Optional)_ Defaults depend on `operation`
    #[serde(default)]
    pub climo_time_periods: Option<Vec<TimePeriod>>,
    /// _(Optional)_ Source drawn in the first panel
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default = "RunConfig::default_stats_in_title")]
    pub stats_in_title: bool,
    #[serde(default)]
    pub cache_data: bool,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// _(Optional)_ Rayon worker threads
    #[serde(default)]
    pub threads: Option<usize>,
    /// Sources in file order
    #[serde(deserialize_with = "ordered_sources")]
    pub data_sources: Vec<(String, SourceConfig)>,
}

impl RunConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {}", path.display());
        let yaml = fs::read_to_string(path).map_err(|e| {
            OceanClimoError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Cross-field checks serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.variable_list.is_empty() {
            return Err(OceanClimoError::config("variable_list is empty"));
        }
        if self.depth_list.is_empty() {
            return Err(OceanClimoError::config("depth_list is empty"));
        }
        for depth in &self.depth_list {
            if let DepthSelector::Range([lo, hi]) = depth {
                if lo > hi {
                    return Err(OceanClimoError::config(format!(
                        "depth range [{lo}, {hi}] must be ascending"
                    )));
                }
            }
        }
        if self.data_sources.is_empty() {
            return Err(OceanClimoError::config("data_sources is empty"));
        }
        if self.cache_data && self.cache_dir.is_none() {
            return Err(OceanClimoError::config(
                "cache_dir is required when cache_data is set",
            ));
        }
        if self.cache_data {
            let seasonal: Vec<&str> = self
                .time_periods()
                .into_iter()
                .filter(|period| *period != TimePeriod::Ann)
                .map(TimePeriod::as_str)
                .collect();
            if !seasonal.is_empty() {
                return Err(OceanClimoError::config(format!(
                    "cache_data only supports climo_time_periods [ANN]; cached climatologies cannot serve {}",
                    seasonal.join(", ")
                )));
            }
        }
        if let Some(reference) = &self.reference {
            if self.source(reference).is_none() {
                return Err(OceanClimoError::config(format!(
                    "reference '{reference}' is not one of the data_sources"
                )));
            }
        }
        if self.threads == Some(0) {
            return Err(OceanClimoError::config("threads must be at least 1"));
        }
        Ok(())
    }

    /// Periods to plot: configured, else the operation's defaults
    #[must_use]
    pub fn time_periods(&self) -> Vec<TimePeriod> {
        self.climo_time_periods
            .clone()
            .unwrap_or_else(|| self.operation.default_time_periods())
    }

    #[must_use]
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.data_sources
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cfg)| cfg)
    }

    /// Cached store and dictionary paths of a source, when caching is on
    #[must_use]
    pub fn cache_paths(&self, source_name: &str) -> Option<(PathBuf, PathBuf)> {
        if !self.cache_data {
            return None;
        }
        let cache_dir = self.cache_dir.as_ref()?;
        let stem = format!(
            "{}.{source_name}.{}",
            self.short_name,
            self.operation.climo_str()
        );
        Some((
            cache_dir.join(format!("{stem}.zarr")),
            cache_dir.join(format!("{stem}.json")),
        ))
    }

    fn default_stats_in_title() -> bool {
        true
    }
}

fn ordered_sources<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, SourceConfig)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedSources;

    impl<'de> Visitor<'de> for OrderedSources {
        type Value = Vec<(String, SourceConfig)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of data source names to their parameters")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut sources: Vec<(String, SourceConfig)> = Vec::new();
            while let Some((name, cfg)) = map.next_entry::<String, SourceConfig>()? {
                if sources.iter().any(|(n, _)| *n == name) {
                    return Err(A::Error::custom(format!("duplicate data source '{name}'")));
                }
                sources.push((name, cfg));
            }
            Ok(sources)
        }
    }

    deserializer.deserialize_map(OrderedSources)
}
