//! ocean-climo: comparable climatology fields from ocean-model output and reference products
//!
//! Model history files, pre-averaged model climatologies, World Ocean Atlas
//! products and previously cached climatologies are all normalized into one
//! in-memory [`Dataset`] shape with canonical variable names and consistent
//! units. From any of them the [`ClimatologyEngine`] produces a 2-D map of a
//! variable at a depth level (or averaged over a depth range) for the annual
//! mean or a season.
//!
//! ## Module Organization
//!
//! - [`catalog`]: grids, source types and file-name conventions
//! - [`var_dict`]: canonical to on-disk variable names
//! - [`resolver`]: file-name template expansion
//! - [`dataset`], [`netcdf_io`], [`zarr_io`]: in-memory datasets and their storage
//! - [`loader`]: opening and pruning the files of one source
//! - [`units`]: unit normalization
//! - [`data_source`]: one normalized source, its time periods and cache
//! - [`climatology`]: time and depth reduction to a map field
//! - [`statistics`]: parallel reductions and map summaries
//! - [`grid`]: plotting coordinates
//! - [`config`], [`analysis`]: run configuration and orchestration
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ocean_climo::prelude::*;
//! use std::path::Path;
//!
//! let source = DataSource::cached(
//!     "CESM",
//!     Path::new("cache/run.CESM.mon_climo.zarr"),
//!     Path::new("cache/run.CESM.mon_climo.json"),
//! )?;
//! let engine = ClimatologyEngine::new(Grid::PopGx1v7);
//! let field = engine.compute(
//!     &source,
//!     &ClimoRequest {
//!         variable: "nitrate",
//!         depth: DepthSelector::Level(100.0),
//!         period: TimePeriod::Ann,
//!         with_stats: true,
//!     },
//! )?;
//! println!("{:?}", field.field.dim());
//! # Ok::<(), OceanClimoError>(())
//! ```

pub mod analysis;
pub mod catalog;
pub mod climatology;
pub mod config;
pub mod data_source;
pub mod dataset;
pub mod errors;
pub mod grid;
pub mod loader;
pub mod netcdf_io;
pub mod parallel;
pub mod resolver;
pub mod statistics;
pub mod units;
pub mod var_dict;
pub mod zarr_io;

pub use analysis::{Analysis, LoggingRenderer, MapPanel, MapRenderer, SourceRegistry, StateMap};
pub use catalog::{DatasetFormat, Grid, ReanalysisFrequency, SourceType};
pub use climatology::{ClimatologyEngine, ClimoField, ClimoRequest, DepthSelector, TimePeriod};
pub use config::{Operation, RunConfig, SourceConfig};
pub use data_source::{DataSource, SourceKind};
pub use dataset::{AttrValue, Dataset, Variable};
pub use errors::{OceanClimoError, Result};
pub use loader::ClimoClass;
pub use parallel::ParallelConfig;
pub use resolver::{require_files, resolve_files};
pub use units::{UnitConformer, UnitProfile};
pub use var_dict::VariableDictionary;

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::analysis::{Analysis, LoggingRenderer, MapRenderer, StateMap};
    pub use crate::catalog::{DatasetFormat, Grid, SourceType};
    pub use crate::climatology::{ClimatologyEngine, ClimoRequest, DepthSelector, TimePeriod};
    pub use crate::config::RunConfig;
    pub use crate::data_source::DataSource;
    pub use crate::dataset::{Dataset, Variable};
    pub use crate::errors::{OceanClimoError, Result};
    pub use crate::parallel::ParallelConfig;
    pub use crate::statistics::{FieldStats, StatOperation, StatisticalReduction};
    pub use crate::var_dict::VariableDictionary;
}
