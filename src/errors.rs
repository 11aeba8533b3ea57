//! Centralized error handling for ocean-climo
//!
//! Every failure in the normalization layer is fatal to the run. The variants
//! below carry enough context (source, variable, period, pattern) to diagnose a
//! failed run from the error message alone.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ocean-climo operations
#[derive(Error, Debug)]
pub enum OceanClimoError {
    /// Unknown grid, operation, frequency or dataset-format token, or an
    /// inconsistent run configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Run configuration could not be deserialized
    #[error("Cannot deserialize run configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A set of file-name templates matched nothing on disk
    #[error("No files found matching: {}", patterns.join(", "))]
    NoFilesFound { patterns: Vec<String> },

    /// Malformed file-name template
    #[error("Invalid file-name pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Canonical variable unknown to a source's variable dictionary
    #[error("Variable '{variable}' is not defined in the variable dictionary of '{source_name}'")]
    VariableNotInDictionary {
        source_name: String,
        variable: String,
    },

    /// On-disk variable absent from an opened dataset
    #[error("Can not find variable '{var}' in '{source_name}'")]
    VariableNotFound { source_name: String, var: String },

    /// Time period not offered by a source's climatology class
    #[error("'{period}' is not a valid time period for '{source_name}'")]
    InvalidTimePeriod { source_name: String, period: String },

    /// Dimension not found in variable
    #[error("Dimension '{dim}' not found in variable '{var}'")]
    DimensionNotFound { var: String, dim: String },

    /// Depth range that selects no model levels
    #[error("No depth levels of '{source_name}' fall within {lo}-{hi}")]
    EmptyDepthRange { source_name: String, lo: f64, hi: f64 },

    /// Raw history source without a time-bounds variable
    #[error("No time bounds variable found in '{source_name}'")]
    MissingTimeBounds { source_name: String },

    /// Raw history that does not cover whole years of every month
    #[error("Cannot compute a monthly climatology for '{source_name}': {message}")]
    IncompleteYears { source_name: String, message: String },

    /// Time coordinate not encoded as days since January 1 on a 365-day calendar
    #[error("Unsupported time encoding in '{source_name}': units '{units}', calendar '{calendar}'")]
    TimeEncoding {
        source_name: String,
        units: String,
        calendar: String,
    },

    /// Incompatible coordinates or conflicting variables while merging datasets
    #[error("Merge error: {message}")]
    Merge { message: String },

    /// Variable dictionary JSON missing on disk
    #[error("Can not find variable dictionary {}", path.display())]
    DictionaryNotFound { path: PathBuf },

    /// Second unit conversion attempted on the same source
    #[error("Units of '{source_name}' were already conformed")]
    UnitsAlreadyConformed { source_name: String },

    /// Statistics computation errors
    #[error("Statistics computation error: {0}")]
    Statistics(String),

    /// Malformed or unsupported chunked store
    #[error("Zarr error: {0}")]
    Zarr(String),

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    Array(#[from] ndarray::ShapeError),

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl OceanClimoError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for the lookup class: unknown variable, missing variable,
    /// invalid period, missing dimension or empty depth range
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            Self::VariableNotInDictionary { .. }
                | Self::VariableNotFound { .. }
                | Self::InvalidTimePeriod { .. }
                | Self::DimensionNotFound { .. }
                | Self::EmptyDepthRange { .. }
                | Self::MissingTimeBounds { .. }
        )
    }

    /// True for errors that abort a run before any data is read
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Yaml(_))
    }
}

/// Result type alias for ocean-climo operations
pub type Result<T> = std::result::Result<T, OceanClimoError>;
