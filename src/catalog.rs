//! Known grids, source types and reanalysis file-naming conventions
//!
//! Only the grid/source combinations listed here are supported. Adding a new
//! product means adding a variant and its naming rule, not configuring one.

use crate::errors::{OceanClimoError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the vertical coordinate after normalization, on every grid
pub const DEPTH_COORD: &str = "z_t";

/// Horizontal grids that sources can be delivered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Grid {
    /// Regular one-degree latitude/longitude grid
    #[serde(rename = "1x1d")]
    OneDegree,
    /// POP nominal one-degree displaced-pole grid
    #[serde(rename = "POP_gx1v7")]
    PopGx1v7,
}

impl Grid {
    /// Identifier used in configuration files and directory names
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDegree => "1x1d",
            Self::PopGx1v7 => "POP_gx1v7",
        }
    }

    /// Resolution code embedded in reanalysis file names
    #[must_use]
    pub const fn resolution_code(self) -> &'static str {
        match self {
            Self::OneDegree => "01",
            Self::PopGx1v7 => "gx1v7",
        }
    }

    /// Name of the vertical coordinate after normalization
    #[must_use]
    pub const fn depth_coord(self) -> &'static str {
        DEPTH_COORD
    }

    /// Longitude coordinate variable
    #[must_use]
    pub const fn lon_name(self) -> &'static str {
        match self {
            Self::OneDegree => "lon",
            Self::PopGx1v7 => "TLONG",
        }
    }

    /// Latitude coordinate variable
    #[must_use]
    pub const fn lat_name(self) -> &'static str {
        match self {
            Self::OneDegree => "lat",
            Self::PopGx1v7 => "TLAT",
        }
    }

    /// Grid-cell area variable used to weight spatial means
    #[must_use]
    pub const fn area_name(self) -> &'static str {
        match self {
            Self::OneDegree => "area",
            Self::PopGx1v7 => "TAREA",
        }
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grid {
    type Err = OceanClimoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1x1d" => Ok(Self::OneDegree),
            "POP_gx1v7" => Ok(Self::PopGx1v7),
            other => Err(OceanClimoError::config(format!("unknown grid '{other}'"))),
        }
    }
}

/// Families of data sources that can appear in a run configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Climatology cached by a previous run
    CachedClimo,
    /// CESM/POP model output
    Cesm,
    /// World Ocean Atlas 2005
    Woa2005,
    /// World Ocean Atlas 2013
    Woa2013,
}

impl SourceType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CachedClimo => "cached",
            Self::Cesm => "cesm",
            Self::Woa2005 => "woa2005",
            Self::Woa2013 => "woa2013",
        }
    }
}

impl FromStr for SourceType {
    type Err = OceanClimoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cached" => Ok(Self::CachedClimo),
            "cesm" => Ok(Self::Cesm),
            "woa2005" => Ok(Self::Woa2005),
            "woa2013" => Ok(Self::Woa2013),
            other => Err(OceanClimoError::config(format!("unknown source '{other}'"))),
        }
    }
}

/// Time resolution of reanalysis files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReanalysisFrequency {
    /// Annual mean
    #[default]
    Ann,
    /// Twelve monthly means
    Mon,
    /// January-February-March
    Jfm,
    /// April-May-June
    Amp,
    /// July-August-September
    Jas,
    /// October-November-December
    Ond,
}

impl ReanalysisFrequency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ann => "ann",
            Self::Mon => "mon",
            Self::Jfm => "jfm",
            Self::Amp => "amp",
            Self::Jas => "jas",
            Self::Ond => "ond",
        }
    }

    /// Time codes embedded in file names: `00` annual, `01`-`12` monthly,
    /// `13`-`16` for the four quarters
    #[must_use]
    pub fn time_codes(self) -> Vec<String> {
        match self {
            Self::Ann => vec!["00".to_string()],
            Self::Mon => (1..=12).map(|m| format!("{m:02}")).collect(),
            Self::Jfm => vec!["13".to_string()],
            Self::Amp => vec!["14".to_string()],
            Self::Jas => vec!["15".to_string()],
            Self::Ond => vec!["16".to_string()],
        }
    }
}

impl fmt::Display for ReanalysisFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReanalysisFrequency {
    type Err = OceanClimoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ann" => Ok(Self::Ann),
            "mon" => Ok(Self::Mon),
            "jfm" => Ok(Self::Jfm),
            "amp" => Ok(Self::Amp),
            "jas" => Ok(Self::Jas),
            "ond" => Ok(Self::Ond),
            other => Err(OceanClimoError::config(format!(
                "unknown reanalysis frequency '{other}'"
            ))),
        }
    }
}

/// Short internal code the reanalysis uses for a canonical variable
#[must_use]
pub fn reanalysis_code(canonical: &str) -> Option<&'static str> {
    match canonical {
        "nitrate" => Some("n"),
        "phosphate" => Some("p"),
        "oxygen" => Some("o"),
        "silicate" => Some("i"),
        "temperature" => Some("t"),
        "salinity" => Some("s"),
        "oxygen_saturation" => Some("O"),
        "aou" => Some("A"),
        _ => None,
    }
}

/// File name of one reanalysis file for a variable code and time code
///
/// Temperature and salinity come from the decadal-average product, every
/// other tracer from the all-years product.
pub fn reanalysis_file_name(code: &str, time_code: &str, grid: Grid) -> Result<String> {
    let res = grid.resolution_code();
    match code {
        "t" | "s" => Ok(format!("woa13_decav_{code}{time_code}_{res}v2.nc")),
        "o" | "p" | "n" | "i" | "O" | "A" => Ok(format!("woa13_all_{code}{time_code}_{res}.nc")),
        other => Err(OceanClimoError::config(format!(
            "no file template defined for '{other}'"
        ))),
    }
}

/// Full paths of every reanalysis file for a variable code:
/// `<dirin>/<grid>/<file name>` for each time code of `freq`
pub fn reanalysis_file_paths(
    dirin: &Path,
    code: &str,
    freq: ReanalysisFrequency,
    grid: Grid,
) -> Result<Vec<PathBuf>> {
    freq.time_codes()
        .iter()
        .map(|time_code| {
            reanalysis_file_name(code, time_code, grid)
                .map(|name| dirin.join(grid.as_str()).join(name))
        })
        .collect()
}

/// Layout of model output on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetFormat {
    /// Raw history files, one per output interval
    Hist,
    /// Twelve-month climatology files
    MonClimo,
    /// Annual-mean climatology files
    AnnClimo,
    /// Time series with one variable per file
    SingleVariable,
}

impl DatasetFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hist => "hist",
            Self::MonClimo => "mon_climo",
            Self::AnnClimo => "ann_climo",
            Self::SingleVariable => "single_variable",
        }
    }

    /// File-name template for one date string
    ///
    /// `on_disk` is the variable name embedded in `single_variable` file
    /// names and is ignored by the other formats.
    pub fn file_template(
        self,
        dirin: &Path,
        case: &str,
        stream: &str,
        datestr: &str,
        on_disk: Option<&str>,
    ) -> Result<String> {
        let dirin = dirin.display();
        match (self, on_disk) {
            (Self::Hist, _) => Ok(format!("{dirin}/{case}.{stream}.{datestr}.nc")),
            (Self::MonClimo | Self::AnnClimo, _) => Ok(format!("{dirin}/{stream}.{datestr}.nc")),
            (Self::SingleVariable, Some(var)) => {
                Ok(format!("{dirin}/{case}.{stream}.{var}.{datestr}.nc"))
            }
            (Self::SingleVariable, None) => Err(OceanClimoError::config(
                "single_variable file names need a variable name",
            )),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetFormat {
    type Err = OceanClimoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hist" => Ok(Self::Hist),
            "mon_climo" => Ok(Self::MonClimo),
            "ann_climo" => Ok(Self::AnnClimo),
            "single_variable" => Ok(Self::SingleVariable),
            other => Err(OceanClimoError::config(format!(
                "unknown dataset format '{other}'"
            ))),
        }
    }
}
