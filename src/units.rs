//! Unit normalization across sources
//!
//! Conversions are table driven. Attribute rules look at a variable's
//! `units` string; fixed scalings apply to named model variables whatever
//! their attributes say. Each rule rewrites the `units` attribute so the label
//! always describes the stored values.

use crate::dataset::{AttrValue, Dataset, Variable};
use log::debug;

/// Millilitres of O2 per litre to millimoles per cubic metre
pub const ML_PER_L_TO_MMOL_PER_M3: f64 = 1.0e6 / 1.0e3 / 22.3916;

/// Label given to molar concentrations
pub const MOLAR_CONCENTRATION: &str = "mmol m$^{-3}$";

/// Scaling triggered by a `units` attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitRule {
    /// Exact `units` value the rule matches
    pub marker: &'static str,
    /// `None` relabels without touching values
    pub factor: Option<f64>,
    pub new_units: &'static str,
}

/// Scaling applied to a named variable regardless of its attributes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedScale {
    pub var: &'static str,
    pub factor: f64,
    pub new_units: &'static str,
}

/// Concentration rules, checked against every variable
pub const CONCENTRATION_RULES: [UnitRule; 2] = [
    UnitRule {
        marker: "ml l-1",
        factor: Some(ML_PER_L_TO_MMOL_PER_M3),
        new_units: MOLAR_CONCENTRATION,
    },
    UnitRule {
        marker: "micromoles_per_liter",
        factor: None,
        new_units: MOLAR_CONCENTRATION,
    },
];

/// Depth rules, checked against the vertical coordinate only
pub const DEPTH_RULES: [UnitRule; 2] = [
    UnitRule {
        marker: "centimeters",
        factor: Some(1.0e-2),
        new_units: "m",
    },
    UnitRule {
        marker: "cm",
        factor: Some(1.0e-2),
        new_units: "m",
    },
];

/// Model output stores depth in centimetres and iron in mmol m-3
pub const MODEL_SCALES: [FixedScale; 2] = [
    FixedScale {
        var: "z_t",
        factor: 1.0e-2,
        new_units: "m",
    },
    FixedScale {
        var: "Fe",
        factor: 1.0e6,
        new_units: "pM",
    },
];

/// Long names attached to known on-disk variables
pub const LONG_NAMES: [(&str, &str); 10] = [
    ("NO3", "Nitrate"),
    ("O2", "Oxygen"),
    ("O2sat", "Oxygen saturation"),
    ("AOU", "AOU"),
    ("SiO3", "Silicic acid"),
    ("PO4", "Phosphate"),
    ("S", "Salinity"),
    ("T", "Temperature"),
    ("DIC", "Dissolved Inorganic Carbon"),
    ("ALK", "Alkalinity"),
];

/// Long name for an on-disk variable name
#[must_use]
pub fn long_name(var: &str) -> Option<&'static str> {
    LONG_NAMES
        .iter()
        .find(|(name, _)| *name == var)
        .map(|(_, long)| *long)
}

/// Which rules a source needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitProfile {
    /// Fixed model scalings
    Model,
    /// Attribute-driven depth and concentration rules
    Reanalysis,
    /// Already normalized by the run that cached it
    Cached,
}

/// Applies one [`UnitProfile`] to a dataset
#[derive(Debug, Clone, Copy)]
pub struct UnitConformer {
    profile: UnitProfile,
    depth_coord: &'static str,
}

impl UnitConformer {
    #[must_use]
    pub const fn new(profile: UnitProfile, depth_coord: &'static str) -> Self {
        Self {
            profile,
            depth_coord,
        }
    }

    #[must_use]
    pub const fn profile(&self) -> UnitProfile {
        self.profile
    }

    /// Rewrite values and unit labels in place
    ///
    /// Not idempotent: callers apply it once per dataset. Returns the names
    /// of variables whose values were scaled.
    pub fn conform(&self, ds: &mut Dataset) -> Vec<String> {
        let mut scaled = Vec::new();
        match self.profile {
            UnitProfile::Cached => return scaled,
            UnitProfile::Model => {
                for rule in &MODEL_SCALES {
                    if let Some(var) = ds.get_mut(rule.var) {
                        var.data.mapv_inplace(|v| v * rule.factor);
                        var.attrs
                            .insert("units".to_string(), AttrValue::from(rule.new_units));
                        scaled.push(rule.var.to_string());
                    }
                }
            }
            UnitProfile::Reanalysis => {
                if let Some(depth) = ds.get_mut(self.depth_coord) {
                    if apply_rules(&DEPTH_RULES, depth) {
                        scaled.push(self.depth_coord.to_string());
                    }
                }
                for (name, var) in ds.variables_mut() {
                    if apply_rules(&CONCENTRATION_RULES, var) {
                        scaled.push(name.to_string());
                    }
                }
            }
        }

        for (name, var) in ds.variables_mut() {
            if let Some(long) = long_name(name) {
                var.attrs
                    .insert("long_name".to_string(), AttrValue::from(long));
            }
        }
        debug!("{:?} unit conversion scaled {scaled:?}", self.profile);
        scaled
    }
}

/// Apply the first matching rule; true if values were scaled
fn apply_rules(rules: &[UnitRule], var: &mut Variable) -> bool {
    let Some(units) = var.units() else {
        return false;
    };
    let Some(rule) = rules.iter().find(|r| r.marker == units) else {
        return false;
    };
    if let Some(factor) = rule.factor {
        var.data.mapv_inplace(|v| v * factor);
    }
    var.attrs
        .insert("units".to_string(), AttrValue::from(rule.new_units));
    rule.factor.is_some()
}
