//! Coordinate reference system descriptors and length units.
//!
//! The parser never reprojects. A reference system is only needed to know
//! the linear unit of the stored coordinates, and its presence is the gate
//! for every geometry accessor.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Feet per statute mile
const FEET_PER_MILE: f64 = 5280.0;

/// Meters per statute mile
const METERS_PER_MILE: f64 = 1609.344;

/// A coordinate reference system as supplied by the caller: WKT, a PROJ
/// string, or an authority code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSystem {
    descriptor: String,
}

impl ReferenceSystem {
    /// Wraps a descriptor string
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into().trim().to_string(),
        }
    }

    /// The descriptor as supplied
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Linear unit of projected coordinates.
    ///
    /// Read from `+units=` in a PROJ string or from the last non-angular
    /// `UNIT[...]`/`LENGTHUNIT[...]` in WKT. An `EPSG:<code>` authority code
    /// is looked up in the EPSG registry and its definition read the same
    /// way. Geographic systems and unknown codes are rejected.
    pub fn linear_unit(&self) -> Result<LinearUnit> {
        let unit = proj_units(&self.descriptor)
            .or_else(|| wkt_linear_unit(&self.descriptor))
            .or_else(|| registry_linear_unit(&self.descriptor))
            .ok_or_else(|| Error::unsupported_unit(format!("unspecified in '{}'", self.descriptor)))?;
        unit.parse()
    }
}

fn registry_linear_unit(descriptor: &str) -> Option<String> {
    let (authority, code) = descriptor.split_once(':')?;
    if !authority.trim().eq_ignore_ascii_case("EPSG") {
        return None;
    }
    let code: u16 = code.trim().parse().ok()?;
    let definition = crs_definitions::from_code(code)?;
    trace!(code, "resolved authority code from registry");
    proj_units(definition.proj4).or_else(|| wkt_linear_unit(definition.wkt))
}

impl From<&str> for ReferenceSystem {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ReferenceSystem {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for ReferenceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor)
    }
}

fn proj_units(descriptor: &str) -> Option<String> {
    descriptor
        .split_whitespace()
        .find_map(|token| token.strip_prefix("+units="))
        .map(str::to_string)
}

fn wkt_linear_unit(descriptor: &str) -> Option<String> {
    let mut found = None;
    let mut rest = descriptor;

    while let Some(position) = rest.find("UNIT[") {
        rest = &rest[position + "UNIT[".len()..];
        let Some(name) = rest
            .trim_start()
            .strip_prefix('"')
            .and_then(|quoted| quoted.split('"').next())
        else {
            continue;
        };
        if !is_angular(name) {
            found = Some(name.to_string());
        }
    }

    found
}

fn is_angular(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    ["degree", "radian", "grad", "arc-second", "arcsecond"]
        .iter()
        .any(|angular| name.contains(angular))
}

/// Linear unit of stored coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearUnit {
    /// International foot
    Foot,
    /// US survey foot
    UsSurveyFoot,
    /// Meter
    Meter,
}

impl LinearUnit {
    /// Length of one unit in meters
    pub fn meters(self) -> f64 {
        match self {
            LinearUnit::Foot => 0.3048,
            LinearUnit::UsSurveyFoot => 1200.0 / 3937.0,
            LinearUnit::Meter => 1.0,
        }
    }

    /// Convert a length in this unit to `target`.
    ///
    /// Both foot variants use 5280 to the mile, matching how HEC-RAS reports
    /// river miles.
    pub fn convert(self, length: f64, target: LengthUnit) -> f64 {
        match (self, target) {
            (LinearUnit::Foot | LinearUnit::UsSurveyFoot, LengthUnit::Miles) => length / FEET_PER_MILE,
            (LinearUnit::Meter, LengthUnit::Miles) => length / METERS_PER_MILE,
            (unit, LengthUnit::Kilometers) => length * unit.meters() / 1000.0,
        }
    }
}

impl FromStr for LinearUnit {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "ft" | "foot" | "feet" | "international-foot" | "foot-international" => Ok(LinearUnit::Foot),
            "us-ft" | "ft-us" | "us-survey-foot" | "foot-us" | "foot-survey-us" | "us-foot" => {
                Ok(LinearUnit::UsSurveyFoot)
            }
            "m" | "meter" | "meters" | "metre" | "metres" => Ok(LinearUnit::Meter),
            _ => Err(Error::unsupported_unit(value.trim())),
        }
    }
}

/// Unit for reported network lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    /// Statute miles
    Miles,
    /// Kilometers
    Kilometers,
}

impl FromStr for LengthUnit {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mi" | "mile" | "miles" => Ok(LengthUnit::Miles),
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => Ok(LengthUnit::Kilometers),
            _ => Err(Error::unsupported_unit(value.trim())),
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthUnit::Miles => f.write_str("miles"),
            LengthUnit::Kilometers => f.write_str("kilometers"),
        }
    }
}
