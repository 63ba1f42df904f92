//! Domain data structures for locations, climatology, system specifications and yield results.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EstimateError;

/// Month codes used by climatology sources, January first.
pub const MONTH_CODES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Days per calendar month. February is 28.25 to average leap years over a climatology period.
pub const DAYS_IN_MONTH: [f64; 12] = [
    31.0, 28.25, 31.0, 30.0, 31.0, 30.0, 31.0, 31.0, 30.0, 31.0, 30.0, 31.0,
];

/// Region label used when the lookup carries neither a region nor a district.
pub const UNKNOWN_REGION: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Postal code resolved to coordinates and an administrative region.
pub struct Location {
    /// Canonical postal code, e.g. `SW1A 1AA`.
    pub postcode: String,
    /// Latitude in signed decimal degrees.
    pub latitude: f64,
    /// Longitude in signed decimal degrees.
    pub longitude: f64,
    /// Region name, district name or [`UNKNOWN_REGION`].
    pub region: String,
}

impl Location {
    /// Check that both coordinates lie within the valid geographic range.
    #[must_use]
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Coordinate pair snapped to a 0.01° grid (roughly 1 km).
pub struct GridKey {
    lat_centi: i32,
    lon_centi: i32,
}

impl GridKey {
    /// Snap a coordinate pair to the grid.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "valid coordinates times 100 fit comfortably in i32"
    )]
    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_centi: (latitude * 100.0).round() as i32,
            lon_centi: (longitude * 100.0).round() as i32,
        }
    }

    /// Grid latitude in degrees.
    #[must_use]
    pub fn latitude(&self) -> f64 {
        f64::from(self.lat_centi) / 100.0
    }

    /// Grid longitude in degrees.
    #[must_use]
    pub fn longitude(&self) -> f64 {
        f64::from(self.lon_centi) / 100.0
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.2},{:.2}", self.latitude(), self.longitude())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Long-term irradiance climatology for a point.
pub struct ClimateRecord {
    /// Latitude the data was requested for.
    pub latitude: f64,
    /// Longitude the data was requested for.
    pub longitude: f64,
    /// Mean daily global horizontal irradiance per month (kWh/m²/day), January first.
    pub monthly_ghi: [f64; 12],
    /// Annual global horizontal irradiance (kWh/m²/year).
    pub annual_ghi: f64,
    /// Tag of the data source, e.g. `NASA_POWER`.
    pub source: String,
}

impl ClimateRecord {
    /// Build a record from monthly means, deriving the annual total.
    #[must_use]
    pub fn from_monthly(
        latitude: f64,
        longitude: f64,
        monthly_ghi: [f64; 12],
        source: impl Into<String>,
    ) -> Self {
        let annual_ghi = monthly_ghi
            .iter()
            .zip(DAYS_IN_MONTH)
            .map(|(mean, days)| mean * days)
            .sum();
        Self {
            latitude,
            longitude,
            monthly_ghi,
            annual_ghi,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Compass direction a panel faces.
pub enum Orientation {
    /// Facing south.
    #[default]
    South,
    /// Facing south-east.
    SouthEast,
    /// Facing south-west.
    SouthWest,
    /// Facing east.
    East,
    /// Facing west.
    West,
    /// Facing north-east.
    NorthEast,
    /// Facing north-west.
    NorthWest,
    /// Facing north.
    North,
}

/// Factor applied to labels outside the compass table.
pub const FALLBACK_ORIENTATION_FACTOR: f64 = 0.88;

impl Orientation {
    /// All orientations, best to worst.
    pub const ALL: [Orientation; 8] = [
        Orientation::South,
        Orientation::SouthEast,
        Orientation::SouthWest,
        Orientation::East,
        Orientation::West,
        Orientation::NorthEast,
        Orientation::NorthWest,
        Orientation::North,
    ];

    /// Kebab-case label, e.g. `south-east`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Orientation::South => "south",
            Orientation::SouthEast => "south-east",
            Orientation::SouthWest => "south-west",
            Orientation::East => "east",
            Orientation::West => "west",
            Orientation::NorthEast => "north-east",
            Orientation::NorthWest => "north-west",
            Orientation::North => "north",
        }
    }

    /// Output relative to a south-facing array.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Orientation::South => 1.00,
            Orientation::SouthEast | Orientation::SouthWest => 0.97,
            Orientation::East | Orientation::West => 0.88,
            Orientation::NorthEast | Orientation::NorthWest => 0.75,
            Orientation::North => 0.55,
        }
    }

    /// Factor for a free-text label; unknown labels get [`FALLBACK_ORIENTATION_FACTOR`].
    #[must_use]
    pub fn factor_for_label(label: &str) -> f64 {
        label
            .parse::<Orientation>()
            .map_or(FALLBACK_ORIENTATION_FACTOR, Orientation::factor)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.label())
    }
}

impl FromStr for Orientation {
    type Err = EstimateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_lowercase();
        Orientation::ALL
            .into_iter()
            .find(|orientation| orientation.label() == wanted)
            .ok_or_else(|| EstimateError::Validation {
                field: "orientation",
                message: format!("unknown orientation '{raw}'"),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Kind of generating system.
pub enum SystemKind {
    /// Photovoltaic array.
    Solar,
    /// Small wind turbine.
    Wind,
}

impl fmt::Display for SystemKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            SystemKind::Solar => "solar",
            SystemKind::Wind => "wind",
        };
        write!(formatter, "{slug}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Photovoltaic system specification.
pub struct SolarSpec {
    /// Nameplate capacity in kWp, 0.5 to 50.
    pub capacity_kwp: f64,
    /// Direction the panels face.
    #[serde(default)]
    pub orientation: Orientation,
    /// Panel tilt from horizontal, 0 to 90; `None` means optimal for the latitude.
    #[serde(default)]
    pub tilt_degrees: Option<f64>,
    /// Unshaded fraction, 1.0 means no shading.
    #[serde(default = "default_shading_factor")]
    pub shading_factor: f64,
    /// Inverter efficiency, 0.90 to 0.99.
    #[serde(default = "default_inverter_efficiency")]
    pub inverter_efficiency: f64,
}

fn default_shading_factor() -> f64 {
    1.0
}

fn default_inverter_efficiency() -> f64 {
    0.96
}

impl SolarSpec {
    /// South-facing, optimally tilted, unshaded array of the given capacity.
    #[must_use]
    pub fn new(capacity_kwp: f64) -> Self {
        Self {
            capacity_kwp,
            orientation: Orientation::default(),
            tilt_degrees: None,
            shading_factor: default_shading_factor(),
            inverter_efficiency: default_inverter_efficiency(),
        }
    }

    /// Set the panel orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set an explicit tilt.
    #[must_use]
    pub fn with_tilt(mut self, tilt_degrees: f64) -> Self {
        self.tilt_degrees = Some(tilt_degrees);
        self
    }

    /// Set the shading factor.
    #[must_use]
    pub fn with_shading(mut self, shading_factor: f64) -> Self {
        self.shading_factor = shading_factor;
        self
    }

    /// Set the inverter efficiency.
    #[must_use]
    pub fn with_inverter_efficiency(mut self, inverter_efficiency: f64) -> Self {
        self.inverter_efficiency = inverter_efficiency;
        self
    }

    /// Check every field against its declared bounds.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::Validation`] naming the first field out of range.
    pub fn validate(&self) -> Result<(), EstimateError> {
        check_range("capacity_kwp", self.capacity_kwp, 0.5, 50.0)?;
        if let Some(tilt) = self.tilt_degrees {
            check_range("tilt_degrees", tilt, 0.0, 90.0)?;
        }
        check_range("shading_factor", self.shading_factor, 0.0, 1.0)?;
        check_range("inverter_efficiency", self.inverter_efficiency, 0.90, 0.99)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Wind turbine specification. Accepted, but no yield model exists for it.
pub struct WindSpec {
    /// Rated power in kW, 0.5 to 20.
    pub rated_power_kw: f64,
    /// Hub height in metres, 5 to 30.
    pub hub_height_m: f64,
    /// Optional turbine model name.
    #[serde(default)]
    pub model: Option<String>,
}

impl WindSpec {
    /// Check every field against its declared bounds.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::Validation`] naming the first field out of range.
    pub fn validate(&self) -> Result<(), EstimateError> {
        check_range("rated_power_kw", self.rated_power_kw, 0.5, 20.0)?;
        check_range("hub_height_m", self.hub_height_m, 5.0, 30.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
/// Specification of the system to estimate.
pub enum SystemSpec {
    /// Photovoltaic array.
    Solar(SolarSpec),
    /// Wind turbine.
    Wind(WindSpec),
}

impl SystemSpec {
    /// Which kind of system this is.
    #[must_use]
    pub fn kind(&self) -> SystemKind {
        match self {
            SystemSpec::Solar(_) => SystemKind::Solar,
            SystemSpec::Wind(_) => SystemKind::Wind,
        }
    }

    /// Validate the inner specification.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::Validation`] naming the first field out of range.
    pub fn validate(&self) -> Result<(), EstimateError> {
        match self {
            SystemSpec::Solar(spec) => spec.validate(),
            SystemSpec::Wind(spec) => spec.validate(),
        }
    }
}

impl From<SolarSpec> for SystemSpec {
    fn from(spec: SolarSpec) -> Self {
        SystemSpec::Solar(spec)
    }
}

impl From<WindSpec> for SystemSpec {
    fn from(spec: WindSpec) -> Self {
        SystemSpec::Wind(spec)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
/// Value recorded for one assumption.
pub enum AssumptionValue {
    /// Numeric factor or angle.
    Number(f64),
    /// Text such as an orientation label or source tag.
    Text(String),
}

impl AssumptionValue {
    /// Numeric value, if this is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AssumptionValue::Number(value) => Some(*value),
            AssumptionValue::Text(_) => None,
        }
    }

    /// Text value, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AssumptionValue::Number(_) => None,
            AssumptionValue::Text(text) => Some(text),
        }
    }
}

impl fmt::Display for AssumptionValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssumptionValue::Number(value) => write!(formatter, "{value}"),
            AssumptionValue::Text(text) => formatter.write_str(text),
        }
    }
}

impl From<f64> for AssumptionValue {
    fn from(value: f64) -> Self {
        AssumptionValue::Number(value)
    }
}

impl From<&str> for AssumptionValue {
    fn from(text: &str) -> Self {
        AssumptionValue::Text(text.to_owned())
    }
}

/// Ordered record of the factors behind a yield figure.
pub type Assumptions = BTreeMap<String, AssumptionValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Estimated yield of a system.
pub struct YieldResult {
    /// Annual energy in kWh, the sum of `monthly_kwh`.
    pub annual_kwh: f64,
    /// Energy per calendar month in kWh, January first.
    pub monthly_kwh: [f64; 12],
    /// Annual energy over continuous nameplate output.
    pub capacity_factor: f64,
    /// Annual energy per kWp installed.
    pub kwh_per_kwp: f64,
    /// Factors applied, for audit and explanation.
    pub assumptions: Assumptions,
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), EstimateError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(EstimateError::Validation {
            field,
            message: format!("{value} is outside {min}..={max}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_parses_case_insensitively() {
        assert_eq!("South-East".parse::<Orientation>().ok(), Some(Orientation::SouthEast));
        assert_eq!(" north ".parse::<Orientation>().ok(), Some(Orientation::North));
        assert!("up".parse::<Orientation>().is_err());
    }

    #[test]
    fn unknown_orientation_label_uses_fallback_factor() {
        assert!((Orientation::factor_for_label("sideways") - 0.88).abs() < 1e-12);
        assert!((Orientation::factor_for_label("north-west") - 0.75).abs() < 1e-12);
    }

    #[test]
    fn orientation_factors_are_ordered() {
        let factor = Orientation::factor;
        assert!(factor(Orientation::South) > factor(Orientation::SouthEast));
        assert!((factor(Orientation::SouthEast) - factor(Orientation::SouthWest)).abs() < 1e-12);
        assert!(factor(Orientation::SouthWest) > factor(Orientation::East));
        assert!((factor(Orientation::East) - factor(Orientation::West)).abs() < 1e-12);
        assert!(factor(Orientation::West) > factor(Orientation::NorthEast));
        assert!((factor(Orientation::NorthEast) - factor(Orientation::NorthWest)).abs() < 1e-12);
        assert!(factor(Orientation::NorthWest) > factor(Orientation::North));
    }

    #[test]
    fn grid_key_snaps_nearby_points_together() {
        let first = GridKey::from_degrees(51.501_009, -0.141_588);
        let second = GridKey::from_degrees(51.498_1, -0.139_9);
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "51.50,-0.14");
    }

    #[test]
    fn annual_total_weights_months_by_days() {
        let record = ClimateRecord::from_monthly(51.5, -0.1, [1.0; 12], "TEST");
        assert!((record.annual_ghi - 365.25).abs() < 1e-9);
    }

    #[test]
    fn solar_spec_bounds_are_enforced() {
        assert!(SolarSpec::new(4.0).validate().is_ok());
        assert!(SolarSpec::new(0.4).validate().is_err());
        assert!(SolarSpec::new(4.0).with_tilt(91.0).validate().is_err());
        assert!(SolarSpec::new(4.0).with_shading(1.5).validate().is_err());
        assert!(SolarSpec::new(4.0).with_inverter_efficiency(0.8).validate().is_err());
        assert!(SolarSpec::new(f64::NAN).validate().is_err());
    }

    #[test]
    fn solar_spec_defaults_apply_when_deserializing() {
        let spec: SystemSpec =
            toml::from_str("type = \"solar\"\ncapacity_kwp = 3.5\n").expect("valid spec");
        let SystemSpec::Solar(solar) = spec else {
            panic!("expected a solar spec");
        };
        assert_eq!(solar, SolarSpec::new(3.5));
    }

    #[test]
    fn validation_error_names_the_field() {
        let err = WindSpec {
            rated_power_kw: 5.0,
            hub_height_m: 40.0,
            model: None,
        }
        .validate()
        .expect_err("hub height out of range");
        assert!(matches!(
            err,
            EstimateError::Validation {
                field: "hub_height_m",
                ..
            }
        ));
    }
}
