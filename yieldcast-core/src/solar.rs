//! Photovoltaic yield from climatology and installation geometry.
//!
//! The model is a fixed chain of empirical factors tuned for UK latitudes (roughly 50° to 60°
//! north). It is not a solar-position or plane-of-array irradiance model.

use crate::model::{Assumptions, ClimateRecord, DAYS_IN_MONTH, SolarSpec, YieldResult};

/// Real-world derating not itemized elsewhere.
pub const PERFORMANCE_RATIO: f64 = 0.85;
/// Average temperature loss for UK conditions.
pub const TEMPERATURE_COEFFICIENT: f64 = 0.96;
/// Output kept after dust, dirt and droppings.
pub const SOILING_FACTOR: f64 = 0.98;
/// Output kept after cable resistance.
pub const CABLE_LOSS_FACTOR: f64 = 0.99;
/// Output kept after module mismatch.
pub const MISMATCH_LOSS_FACTOR: f64 = 0.99;

/// The optimal tilt sits this many degrees below the latitude.
pub const OPTIMAL_TILT_OFFSET_DEGREES: f64 = 10.0;
/// Output lost per degree away from the optimal tilt.
pub const TILT_PENALTY_PER_DEGREE: f64 = 0.005;
/// Floor of the tilt factor.
pub const MIN_TILT_FACTOR: f64 = 0.7;

/// Hours in a non-leap year.
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Year-round optimal tilt for a latitude, to one decimal place.
#[must_use]
pub fn optimal_tilt(latitude: f64) -> f64 {
    round_to((latitude - OPTIMAL_TILT_OFFSET_DEGREES).max(0.0), 1)
}

/// Share of optimal output kept at `tilt`, between [`MIN_TILT_FACTOR`] and 1.
#[must_use]
pub fn tilt_factor(tilt: f64, optimal: f64) -> f64 {
    let deviation = (tilt - optimal).abs();
    (1.0 - TILT_PENALTY_PER_DEGREE * deviation).max(MIN_TILT_FACTOR)
}

/// Product of every loss factor applied before the performance ratio.
#[must_use]
pub fn system_efficiency(
    orientation_factor: f64,
    tilt_factor: f64,
    inverter_efficiency: f64,
    shading_factor: f64,
) -> f64 {
    orientation_factor
        * tilt_factor
        * inverter_efficiency
        * TEMPERATURE_COEFFICIENT
        * SOILING_FACTOR
        * CABLE_LOSS_FACTOR
        * MISMATCH_LOSS_FACTOR
        * shading_factor
}

/// Estimate annual and monthly output of a solar array.
///
/// Monthly figures are rounded to two decimals first and the annual figure is their sum, so the
/// months always add up to the year.
#[must_use]
pub fn estimate_solar_yield(
    spec: &SolarSpec,
    climate: &ClimateRecord,
    latitude: f64,
) -> YieldResult {
    let optimal = optimal_tilt(latitude);
    let tilt = spec.tilt_degrees.unwrap_or(optimal);
    let orientation_factor = spec.orientation.factor();
    let tilt_adjustment = tilt_factor(tilt, optimal);
    let efficiency = system_efficiency(
        orientation_factor,
        tilt_adjustment,
        spec.inverter_efficiency,
        spec.shading_factor,
    );

    let mut monthly_kwh = [0.0_f64; 12];
    for ((slot, ghi), days) in monthly_kwh
        .iter_mut()
        .zip(climate.monthly_ghi)
        .zip(DAYS_IN_MONTH)
    {
        *slot = round_to(
            spec.capacity_kwp * ghi * days * efficiency * PERFORMANCE_RATIO,
            2,
        );
    }

    let annual_kwh = round_to(monthly_kwh.iter().sum(), 2);

    let mut assumptions = Assumptions::new();
    let mut note = |name: &str, value: f64| {
        assumptions.insert(name.to_owned(), round_to(value, 3).into());
    };
    note("optimal_tilt_degrees", optimal);
    note("actual_tilt_degrees", tilt);
    note("orientation_factor", orientation_factor);
    note("tilt_factor", tilt_adjustment);
    note("system_efficiency", efficiency);
    note("performance_ratio", PERFORMANCE_RATIO);
    note("inverter_efficiency", spec.inverter_efficiency);
    note("temperature_coefficient", TEMPERATURE_COEFFICIENT);
    note("soiling_losses", 1.0 - SOILING_FACTOR);
    note("shading_factor", spec.shading_factor);
    assumptions.insert("orientation".to_owned(), spec.orientation.label().into());
    assumptions.insert("climate_source".to_owned(), climate.source.as_str().into());

    YieldResult {
        annual_kwh,
        monthly_kwh,
        capacity_factor: round_to(annual_kwh / (spec.capacity_kwp * HOURS_PER_YEAR), 4),
        kwh_per_kwp: round_to(annual_kwh / spec.capacity_kwp, 1),
        assumptions,
    }
}

/// Round half away from zero to `decimals` places.
#[must_use]
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale).round() / scale
}
