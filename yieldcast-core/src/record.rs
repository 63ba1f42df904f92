//! Audit record handed to a [`CalculationSink`](crate::ports::CalculationSink).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::location::normalize_postcode;
use crate::model::{Assumptions, ClimateRecord, SystemSpec};
use crate::service::Estimate;

/// Version stamped on every record so stored figures can be traced to a model revision.
pub const CALCULATION_VERSION: &str = "1.0.0";

/// Year-to-year spread quoted with UK estimates, in percent either side.
pub const CONFIDENCE_BAND_PERCENT: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Finalized calculation. Carries a hash of the postcode, never the postcode itself.
pub struct CalculationRecord {
    /// When the estimate was produced.
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the normalized postcode.
    pub postcode_hash: String,
    /// Latitude used.
    pub latitude: f64,
    /// Longitude used.
    pub longitude: f64,
    /// Region of the location.
    pub region: String,
    /// System the estimate is for.
    pub system: SystemSpec,
    /// Climatology snapshot the estimate used.
    pub climate: ClimateRecord,
    /// Annual energy in kWh.
    pub annual_energy_kwh: f64,
    /// Monthly energy in kWh, January first.
    pub monthly_energy_kwh: [f64; 12],
    /// Annual energy over continuous nameplate output.
    pub capacity_factor: f64,
    /// Annual energy per kWp.
    pub kwh_per_kwp: f64,
    /// Quoted uncertainty, percent either side.
    pub confidence_band_percent: f64,
    /// Factors applied.
    pub assumptions: Assumptions,
    /// Model revision.
    pub calculation_version: String,
}

impl CalculationRecord {
    /// Build the record for a finished estimate.
    #[must_use]
    pub fn from_estimate(estimate: &Estimate, system: &SystemSpec) -> Self {
        Self {
            created_at: Utc::now(),
            postcode_hash: hash_postcode(&estimate.location.postcode),
            latitude: estimate.location.latitude,
            longitude: estimate.location.longitude,
            region: estimate.location.region.clone(),
            system: system.clone(),
            climate: estimate.climate.clone(),
            annual_energy_kwh: estimate.result.annual_kwh,
            monthly_energy_kwh: estimate.result.monthly_kwh,
            capacity_factor: estimate.result.capacity_factor,
            kwh_per_kwp: estimate.result.kwh_per_kwp,
            confidence_band_percent: estimate.confidence_band_percent,
            assumptions: estimate.result.assumptions.clone(),
            calculation_version: estimate.calculation_version.to_owned(),
        }
    }
}

/// One-way hash of a postcode; spelling variants of the same code hash alike.
#[must_use]
pub fn hash_postcode(postcode: &str) -> String {
    hex::encode(Sha256::digest(normalize_postcode(postcode).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postcode_hash_is_sha256_of_normalized_code() {
        assert_eq!(
            hash_postcode("sw1a1aa"),
            "6759600cd97d0948af17cb150d22426a5d3c3c07d48fd40ea239d32194cab535"
        );
        assert_eq!(hash_postcode("SW1A 1AA"), hash_postcode(" sw1a 1aa"));
        assert_ne!(hash_postcode("SW1A 1AA"), hash_postcode("SW1A 2AA"));
    }
}
