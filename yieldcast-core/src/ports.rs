//! Traits describing the upstream capabilities the pipeline consumes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;

use crate::model::MONTH_CODES;
use crate::record::CalculationRecord;

#[derive(thiserror::Error, Debug)]
/// Errors reported by upstream adapters.
pub enum LookupError {
    /// Network layer failed, or the response could not be decoded.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The upstream does not know the requested item.
    #[error("Not found")]
    NotFound,
    /// The upstream answered, but not successfully.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    /// The upstream answered with data of the wrong shape.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl LookupError {
    /// Whether the payload itself was unusable rather than the transport.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        match self {
            LookupError::Network(err) => err.is_decode(),
            LookupError::Malformed(_) => true,
            LookupError::NotFound | LookupError::Unavailable(_) => false,
        }
    }
}

#[derive(thiserror::Error, Debug)]
/// Errors reported by a [`CalculationSink`].
pub enum SinkError {
    /// The backing store could not be reached or written.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
/// Raw answer of a postcode lookup.
pub struct LocationFix {
    /// Postcode as the upstream spells it.
    pub postcode: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Region, if the upstream reports one.
    pub region: Option<String>,
    /// Administrative district, if the upstream reports one.
    pub admin_district: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Monthly mean daily irradiance keyed by upper-case month code (`JAN`..`DEC`).
pub struct MonthlyIrradiance {
    /// Values keyed by month code. Extra keys such as `ANN` are ignored.
    pub values: BTreeMap<String, f64>,
}

impl MonthlyIrradiance {
    /// Value for a month code, if present.
    #[must_use]
    pub fn get(&self, month_code: &str) -> Option<f64> {
        self.values.get(month_code).copied()
    }

    /// Month codes with no value, in calendar order.
    #[must_use]
    pub fn missing_months(&self) -> Vec<&'static str> {
        MONTH_CODES
            .into_iter()
            .filter(|code| !self.values.contains_key(*code))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for MonthlyIrradiance {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(code, value)| (code.into(), value))
                .collect(),
        }
    }
}

#[async_trait]
/// Resolves a normalized postcode to coordinates.
pub trait LocationLookup: Send + Sync {
    /// Short name of the upstream, for logs.
    fn name(&self) -> &str;

    /// Look up a normalized postcode.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] for unknown postcodes and another [`LookupError`] when
    /// the upstream cannot answer.
    async fn lookup(&self, postcode: &str) -> Result<LocationFix, LookupError>;
}

#[async_trait]
/// Supplies long-term global horizontal irradiance for a point.
pub trait ClimateSource: Send + Sync {
    /// Tag recorded on every climate record, e.g. `NASA_POWER`.
    fn source_tag(&self) -> &str;

    /// Fetch monthly climatological means.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] when the upstream cannot answer, has no data for the point, or
    /// answers with an unusable payload.
    async fn monthly_irradiance(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<MonthlyIrradiance, LookupError>;
}

#[async_trait]
/// Receives finalized calculations for audit storage.
pub trait CalculationSink: Send + Sync {
    /// Store one calculation.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the record could not be stored.
    async fn record(&self, record: &CalculationRecord) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_months_are_listed_in_calendar_order() {
        let irradiance: MonthlyIrradiance = [("JAN", 0.8), ("MAR", 2.1), ("ANN", 2.7)]
            .into_iter()
            .collect();
        let missing = irradiance.missing_months();
        assert_eq!(missing.first(), Some(&"FEB"));
        assert_eq!(missing.len(), 10);
        assert_eq!(irradiance.get("MAR"), Some(2.1));
    }

    #[test]
    fn only_payload_errors_count_as_malformed() {
        assert!(LookupError::Malformed("x".to_owned()).is_malformed());
        assert!(!LookupError::Unavailable("503".to_owned()).is_malformed());
        assert!(!LookupError::NotFound.is_malformed());
    }
}
