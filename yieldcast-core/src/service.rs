//! High-level service facade: postcode in, yield estimate out.

use std::sync::Arc;

use crate::climate::ClimateProvider;
use crate::config::Settings;
use crate::error::EstimateError;
use crate::location::LocationResolver;
use crate::model::{ClimateRecord, Location, SystemSpec, YieldResult};
use crate::ports::CalculationSink;
use crate::record::{CALCULATION_VERSION, CONFIDENCE_BAND_PERCENT, CalculationRecord};
use crate::solar::estimate_solar_yield;
use crate::sources::DataSources;

#[derive(Debug, Clone, PartialEq)]
/// Everything produced for one estimate request.
pub struct Estimate {
    /// Where the system is.
    pub location: Location,
    /// Climatology the figures are based on.
    pub climate: ClimateRecord,
    /// Yield figures and assumptions.
    pub result: YieldResult,
    /// Quoted uncertainty, percent either side of the annual figure.
    pub confidence_band_percent: f64,
    /// Model revision that produced the figures.
    pub calculation_version: &'static str,
}

impl Estimate {
    /// Lower and upper bound of the annual figure within the confidence band.
    #[must_use]
    pub fn annual_range_kwh(&self) -> (f64, f64) {
        let spread = self.result.annual_kwh * self.confidence_band_percent / 100.0;
        (self.result.annual_kwh - spread, self.result.annual_kwh + spread)
    }
}

/// Public entry point for yield estimates.
pub struct YieldService {
    locations: LocationResolver,
    climate: ClimateProvider,
    sink: Option<Arc<dyn CalculationSink>>,
}

impl YieldService {
    /// Create a service from an assembled resolver and provider.
    #[must_use]
    pub fn new(locations: LocationResolver, climate: ClimateProvider) -> Self {
        Self {
            locations,
            climate,
            sink: None,
        }
    }

    /// Create a service over `sources`, with caches and deadlines taken from `settings`.
    #[must_use]
    pub fn from_settings(sources: &DataSources, settings: &Settings) -> Self {
        Self::new(
            sources.location_resolver(settings),
            sources.climate_provider(settings),
        )
    }

    /// Hand every finished calculation to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn CalculationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Estimate the yield of `system` installed at `postcode`.
    ///
    /// The system is validated before anything is looked up, and kinds without a yield model
    /// fail before any upstream call.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::Validation`] for out-of-range specifications,
    /// [`EstimateError::UnsupportedSystemType`] for wind systems, the lookup errors of the
    /// resolver and the climate provider, and [`EstimateError::Internal`] when the attached
    /// sink refuses the record.
    pub async fn estimate(
        &self,
        postcode: &str,
        system: &SystemSpec,
    ) -> Result<Estimate, EstimateError> {
        system.validate()?;

        let solar = match system {
            SystemSpec::Solar(solar) => solar,
            SystemSpec::Wind(_) => {
                return Err(EstimateError::UnsupportedSystemType(system.kind()));
            }
        };

        let location = self.locations.resolve(postcode).await?;
        let climate = self
            .climate
            .climatology(location.latitude, location.longitude)
            .await?;
        let result = estimate_solar_yield(solar, &climate, location.latitude);

        let estimate = Estimate {
            location,
            climate,
            result,
            confidence_band_percent: CONFIDENCE_BAND_PERCENT,
            calculation_version: CALCULATION_VERSION,
        };

        if let Some(sink) = &self.sink {
            let record = CalculationRecord::from_estimate(&estimate, system);
            sink.record(&record).await.map_err(|err| {
                tracing::error!(error = %err, "calculation sink failed");
                EstimateError::Internal(format!("failed to store calculation: {err}"))
            })?;
        }

        tracing::info!(
            region = %estimate.location.region,
            annual_kwh = estimate.result.annual_kwh,
            capacity_factor = estimate.result.capacity_factor,
            "estimate complete"
        );
        Ok(estimate)
    }

    /// Drop expired entries from both caches; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.locations.cache().purge_expired() + self.climate.cache().purge_expired()
    }
}
