//! Cached irradiance climatology per 0.01° grid cell.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time;

use crate::cache::KeyedCache;
use crate::error::EstimateError;
use crate::model::{ClimateRecord, GridKey, MONTH_CODES};
use crate::ports::{ClimateSource, LookupError, MonthlyIrradiance};

/// Cache of climatology keyed by grid cell.
pub type ClimateCache = KeyedCache<GridKey, ClimateRecord, EstimateError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// What to do when the source omits some months.
pub enum MissingMonthPolicy {
    /// Treat absent months as zero irradiance and log a warning.
    #[default]
    ZeroFill,
    /// Fail with [`EstimateError::ClimateDataMalformed`].
    Reject,
}

/// Loads climatology through the cache, then the upstream source.
pub struct ClimateProvider {
    source: Arc<dyn ClimateSource>,
    cache: Arc<ClimateCache>,
    timeout: Option<Duration>,
    missing_months: MissingMonthPolicy,
}

impl ClimateProvider {
    /// Create a provider over `source`, storing results in `cache`.
    #[must_use]
    pub fn new(source: Arc<dyn ClimateSource>, cache: Arc<ClimateCache>) -> Self {
        Self {
            source,
            cache,
            timeout: None,
            missing_months: MissingMonthPolicy::default(),
        }
    }

    /// Give up on the upstream after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Choose how incomplete climatology is handled.
    #[must_use]
    pub fn with_missing_months(mut self, policy: MissingMonthPolicy) -> Self {
        self.missing_months = policy;
        self
    }

    /// Cache backing this provider.
    #[must_use]
    pub fn cache(&self) -> &Arc<ClimateCache> {
        &self.cache
    }

    /// Climatology for a point; nearby points share one grid cell.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::ClimateServiceUnavailable`] when the source cannot answer in
    /// time or has no data, and [`EstimateError::ClimateDataMalformed`] when its data is
    /// unusable.
    pub async fn climatology(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ClimateRecord, EstimateError> {
        let key = GridKey::from_degrees(latitude, longitude);
        let source = Arc::clone(&self.source);
        let timeout = self.timeout;
        let policy = self.missing_months;
        self.cache
            .get_or_fetch(key, move || {
                fetch_climate(source, latitude, longitude, timeout, policy)
            })
            .await
    }
}

async fn fetch_climate(
    source: Arc<dyn ClimateSource>,
    latitude: f64,
    longitude: f64,
    timeout: Option<Duration>,
    policy: MissingMonthPolicy,
) -> Result<ClimateRecord, EstimateError> {
    tracing::info!(source = source.source_tag(), latitude, longitude, "fetching climatology");

    let answer = match timeout {
        Some(limit) => time::timeout(limit, source.monthly_irradiance(latitude, longitude))
            .await
            .map_err(|_elapsed| {
                EstimateError::ClimateServiceUnavailable(format!(
                    "climate request timed out after {}s",
                    limit.as_secs_f64()
                ))
            })?,
        None => source.monthly_irradiance(latitude, longitude).await,
    };

    let irradiance = answer.map_err(|err| {
        tracing::warn!(latitude, longitude, error = %err, "climate request failed");
        match err {
            LookupError::NotFound => EstimateError::ClimateServiceUnavailable(
                "no climate data for this location".to_owned(),
            ),
            other if other.is_malformed() => {
                EstimateError::ClimateDataMalformed(other.to_string())
            }
            other => EstimateError::ClimateServiceUnavailable(other.to_string()),
        }
    })?;

    build_record(&irradiance, latitude, longitude, source.source_tag(), policy)
}

/// Turn monthly values from a source into a [`ClimateRecord`].
///
/// # Errors
///
/// Returns [`EstimateError::ClimateServiceUnavailable`] when no month has a value and
/// [`EstimateError::ClimateDataMalformed`] for negative or non-finite values, or for missing
/// months under [`MissingMonthPolicy::Reject`].
pub fn build_record(
    irradiance: &MonthlyIrradiance,
    latitude: f64,
    longitude: f64,
    source_tag: &str,
    policy: MissingMonthPolicy,
) -> Result<ClimateRecord, EstimateError> {
    let missing = irradiance.missing_months();
    if missing.len() == MONTH_CODES.len() {
        return Err(EstimateError::ClimateServiceUnavailable(
            "no irradiance data returned".to_owned(),
        ));
    }

    if !missing.is_empty() {
        let listed = missing.join(", ");
        match policy {
            MissingMonthPolicy::ZeroFill => {
                tracing::warn!(latitude, longitude, months = %listed, "zero-filling missing months");
            }
            MissingMonthPolicy::Reject => {
                return Err(EstimateError::ClimateDataMalformed(format!(
                    "missing months: {listed}"
                )));
            }
        }
    }

    let mut monthly_ghi = [0.0_f64; 12];
    for (slot, code) in monthly_ghi.iter_mut().zip(MONTH_CODES) {
        let Some(value) = irradiance.get(code) else {
            continue;
        };
        if !value.is_finite() || value < 0.0 {
            return Err(EstimateError::ClimateDataMalformed(format!(
                "irradiance for {code} is {value}"
            )));
        }
        *slot = value;
    }

    Ok(ClimateRecord::from_monthly(
        latitude,
        longitude,
        monthly_ghi,
        source_tag,
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    fn full_year() -> MonthlyIrradiance {
        MONTH_CODES
            .into_iter()
            .zip([0.8, 1.5, 2.5, 3.8, 4.8, 5.1, 4.9, 4.2, 3.0, 1.8, 1.0, 0.6])
            .collect()
    }

    struct CountingSource {
        calls: AtomicUsize,
        answer: fn() -> Result<MonthlyIrradiance, LookupError>,
    }

    #[async_trait]
    impl ClimateSource for CountingSource {
        fn source_tag(&self) -> &str {
            "TEST"
        }

        async fn monthly_irradiance(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<MonthlyIrradiance, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.answer)()
        }
    }

    fn provider_with(
        answer: fn() -> Result<MonthlyIrradiance, LookupError>,
    ) -> (ClimateProvider, Arc<CountingSource>) {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            answer,
        });
        let cache = Arc::new(ClimateCache::new("climate", Duration::from_secs(60)));
        let shared: Arc<dyn ClimateSource> = Arc::<CountingSource>::clone(&source);
        (ClimateProvider::new(shared, cache), source)
    }

    #[test]
    fn annual_total_uses_days_in_month() {
        let record = build_record(&full_year(), 51.5, -0.1, "TEST", MissingMonthPolicy::ZeroFill)
            .expect("complete year");
        let expected = 0.8 * 31.0
            + 1.5 * 28.25
            + 2.5 * 31.0
            + 3.8 * 30.0
            + 4.8 * 31.0
            + 5.1 * 30.0
            + 4.9 * 31.0
            + 4.2 * 31.0
            + 3.0 * 30.0
            + 1.8 * 31.0
            + 1.0 * 30.0
            + 0.6 * 31.0;
        assert!((record.annual_ghi - expected).abs() < 1e-9);
        assert_eq!(record.monthly_ghi.first(), Some(&0.8));
        assert_eq!(record.monthly_ghi.last(), Some(&0.6));
        assert_eq!(record.source, "TEST");
    }

    #[test]
    fn missing_months_are_zero_filled_by_default() {
        let mut irradiance = full_year();
        irradiance.values.remove("JUL");
        let record = build_record(&irradiance, 51.5, -0.1, "TEST", MissingMonthPolicy::ZeroFill)
            .expect("zero-filled");
        assert_eq!(record.monthly_ghi.get(6), Some(&0.0));
        assert_eq!(record.monthly_ghi.get(5), Some(&5.1));
    }

    #[test]
    fn missing_months_are_rejected_when_configured() {
        let mut irradiance = full_year();
        irradiance.values.remove("JUL");
        irradiance.values.remove("DEC");
        let err = build_record(&irradiance, 51.5, -0.1, "TEST", MissingMonthPolicy::Reject)
            .expect_err("incomplete");
        assert_eq!(
            err,
            EstimateError::ClimateDataMalformed("missing months: JUL, DEC".to_owned())
        );
    }

    #[test]
    fn empty_payload_means_service_unavailable() {
        let err = build_record(
            &MonthlyIrradiance::default(),
            51.5,
            -0.1,
            "TEST",
            MissingMonthPolicy::ZeroFill,
        )
        .expect_err("no data");
        assert!(matches!(err, EstimateError::ClimateServiceUnavailable(_)));
    }

    #[test]
    fn negative_values_are_malformed() {
        let mut irradiance = full_year();
        irradiance.values.insert("MAR".to_owned(), -1.0);
        let err = build_record(&irradiance, 51.5, -0.1, "TEST", MissingMonthPolicy::ZeroFill)
            .expect_err("negative");
        assert!(matches!(err, EstimateError::ClimateDataMalformed(_)));
    }

    #[tokio::test]
    async fn nearby_points_share_a_cached_record() {
        let (provider, source) = provider_with(|| Ok(full_year()));

        let first = provider.climatology(51.501, -0.1416).await.expect("loads");
        let second = provider.climatology(51.4981, -0.1399).await.expect("cached");

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upstream_errors_keep_their_kind() {
        let (provider, _source) =
            provider_with(|| Err(LookupError::Unavailable("status 500".to_owned())));
        let err = provider.climatology(51.5, -0.1).await.expect_err("down");
        assert!(matches!(err, EstimateError::ClimateServiceUnavailable(_)));

        let (provider, _source) =
            provider_with(|| Err(LookupError::Malformed("not json".to_owned())));
        let err = provider.climatology(51.5, -0.1).await.expect_err("garbage");
        assert!(matches!(err, EstimateError::ClimateDataMalformed(_)));
    }

    #[tokio::test]
    async fn reject_policy_applies_to_fetched_data() {
        let (provider, _source) = provider_with(|| {
            let mut irradiance = full_year();
            irradiance.values.remove("FEB");
            Ok(irradiance)
        });
        let provider = provider.with_missing_months(MissingMonthPolicy::Reject);
        let err = provider.climatology(51.5, -0.1).await.expect_err("incomplete");
        assert!(matches!(err, EstimateError::ClimateDataMalformed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out() {
        struct Stalled;

        #[async_trait]
        impl ClimateSource for Stalled {
            fn source_tag(&self) -> &str {
                "STALLED"
            }

            async fn monthly_irradiance(
                &self,
                _latitude: f64,
                _longitude: f64,
            ) -> Result<MonthlyIrradiance, LookupError> {
                time::sleep(Duration::from_secs(3_600)).await;
                Ok(full_year())
            }
        }

        let cache = Arc::new(ClimateCache::new("climate", Duration::from_secs(60)));
        let provider = ClimateProvider::new(Arc::new(Stalled), Arc::clone(&cache))
            .with_timeout(Duration::from_secs(30));

        let err = provider.climatology(51.5, -0.1).await.expect_err("times out");
        assert_eq!(
            err,
            EstimateError::ClimateServiceUnavailable(
                "climate request timed out after 30s".to_owned()
            )
        );
        assert!(cache.is_empty(), "timeouts are not cached");
    }
}
