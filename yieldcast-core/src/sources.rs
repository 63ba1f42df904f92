//! Bundle of upstream adapters and the cached components built from them.

use std::sync::Arc;

use crate::climate::{ClimateCache, ClimateProvider};
use crate::config::Settings;
use crate::location::{LocationCache, LocationResolver};
use crate::ports::{ClimateSource, LocationLookup};

/// Upstream adapters backing one service instance.
pub struct DataSources {
    /// Postcode lookup.
    pub location: Arc<dyn LocationLookup>,
    /// Irradiance climatology.
    pub climate: Arc<dyn ClimateSource>,
}

impl DataSources {
    /// Pair a postcode lookup with a climate source.
    #[must_use]
    pub fn new(location: Arc<dyn LocationLookup>, climate: Arc<dyn ClimateSource>) -> Self {
        Self { location, climate }
    }

    /// Location resolver with the cache lifetime, capacity and deadline from `settings`.
    #[must_use]
    pub fn location_resolver(&self, settings: &Settings) -> LocationResolver {
        let mut cache = LocationCache::new("locations", settings.location_ttl());
        if let Some(capacity) = settings.cache_capacity {
            cache = cache.with_capacity(capacity);
        }
        LocationResolver::new(Arc::clone(&self.location), Arc::new(cache))
            .with_timeout(settings.location_timeout())
    }

    /// Climate provider with the cache lifetime, capacity, deadline and missing-month policy
    /// from `settings`.
    #[must_use]
    pub fn climate_provider(&self, settings: &Settings) -> ClimateProvider {
        let mut cache = ClimateCache::new("climate", settings.climate_ttl());
        if let Some(capacity) = settings.cache_capacity {
            cache = cache.with_capacity(capacity);
        }
        ClimateProvider::new(Arc::clone(&self.climate), Arc::new(cache))
            .with_timeout(settings.climate_timeout())
            .with_missing_months(settings.missing_months)
    }
}
