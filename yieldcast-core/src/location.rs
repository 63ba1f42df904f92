//! Postcode normalization and cached resolution to coordinates.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::cache::KeyedCache;
use crate::error::EstimateError;
use crate::model::{Location, UNKNOWN_REGION};
use crate::ports::{LocationFix, LocationLookup, LookupError};

/// Cache of resolved locations keyed by normalized postcode.
pub type LocationCache = KeyedCache<String, Location, EstimateError>;

/// Length of the inward part of a UK postcode (`1AA` in `SW1A 1AA`).
const INWARD_CODE_LEN: usize = 3;

/// Canonical form of a postcode: no inner whitespace, upper case, one space before the last
/// three characters. Inputs shorter than five characters are returned compacted.
#[must_use]
pub fn normalize_postcode(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|character| !character.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();

    let length = compact.chars().count();
    if length < INWARD_CODE_LEN + 2 {
        return compact;
    }

    let outward: String = compact.chars().take(length - INWARD_CODE_LEN).collect();
    let inward: String = compact.chars().skip(length - INWARD_CODE_LEN).collect();
    format!("{outward} {inward}")
}

/// Resolves postcodes through the cache, then the upstream lookup.
pub struct LocationResolver {
    lookup: Arc<dyn LocationLookup>,
    cache: Arc<LocationCache>,
    timeout: Option<Duration>,
}

impl LocationResolver {
    /// Create a resolver over `lookup`, storing results in `cache`.
    #[must_use]
    pub fn new(lookup: Arc<dyn LocationLookup>, cache: Arc<LocationCache>) -> Self {
        Self {
            lookup,
            cache,
            timeout: None,
        }
    }

    /// Give up on the upstream after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cache backing this resolver.
    #[must_use]
    pub fn cache(&self) -> &Arc<LocationCache> {
        &self.cache
    }

    /// Resolve a raw postcode.
    ///
    /// # Errors
    ///
    /// Returns [`EstimateError::Validation`] for blank input,
    /// [`EstimateError::LocationNotFound`] when the upstream does not know the postcode and
    /// [`EstimateError::LocationServiceUnavailable`] when it cannot answer in time.
    pub async fn resolve(&self, raw_postcode: &str) -> Result<Location, EstimateError> {
        let postcode = normalize_postcode(raw_postcode);
        if postcode.is_empty() {
            return Err(EstimateError::Validation {
                field: "postcode",
                message: "postcode is empty".to_owned(),
            });
        }

        let lookup = Arc::clone(&self.lookup);
        let timeout = self.timeout;
        let requested = postcode.clone();
        self.cache
            .get_or_fetch(postcode, move || fetch_location(lookup, requested, timeout))
            .await
    }
}

async fn fetch_location(
    lookup: Arc<dyn LocationLookup>,
    postcode: String,
    timeout: Option<Duration>,
) -> Result<Location, EstimateError> {
    tracing::info!(upstream = lookup.name(), %postcode, "looking up postcode");

    let answer = match timeout {
        Some(limit) => time::timeout(limit, lookup.lookup(&postcode))
            .await
            .map_err(|_elapsed| {
                EstimateError::LocationServiceUnavailable(format!(
                    "postcode lookup timed out after {}s",
                    limit.as_secs_f64()
                ))
            })?,
        None => lookup.lookup(&postcode).await,
    };

    match answer {
        Ok(fix) => location_from_fix(fix, &postcode),
        Err(LookupError::NotFound) => {
            tracing::info!(%postcode, "postcode not found");
            Err(EstimateError::LocationNotFound(postcode))
        }
        Err(err) => {
            tracing::warn!(%postcode, error = %err, "postcode lookup failed");
            Err(EstimateError::LocationServiceUnavailable(err.to_string()))
        }
    }
}

fn location_from_fix(fix: LocationFix, requested: &str) -> Result<Location, EstimateError> {
    let region = fix
        .region
        .filter(|region| !region.trim().is_empty())
        .or(fix.admin_district.filter(|district| !district.trim().is_empty()))
        .unwrap_or_else(|| UNKNOWN_REGION.to_owned());

    let postcode = if fix.postcode.trim().is_empty() {
        requested.to_owned()
    } else {
        fix.postcode
    };

    let location = Location {
        postcode,
        latitude: fix.latitude,
        longitude: fix.longitude,
        region,
    };

    if location.has_valid_coordinates() {
        Ok(location)
    } else {
        Err(EstimateError::LocationServiceUnavailable(format!(
            "lookup returned out-of-range coordinates ({}, {})",
            location.latitude, location.longitude
        )))
    }
}
