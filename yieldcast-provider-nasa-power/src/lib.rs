//! Irradiance climatology from the NASA POWER API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use yieldcast_core::ports::{ClimateSource, LookupError, MonthlyIrradiance};

/// Public NASA POWER endpoint.
pub const DEFAULT_BASE_URL: &str = "https://power.larc.nasa.gov/api";

/// Tag stamped on climate records from this source.
pub const SOURCE_TAG: &str = "NASA_POWER";

/// All-sky surface shortwave downward irradiance, kWh/m²/day.
const GHI_PARAMETER: &str = "ALLSKY_SFC_SW_DWN";

/// Marker NASA POWER uses for missing values.
const FILL_VALUE: f64 = -999.0;

/// Response of `/temporal/climatology/point`, trimmed to what we read.
#[derive(Debug, Deserialize)]
struct ClimatologyResponse {
    // error payloads carry only `messages`
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    // parameter name -> period code ("JAN".."DEC", "ANN") -> value
    #[serde(default)]
    parameter: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Climate source querying NASA POWER's long-term climatology.
pub struct NasaPowerSource {
    client: Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl NasaPowerSource {
    /// Create a source against the public endpoint.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Create a source against another deployment, e.g. a mock server.
    #[must_use]
    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: None,
        }
    }

    /// Abort each request after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl ClimateSource for NasaPowerSource {
    fn source_tag(&self) -> &str {
        SOURCE_TAG
    }

    async fn monthly_irradiance(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<MonthlyIrradiance, LookupError> {
        let latitude_s = latitude.to_string();
        let longitude_s = longitude.to_string();

        let mut req = self
            .client
            .get(format!("{}/temporal/climatology/point", self.base_url))
            .query(&[
                ("parameters", GHI_PARAMETER),
                ("community", "RE"),
                ("longitude", &longitude_s),
                ("latitude", &latitude_s),
                ("format", "JSON"),
            ]);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let mut response = fetch_json::<ClimatologyResponse>(req).await?;
        let series = response
            .properties
            .parameter
            .remove(GHI_PARAMETER)
            .ok_or_else(|| {
                LookupError::Unavailable(format!("response has no {GHI_PARAMETER} series"))
            })?;

        parse_series(series)
    }
}

fn parse_series(series: BTreeMap<String, Value>) -> Result<MonthlyIrradiance, LookupError> {
    let mut values = BTreeMap::new();
    for (period, raw) in series {
        let period = period.to_uppercase();
        let value = match raw {
            Value::Null => continue,
            Value::Number(number) => number.as_f64().ok_or_else(|| {
                LookupError::Malformed(format!("{period} value {number} is not a float"))
            })?,
            other => {
                return Err(LookupError::Malformed(format!(
                    "{period} value {other} is not a number"
                )));
            }
        };
        if (value - FILL_VALUE).abs() < f64::EPSILON {
            tracing::debug!(%period, "skipping fill value");
            continue;
        }
        values.insert(period, value);
    }
    Ok(MonthlyIrradiance { values })
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, LookupError> {
    req.send()
        .await
        .map_err(LookupError::from)?
        .error_for_status()
        .map_err(LookupError::from)?
        .json()
        .await
        .map_err(LookupError::from)
}
