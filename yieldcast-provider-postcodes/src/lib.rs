//! Location lookup backed by the postcodes.io API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;

use yieldcast_core::ports::{LocationFix, LocationLookup, LookupError};

/// Public postcodes.io endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.postcodes.io";

/// Response envelope of `/postcodes/{code}`.
#[derive(Debug, Deserialize)]
struct PostcodeResponse {
    status: u16,
    #[serde(default)]
    result: Option<PostcodeResult>,
}

/// Fields of the `result` object we use; the rest is ignored.
#[derive(Debug, Deserialize)]
struct PostcodeResult {
    postcode: String,
    // null for some Crown dependency and newly issued codes
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    admin_district: Option<String>,
}

/// Postcode lookup against postcodes.io.
pub struct PostcodesIoLookup {
    client: Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl PostcodesIoLookup {
    /// Create a lookup against the public endpoint.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    /// Create a lookup against another deployment, e.g. a mirror or a mock server.
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
impl LocationLookup for PostcodesIoLookup {
    fn name(&self) -> &str {
        "postcodes.io"
    }

    async fn lookup(&self, postcode: &str) -> Result<LocationFix, LookupError> {
        let compact: String = postcode
            .chars()
            .filter(|character| !character.is_whitespace())
            .collect();
        // UK postcodes are alphanumeric; anything else cannot match
        if compact.is_empty() || !compact.chars().all(|character| character.is_ascii_alphanumeric())
        {
            return Err(LookupError::NotFound);
        }

        let mut req = self
            .client
            .get(format!("{}/postcodes/{compact}", self.base_url));
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let Some(body) = fetch_json(req).await? else {
            return Err(LookupError::NotFound);
        };
        if body.status != 200 {
            tracing::debug!(%postcode, status = body.status, "postcodes.io reported failure");
            return Err(LookupError::NotFound);
        }
        let result = body.result.ok_or(LookupError::NotFound)?;

        let (Some(latitude), Some(longitude)) = (result.latitude, result.longitude) else {
            return Err(LookupError::Malformed(format!(
                "no coordinates for {}",
                result.postcode
            )));
        };

        Ok(LocationFix {
            postcode: result.postcode,
            latitude,
            longitude,
            region: result.region,
            admin_district: result.admin_district,
        })
    }
}

// Fetch and decode JSON; a 404 becomes `None`, other failures become errors.
async fn fetch_json(req: RequestBuilder) -> Result<Option<PostcodeResponse>, LookupError> {
    let resp = req.send().await.map_err(LookupError::from)?;
    if resp.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    resp.error_for_status()
        .map_err(LookupError::from)?
        .json::<PostcodeResponse>()
        .await
        .map(Some)
        .map_err(LookupError::from)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn lookup_for(server: &MockServer) -> PostcodesIoLookup {
        PostcodesIoLookup::with_base_url(Client::new(), &server.uri())
    }

    #[tokio::test]
    async fn resolves_postcode_without_inner_space() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/postcodes/SW1A1AA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 200,
                "result": {
                    "postcode": "SW1A 1AA",
                    "latitude": 51.501_009,
                    "longitude": -0.141_588,
                    "region": "London",
                    "admin_district": "Westminster",
                    "country": "England"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let fix = lookup_for(&server).lookup("SW1A 1AA").await.expect("found");

        assert_eq!(fix.postcode, "SW1A 1AA");
        assert!((fix.latitude - 51.501_009).abs() < 1e-9);
        assert!((fix.longitude + 0.141_588).abs() < 1e-9);
        assert_eq!(fix.region.as_deref(), Some("London"));
        assert_eq!(fix.admin_district.as_deref(), Some("Westminster"));
    }

    #[tokio::test]
    async fn http_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/postcodes/ZZ999ZZ"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "status": 404,
                "error": "Invalid postcode"
            })))
            .mount(&server)
            .await;

        let err = lookup_for(&server).lookup("ZZ99 9ZZ").await.expect_err("unknown");
        assert!(matches!(err, LookupError::NotFound));
    }

    #[tokio::test]
    async fn body_status_other_than_200_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/postcodes/AB11AB"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": 404, "result": null })),
            )
            .mount(&server)
            .await;

        let err = lookup_for(&server).lookup("AB1 1AB").await.expect_err("unknown");
        assert!(matches!(err, LookupError::NotFound));
    }

    #[tokio::test]
    async fn server_error_is_not_mistaken_for_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = lookup_for(&server).lookup("SW1A 1AA").await.expect_err("down");
        assert!(matches!(err, LookupError::Network(_)));
        assert!(!err.is_malformed());
    }

    #[tokio::test]
    async fn null_coordinates_are_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/postcodes/GY11AA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 200,
                "result": {
                    "postcode": "GY1 1AA",
                    "latitude": null,
                    "longitude": null,
                    "region": null,
                    "admin_district": null
                }
            })))
            .mount(&server)
            .await;

        let err = lookup_for(&server).lookup("GY1 1AA").await.expect_err("no coordinates");
        assert!(matches!(err, LookupError::Malformed(_)));
    }

    #[tokio::test]
    async fn non_alphanumeric_input_never_hits_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = lookup_for(&server).lookup("../admin").await.expect_err("rejected");
        assert!(matches!(err, LookupError::NotFound));
    }
}
