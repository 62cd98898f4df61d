// Device API HTTP client
//
// Wraps `reqwest::Client` with endpoint URL construction, key header
// injection, and envelope decoding. Operations (keygen, config, op
// commands, jobs) are implemented as inherent methods in separate files
// to keep this module focused on transport mechanics.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::request::ApiRequest;
use crate::response::ApiResponse;
use crate::transport::TransportConfig;

/// Header carrying the API key on every authenticated request.
pub(crate) const KEY_HEADER: &str = "X-PAN-KEY";

/// Raw HTTP client for the firewall XML API.
///
/// Holds no per-device state: every call names the device base URL and,
/// where needed, the API key. One instance can serve both devices of a pair.
/// Retry policy belongs to the caller; each method is a single attempt.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
}

impl DeviceClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// `{base}/api/`, keeping any path prefix the base URL carries.
    pub(crate) fn api_url(base: &Url) -> Result<Url, Error> {
        if base.path().ends_with('/') {
            return Ok(base.join("api/")?);
        }
        let mut dir = base.clone();
        dir.set_path(&format!("{}/", base.path()));
        Ok(dir.join("api/")?)
    }

    /// Send one request and decode the response envelope.
    ///
    /// HTTP 401/403 map to `Error::Authentication`. Other non-success
    /// statuses yield the device error text when the body is an envelope,
    /// `Error::Http` otherwise. Error envelopes with a 2xx status are
    /// returned as-is for the operation to classify.
    pub(crate) async fn send(
        &self,
        base: &Url,
        key: Option<&SecretString>,
        request: &ApiRequest<'_>,
    ) -> Result<ApiResponse, Error> {
        let url = Self::api_url(base)?;
        debug!(host = base.host_str().unwrap_or_default(), request = %request.label(), "POST {url}");

        let mut builder = self.http.post(url).form(&request.form());
        if let Some(key) = key {
            builder = builder.header(KEY_HEADER, key.expose_secret());
        }

        let resp = builder.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;
        trace!(%status, bytes = body.len(), "response received");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = ApiResponse::parse(body)
                .ok()
                .and_then(|r| r.message().map(str::to_owned))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(Error::Authentication { message });
        }

        if !status.is_success() {
            return match ApiResponse::parse(body.clone()) {
                Ok(envelope) if !envelope.is_success() => Ok(envelope),
                _ => Err(Error::Http {
                    status: status.as_u16(),
                    body: body.chars().take(200).collect(),
                }),
            };
        }

        ApiResponse::parse(body)
    }
}
