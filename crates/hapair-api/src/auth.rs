// API key generation
//
// Exchanges a username/password for an API key. Credentials travel in the
// form body, never in the query string, so they stay out of access logs.

use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::client::DeviceClient;
use crate::error::Error;
use crate::request::ApiRequest;

impl DeviceClient {
    /// Generate an API key for `username` on the device at `base`.
    ///
    /// An error envelope or HTTP 401/403 is `Error::Authentication`; bad
    /// credentials are not transient, so callers should not retry.
    pub async fn generate_key(
        &self,
        base: &Url,
        username: &str,
        password: &SecretString,
    ) -> Result<SecretString, Error> {
        let request = ApiRequest::Keygen { username, password };
        let resp = self
            .send(base, None, &request)
            .await?
            .into_result(|message, _| Error::Authentication { message })?;

        let key = resp.find_text("result/key")?.ok_or_else(|| Error::Malformed {
            message: "keygen response has no <key>".into(),
            body: String::new(),
        })?;

        debug!(host = base.host_str().unwrap_or_default(), "API key issued");
        Ok(SecretString::from(key))
    }
}
