// Candidate configuration reads and writes.

use secrecy::SecretString;
use url::Url;

use crate::client::DeviceClient;
use crate::error::Error;
use crate::request::{ApiRequest, ConfigAction, XPath};
use crate::response::ApiResponse;

impl DeviceClient {
    /// Read the candidate configuration at `xpath`.
    ///
    /// A missing object is `Error::ObjectNotFound`; callers probing for
    /// existing state can branch on [`Error::is_not_found`].
    pub async fn get_config(
        &self,
        base: &Url,
        key: &SecretString,
        xpath: &XPath,
    ) -> Result<ApiResponse, Error> {
        let request = ApiRequest::Config {
            action: ConfigAction::Get,
            xpath,
            element: None,
        };
        let resp = self.send(base, Some(key), &request).await?;
        if resp.is_object_missing() {
            return Err(Error::ObjectNotFound {
                xpath: xpath.to_string(),
            });
        }
        resp.into_result(|message, code| Error::Command { message, code })
    }

    /// Merge `element` into the candidate configuration at `xpath`.
    ///
    /// A rejection is `Error::ConfigRejected` carrying the device text.
    pub async fn set_config(
        &self,
        base: &Url,
        key: &SecretString,
        xpath: &XPath,
        element: &str,
    ) -> Result<ApiResponse, Error> {
        self.write_config(base, key, ConfigAction::Set, xpath, element)
            .await
    }

    /// Replace the candidate configuration at `xpath` with `element`.
    pub async fn edit_config(
        &self,
        base: &Url,
        key: &SecretString,
        xpath: &XPath,
        element: &str,
    ) -> Result<ApiResponse, Error> {
        self.write_config(base, key, ConfigAction::Edit, xpath, element)
            .await
    }

    async fn write_config(
        &self,
        base: &Url,
        key: &SecretString,
        action: ConfigAction,
        xpath: &XPath,
        element: &str,
    ) -> Result<ApiResponse, Error> {
        let request = ApiRequest::Config {
            action,
            xpath,
            element: Some(element),
        };
        self.send(base, Some(key), &request)
            .await?
            .into_result(|message, code| Error::ConfigRejected { message, code })
    }
}
