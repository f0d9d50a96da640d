//! HTTP client for a spreadsheet values API.
//!
//! Speaks the `GET/PUT {endpoint}/values/{range}` shape used by hosted
//! spreadsheet services, with an optional bearer token.

use async_trait::async_trait;
use dataguard_core::errors::{ExError, GuardError, Result};
use dataguard_core::MirrorConfig;
use dataguard_core_types::Sensitive;
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};

use super::{Grid, TabularStore};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Grid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: &'a Grid,
}

/// [`TabularStore`] backed by a remote spreadsheet
pub struct SheetsClient {
    http: Client,
    endpoint: Url,
    token: Option<Sensitive<String>>,
}

impl SheetsClient {
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unparseable endpoint or if the HTTP
    /// client cannot be built.
    pub fn new(config: &MirrorConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| invalid(e.to_string()))?;
        if endpoint.cannot_be_a_base() {
            return Err(invalid(format!("{} cannot be a base URL", endpoint)));
        }
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            token: config.token.clone(),
        })
    }

    fn values_url(&self, range: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| invalid(format!("{} cannot be a base URL", self.endpoint)))?
            .pop_if_empty()
            .push("values")
            .push(range);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }
}

#[async_trait]
impl TabularStore for SheetsClient {
    async fn read(&self, range: &str) -> Result<Grid> {
        let url = self.values_url(range)?;
        let response = self
            .authorize(self.http.get(url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote_error)?;
        let body: ValueRange = response.json().await.map_err(remote_error)?;
        Ok(body.values)
    }

    async fn write(&self, range: &str, values: Grid) -> Result<()> {
        let url = self.values_url(range)?;
        let body = ValueRangeBody {
            range,
            major_dimension: "ROWS",
            values: &values,
        };
        self.authorize(self.http.put(url))
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(remote_error)?;
        Ok(())
    }
}

fn invalid(reason: String) -> ExError {
    GuardError::InvalidConfig { reason }.into()
}

fn remote_error(err: reqwest::Error) -> ExError {
    GuardError::RemoteUnavailable {
        reason: err.to_string(),
    }
    .into()
}
