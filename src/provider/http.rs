use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::{PixelPerfectError, Result};
use crate::reference::Provider;

/// Token-authenticated JSON client for one provider's REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    provider: Provider,
    auth_header: HeaderName,
    token: HeaderValue,
}

impl ApiClient {
    pub fn new(
        provider: Provider,
        auth_header: &'static str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        if token.is_empty() {
            return Err(PixelPerfectError::Config(format!(
                "configuration.{} must be a non-empty string",
                provider.token_key()
            )));
        }
        let mut token = HeaderValue::from_str(token).map_err(|_| {
            PixelPerfectError::Config(format!(
                "configuration.{} contains characters not allowed in a header",
                provider.token_key()
            ))
        })?;
        token.set_sensitive(true);

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(PixelPerfectError::Network)?;

        Ok(Self {
            http,
            provider,
            auth_header: HeaderName::from_static(auth_header),
            token,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// GETs `url` with the auth header and decodes the body, failing on a
    /// non-success status or a non-empty `err` field.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {url}");
        let response = self
            .http
            .get(url)
            .header(self.auth_header.clone(), self.token.clone())
            .send()
            .await
            .map_err(PixelPerfectError::Network)?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        if !status.is_success() {
            // The status alone is reported if the error body is unreadable.
            let body = response.text().await.unwrap_or_default();
            return Err(PixelPerfectError::remote(
                self.provider,
                Some(status),
                error_message(status, &body, retry_after.as_deref()),
            ));
        }

        let body = response.text().await.map_err(PixelPerfectError::Network)?;
        let value: Value = serde_json::from_str(&body)?;
        if let Some(err) = payload_error(&value) {
            return Err(PixelPerfectError::remote(self.provider, Some(status), err));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Fetches raw bytes from a (pre-signed) render URL; no auth header.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        debug!("downloading {url}");
        let response = self.http.get(url).send().await.map_err(PixelPerfectError::Network)?;

        let status = response.status();

        if status.is_success() {
            return response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(PixelPerfectError::Network);
        }

        let body = response.text().await.unwrap_or_default();
        Err(PixelPerfectError::remote(
            self.provider,
            Some(status),
            format!(
                "failed to download image (status {}): {}",
                status.as_u16(),
                body
            ),
        ))
    }
}

/// Non-empty `err` (or `error`) field of a JSON payload.
fn payload_error(value: &Value) -> Option<String> {
    let err = value.get("err").or_else(|| value.get("error"))?;
    match err {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn error_message(status: StatusCode, body: &str, retry_after: Option<&str>) -> String {
    let fallback = format!("API returned status {}", status.as_u16());
    let from_body = serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(payload_error);

    match (status, retry_after, from_body) {
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), Some(msg)) => {
            format!("{msg} (rate limited, retry after {retry}s)")
        }
        (StatusCode::TOO_MANY_REQUESTS, Some(retry), None) => {
            format!("rate limited, retry after {retry}s")
        }
        (_, _, Some(msg)) => msg,
        _ => fallback,
    }
}
