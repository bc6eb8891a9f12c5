//! HTTP plumbing shared by the CalDAV and iCal sources.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use tracing::instrument;
use url::Url;

use crate::error::CalendarError;
use crate::retry::{with_retry, RetryConfig};

const USER_AGENT: &str = concat!("calbot/", env!("CARGO_PKG_VERSION"));

/// Credentials found in the userinfo part of a calendar address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

/// A parsed calendar address with its credentials moved out of the URL.
#[derive(Debug, Clone)]
pub struct CalendarUrl {
    pub url: Url,
    pub auth: Option<BasicAuth>,
}

impl CalendarUrl {
    pub fn parse(address: &str) -> Result<Self, CalendarError> {
        let mut url = Url::parse(address)
            .map_err(|e| CalendarError::InvalidUrl(format!("{}: {}", address, e)))?;

        match url.scheme() {
            "http" | "https" => {}
            // webcal:// is plain https for feed subscriptions
            "webcal" => {
                url = Url::parse(&address.replacen("webcal", "https", 1))
                    .map_err(|e| CalendarError::InvalidUrl(format!("{}: {}", address, e)))?;
            }
            other => {
                return Err(CalendarError::InvalidUrl(format!(
                    "unsupported scheme {}",
                    other
                )))
            }
        }

        let auth = if url.username().is_empty() {
            None
        } else {
            let username = percent_decode(url.username());
            let password = url.password().map(percent_decode);
            url.set_username("")
                .and_then(|()| url.set_password(None))
                .map_err(|()| {
                    CalendarError::InvalidUrl("cannot remove credentials from address".into())
                })?;
            Some(BasicAuth { username, password })
        };

        Ok(Self { url, auth })
    }
}

fn percent_decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s)
        .decode_utf8_lossy()
        .into_owned()
}

/// Thin wrapper around `reqwest::Client` with timeouts, basic auth and retries.
#[derive(Debug, Clone)]
pub struct CalendarHttpClient {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl CalendarHttpClient {
    pub fn new(timeout: Duration, retry: RetryConfig) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, retry })
    }

    /// Download `target` with GET; only 200 is accepted.
    #[instrument(skip(self, target), fields(url = %target.url), level = "debug")]
    pub async fn get_text(&self, target: &CalendarUrl) -> Result<String, CalendarError> {
        let this = self;
        with_retry(&self.retry, move || async move {
            this.send(target, Method::GET, None, &[StatusCode::OK]).await
        })
        .await
    }

    /// Send a CalDAV `REPORT` with `Depth: 1`; 207 and 200 are accepted.
    #[instrument(skip(self, target, body), fields(url = %target.url), level = "debug")]
    pub async fn report(&self, target: &CalendarUrl, body: &str) -> Result<String, CalendarError> {
        let this = self;
        let method = Method::from_bytes(b"REPORT")
            .map_err(|e| CalendarError::Network(e.to_string()))?;
        let method = &method;
        with_retry(&self.retry, move || async move {
            this.send(
                target,
                method.clone(),
                Some(body),
                &[StatusCode::MULTI_STATUS, StatusCode::OK],
            )
            .await
        })
        .await
    }

    async fn send(
        &self,
        target: &CalendarUrl,
        method: Method,
        body: Option<&str>,
        accepted: &[StatusCode],
    ) -> Result<String, CalendarError> {
        let mut request = self.client.request(method, target.url.clone());

        if let Some(auth) = &target.auth {
            request = request.basic_auth(&auth.username, auth.password.as_ref());
        }

        if let Some(body) = body {
            request = request
                .header("Depth", "1")
                .header("Content-Type", "application/xml; charset=utf-8")
                .body(body.to_string());
        }

        let response = request.send().await?;
        let status = response.status();

        if !accepted.contains(&status) {
            return Err(CalendarError::Status {
                status: status.as_u16(),
                url: target.url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}
