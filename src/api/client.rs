//! API client for the login and registration endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use tracing::debug;

use crate::models::{ApiReply, UserProfile};
use crate::session::{SessionCookie, SessionCookieCache};

use super::ApiError;

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Typed client for the two authentication endpoints.
///
/// Every request carries the stored cookies for the API host, and every
/// response is fed back into the cookie cache before the body is even
/// looked at - the server may rotate session cookies on failed attempts.
pub struct AuthApiClient {
    client: Client,
    base_url: String,
    host: String,
    cookies: Arc<SessionCookieCache>,
}

impl AuthApiClient {
    pub fn new(base_url: &str, cookies: Arc<SessionCookieCache>) -> Result<Self> {
        let parsed = reqwest::Url::parse(base_url).context("Invalid API base URL")?;
        let host = parsed
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("API base URL has no host"))?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            host,
            cookies,
        })
    }

    /// Host the session cookies are scoped to.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ApiReply<UserProfile>, ApiError> {
        self.post_form("user/login", &[("username", username), ("password", password)])
            .await
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        repassword: &str,
    ) -> Result<ApiReply<UserProfile>, ApiError> {
        self.post_form(
            "user/register",
            &[
                ("username", username),
                ("password", password),
                ("repassword", repassword),
            ],
        )
        .await
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<ApiReply<UserProfile>, ApiError> {
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self.client.post(&url).form(form);

        let cookie_header = self
            .cookies
            .cookies_for_request(&self.host)
            .iter()
            .map(|c| c.pair())
            .collect::<Vec<_>>()
            .join("; ");
        if !cookie_header.is_empty() {
            request = request.header(header::COOKIE, cookie_header);
        }

        let response = request.send().await?;

        // Record received cookies before any status/body handling
        self.record_response_cookies(&response);

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    fn record_response_cookies(&self, response: &reqwest::Response) {
        let cookies: Vec<SessionCookie> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| SessionCookie::parse_set_cookie(&self.host, value))
            .collect();

        if !cookies.is_empty() {
            debug!(count = cookies.len(), host = %self.host, "Recording response cookies");
        }
        self.cookies.record_response_cookies(&self.host, cookies);
    }
}
