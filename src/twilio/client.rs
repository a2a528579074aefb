//! HTTP client for the Twilio REST API.
//!
//! Every request authenticates with HTTP basic auth `(account_sid, token)`.
//! The token is the current call's token when one was supplied, otherwise the
//! configured default.

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::context;
use crate::VERSION;

/// Twilio REST API version segment.
pub const API_VERSION: &str = "2010-04-01";

/// User agent string for API requests.
fn user_agent() -> String {
    format!("twilio-mcp-rs/{} (rust)", VERSION)
}

/// Error body returned by Twilio.
#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    more_info: Option<String>,
}

/// API client for Twilio.
#[derive(Debug, Clone)]
pub struct TwilioClient {
    client: Client,
    api_url: String,
    account_sid: Option<String>,
    default_token: Option<String>,
}

impl TwilioClient {
    /// Create a client from server configuration.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_credentials(
            config.api_url.clone(),
            config.account_sid.clone(),
            config.auth_token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Create a client with explicit credentials.
    pub fn with_credentials(
        api_url: String,
        account_sid: Option<String>,
        default_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            account_sid,
            default_token,
        })
    }

    /// Get the API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// The configured account SID.
    pub fn account_sid(&self) -> Result<&str> {
        self.account_sid
            .as_deref()
            .ok_or_else(|| Error::CredentialsNotFound("TWILIO_ACCOUNT_SID is not configured".to_string()))
    }

    /// Token for the call in flight, falling back to the configured default.
    pub fn auth_token(&self) -> Result<String> {
        context::current_token()
            .filter(|t| !t.is_empty())
            .or_else(|| self.default_token.clone())
            .ok_or_else(|| {
                Error::Auth(
                    "Authentication token not found in request context or environment".to_string(),
                )
            })
    }

    /// URL of an account-scoped resource, e.g. `/Messages.json`.
    fn account_url(&self, sid: &str, path: &str) -> String {
        format!("{}/{}/Accounts/{}{}", self.api_url, API_VERSION, sid, path)
    }

    /// GET an account-scoped resource.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let sid = self.account_sid()?;
        let token = self.auth_token()?;
        let url = self.account_url(sid, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(sid, Some(token))
            .query(query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// POST a form to an account-scoped resource.
    pub async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<Value> {
        let sid = self.account_sid()?;
        let token = self.auth_token()?;
        let url = self.account_url(sid, path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .basic_auth(sid, Some(token))
            .form(form)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// DELETE an account-scoped resource.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let sid = self.account_sid()?;
        let token = self.auth_token()?;
        let url = self.account_url(sid, path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .basic_auth(sid, Some(token))
            .send()
            .await?;

        self.handle_response(response).await.map(|_| ())
    }

    /// Handle API response, extracting errors.
    async fn handle_response(&self, response: Response) -> Result<Value> {
        let status = response.status();

        if !status.is_success() {
            let status_text = status.canonical_reason().unwrap_or("Unknown");
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), status_text, error_message(&body)));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse response: {}", e)))
    }
}

/// Human-readable message from a Twilio error body, or the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<TwilioErrorBody>(body) {
        Ok(TwilioErrorBody {
            message: Some(message),
            code,
            more_info,
        }) => {
            let mut text = message;
            if let Some(code) = code {
                text.push_str(&format!(" (code {})", code));
            }
            if let Some(info) = more_info {
                text.push_str(&format!(" see {}", info));
            }
            text
        }
        _ => body.to_string(),
    }
}
