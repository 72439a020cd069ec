//! Authentication service client: login and token refresh against the
//! agency-selected endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{GatewayError, decode_json_response, normalize_base_url, request_id};

pub const LOGIN_PATH: &str = "/login";
pub const REFRESH_PATH: &str = "/auth/refresh-token";
pub const LEGACY_REFRESH_PATH: &str = "/proxy/refresh-token";

/// The refresh route reports an invalid or expired refresh token with this
/// status instead of a 4xx.
pub const STATUS_REFRESH_EXPIRED: u16 = 203;

/// Fixed lifetime the service expects echoed back on refresh requests.
pub const REFRESH_EXPIRES_IN_SECONDS: u32 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The service issued a fresh access token; the refresh token stays.
    Refreshed { access_token: String },
    /// Explicit expired/invalid signal — terminal for the session.
    Expired,
    /// Transport-level success but no usable token in the body — treated
    /// identically to an expired session.
    Invalid,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "userName")]
    user_name: &'a str,
    password: &'a str,
    // The service requires this (misspelled) field to be present.
    #[serde(rename = "loginRsponse")]
    login_response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<TokenPair>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    token: RefreshTokenBody<'a>,
}

#[derive(Debug, Serialize)]
struct RefreshTokenBody<'a> {
    access_token: &'a str,
    refresh_token: &'a str,
    expires_in: u32,
}

/// Remote authentication surface, a trait so the secure gateway can be
/// exercised against fakes.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a token pair. A transport-level success
    /// with no usable token is a credentials error, never a stored session.
    async fn login(&self, user_name: &str, password: &str) -> Result<TokenPair, GatewayError>;

    async fn refresh(&self, current: &TokenPair) -> Result<RefreshOutcome, GatewayError>;
}

#[derive(Debug, Clone)]
pub struct AuthClient {
    base_url: String,
    http: reqwest::Client,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            http: reqwest::Client::new(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_refresh(
        &self,
        path: &str,
        current: &TokenPair,
    ) -> Result<reqwest::Response, GatewayError> {
        let request = RefreshRequest {
            token: RefreshTokenBody {
                access_token: &current.access_token,
                refresh_token: &current.refresh_token,
                expires_in: REFRESH_EXPIRES_IN_SECONDS,
            },
        };
        self.http
            .post(self.endpoint(path))
            .header("x-request-id", request_id())
            .json(&request)
            .send()
            .await
            .map_err(|error| GatewayError::Request {
                message: error.to_string(),
            })
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, user_name: &str, password: &str) -> Result<TokenPair, GatewayError> {
        let request = LoginRequest {
            user_name,
            password,
            login_response: serde_json::json!({}),
        };
        let response = self
            .http
            .post(self.endpoint(LOGIN_PATH))
            .header("x-request-id", request_id())
            .json(&request)
            .send()
            .await
            .map_err(|error| GatewayError::Request {
                message: error.to_string(),
            })?;

        let body: LoginResponse = decode_json_response(response).await?;
        token_pair_from_login(body).ok_or(GatewayError::Credentials)
    }

    async fn refresh(&self, current: &TokenPair) -> Result<RefreshOutcome, GatewayError> {
        let mut response = self.post_refresh(REFRESH_PATH, current).await?;
        if response.status().as_u16() == 404 {
            // Older deployments only expose the proxy route.
            tracing::debug!(
                target: "voucherpilot.auth",
                "refresh route missing; falling back to legacy proxy route",
            );
            response = self.post_refresh(LEGACY_REFRESH_PATH, current).await?;
        }

        let status = response.status();
        if status.as_u16() == STATUS_REFRESH_EXPIRED {
            return Ok(RefreshOutcome::Expired);
        }

        let body: serde_json::Value = decode_json_response(response).await?;
        Ok(refresh_outcome_from_body(&body))
    }
}

fn token_pair_from_login(body: LoginResponse) -> Option<TokenPair> {
    body.token
        .filter(|pair| !pair.access_token.is_empty() && !pair.refresh_token.is_empty())
}

/// Extracts the refreshed access token from a 2xx refresh body. The service
/// has shipped both a flat and a nested shape.
#[must_use]
pub fn refresh_outcome_from_body(body: &serde_json::Value) -> RefreshOutcome {
    let access_token = body
        .get("access_token")
        .or_else(|| body.get("token").and_then(|token| token.get("access_token")))
        .and_then(|value| value.as_str())
        .filter(|value| !value.is_empty());

    match access_token {
        Some(access_token) => RefreshOutcome::Refreshed {
            access_token: access_token.to_string(),
        },
        None => RefreshOutcome::Invalid,
    }
}
