//! Authenticated POST with a single automatic recovery attempt.
//!
//! Every secure call runs refresh-then-retry-once: refresh the session
//! against the authentication endpoint, persist the new access token, then
//! issue the real request with the new token as bearer. There is no backoff
//! and no retry loop. An expired or invalid refresh clears the session and
//! yields `Ok(None)`; a transport failure surfaces as an error and leaves
//! the session intact (only authentication-specific failures force logout).

use std::sync::Arc;

use async_trait::async_trait;

use voucherpilot_client_core::session::SessionManager;

use crate::auth_client::{AuthApi, RefreshOutcome, TokenPair};
use crate::{GatewayError, decode_json_response, request_id};

/// Plain JSON POST transport, separated from the gateway so tests can record
/// the bearer credential each call carries.
#[async_trait]
pub trait JsonPoster: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        headers: &[(String, String)],
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpPoster {
    http: reqwest::Client,
}

impl HttpPoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JsonPoster for HttpPoster {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        headers: &[(String, String)],
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, GatewayError> {
        let mut request = self
            .http
            .post(url)
            .header("x-request-id", request_id())
            .bearer_auth(bearer)
            .json(payload);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|error| GatewayError::Request {
            message: error.to_string(),
        })?;
        decode_json_response(response).await
    }
}

#[derive(Clone)]
pub struct SecureGateway {
    auth: Arc<dyn AuthApi>,
    http: Arc<dyn JsonPoster>,
    sessions: SessionManager,
}

impl SecureGateway {
    pub fn new(auth: Arc<dyn AuthApi>, http: Arc<dyn JsonPoster>, sessions: SessionManager) -> Self {
        Self {
            auth,
            http,
            sessions,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Issues an authenticated POST. `Ok(None)` means the session was
    /// terminated (storage already cleared); the caller is expected to
    /// reset the hosting view.
    pub async fn secure_post(
        &self,
        target_url: &str,
        payload: &serde_json::Value,
        extra_headers: &[(String, String)],
    ) -> Result<Option<serde_json::Value>, GatewayError> {
        let Some(session) = self.sessions.restore() else {
            tracing::warn!(
                target: "voucherpilot.gateway",
                url = target_url,
                "secure post without a live session",
            );
            self.sessions.clear()?;
            return Ok(None);
        };

        let current = TokenPair {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        };

        let access_token = match self.auth.refresh(&current).await? {
            RefreshOutcome::Refreshed { access_token } => access_token,
            RefreshOutcome::Expired => {
                tracing::warn!(
                    target: "voucherpilot.gateway",
                    "refresh token expired or invalid; logging out",
                );
                self.sessions.clear()?;
                return Ok(None);
            }
            RefreshOutcome::Invalid => {
                tracing::warn!(
                    target: "voucherpilot.gateway",
                    "refresh response carried no access token; logging out",
                );
                self.sessions.clear()?;
                return Ok(None);
            }
        };

        // The refreshed token must be persisted before the retried call so a
        // concurrent restore never observes the stale pair.
        self.sessions
            .persist(&session.with_access_token(&access_token))?;

        let body = self
            .http
            .post_json(target_url, &access_token, extra_headers, payload)
            .await?;
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use voucherpilot_client_core::session::Session;
    use voucherpilot_client_core::settings::MemorySettingsStore;

    struct FakeAuth {
        outcome: RefreshOutcome,
        seen: Mutex<Vec<TokenPair>>,
    }

    #[async_trait]
    impl AuthApi for FakeAuth {
        async fn login(&self, _user: &str, _password: &str) -> Result<TokenPair, GatewayError> {
            Err(GatewayError::Credentials)
        }

        async fn refresh(&self, current: &TokenPair) -> Result<RefreshOutcome, GatewayError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(current.clone());
            }
            Ok(self.outcome.clone())
        }
    }

    struct RecordingPoster {
        sessions: SessionManager,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl JsonPoster for RecordingPoster {
        async fn post_json(
            &self,
            url: &str,
            bearer: &str,
            _headers: &[(String, String)],
            _payload: &serde_json::Value,
        ) -> Result<serde_json::Value, GatewayError> {
            let persisted = self
                .sessions
                .restore()
                .map(|session| session.access_token)
                .unwrap_or_default();
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((url.to_string(), bearer.to_string(), persisted));
            }
            Ok(serde_json::json!({"ok": true}))
        }
    }

    struct FailingPoster;

    #[async_trait]
    impl JsonPoster for FailingPoster {
        async fn post_json(
            &self,
            _url: &str,
            _bearer: &str,
            _headers: &[(String, String)],
            _payload: &serde_json::Value,
        ) -> Result<serde_json::Value, GatewayError> {
            Err(GatewayError::Request {
                message: "connection reset".to_string(),
            })
        }
    }

    fn sessions_with_live_session() -> SessionManager {
        let sessions = SessionManager::new(
            Arc::new(MemorySettingsStore::new()),
            Arc::new(MemorySettingsStore::new()),
        );
        sessions
            .persist(&Session {
                access_token: "A1".to_string(),
                refresh_token: "R1".to_string(),
                user_name: "alice".to_string(),
            })
            .expect("seed session");
        sessions
    }

    #[tokio::test]
    async fn expired_refresh_clears_session_and_returns_none() {
        let sessions = sessions_with_live_session();
        let gateway = SecureGateway::new(
            Arc::new(FakeAuth {
                outcome: RefreshOutcome::Expired,
                seen: Mutex::new(Vec::new()),
            }),
            Arc::new(FailingPoster),
            sessions.clone(),
        );

        let result = gateway
            .secure_post("https://finance.example.com/x", &serde_json::json!({}), &[])
            .await
            .expect("no transport error");
        assert!(result.is_none());
        assert!(sessions.restore().is_none());
    }

    #[tokio::test]
    async fn refresh_without_token_clears_session_and_returns_none() {
        let sessions = sessions_with_live_session();
        let gateway = SecureGateway::new(
            Arc::new(FakeAuth {
                outcome: RefreshOutcome::Invalid,
                seen: Mutex::new(Vec::new()),
            }),
            Arc::new(FailingPoster),
            sessions.clone(),
        );

        let result = gateway
            .secure_post("https://finance.example.com/x", &serde_json::json!({}), &[])
            .await
            .expect("no transport error");
        assert!(result.is_none());
        assert!(sessions.restore().is_none());
    }

    #[tokio::test]
    async fn retried_call_carries_the_refreshed_token_already_persisted() {
        let sessions = sessions_with_live_session();
        let auth = Arc::new(FakeAuth {
            outcome: RefreshOutcome::Refreshed {
                access_token: "A2".to_string(),
            },
            seen: Mutex::new(Vec::new()),
        });
        let poster = Arc::new(RecordingPoster {
            sessions: sessions.clone(),
            calls: Mutex::new(Vec::new()),
        });
        let gateway = SecureGateway::new(auth.clone(), poster.clone(), sessions.clone());

        let result = gateway
            .secure_post(
                "https://finance.example.com/Vouchers/SendVoucherForOCR",
                &serde_json::json!({"fileName": "invoice.pdf"}),
                &[],
            )
            .await
            .expect("success");
        assert!(result.is_some());

        let seen = auth.seen.lock().expect("seen calls");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].access_token, "A1");
        assert_eq!(seen[0].refresh_token, "R1");

        let calls = poster.calls.lock().expect("poster calls");
        assert_eq!(calls.len(), 1);
        let (url, bearer, persisted_at_call_time) = &calls[0];
        assert_eq!(url, "https://finance.example.com/Vouchers/SendVoucherForOCR");
        assert_eq!(bearer, "A2");
        // Persisted before the retried call went out, never the stale token.
        assert_eq!(persisted_at_call_time, "A2");

        let restored = sessions.restore().expect("session kept");
        assert_eq!(restored.access_token, "A2");
        assert_eq!(restored.refresh_token, "R1");
    }

    #[tokio::test]
    async fn transport_failure_keeps_the_session() {
        let sessions = sessions_with_live_session();
        let gateway = SecureGateway::new(
            Arc::new(FakeAuth {
                outcome: RefreshOutcome::Refreshed {
                    access_token: "A2".to_string(),
                },
                seen: Mutex::new(Vec::new()),
            }),
            Arc::new(FailingPoster),
            sessions.clone(),
        );

        let result = gateway
            .secure_post("https://finance.example.com/x", &serde_json::json!({}), &[])
            .await;
        assert!(matches!(result, Err(GatewayError::Request { .. })));
        assert!(sessions.restore().is_some());
    }

    #[tokio::test]
    async fn missing_session_short_circuits_to_none() {
        let sessions = SessionManager::new(
            Arc::new(MemorySettingsStore::new()),
            Arc::new(MemorySettingsStore::new()),
        );
        let gateway = SecureGateway::new(
            Arc::new(FakeAuth {
                outcome: RefreshOutcome::Expired,
                seen: Mutex::new(Vec::new()),
            }),
            Arc::new(FailingPoster),
            sessions,
        );

        let result = gateway
            .secure_post("https://finance.example.com/x", &serde_json::json!({}), &[])
            .await
            .expect("no transport error");
        assert!(result.is_none());
    }
}
