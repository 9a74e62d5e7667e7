//! HTTP client for the platform's authorization and notification endpoints.
//!
//! `POST {base}/authorize` takes `{actor, matter_id, capability}` and answers
//! `{allowed}`. `POST {base}/notifications` takes a history event as JSON;
//! any 2xx answer counts as delivered.

use std::time::Duration;

use async_trait::async_trait;
use coordination::{
    Authorizer, Capability, CoordinationError, HistoryEvent, MatterId, NotificationHook, UserId,
};
use serde::{Deserialize, Serialize};

use crate::PlatformError;

/// Connection settings for [`HttpPlatformClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSettings {
    /// Base URL, e.g. `https://platform.example.com/api`. A trailing slash is ignored.
    pub base_url: String,
    pub timeout: Duration,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
    actor: &'a str,
    matter_id: String,
    capability: &'static str,
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    allowed: bool,
}

/// Calls the platform over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpPlatformClient {
    pub fn new(settings: PlatformSettings) -> Result<Self, PlatformError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(PlatformError::InvalidBaseUrl(settings.base_url));
        }
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(PlatformError::Client)?;
        Ok(Self {
            http,
            base_url,
            bearer_token: settings.bearer_token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, PlatformError> {
        let mut request = self.http.post(endpoint).json(body);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|source| PlatformError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Authorizer for HttpPlatformClient {
    async fn can_act(
        &self,
        actor: &UserId,
        matter: MatterId,
        capability: Capability,
    ) -> Result<bool, CoordinationError> {
        let endpoint = self.endpoint("authorize");
        let body = AuthorizeRequest {
            actor: actor.as_str(),
            matter_id: matter.to_string(),
            capability: capability.as_str(),
        };
        let response = self.post(&endpoint, &body).await?;
        let answer: AuthorizeResponse =
            response
                .json()
                .await
                .map_err(|source| PlatformError::Transport {
                    endpoint: endpoint.clone(),
                    source,
                })?;
        tracing::debug!(
            matter_id = %matter,
            actor = %actor,
            capability = %capability,
            allowed = answer.allowed,
            "authorization answered"
        );
        Ok(answer.allowed)
    }
}

#[async_trait]
impl NotificationHook for HttpPlatformClient {
    async fn notify(&self, event: &HistoryEvent) -> Result<(), CoordinationError> {
        let endpoint = self.endpoint("notifications");
        self.post(&endpoint, event).await?;
        tracing::debug!(event_id = %event.id, action = %event.action, "notification delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base: &str) -> PlatformSettings {
        PlatformSettings {
            base_url: base.into(),
            timeout: Duration::from_secs(1),
            bearer_token: None,
        }
    }

    #[test]
    fn endpoints_ignore_trailing_slashes() {
        let client = HttpPlatformClient::new(settings("http://localhost:9000/api/")).unwrap();
        assert_eq!(client.endpoint("authorize"), "http://localhost:9000/api/authorize");
    }

    #[test]
    fn non_http_base_urls_are_rejected() {
        let err = HttpPlatformClient::new(settings("localhost:9000")).unwrap_err();
        assert!(matches!(err, PlatformError::InvalidBaseUrl(_)));
    }
}
