//! Learning-state backend client.

use crate::types::{LearningState, LearningStateRecord};
use async_trait::async_trait;
use serde::Serialize;

/// Errors talking to the learning-state backend. A missing record is not an
/// error; `fetch` answers `None` for it.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("learning-state request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("learning-state request returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Remote persistence for one user's learning state, keyed by scope.
#[async_trait]
pub trait LearningStateApi: Send + Sync {
    async fn fetch(&self, scope: &str) -> Result<Option<LearningStateRecord>, RemoteError>;

    async fn store(
        &self,
        scope: &str,
        state: &LearningState,
        client_updated_at: Option<&str>,
    ) -> Result<(), RemoteError>;
}

#[derive(Serialize)]
struct StoreRequest<'a> {
    state: &'a LearningState,
    #[serde(rename = "clientUpdatedAt", skip_serializing_if = "Option::is_none")]
    client_updated_at: Option<&'a str>,
}

/// HTTP implementation against the `/learning-state` endpoint, carrying a
/// bearer credential.
pub struct HttpLearningStateApi {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpLearningStateApi {
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer_token,
        }
    }

    fn endpoint(&self, scope: &str) -> String {
        format!(
            "{}/learning-state?scope={}",
            self.base_url.trim_end_matches('/'),
            scope
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl LearningStateApi for HttpLearningStateApi {
    async fn fetch(&self, scope: &str) -> Result<Option<LearningStateRecord>, RemoteError> {
        let response = self
            .authorize(self.client.get(self.endpoint(scope)))
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::Status(status));
        }
        let record: LearningStateRecord = response.json().await?;
        Ok(Some(record))
    }

    async fn store(
        &self,
        scope: &str,
        state: &LearningState,
        client_updated_at: Option<&str>,
    ) -> Result<(), RemoteError> {
        let body = StoreRequest {
            state,
            client_updated_at,
        };
        let response = self
            .authorize(self.client.put(self.endpoint(scope)))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_includes_scope() {
        let api = HttpLearningStateApi::new("http://localhost:3001/", None);
        assert_eq!(
            api.endpoint("global"),
            "http://localhost:3001/learning-state?scope=global"
        );
    }

    #[test]
    fn test_store_request_omits_absent_client_timestamp() {
        let state = LearningState::default();
        let without = StoreRequest {
            state: &state,
            client_updated_at: None,
        };
        let json = serde_json::to_value(&without).unwrap();
        assert!(json.get("clientUpdatedAt").is_none());

        let with = StoreRequest {
            state: &state,
            client_updated_at: Some("2026-08-28T10:00:00Z"),
        };
        let json = serde_json::to_value(&with).unwrap();
        assert_eq!(
            json["clientUpdatedAt"],
            serde_json::json!("2026-08-28T10:00:00Z")
        );
    }
}
