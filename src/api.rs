//! HTTP endpoints for the learning-state backend.
//!
//! One user's learning state lives under (subject, scope). Identity comes
//! from the bearer token's decoded payload; without a subject every request
//! is a 401. Records are held in memory and snapshotted to a JSON file on
//! every write so restarts keep state.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::{claims_from_authorization, TokenClaims};
use crate::types::{LearningState, LearningStateRecord};

/// Shared server state: the record map plus an optional snapshot location.
pub struct ServerState {
    records: RwLock<HashMap<RecordKey, StoredRecord>>,
    snapshot_path: Option<PathBuf>,
}

type RecordKey = (String, String);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    state: LearningState,
    #[serde(rename = "updatedAt")]
    updated_at: String,
    #[serde(rename = "clientUpdatedAt", skip_serializing_if = "Option::is_none")]
    client_updated_at: Option<String>,
}

impl ServerState {
    pub fn new(snapshot_path: Option<PathBuf>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            snapshot_path,
        }
    }

    /// Load the snapshot file if one exists. A missing or unreadable file is
    /// an empty server, not an error.
    pub fn with_snapshot(snapshot_path: PathBuf) -> Self {
        let records = std::fs::read_to_string(&snapshot_path)
            .ok()
            .and_then(|raw| serde_json::from_str::<Vec<SnapshotEntry>>(&raw).ok())
            .map(|entries| {
                entries
                    .into_iter()
                    .map(|e| ((e.sub, e.scope), e.record))
                    .collect::<HashMap<RecordKey, StoredRecord>>()
            })
            .unwrap_or_default();
        if !records.is_empty() {
            tracing::info!(count = records.len(), "Loaded learning-state snapshot");
        }
        Self {
            records: RwLock::new(records),
            snapshot_path: Some(snapshot_path),
        }
    }

    async fn persist_snapshot(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let records = self.records.read().await;
        let entries: Vec<SnapshotEntry> = records
            .iter()
            .map(|((sub, scope), record)| SnapshotEntry {
                sub: sub.clone(),
                scope: scope.clone(),
                record: record.clone(),
            })
            .collect();
        drop(records);
        match serde_json::to_string_pretty(&entries) {
            Ok(serialized) => {
                if let Err(e) = tokio::fs::write(path, serialized).await {
                    tracing::warn!("Failed to write learning-state snapshot: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize learning-state snapshot: {}", e),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    sub: String,
    scope: String,
    #[serde(flatten)]
    record: StoredRecord,
}

#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_scope() -> String {
    "global".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PutLearningState {
    pub state: LearningState,
    #[serde(rename = "clientUpdatedAt")]
    pub client_updated_at: Option<String>,
}

#[derive(Serialize)]
struct PutResponse {
    scope: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
}

fn identity(headers: &HeaderMap) -> Option<TokenClaims> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(claims_from_authorization)
}

fn error_body(status: StatusCode, code: &str) -> Response {
    (status, Json(serde_json::json!({ "error": code }))).into_response()
}

/// GET /learning-state?scope=
pub async fn get_learning_state(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ScopeQuery>,
    headers: HeaderMap,
) -> Response {
    let Some(claims) = identity(&headers) else {
        return error_body(StatusCode::UNAUTHORIZED, "unauthorized");
    };

    let records = state.records.read().await;
    match records.get(&(claims.sub.clone(), query.scope.clone())) {
        Some(record) => Json(LearningStateRecord {
            scope: query.scope,
            state: record.state.clone(),
            updated_at: record.updated_at.clone(),
        })
        .into_response(),
        None => error_body(StatusCode::NOT_FOUND, "not_found"),
    }
}

/// PUT /learning-state?scope=
pub async fn put_learning_state(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ScopeQuery>,
    headers: HeaderMap,
    body: Result<Json<PutLearningState>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Some(claims) = identity(&headers) else {
        return error_body(StatusCode::UNAUTHORIZED, "unauthorized");
    };
    let Ok(Json(payload)) = body else {
        return error_body(StatusCode::BAD_REQUEST, "invalid_body");
    };

    let updated_at = chrono::Utc::now().to_rfc3339();
    let record = StoredRecord {
        state: payload.state.normalized(),
        updated_at: updated_at.clone(),
        client_updated_at: payload.client_updated_at,
    };

    state
        .records
        .write()
        .await
        .insert((claims.sub.clone(), query.scope.clone()), record);
    tracing::debug!(sub = %claims.sub, scope = %query.scope, "Stored learning state");

    state.persist_snapshot().await;

    Json(PutResponse {
        scope: query.scope,
        updated_at,
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;

    fn bearer_header(sub: &str) -> HeaderMap {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{}"}}"#, sub));
        let token = format!("e30.{}.sig", payload);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", token).parse().unwrap(),
        );
        headers
    }

    fn state_with_language(language: Language) -> LearningState {
        LearningState {
            language: Some(language),
            ..LearningState::default()
        }
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let server = Arc::new(ServerState::new(None));
        let headers = bearer_header("user-1");

        let put = put_learning_state(
            State(Arc::clone(&server)),
            Query(ScopeQuery {
                scope: "global".to_string(),
            }),
            headers.clone(),
            Ok(Json(PutLearningState {
                state: state_with_language(Language::En),
                client_updated_at: Some("2026-08-28T09:00:00Z".to_string()),
            })),
        )
        .await;
        assert_eq!(put.status(), StatusCode::OK);

        let get = get_learning_state(
            State(server),
            Query(ScopeQuery {
                scope: "global".to_string(),
            }),
            headers,
        )
        .await;
        assert_eq!(get.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_records_are_keyed_per_user_and_scope() {
        let server = Arc::new(ServerState::new(None));

        put_learning_state(
            State(Arc::clone(&server)),
            Query(ScopeQuery {
                scope: "global".to_string(),
            }),
            bearer_header("user-1"),
            Ok(Json(PutLearningState {
                state: state_with_language(Language::Ca),
                client_updated_at: None,
            })),
        )
        .await;

        let other_user = get_learning_state(
            State(Arc::clone(&server)),
            Query(ScopeQuery {
                scope: "global".to_string(),
            }),
            bearer_header("user-2"),
        )
        .await;
        assert_eq!(other_user.status(), StatusCode::NOT_FOUND);

        let other_scope = get_learning_state(
            State(server),
            Query(ScopeQuery {
                scope: "exam-prep".to_string(),
            }),
            bearer_header("user-1"),
        )
        .await;
        assert_eq!(other_scope.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let server = Arc::new(ServerState::new(None));
        let response = get_learning_state(
            State(server),
            Query(ScopeQuery {
                scope: "global".to_string(),
            }),
            HeaderMap::new(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_snapshot_round_trips_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learning-state.json");

        let server = Arc::new(ServerState::new(Some(path.clone())));
        put_learning_state(
            State(Arc::clone(&server)),
            Query(ScopeQuery {
                scope: "global".to_string(),
            }),
            bearer_header("user-1"),
            Ok(Json(PutLearningState {
                state: state_with_language(Language::Es),
                client_updated_at: None,
            })),
        )
        .await;

        let restarted = ServerState::with_snapshot(path);
        let records = restarted.records.read().await;
        let record = records
            .get(&("user-1".to_string(), "global".to_string()))
            .unwrap();
        assert_eq!(record.state.language, Some(Language::Es));
    }
}
