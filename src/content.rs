//! Content loading and normalization.
//!
//! Areas catalogs and per-area question sets arrive as JSON documents,
//! either a bare array or an object wrapper with optional metadata
//! (`guestAllowedAreaShortNames` for areas, `language` for questions).
//! Anything else is rejected as an invalid payload. Questions receive their
//! stable `index` here, from their position in the source array.

use crate::types::{Area, Language, Question};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;

/// Result type for content operations
pub type ContentResult<T> = Result<T, ContentError>;

/// Errors at the content boundary. All of them surface to the UI as a
/// retryable load error, never a crash.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("content request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("content request returned status {0}")]
    Status(reqwest::StatusCode),
}

/// An areas catalog after normalization.
#[derive(Debug, Clone)]
pub struct NormalizedAreas {
    pub areas: Vec<Area>,
    /// Allow-list applied to guest users; `None` means the catalog did not
    /// restrict guests.
    pub guest_allowed_short_names: Option<Vec<String>>,
}

/// A question set after normalization.
#[derive(Debug, Clone)]
pub struct NormalizedQuestions {
    pub language: Language,
    pub questions: Vec<Question>,
}

/// Parse an areas payload. Accepts a bare array or `{areas: [...]}`, keeps
/// only areas in the active language (missing language means Spanish), and
/// extracts the guest allow-list when present.
pub fn normalize_areas(data: &Value, active_language: Language) -> ContentResult<NormalizedAreas> {
    let guest_allowed_short_names = data
        .as_object()
        .and_then(|obj| obj.get("guestAllowedAreaShortNames"))
        .and_then(|raw| raw.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect::<Vec<String>>()
        });

    let raw_areas = match data {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => match obj.get("areas").and_then(|a| a.as_array()) {
            Some(items) => items.as_slice(),
            None => return Err(ContentError::InvalidPayload("areas".to_string())),
        },
        _ => return Err(ContentError::InvalidPayload("areas".to_string())),
    };

    let areas = raw_areas
        .iter()
        .map(|raw| {
            serde_json::from_value::<Area>(raw.clone())
                .map_err(|e| ContentError::InvalidPayload(format!("area entry: {}", e)))
        })
        .collect::<ContentResult<Vec<Area>>>()?
        .into_iter()
        .filter(|area| Language::normalize(area.language.as_deref()) == active_language)
        .collect();

    Ok(NormalizedAreas {
        areas,
        guest_allowed_short_names,
    })
}

/// Parse a questions payload. Accepts a bare array or `{questions: [...]}`.
/// Every question is tagged with its source-array position as `index` before
/// any filtering or reordering happens downstream.
pub fn normalize_questions(data: &Value) -> ContentResult<NormalizedQuestions> {
    let (raw_questions, language) = match data {
        Value::Array(items) => (items.as_slice(), Language::default()),
        Value::Object(obj) => match obj.get("questions").and_then(|q| q.as_array()) {
            Some(items) => {
                let language =
                    Language::normalize(obj.get("language").and_then(|l| l.as_str()));
                (items.as_slice(), language)
            }
            None => return Err(ContentError::InvalidPayload("questions".to_string())),
        },
        _ => return Err(ContentError::InvalidPayload("questions".to_string())),
    };

    let questions = raw_questions
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let mut question: Question = serde_json::from_value(raw.clone())
                .map_err(|e| ContentError::InvalidPayload(format!("question {}: {}", idx, e)))?;
            question.index = idx as u32;
            Ok(question)
        })
        .collect::<ContentResult<Vec<Question>>>()?;

    Ok(NormalizedQuestions {
        language,
        questions,
    })
}

/// Fetches content JSON with a conditional-request cache: a cached ETag is
/// sent as `If-None-Match`, and a 304 is answered from the cached body.
pub struct ContentClient {
    client: reqwest::Client,
    base_url: String,
    cache_dir: Option<PathBuf>,
}

impl ContentClient {
    pub fn new(base_url: impl Into<String>, cache_dir: Option<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            cache_dir,
        }
    }

    /// Resolve a content reference against the base URL. Absolute URLs pass
    /// through untouched.
    pub fn build_url(&self, path_or_url: &str) -> String {
        let lower = path_or_url.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return path_or_url.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if base.is_empty() {
            return path_or_url.to_string();
        }
        format!("{}/{}", base, path_or_url.trim_start_matches('/'))
    }

    /// Fetch and normalize the areas catalog.
    pub async fn fetch_areas(
        &self,
        areas_file: &str,
        active_language: Language,
    ) -> ContentResult<NormalizedAreas> {
        let data = self.fetch_json(areas_file).await?;
        normalize_areas(&data, active_language)
    }

    /// Fetch and normalize one area's question set.
    pub async fn fetch_questions(&self, area: &Area) -> ContentResult<NormalizedQuestions> {
        let data = self.fetch_json(&area.file).await?;
        normalize_questions(&data)
    }

    pub async fn fetch_json(&self, path_or_url: &str) -> ContentResult<Value> {
        let url = self.build_url(path_or_url);

        let mut request = self.client.get(&url);
        if let Some(etag) = self.cached_etag(&url) {
            request = request.header(reqwest::header::IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_MODIFIED {
            if let Some(body) = self.cached_body(&url) {
                tracing::debug!("Serving {} from content cache", url);
                return Ok(body);
            }
            // 304 without a cached body means the cache was cleared from
            // under us; refetch unconditionally.
            let retry = self.client.get(&url).send().await?;
            let status = retry.status();
            if !status.is_success() {
                return Err(ContentError::Status(status));
            }
            let body: Value = retry.json().await?;
            self.store_cache(&url, None, &body);
            return Ok(body);
        }

        if !status.is_success() {
            return Err(ContentError::Status(status));
        }

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body: Value = response.json().await?;
        self.store_cache(&url, etag.as_deref(), &body);
        Ok(body)
    }

    fn cache_paths(&self, url: &str) -> Option<(PathBuf, PathBuf)> {
        let dir = self.cache_dir.as_ref()?;
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        Some((
            dir.join(format!("{}.etag", digest)),
            dir.join(format!("{}.json", digest)),
        ))
    }

    fn cached_etag(&self, url: &str) -> Option<String> {
        let (etag_path, _) = self.cache_paths(url)?;
        std::fs::read_to_string(etag_path).ok()
    }

    fn cached_body(&self, url: &str) -> Option<Value> {
        let (_, body_path) = self.cache_paths(url)?;
        let raw = std::fs::read_to_string(body_path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn store_cache(&self, url: &str, etag: Option<&str>, body: &Value) {
        let Some((etag_path, body_path)) = self.cache_paths(url) else {
            return;
        };
        if let Some(dir) = self.cache_dir.as_ref() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Some(etag) = etag {
            let _ = std::fs::write(etag_path, etag);
        }
        if let Ok(serialized) = serde_json::to_string(body) {
            let _ = std::fs::write(body_path, serialized);
        }
    }
}
