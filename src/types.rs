use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque ID types for type safety
pub type AreaShortName = String;
pub type UserKey = String;

/// Stable zero-based question identity, assigned from the source array at
/// load time. Never recomputed after filtering or reordering.
pub type QuestionIndex = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuizType {
    #[serde(rename = "True False")]
    TrueFalse,
    #[serde(rename = "Multiple Choice")]
    MultipleChoice,
}

/// Content language. Unknown or missing values normalize to Spanish, the
/// catalog's original language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
    Ca,
}

impl Language {
    pub fn normalize(input: Option<&str>) -> Self {
        match input.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("en") => Language::En,
            Some("ca") => Language::Ca,
            _ => Language::Es,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
            Language::Ca => "ca",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Position in the source array, assigned by the content normalizer.
    #[serde(default)]
    pub index: QuestionIndex,
    pub section: String,
    /// Human-facing question number. Not necessarily contiguous.
    pub number: u32,
    pub question: String,
    /// Literal answer text. For multiple choice this must be byte-equal to
    /// one of `options`, never a letter.
    pub answer: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, rename = "appearsIn", skip_serializing_if = "Option::is_none")]
    pub appears_in: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    /// Display name
    pub area: String,
    /// Content file reference, relative to the data base URL
    pub file: String,
    #[serde(rename = "type")]
    pub quiz_type: QuizType,
    /// Stable identifier; the persistence key and access-control unit
    #[serde(rename = "shortName")]
    pub short_name: AreaShortName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Pending,
    Correct,
    Fail,
}

/// Per-session answer bookkeeping, keyed by stable question index.
pub type QuizStatus = BTreeMap<QuestionIndex, QuestionStatus>;

/// Per-area persisted sub-record. Created lazily on first write; fields are
/// optional so partial legacy records keep deserializing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AreaRecord {
    /// Index into the session's ordered question array, not a Question.index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_question: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle_questions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle_answers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_status: Option<QuizStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_sections: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_questions: Option<Vec<QuestionIndex>>,
}

impl AreaRecord {
    pub fn is_empty(&self) -> bool {
        self == &AreaRecord::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaConfig {
    #[serde(rename = "allowedAreaShortNames")]
    pub allowed_area_short_names: Vec<AreaShortName>,
}

/// Root persisted object. One JSON blob behind one storage key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_area: Option<AreaShortName>,
    pub areas: BTreeMap<AreaShortName, AreaRecord>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub area_config_by_user: BTreeMap<UserKey, AreaConfig>,
}

impl LearningState {
    /// Drop entries that carry no information: empty per-user allow-lists
    /// are never persisted, and fully-empty area records are pruned.
    pub fn normalize(&mut self) {
        self.area_config_by_user
            .retain(|_, cfg| !cfg.allowed_area_short_names.is_empty());
        self.areas.retain(|_, record| !record.is_empty());
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Whether this state shows any evidence of prior use: a remembered
    /// area, per-area progress, or a saved area configuration.
    pub fn has_progress(&self) -> bool {
        self.current_area.is_some()
            || !self.areas.is_empty()
            || !self.area_config_by_user.is_empty()
    }
}

/// What the remote learning-state endpoint stores and returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStateRecord {
    pub scope: String,
    pub state: LearningState,
    pub updated_at: String,
}
