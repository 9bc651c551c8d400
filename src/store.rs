//! Local persistence for the learning state.
//!
//! One serialized [`LearningState`] blob lives behind one key (a JSON file,
//! or memory in tests). Every read deserializes and normalizes; corrupt or
//! unrecognized data degrades to the empty default instead of erroring.
//! Every write re-normalizes, persists, and synchronously notifies
//! registered subscribers so in-process consumers can react without polling.
//!
//! Mutations are read-modify-write over the whole root object. The UI side
//! is single-threaded and user-input driven, so no finer-grained update
//! primitive is needed.

use crate::types::{
    AreaConfig, AreaRecord, AreaShortName, Language, LearningState, QuestionIndex, QuizStatus,
    UserKey,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

type Listener = Box<dyn Fn(&LearningState) + Send + Sync>;

/// Handle for unregistering a change subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

enum Backend {
    File(PathBuf),
    Memory(Mutex<Option<String>>),
}

pub struct Store {
    backend: Backend,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: Mutex<u64>,
}

impl Store {
    /// A store persisting to the given JSON file. The file is created on
    /// first write; a missing file reads as the empty default state.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Backend::File(path.into()))
    }

    /// An in-memory store, used by tests and local-only trial runs.
    pub fn in_memory() -> Self {
        Self::new(Backend::Memory(Mutex::new(None)))
    }

    fn new(backend: Backend) -> Self {
        Self {
            backend,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: Mutex::new(0),
        }
    }

    // =========================================================================
    // Snapshot / replace interface (used by the sync coordinator)
    // =========================================================================

    /// The current normalized state.
    pub fn snapshot(&self) -> LearningState {
        self.read()
    }

    /// Replace local state wholesale, e.g. with a remote bootstrap snapshot.
    pub fn replace(&self, state: LearningState) {
        self.write(state.normalized());
    }

    /// Drop all persisted state.
    pub fn clear(&self) {
        self.write(LearningState::default());
    }

    // =========================================================================
    // Root fields
    // =========================================================================

    pub fn language(&self) -> Option<Language> {
        self.read().language
    }

    pub fn set_language(&self, language: Language) {
        self.update(|state| state.language = Some(language));
    }

    pub fn current_area(&self) -> Option<AreaShortName> {
        self.read().current_area
    }

    pub fn set_current_area(&self, area: Option<AreaShortName>) {
        self.update(|state| state.current_area = area);
    }

    // =========================================================================
    // Per-area records
    // =========================================================================

    pub fn area_current_question(&self, area: &str) -> Option<u32> {
        self.area(area).and_then(|r| r.current_question)
    }

    pub fn set_area_current_question(&self, area: &str, position: Option<u32>) {
        self.update_area(area, |record| record.current_question = position);
    }

    pub fn area_shuffle_questions(&self, area: &str) -> Option<bool> {
        self.area(area).and_then(|r| r.shuffle_questions)
    }

    pub fn set_area_shuffle_questions(&self, area: &str, shuffle: bool) {
        self.update_area(area, |record| record.shuffle_questions = Some(shuffle));
    }

    pub fn area_shuffle_answers(&self, area: &str) -> Option<bool> {
        self.area(area).and_then(|r| r.shuffle_answers)
    }

    pub fn set_area_shuffle_answers(&self, area: &str, shuffle: bool) {
        self.update_area(area, |record| record.shuffle_answers = Some(shuffle));
    }

    pub fn area_quiz_status(&self, area: &str) -> Option<QuizStatus> {
        self.area(area).and_then(|r| r.quiz_status)
    }

    pub fn set_area_quiz_status(&self, area: &str, status: Option<QuizStatus>) {
        self.update_area(area, |record| record.quiz_status = status);
    }

    pub fn area_selected_sections(&self, area: &str) -> Option<Vec<String>> {
        self.area(area).and_then(|r| r.selected_sections)
    }

    pub fn set_area_selected_sections(&self, area: &str, sections: Option<Vec<String>>) {
        self.update_area(area, |record| record.selected_sections = sections);
    }

    pub fn area_selected_questions(&self, area: &str) -> Option<Vec<QuestionIndex>> {
        self.area(area).and_then(|r| r.selected_questions)
    }

    pub fn set_area_selected_questions(&self, area: &str, questions: Option<Vec<QuestionIndex>>) {
        self.update_area(area, |record| record.selected_questions = questions);
    }

    /// Delete one area's record, e.g. on explicit quiz reset.
    pub fn clear_area(&self, area: &str) {
        self.update(|state| {
            state.areas.remove(area);
        });
    }

    // =========================================================================
    // Per-user area configuration
    // =========================================================================

    pub fn user_allowed_areas(&self, user_key: &str) -> Option<Vec<AreaShortName>> {
        self.read()
            .area_config_by_user
            .get(user_key)
            .map(|cfg| cfg.allowed_area_short_names.clone())
    }

    /// Save a user's allow-list, deduplicating by first occurrence. An empty
    /// list removes the entry; empty allow-lists are never persisted.
    pub fn set_user_allowed_areas(&self, user_key: &UserKey, areas: Vec<AreaShortName>) {
        let mut seen = HashSet::new();
        let deduped: Vec<AreaShortName> = areas
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect();
        self.update(|state| {
            if deduped.is_empty() {
                state.area_config_by_user.remove(user_key);
            } else {
                state.area_config_by_user.insert(
                    user_key.clone(),
                    AreaConfig {
                        allowed_area_short_names: deduped.clone(),
                    },
                );
            }
        });
    }

    // =========================================================================
    // Change notification
    // =========================================================================

    /// Register a callback invoked synchronously after every write, with the
    /// normalized state that was just persisted.
    pub fn subscribe(
        &self,
        listener: impl Fn(&LearningState) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let mut next_id = self.next_listener_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.listeners
            .lock()
            .unwrap()
            .push((id, Box::new(listener)));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .lock()
            .unwrap()
            .retain(|(listener_id, _)| *listener_id != id.0);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn area(&self, area: &str) -> Option<AreaRecord> {
        self.read().areas.get(area).cloned()
    }

    fn update_area(&self, area: &str, f: impl FnOnce(&mut AreaRecord)) {
        self.update(|state| {
            let record = state.areas.entry(area.to_string()).or_default();
            f(record);
        });
    }

    fn update(&self, f: impl FnOnce(&mut LearningState)) {
        let mut state = self.read();
        f(&mut state);
        self.write(state);
    }

    fn read(&self) -> LearningState {
        let raw = match &self.backend {
            Backend::File(path) => match std::fs::read_to_string(path) {
                Ok(contents) => Some(contents),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    tracing::warn!("Failed to read learning state from {:?}: {}", path, e);
                    None
                }
            },
            Backend::Memory(cell) => cell.lock().unwrap().clone(),
        };

        let Some(raw) = raw else {
            return LearningState::default();
        };

        match serde_json::from_str::<LearningState>(&raw) {
            Ok(state) => state.normalized(),
            Err(e) => {
                tracing::warn!("Stored learning state is corrupt, starting empty: {}", e);
                LearningState::default()
            }
        }
    }

    fn write(&self, mut state: LearningState) {
        state.normalize();
        let serialized = match serde_json::to_string(&state) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize learning state: {}", e);
                return;
            }
        };

        match &self.backend {
            Backend::File(path) => {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                if let Err(e) = std::fs::write(path, &serialized) {
                    tracing::error!("Failed to persist learning state to {:?}: {}", path, e);
                }
            }
            Backend::Memory(cell) => {
                *cell.lock().unwrap() = Some(serialized);
            }
        }

        let listeners = self.listeners.lock().unwrap();
        for (_, listener) in listeners.iter() {
            listener(&state);
        }
    }
}
