//! Quiz session state machine.
//!
//! A [`QuizSession`] ties one area's question set to the persisted progress
//! for that area. The phases are Menu (pick what to practice), Question
//! (answering), Result (feedback shown), StatusGrid (overview), and
//! Completed. Precondition violations return `Err(String)` and leave the
//! session untouched; persistence happens eagerly on every state change so a
//! dropped session loses nothing.

mod answer;
mod navigate;
mod run;

pub use answer::AnswerOutcome;

use crate::shuffle::AnswerOrderCache;
use crate::types::{Area, Question, QuestionStatus, QuizStatus};
use crate::Store;
use std::collections::HashMap;
use std::sync::Arc;
use ulid::Ulid;

/// Where the user currently is inside an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Menu,
    Question,
    Result,
    StatusGrid,
    Completed,
}

/// Which subset of the area's questions the current run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    All,
    Sections(Vec<String>),
    Questions(Vec<u32>),
}

/// One open area: its questions, the active run, and the cursor into it.
pub struct QuizSession {
    run_id: Ulid,
    area: Area,
    /// Full catalog for the area, in load order.
    all_questions: Vec<Question>,
    /// The active run's questions, already filtered and ordered.
    questions: Vec<Question>,
    /// Status per stable question index.
    status: QuizStatus,
    /// Position in `questions`, when a question is up.
    current: Option<usize>,
    phase: SessionPhase,
    selection_mode: SelectionMode,
    shuffle_questions: bool,
    shuffle_answers: bool,
    /// Literal answer text recorded per stable index during this run.
    answers: HashMap<u32, String>,
    orders: AnswerOrderCache,
    /// Position to return to when the status grid closes.
    resume_target: Option<usize>,
    store: Arc<Store>,
}

impl QuizSession {
    /// Open an area, restoring any saved progress. Lands in `Question` when
    /// an unfinished run can be resumed, otherwise in `Menu`.
    pub fn open(area: Area, all_questions: Vec<Question>, store: Arc<Store>) -> Self {
        let short_name = area.short_name.clone();
        // Question order defaults to shuffled until the user turns it off
        let shuffle_questions = store.area_shuffle_questions(&short_name).unwrap_or(true);
        let shuffle_answers = store.area_shuffle_answers(&short_name).unwrap_or(false);
        let saved_status = store.area_quiz_status(&short_name);
        let saved_questions = store.area_selected_questions(&short_name);
        let saved_sections = store.area_selected_sections(&short_name);

        let mut session = Self {
            run_id: Ulid::new(),
            area,
            all_questions,
            questions: Vec::new(),
            status: QuizStatus::new(),
            current: None,
            phase: SessionPhase::Menu,
            selection_mode: SelectionMode::All,
            shuffle_questions,
            shuffle_answers,
            answers: HashMap::new(),
            orders: AnswerOrderCache::new(),
            resume_target: None,
            store,
        };

        // Which indices did the last run cover? Explicit selections take
        // precedence; older records only carried the status map, whose keys
        // double as the selection.
        let selection: Option<Vec<u32>> = saved_questions.clone().or_else(|| {
            saved_status
                .as_ref()
                .filter(|status| !status.is_empty())
                .map(|status| status.keys().copied().collect())
        });

        session.selection_mode = match (&saved_questions, &saved_sections) {
            (Some(indices), _) => SelectionMode::Questions(indices.clone()),
            (None, Some(sections)) => SelectionMode::Sections(sections.clone()),
            (None, None) => SelectionMode::All,
        };

        session.questions = match &selection {
            Some(indices) => session
                .all_questions
                .iter()
                .filter(|q| indices.contains(&q.index))
                .cloned()
                .collect(),
            None => session.all_questions.clone(),
        };
        session.order_questions();

        // A run was left open if either a status map or a position was
        // saved; a freshly started run has both before any answer lands.
        let has_saved_run = saved_status.is_some()
            || session
                .store
                .area_current_question(&session.area.short_name)
                .is_some();

        let saved = saved_status.unwrap_or_default();
        session.status = session
            .questions
            .iter()
            .map(|q| {
                let status = saved.get(&q.index).copied().unwrap_or(QuestionStatus::Pending);
                (q.index, status)
            })
            .collect();

        let all_answered = !session.status.is_empty()
            && session
                .status
                .values()
                .all(|s| *s != QuestionStatus::Pending);

        if all_answered {
            // The previous run finished; nothing to resume.
            session
                .store
                .set_area_current_question(&session.area.short_name, None);
            session.phase = SessionPhase::Menu;
        } else if has_saved_run && !session.questions.is_empty() {
            let saved_position = session
                .store
                .area_current_question(&session.area.short_name)
                .map(|p| p as usize)
                .filter(|p| *p < session.questions.len());
            let position = saved_position
                .or_else(|| session.first_pending_position())
                .unwrap_or(0);
            session.current = Some(position);
            session.orders.begin_run();
            session.phase = SessionPhase::Question;
            tracing::debug!(
                run = %session.run_id,
                area = %session.area.short_name,
                position,
                "Resuming saved quiz run"
            );
        }

        session
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn area(&self) -> &Area {
        &self.area
    }

    pub fn run_id(&self) -> Ulid {
        self.run_id
    }

    pub fn selection_mode(&self) -> &SelectionMode {
        &self.selection_mode
    }

    /// The active run's questions in display order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn status(&self) -> &QuizStatus {
        &self.status
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current.map(|pos| &self.questions[pos])
    }

    pub fn current_position(&self) -> Option<usize> {
        self.current
    }

    pub fn shuffle_questions(&self) -> bool {
        self.shuffle_questions
    }

    pub fn shuffle_answers(&self) -> bool {
        self.shuffle_answers
    }

    /// The answer text recorded for a question during this run, if any.
    pub fn recorded_answer(&self, index: u32) -> Option<&str> {
        self.answers.get(&index).map(|s| s.as_str())
    }

    /// The option order currently displayed for the question at `position`.
    pub fn displayed_options(&mut self, position: usize) -> Result<Vec<String>, String> {
        let question = self
            .questions
            .get(position)
            .cloned()
            .ok_or_else(|| format!("No question at position {}", position))?;
        Ok(self.orders.display_order(&question, self.shuffle_answers))
    }

    pub fn set_shuffle_questions(&mut self, shuffle: bool) {
        self.shuffle_questions = shuffle;
        self.store
            .set_area_shuffle_questions(&self.area.short_name, shuffle);
    }

    pub fn set_shuffle_answers(&mut self, shuffle: bool) {
        self.shuffle_answers = shuffle;
        self.store
            .set_area_shuffle_answers(&self.area.short_name, shuffle);
    }

    /// Wipe this area's saved progress and return to the menu.
    pub fn reset(&mut self) {
        self.store.clear_area(&self.area.short_name);
        self.questions = self.all_questions.clone();
        self.status = QuizStatus::new();
        self.answers.clear();
        self.orders = AnswerOrderCache::new();
        self.current = None;
        self.resume_target = None;
        self.selection_mode = SelectionMode::All;
        self.phase = SessionPhase::Menu;
        tracing::info!(area = %self.area.short_name, "Cleared saved progress");
    }

    /// The distinct sections of this area's catalog, in first-seen order.
    pub fn sections(&self) -> Vec<String> {
        let mut sections: Vec<String> = Vec::new();
        for question in &self.all_questions {
            if !sections.contains(&question.section) {
                sections.push(question.section.clone());
            }
        }
        sections
    }

    // ==== Internals shared across the impl blocks ====

    fn order_questions(&mut self) {
        if self.shuffle_questions {
            use rand::seq::SliceRandom;
            self.questions.shuffle(&mut rand::rng());
        } else {
            self.questions.sort_by_key(|q| q.number);
        }
    }

    fn first_pending_position(&self) -> Option<usize> {
        self.questions.iter().position(|q| {
            self.status.get(&q.index).copied().unwrap_or(QuestionStatus::Pending)
                == QuestionStatus::Pending
        })
    }

    fn pending_positions(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| {
                self.status.get(&q.index).copied().unwrap_or(QuestionStatus::Pending)
                    == QuestionStatus::Pending
            })
            .map(|(pos, _)| pos)
            .collect()
    }

    fn persist_status(&self) {
        self.store
            .set_area_quiz_status(&self.area.short_name, Some(self.status.clone()));
    }

    fn persist_position(&self) {
        self.store.set_area_current_question(
            &self.area.short_name,
            self.current.map(|p| p as u32),
        );
    }
}

/// Token handed out per area-load attempt; stale tokens are ignored so a slow
/// fetch can never clobber a newer area switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// Owns the active session and serializes area switches.
pub struct SessionManager {
    store: Arc<Store>,
    load_epoch: u64,
    session: Option<QuizSession>,
}

impl SessionManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            load_epoch: 0,
            session: None,
        }
    }

    /// Start switching to an area. Any in-flight load becomes stale, the
    /// previous session is dropped, and the chosen area is persisted as
    /// current immediately.
    pub fn begin_area_load(&mut self, short_name: &str) -> LoadToken {
        self.load_epoch += 1;
        self.session = None;
        self.store.set_current_area(Some(short_name.to_string()));
        LoadToken(self.load_epoch)
    }

    /// Complete an area load. Returns false (and changes nothing) when a
    /// newer load has started since `token` was issued.
    pub fn finish_area_load(
        &mut self,
        token: LoadToken,
        area: Area,
        questions: Vec<Question>,
    ) -> bool {
        if token.0 != self.load_epoch {
            tracing::debug!(area = %area.short_name, "Ignoring stale area load");
            return false;
        }
        self.session = Some(QuizSession::open(area, questions, Arc::clone(&self.store)));
        true
    }

    /// Leave the current area without touching its persisted record.
    pub fn close_area(&mut self) {
        self.load_epoch += 1;
        self.session = None;
        self.store.set_current_area(None);
    }

    pub fn session(&self) -> Option<&QuizSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut QuizSession> {
        self.session.as_mut()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{Area, Question, QuizType};

    pub fn tf_area(short_name: &str) -> Area {
        Area {
            area: format!("Area {}", short_name),
            file: format!("{}.json", short_name),
            quiz_type: QuizType::TrueFalse,
            short_name: short_name.to_string(),
            language: None,
        }
    }

    pub fn mc_area(short_name: &str) -> Area {
        Area {
            quiz_type: QuizType::MultipleChoice,
            ..tf_area(short_name)
        }
    }

    pub fn tf_question(index: u32, number: u32, section: &str, answer: &str) -> Question {
        Question {
            index,
            section: section.to_string(),
            number,
            question: format!("Statement {}?", number),
            answer: answer.to_string(),
            explanation: format!("Explanation for {}", number),
            options: None,
            appears_in: None,
        }
    }

    pub fn mc_question(index: u32, number: u32, answer: &str, options: &[&str]) -> Question {
        Question {
            index,
            section: "General".to_string(),
            number,
            question: format!("Pick one for {}?", number),
            answer: answer.to_string(),
            explanation: format!("Explanation for {}", number),
            options: Some(options.iter().map(|s| s.to_string()).collect()),
            appears_in: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn store() -> Arc<Store> {
        Arc::new(Store::in_memory())
    }

    fn three_tf_questions() -> Vec<Question> {
        vec![
            tf_question(0, 1, "Tema 1", "V"),
            tf_question(1, 2, "Tema 1", "F"),
            tf_question(2, 3, "Tema 2", "V"),
        ]
    }

    #[test]
    fn test_open_without_history_lands_in_menu() {
        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), store());
        assert_eq!(session.phase(), SessionPhase::Menu);
        assert!(session.current_question().is_none());
    }

    #[test]
    fn test_question_shuffle_defaults_on() {
        let store = store();
        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), Arc::clone(&store));
        assert!(session.shuffle_questions());

        // A saved flag wins over the default
        store.set_area_shuffle_questions("ipc", false);
        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), store);
        assert!(!session.shuffle_questions());
    }

    #[test]
    fn test_open_resumes_started_but_unanswered_run() {
        let store = store();
        store.set_area_shuffle_questions("ipc", false);
        {
            let mut session =
                QuizSession::open(tf_area("ipc"), three_tf_questions(), Arc::clone(&store));
            session.start_all().unwrap();
            // Dropped before any answer; status is all pending
        }

        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), store);
        assert_eq!(session.phase(), SessionPhase::Question);
        assert_eq!(session.current_question().map(|q| q.number), Some(1));
        assert!(session
            .status()
            .values()
            .all(|s| *s == QuestionStatus::Pending));
    }

    #[test]
    fn test_open_resumes_partial_progress() {
        let store = store();
        store.set_area_shuffle_questions("ipc", false);
        let mut status = QuizStatus::new();
        status.insert(0, QuestionStatus::Correct);
        status.insert(1, QuestionStatus::Pending);
        status.insert(2, QuestionStatus::Pending);
        store.set_area_quiz_status("ipc", Some(status));
        store.set_area_current_question("ipc", Some(1));

        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), store);
        assert_eq!(session.phase(), SessionPhase::Question);
        assert_eq!(session.current_question().map(|q| q.number), Some(2));
    }

    #[test]
    fn test_open_with_everything_answered_returns_to_menu() {
        let store = store();
        let mut status = QuizStatus::new();
        status.insert(0, QuestionStatus::Correct);
        status.insert(1, QuestionStatus::Fail);
        status.insert(2, QuestionStatus::Correct);
        store.set_area_quiz_status("ipc", Some(status));
        store.set_area_current_question("ipc", Some(2));

        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), Arc::clone(&store));
        assert_eq!(session.phase(), SessionPhase::Menu);
        // The stale position is cleared so the next open stays in the menu
        assert_eq!(store.area_current_question("ipc"), None);
    }

    #[test]
    fn test_legacy_record_without_selection_uses_status_keys() {
        let store = store();
        let mut status = QuizStatus::new();
        status.insert(0, QuestionStatus::Fail);
        store.set_area_quiz_status("ipc", Some(status));
        store.set_area_current_question("ipc", Some(99));

        // Legacy record: no explicit selection, status keys define the run
        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), store);
        assert_eq!(session.questions().len(), 1);
        assert_eq!(session.phase(), SessionPhase::Menu);
    }

    #[test]
    fn test_open_restores_question_selection() {
        let store = store();
        store.set_area_selected_questions("ipc", Some(vec![0, 2]));
        let mut status = QuizStatus::new();
        status.insert(0, QuestionStatus::Correct);
        status.insert(2, QuestionStatus::Pending);
        store.set_area_quiz_status("ipc", Some(status));

        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), store);
        assert_eq!(session.phase(), SessionPhase::Question);
        assert_eq!(session.questions().len(), 2);
        assert_eq!(
            session.selection_mode(),
            &SelectionMode::Questions(vec![0, 2])
        );
        assert_eq!(session.current_question().map(|q| q.index), Some(2));
    }

    #[test]
    fn test_shuffle_toggles_persist() {
        let store = store();
        let mut session =
            QuizSession::open(tf_area("ipc"), three_tf_questions(), Arc::clone(&store));
        session.set_shuffle_answers(true);
        session.set_shuffle_questions(true);
        assert_eq!(store.area_shuffle_answers("ipc"), Some(true));
        assert_eq!(store.area_shuffle_questions("ipc"), Some(true));
    }

    #[test]
    fn test_reset_clears_record_and_returns_to_menu() {
        let store = store();
        let mut session =
            QuizSession::open(tf_area("ipc"), three_tf_questions(), Arc::clone(&store));
        session.start_all().unwrap();
        session.answer("V").unwrap();
        session.reset();
        assert_eq!(session.phase(), SessionPhase::Menu);
        assert_eq!(store.area_quiz_status("ipc"), None);
        assert_eq!(store.area_current_question("ipc"), None);
    }

    #[test]
    fn test_stale_area_load_is_ignored() {
        let mut manager = SessionManager::new(store());
        let stale = manager.begin_area_load("ipc");
        let fresh = manager.begin_area_load("fdl");

        assert!(!manager.finish_area_load(stale, tf_area("ipc"), three_tf_questions()));
        assert!(manager.session().is_none());

        assert!(manager.finish_area_load(fresh, tf_area("fdl"), three_tf_questions()));
        assert_eq!(manager.session().unwrap().area().short_name, "fdl");
        assert_eq!(manager.store().current_area(), Some("fdl".to_string()));
    }

    #[test]
    fn test_sections_in_catalog_order() {
        let session = QuizSession::open(tf_area("ipc"), three_tf_questions(), store());
        assert_eq!(session.sections(), vec!["Tema 1", "Tema 2"]);
    }
}
