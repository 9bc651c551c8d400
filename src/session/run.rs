//! Starting a run from the menu.

use super::{QuizSession, SelectionMode, SessionPhase};
use crate::types::{Question, QuestionStatus, QuizStatus};
use ulid::Ulid;

impl QuizSession {
    /// Practice every question in the area.
    pub fn start_all(&mut self) -> Result<(), String> {
        let questions = self.all_questions.clone();
        self.start_run(SelectionMode::All, questions)
    }

    /// Practice only the questions in the given sections.
    pub fn start_sections(&mut self, sections: Vec<String>) -> Result<(), String> {
        let questions: Vec<Question> = self
            .all_questions
            .iter()
            .filter(|q| sections.contains(&q.section))
            .cloned()
            .collect();
        self.start_run(SelectionMode::Sections(sections), questions)
    }

    /// Practice an explicit set of questions, by stable index.
    pub fn start_questions(&mut self, indices: Vec<u32>) -> Result<(), String> {
        let questions: Vec<Question> = self
            .all_questions
            .iter()
            .filter(|q| indices.contains(&q.index))
            .cloned()
            .collect();
        self.start_run(SelectionMode::Questions(indices), questions)
    }

    fn start_run(&mut self, mode: SelectionMode, questions: Vec<Question>) -> Result<(), String> {
        if self.phase == SessionPhase::Question || self.phase == SessionPhase::Result {
            return Err("A run is already in progress".to_string());
        }

        self.run_id = Ulid::new();
        self.answers.clear();
        self.resume_target = None;
        self.questions = questions;
        self.selection_mode = mode;

        // Selection is persisted so a later open rebuilds the same run
        let (sections, indices) = match &self.selection_mode {
            SelectionMode::All => (None, None),
            SelectionMode::Sections(s) => (Some(s.clone()), None),
            SelectionMode::Questions(i) => (None, Some(i.clone())),
        };
        self.store
            .set_area_selected_sections(&self.area.short_name, sections);
        self.store
            .set_area_selected_questions(&self.area.short_name, indices);

        if self.questions.is_empty() {
            self.status = QuizStatus::new();
            self.current = None;
            self.store.set_area_quiz_status(&self.area.short_name, None);
            self.store
                .set_area_current_question(&self.area.short_name, None);
            self.phase = SessionPhase::Completed;
            return Ok(());
        }

        // Earlier progress on the selected questions carries over
        let saved = self
            .store
            .area_quiz_status(&self.area.short_name)
            .unwrap_or_default();
        self.status = self
            .questions
            .iter()
            .map(|q| {
                let status = saved.get(&q.index).copied().unwrap_or(QuestionStatus::Pending);
                (q.index, status)
            })
            .collect();

        self.order_questions();

        let saved_position = self
            .store
            .area_current_question(&self.area.short_name)
            .map(|p| p as usize)
            .filter(|p| *p < self.questions.len());
        let position = saved_position
            .or_else(|| self.first_pending_position())
            .unwrap_or(0);
        self.current = Some(position);

        self.orders.begin_run();
        self.persist_status();
        self.persist_position();
        self.phase = SessionPhase::Question;
        tracing::info!(
            run = %self.run_id,
            area = %self.area.short_name,
            questions = self.questions.len(),
            "Starting quiz run"
        );
        Ok(())
    }
}
