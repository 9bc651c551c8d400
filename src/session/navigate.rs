//! Moving between questions, the status grid, and completion.

use super::{QuizSession, SessionPhase};
use rand::Rng;

impl QuizSession {
    /// Advance past the result screen. With nothing pending the run
    /// completes; otherwise the next pending question comes up, chosen
    /// sequentially or at random per the question-shuffle flag.
    pub fn next(&mut self) -> Result<(), String> {
        if self.phase != SessionPhase::Result && self.phase != SessionPhase::StatusGrid {
            return Err("Nothing to advance from".to_string());
        }

        let pending = self.pending_positions();
        if pending.is_empty() {
            self.current = None;
            self.store
                .set_area_current_question(&self.area.short_name, None);
            self.phase = SessionPhase::Completed;
            tracing::info!(run = %self.run_id, area = %self.area.short_name, "Run completed");
            return Ok(());
        }

        let position = if self.shuffle_questions {
            pending[rand::rng().random_range(0..pending.len())]
        } else {
            self.next_sequential(&pending)
        };

        self.current = Some(position);
        self.persist_position();
        self.phase = SessionPhase::Question;
        Ok(())
    }

    /// Lowest-numbered pending question after the current one, wrapping to
    /// the lowest pending overall.
    fn next_sequential(&self, pending: &[usize]) -> usize {
        let current_number = self
            .current
            .map(|pos| self.questions[pos].number)
            .unwrap_or(0);

        let after = pending
            .iter()
            .filter(|&&pos| self.questions[pos].number > current_number)
            .min_by_key(|&&pos| self.questions[pos].number);
        let wrapped = pending.iter().min_by_key(|&&pos| self.questions[pos].number);

        // pending is non-empty, so the wrap candidate always exists
        *after.or(wrapped).unwrap_or(&0)
    }

    /// Show the status grid. Entered from a live question, the position is
    /// kept so closing the grid returns to it.
    pub fn open_status_grid(&mut self) -> Result<(), String> {
        match self.phase {
            SessionPhase::Question => {
                self.resume_target = self.current;
                self.phase = SessionPhase::StatusGrid;
                Ok(())
            }
            SessionPhase::Result | SessionPhase::Completed | SessionPhase::Menu => {
                self.resume_target = None;
                self.phase = SessionPhase::StatusGrid;
                Ok(())
            }
            SessionPhase::StatusGrid => Err("Status grid is already open".to_string()),
        }
    }

    /// Leave the status grid, returning to the interrupted question or
    /// advancing when there was none.
    pub fn close_status_grid(&mut self) -> Result<(), String> {
        if self.phase != SessionPhase::StatusGrid {
            return Err("Status grid is not open".to_string());
        }
        match self.resume_target.take() {
            Some(position) => {
                self.current = Some(position);
                self.phase = SessionPhase::Question;
                Ok(())
            }
            None => self.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::types::QuestionStatus;
    use crate::Store;
    use std::sync::Arc;

    fn running_session() -> QuizSession {
        let questions = vec![
            tf_question(0, 1, "Tema 1", "V"),
            tf_question(1, 2, "Tema 1", "V"),
            tf_question(2, 3, "Tema 1", "V"),
        ];
        let store = Arc::new(Store::in_memory());
        store.set_area_shuffle_questions("ipc", false);
        let mut session = QuizSession::open(tf_area("ipc"), questions, store);
        session.start_all().unwrap();
        session
    }

    #[test]
    fn test_sequential_advance() {
        let mut session = running_session();
        session.answer("V").unwrap();
        session.next().unwrap();
        assert_eq!(session.current_question().map(|q| q.number), Some(2));
    }

    #[test]
    fn test_sequential_wraps_to_lowest_pending() {
        // Resume at number 3 with number 2 still pending behind the cursor
        let questions = vec![
            tf_question(0, 1, "Tema 1", "V"),
            tf_question(1, 2, "Tema 1", "V"),
            tf_question(2, 3, "Tema 1", "V"),
        ];
        let store = Arc::new(Store::in_memory());
        store.set_area_shuffle_questions("ipc", false);
        let mut status = crate::types::QuizStatus::new();
        status.insert(0, QuestionStatus::Correct);
        status.insert(1, QuestionStatus::Pending);
        status.insert(2, QuestionStatus::Pending);
        store.set_area_quiz_status("ipc", Some(status));
        store.set_area_current_question("ipc", Some(2));
        let mut session = QuizSession::open(tf_area("ipc"), questions, store);
        assert_eq!(session.current_question().map(|q| q.number), Some(3));
        session.answer("V").unwrap();
        session.next().unwrap();
        // Number 3 was answered; the walk wraps back to number 2
        assert_eq!(session.current_question().map(|q| q.number), Some(2));
    }

    #[test]
    fn test_completion_clears_saved_position() {
        let mut session = running_session();
        let store = Arc::clone(&session.store);
        for _ in 0..3 {
            session.answer("V").unwrap();
            session.next().unwrap();
        }
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert!(session.current_question().is_none());
        assert_eq!(store.area_current_question("ipc"), None);
        // Progress itself survives completion
        let status = store.area_quiz_status("ipc").unwrap();
        assert!(status.values().all(|s| *s == QuestionStatus::Correct));
    }

    #[test]
    fn test_grid_from_question_resumes_same_question() {
        let mut session = running_session();
        session.open_status_grid().unwrap();
        assert_eq!(session.phase(), SessionPhase::StatusGrid);
        session.close_status_grid().unwrap();
        assert_eq!(session.phase(), SessionPhase::Question);
        assert_eq!(session.current_question().map(|q| q.number), Some(1));
    }

    #[test]
    fn test_grid_from_result_advances_on_close() {
        let mut session = running_session();
        session.answer("V").unwrap();
        session.open_status_grid().unwrap();
        session.close_status_grid().unwrap();
        assert_eq!(session.phase(), SessionPhase::Question);
        assert_eq!(session.current_question().map(|q| q.number), Some(2));
    }

    #[test]
    fn test_random_advance_picks_a_pending_question() {
        let mut session = running_session();
        session.set_shuffle_questions(true);
        session.answer("V").unwrap();
        session.next().unwrap();
        let number = session.current_question().map(|q| q.number).unwrap();
        assert!(number == 2 || number == 3);
        assert_ne!(
            session.status().get(&(number - 1)),
            Some(&QuestionStatus::Correct)
        );
    }

    #[test]
    fn test_next_from_question_phase_is_rejected() {
        let mut session = running_session();
        assert!(session.next().is_err());
    }
}
