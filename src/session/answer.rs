//! Answer grading.

use super::{QuizSession, SessionPhase};
use crate::types::{QuestionStatus, QuizType};

/// What came out of grading one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub explanation: String,
    /// The literal text recorded as the user's answer.
    pub stored_answer: String,
}

/// True/False input normalized to its canonical letter. Full-word synonyms
/// are accepted alongside the letters.
fn normalize_true_false(input: &str) -> String {
    let upper = input.trim().to_uppercase();
    match upper.as_str() {
        "VERDADERO" => "V".to_string(),
        "FALSO" => "F".to_string(),
        _ => upper,
    }
}

impl QuizSession {
    /// Grade the current question against `input` and move to the result
    /// screen. For Multiple Choice the input is a slot letter (`a`, `b`, …)
    /// resolved through the option order the user is actually looking at.
    pub fn answer(&mut self, input: &str) -> Result<AnswerOutcome, String> {
        if self.phase != SessionPhase::Question {
            return Err("No question is awaiting an answer".to_string());
        }
        let position = self
            .current
            .ok_or_else(|| "No current question".to_string())?;
        let question = self.questions[position].clone();

        let (correct, stored_answer) = match self.area.quiz_type {
            QuizType::TrueFalse => {
                let given = normalize_true_false(input);
                let expected = normalize_true_false(&question.answer);
                (given == expected, given)
            }
            QuizType::MultipleChoice => {
                let displayed = self.orders.display_order(&question, self.shuffle_answers);
                let slot = letter_to_slot(input);
                let chosen = slot
                    .and_then(|s| displayed.get(s))
                    .cloned()
                    .unwrap_or_default();
                // Literal text comparison, so correctness follows the
                // displayed position even under a shuffled order
                (chosen == question.answer, chosen)
            }
        };

        let status = if correct {
            QuestionStatus::Correct
        } else {
            QuestionStatus::Fail
        };
        self.status.insert(question.index, status);
        self.answers.insert(question.index, stored_answer.clone());
        self.persist_status();
        self.phase = SessionPhase::Result;

        Ok(AnswerOutcome {
            correct,
            explanation: question.explanation,
            stored_answer,
        })
    }
}

/// `a` → 0, `B` → 1, … Anything that is not a single ASCII letter is no slot.
fn letter_to_slot(input: &str) -> Option<usize> {
    let trimmed = input.trim();
    if trimmed.len() != 1 {
        return None;
    }
    let ch = trimmed.chars().next()?;
    if ch.is_ascii_alphabetic() {
        Some((ch.to_ascii_lowercase() as u8 - b'a') as usize)
    } else {
        None
    }
}
