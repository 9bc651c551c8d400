//! Deterministic option shuffling.
//!
//! Option orders must be reproducible per (run seed, question index) pair so
//! that revisiting an unanswered question shows the same order, while a new
//! run draws a fresh seed. The ambient `rand` generator is deliberately not
//! used here; a seeded generator keeps every question's sequence independent
//! and replayable.

use crate::types::{Question, QuestionIndex};
use rand::Rng;
use std::collections::HashMap;

/// Mixing constants combining the run seed with a question's stable index.
const SEED_MIX_RUN: u64 = 977;
const SEED_MIX_INDEX: u64 = 131;

/// Minimal 64-bit linear congruential generator (Knuth's MMIX constants)
/// yielding floats in [0, 1). A pure function of its seed.
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            // Avoid the all-zero fixed point of the multiplier-only step
            state: seed ^ 0x9e37_79b9_7f4a_7c15,
        }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // Top 53 bits give a uniform double in [0, 1)
        (self.state >> 11) as f64 / (1u64 << 53) as f64
    }

    fn next_below(&mut self, bound: usize) -> usize {
        (self.next_f64() * bound as f64) as usize
    }
}

/// Derive the per-question sub-seed from the run seed and the question's
/// stable index, so different questions in one run get decorrelated but
/// reproducible sequences.
pub fn derive_question_seed(run_seed: u64, index: QuestionIndex) -> u64 {
    run_seed
        .wrapping_mul(SEED_MIX_RUN)
        .wrapping_add((index as u64).wrapping_mul(SEED_MIX_INDEX))
}

/// Fisher-Yates shuffle that is guaranteed to differ from `previous` in at
/// least one position whenever more than one arrangement is possible.
/// Inputs of length <= 1 come back unchanged.
pub fn shuffle_with_memory<T: Clone + PartialEq>(
    items: &[T],
    previous: Option<&[T]>,
    rng: &mut SeededRng,
) -> Vec<T> {
    if items.len() <= 1 {
        return items.to_vec();
    }

    // With all-identical items every permutation reads the same; a retry
    // loop would never terminate.
    let has_distinct_items = items.iter().any(|item| item != &items[0]);

    loop {
        let mut shuffled = items.to_vec();
        for i in (1..shuffled.len()).rev() {
            let j = rng.next_below(i + 1);
            shuffled.swap(i, j);
        }

        match previous {
            Some(prev) if has_distinct_items && shuffled.as_slice() == prev => continue,
            _ => return shuffled,
        }
    }
}

/// Per-run cache of displayed option orders.
///
/// Shuffled mode derives a seeded order once per question and replays it for
/// the rest of the run. Sequential mode returns the catalog order and records
/// it as the previous-order baseline, so a later switch to shuffled mode has
/// something to diverge from.
#[derive(Debug, Default)]
pub struct AnswerOrderCache {
    run_seed: u64,
    current: HashMap<QuestionIndex, Vec<String>>,
    previous: HashMap<QuestionIndex, Vec<String>>,
}

impl AnswerOrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop cached orders and draw a fresh ambient seed. Called on every
    /// quiz start and reset.
    pub fn begin_run(&mut self) {
        self.run_seed = rand::rng().random::<u64>();
        self.current.clear();
        self.previous.clear();
    }

    #[cfg(test)]
    pub(crate) fn begin_run_with_seed(&mut self, seed: u64) {
        self.run_seed = seed;
        self.current.clear();
        self.previous.clear();
    }

    /// The option order to display for `question`, honoring the area's
    /// shuffle-answers flag. True/False questions have no options and yield
    /// an empty order.
    pub fn display_order(&mut self, question: &Question, shuffle_answers: bool) -> Vec<String> {
        let Some(options) = question.options.as_ref() else {
            return Vec::new();
        };

        if shuffle_answers && options.len() > 1 {
            if let Some(cached) = self.current.get(&question.index) {
                return cached.clone();
            }
            let mut rng = SeededRng::new(derive_question_seed(self.run_seed, question.index));
            let previous = self.previous.get(&question.index).map(|v| v.as_slice());
            let order = shuffle_with_memory(options, previous, &mut rng);
            self.current.insert(question.index, order.clone());
            return order;
        }

        let sequential = options.clone();
        self.previous.insert(question.index, sequential.clone());
        self.current.remove(&question.index);
        sequential
    }
}
