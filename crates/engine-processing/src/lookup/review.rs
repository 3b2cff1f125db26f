use async_trait::async_trait;
use model::{records::record::Record, transform::lookup::LookupField};
use std::{collections::VecDeque, sync::Mutex};

/// What to do after a lookup field has been resolved once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    /// Re-run the field against a different match field.
    Reselect(String),
    /// Abort the whole run before anything is written.
    Cancel,
}

/// Source of the decision taken at each lookup review checkpoint.
#[async_trait]
pub trait ReviewPolicy: Send + Sync {
    async fn review_lookup(
        &self,
        field: &LookupField,
        resolved: usize,
        sample: &[Record],
    ) -> ReviewDecision;
}

/// Accepts every resolution as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

#[async_trait]
impl ReviewPolicy for AcceptAll {
    async fn review_lookup(&self, _: &LookupField, _: usize, _: &[Record]) -> ReviewDecision {
        ReviewDecision::Accept
    }
}

/// Replays a fixed queue of decisions, then accepts.
#[derive(Debug, Default)]
pub struct ScriptedReview {
    decisions: Mutex<VecDeque<ReviewDecision>>,
    seen: Mutex<Vec<(String, String, usize)>>,
}

impl ScriptedReview {
    pub fn new(decisions: impl IntoIterator<Item = ReviewDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// `(column, match_field, resolved)` for every checkpoint reached so far.
    pub fn checkpoints(&self) -> Vec<(String, String, usize)> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReviewPolicy for ScriptedReview {
    async fn review_lookup(
        &self,
        field: &LookupField,
        resolved: usize,
        _: &[Record],
    ) -> ReviewDecision {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((field.column_name.clone(), field.match_field.clone(), resolved));
        }
        self.decisions
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or(ReviewDecision::Accept)
    }
}
