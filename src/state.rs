//! Session state: the single source of truth for what the view shows.
//!
//! This module owns:
//!   - the current problem and the category/concept/difficulty selection
//!   - the code buffer and the last execution result
//!   - the chat transcript and the pending code suggestion
//!   - progress counters (seeded from the persisted snapshot)
//!
//! Transitions are plain `&mut self` methods; `Session` applies each of them
//! under one write lock so the view never observes a partial update.

use rand::seq::SliceRandom;
use tracing::{debug, info, instrument};

use crate::domain::{
    concepts_for, is_known_concept, ChatMessage, Difficulty, ExecutionResult, Problem, ProgressCounters,
    ProgressUpdate, CATALOG,
};
use crate::progress::ProgressSnapshot;

/// What the user picked for the next generated problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub category: String,
    pub concept: String,
    pub difficulty: Difficulty,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            category: "data_structures".into(),
            concept: "arrays".into(),
            difficulty: Difficulty::Medium,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub problem: Option<Problem>,
    /// Bumped by every `load_problem`; async replies carry the epoch they were asked in.
    pub problem_epoch: u64,
    pub code: String,
    pub placeholder: String,
    pub output: Option<ExecutionResult>,
    pub transcript: Vec<ChatMessage>,
    pub pending_suggestion: Option<String>,
    pub selection: Selection,
    pub progress: ProgressCounters,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    /// Fresh state seeded from the persisted snapshot.
    #[instrument(level = "debug", skip_all, fields(solved = snapshot.solved_count))]
    pub fn new(placeholder: &str, snapshot: &ProgressSnapshot) -> Self {
        Self {
            code: placeholder.to_string(),
            placeholder: placeholder.to_string(),
            progress: ProgressCounters {
                solved_count: snapshot.solved_count,
                solved_ids: snapshot.solved_ids.clone(),
                ..ProgressCounters::default()
            },
            ..Self::default()
        }
    }

    /// Replace the problem and start over: code, output, transcript and
    /// suggestion are reset.
    pub fn load_problem(&mut self, problem: Problem) {
        info!(target: "session", title = ?problem.title, difficulty = %problem.difficulty, "Loading problem");
        self.problem = Some(problem);
        self.problem_epoch += 1;
        self.code = self.placeholder.clone();
        self.output = None;
        self.transcript.clear();
        self.pending_suggestion = None;
        self.error = None;
    }

    pub fn update_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
    }

    pub fn code_is_blank(&self) -> bool {
        self.code.trim().is_empty()
    }

    pub fn record_execution_result(&mut self, result: ExecutionResult) {
        debug!(target: "session", success = result.success, "Execution result recorded");
        self.output = Some(result);
    }

    pub fn append_chat_message(&mut self, message: ChatMessage) {
        if let Some(code) = &message.suggestion {
            self.pending_suggestion = Some(code.clone());
        }
        self.transcript.push(message);
    }

    /// Overwrite the code buffer with a suggested snippet and clear the suggestion.
    pub fn adopt_suggested_code(&mut self, snippet: &str) {
        self.code = snippet.to_string();
        self.pending_suggestion = None;
    }

    /// Count one more solved problem. Ids are recorded once.
    pub fn increment_solved(&mut self, problem_id: Option<&str>) {
        self.progress.solved_count = self.progress.solved_count.saturating_add(1);
        if let Some(id) = problem_id {
            if !self.progress.solved_ids.iter().any(|s| s == id) {
                self.progress.solved_ids.push(id.to_string());
            }
        }
    }

    /// The user's pick for the next generated problem. The tracked level in
    /// `progress` only moves on a progress-update response.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.selection.difficulty = difficulty;
    }

    /// Merge a `/update-progress` response.
    pub fn apply_progress_update(&mut self, update: ProgressUpdate) {
        self.progress.per_difficulty = update.counts;
        self.progress.current_difficulty = update.current_difficulty;
        self.set_difficulty(update.current_difficulty);
    }

    /// Change the category; the concept falls back to the category's first one
    /// when it does not belong there.
    pub fn set_category(&mut self, category: &str) -> Result<(), String> {
        let concepts = concepts_for(category).ok_or_else(|| format!("unknown category '{}'", category))?;
        self.selection.category = category.to_string();
        if !concepts.contains(&self.selection.concept.as_str()) {
            self.selection.concept = concepts.first().map(|c| c.to_string()).unwrap_or_default();
        }
        Ok(())
    }

    pub fn set_concept(&mut self, concept: &str) -> Result<(), String> {
        if !is_known_concept(&self.selection.category, concept) {
            return Err(format!("'{}' is not a concept of '{}'", concept, self.selection.category));
        }
        self.selection.concept = concept.to_string();
        Ok(())
    }

    /// Pick a random category/concept pair.
    pub fn randomize_concept(&mut self) {
        let mut rng = rand::thread_rng();
        if let Some((category, _, concepts)) = CATALOG.choose(&mut rng) {
            if let Some((concept, _)) = concepts.choose(&mut rng) {
                self.selection.category = category.to_string();
                self.selection.concept = concept.to_string();
            }
        }
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            solved_count: self.progress.solved_count,
            solved_ids: self.progress.solved_ids.clone(),
        }
    }
}
