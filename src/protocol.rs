//! Wire DTOs for the CodeEdge backend endpoints (serde ready).
//! Kept separate from the domain types so the backend contract can drift
//! without touching session logic.

use serde::{Deserialize, Serialize};

use crate::domain::{Difficulty, DifficultyCounts};

/// Query string of `GET /generate-question`.
#[derive(Debug, Serialize)]
pub struct QuestionQuery<'a> {
    pub user_id: &'a str,
    pub category: &'a str,
    pub concept: &'a str,
    pub difficulty: Difficulty,
    pub use_advanced: bool,
}

#[derive(Debug, Deserialize)]
pub struct QuestionOut {
    #[serde(default)]
    pub success: Option<bool>,
    /// The backend has used both names for the statement; see `statement`.
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub problem_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub concept: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub is_advanced: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl QuestionOut {
    /// First non-blank of `question` and `problem`, trimmed.
    pub fn statement(&self) -> Option<&str> {
        [self.question.as_deref(), self.problem.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct RunIn<'a> {
    pub code: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RunOut {
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub traceback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitIn<'a> {
    pub code: &'a str,
    pub category: &'a str,
    pub concept: &'a str,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitOut {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub problem_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressIn<'a> {
    pub user_id: &'a str,
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct ProgressOut {
    pub success: bool,
    #[serde(default)]
    pub progress: Option<DifficultyCounts>,
    #[serde(default)]
    pub current_difficulty: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AiIn<'a> {
    pub question: &'a str,
    #[serde(rename = "type")]
    pub mode: &'a str,
    pub problem: &'a str,
    pub code: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AiOut {
    pub success: bool,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Shape shared by every failure payload; used to salvage a message from
/// non-2xx responses whose body does not match the endpoint DTO.
#[derive(Debug, Deserialize)]
pub struct ErrorOut {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
