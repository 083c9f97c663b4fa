//! Domain models used by the client: problems, execution results, chat messages and progress.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Problem difficulty. The backend only knows these three levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  #[default]
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      Difficulty::Easy => "Easy",
      Difficulty::Medium => "Medium",
      Difficulty::Hard => "Hard",
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Difficulty {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "easy" => Ok(Difficulty::Easy),
      "medium" => Ok(Difficulty::Medium),
      "hard" => Ok(Difficulty::Hard),
      other => Err(format!("unknown difficulty '{}'", other)),
    }
  }
}

/// A generated coding challenge. Replaced wholesale on the next generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
  #[serde(default)] pub id: Option<String>,
  #[serde(default)] pub title: Option<String>,
  pub category: String,
  pub concept: String,
  pub difficulty: Difficulty,
  pub statement: String,
}

impl Problem {
  /// Context sent along with submissions and AI questions.
  pub fn context(&self) -> ProblemContext {
    ProblemContext {
      category: self.category.clone(),
      concept: self.concept.clone(),
      difficulty: self.difficulty,
      statement: Some(self.statement.clone()),
    }
  }
}

/// What a submission or AI request needs to know about the current problem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProblemContext {
  pub category: String,
  pub concept: String,
  pub difficulty: Difficulty,
  pub statement: Option<String>,
}

/// Outcome of running the code buffer in the backend sandbox.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionResult {
  pub success: bool,
  pub output: String,
  pub error: Option<String>,
  pub traceback: Option<String>,
}

impl ExecutionResult {
  pub fn ok(output: impl Into<String>) -> Self {
    Self { success: true, output: output.into(), error: None, traceback: None }
  }

  /// A failed result always carries an error message.
  pub fn failure(error: impl Into<String>, traceback: Option<String>) -> Self {
    let mut error = error.into();
    if error.trim().is_empty() {
      error = "Unknown error".into();
    }
    Self { success: false, output: String::new(), error: Some(error), traceback }
  }

  /// Text shown in the output area.
  pub fn display_text(&self) -> String {
    if self.success {
      return self.output.clone();
    }
    let error = self.error.as_deref().unwrap_or("Unknown error");
    match self.traceback.as_deref() {
      Some(tb) if !tb.is_empty() => format!("Error: {}\n{}", error, tb),
      _ => format!("Error: {}", error),
    }
  }
}

/// What the backend said about a submitted solution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionOutcome {
  pub success: bool,
  pub message: String,
  pub correct: Option<bool>,
  pub problem_id: Option<String>,
}

/// Per-difficulty solved counts as tracked by the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyCounts {
  #[serde(default, rename = "easy_solved")] pub easy: u32,
  #[serde(default, rename = "medium_solved")] pub medium: u32,
  #[serde(default, rename = "hard_solved")] pub hard: u32,
}

/// Result of `/update-progress`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressUpdate {
  pub counts: DifficultyCounts,
  pub current_difficulty: Difficulty,
}

/// Client-side progress bookkeeping for one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressCounters {
  pub solved_count: u32,
  pub per_difficulty: DifficultyCounts,
  pub current_difficulty: Difficulty,
  pub solved_ids: Vec<String>,
}

/// Mode of an AI request, forwarded as the `type` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
  #[default]
  General,
  Debug,
  Explain,
  Concept,
  Interview,
  CodeAnalysis,
  SuccessReaction,
}

impl AiMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      AiMode::General => "general",
      AiMode::Debug => "debug",
      AiMode::Explain => "explain",
      AiMode::Concept => "concept",
      AiMode::Interview => "interview",
      AiMode::CodeAnalysis => "code_analysis",
      AiMode::SuccessReaction => "success_reaction",
    }
  }
}

impl FromStr for AiMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "general" => Ok(AiMode::General),
      "debug" => Ok(AiMode::Debug),
      "explain" => Ok(AiMode::Explain),
      "concept" => Ok(AiMode::Concept),
      "interview" => Ok(AiMode::Interview),
      "code_analysis" => Ok(AiMode::CodeAnalysis),
      "success_reaction" => Ok(AiMode::SuccessReaction),
      other => Err(format!("unknown AI mode '{}'", other)),
    }
  }
}

/// Who authored a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
  User,
  Ai,
  Error,
}

/// Why a message is in the transcript. Drives rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MessageKind {
  #[default]
  Plain,
  Welcome,
  CodeAnalysis,
  SuccessReaction,
  Nudge,
  SessionEnd,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
  pub role: Role,
  pub kind: MessageKind,
  pub content: String,
  /// Code extracted from the first fenced block of an AI reply.
  pub suggestion: Option<String>,
}

impl ChatMessage {
  pub fn user(content: impl Into<String>) -> Self {
    Self { role: Role::User, kind: MessageKind::Plain, content: content.into(), suggestion: None }
  }

  pub fn ai(kind: MessageKind, content: impl Into<String>) -> Self {
    Self { role: Role::Ai, kind, content: content.into(), suggestion: None }
  }

  pub fn error(content: impl Into<String>) -> Self {
    Self { role: Role::Error, kind: MessageKind::Plain, content: content.into(), suggestion: None }
  }

  pub fn with_suggestion(mut self, code: Option<String>) -> Self {
    self.suggestion = code;
    self
  }
}

/// Category -> concepts offered by the practice page.
pub const CATALOG: &[(&str, &str, &[(&str, &str)])] = &[
  ("data_structures", "Data Structures", &[
    ("arrays", "Arrays"),
    ("linked_lists", "Linked Lists"),
    ("trees", "Trees"),
    ("graphs", "Graphs"),
    ("stacks", "Stacks"),
    ("queues", "Queues"),
    ("hash_tables", "Hash Tables"),
    ("heaps", "Heaps"),
  ]),
  ("algorithms", "Algorithms", &[
    ("sorting", "Sorting"),
    ("searching", "Searching"),
    ("dynamic_programming", "Dynamic Programming"),
    ("greedy", "Greedy"),
    ("backtracking", "Backtracking"),
    ("divide_and_conquer", "Divide and Conquer"),
    ("graph_algorithms", "Graph Algorithms"),
    ("string_algorithms", "String Algorithms"),
  ]),
];

/// Concept keys for a category, or None if the category is unknown.
pub fn concepts_for(category: &str) -> Option<Vec<&'static str>> {
  CATALOG
    .iter()
    .find(|(key, _, _)| *key == category)
    .map(|(_, _, concepts)| concepts.iter().map(|(k, _)| *k).collect())
}

pub fn is_known_concept(category: &str, concept: &str) -> bool {
  concepts_for(category).map(|c| c.contains(&concept)).unwrap_or(false)
}
