//! Scripted in-memory `Backend` for session, workflow and chat tests.
//!
//! Responses are queued per endpoint and popped in order; an empty queue
//! yields a plausible success. Every call is recorded for assertions.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{AiRequest, ApiError, Backend, QuestionRequest};
use crate::domain::{
  Difficulty, DifficultyCounts, ExecutionResult, Problem, ProblemContext, ProgressUpdate, SubmissionOutcome,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
  Generate(QuestionRequest),
  Run(String),
  Submit(String, ProblemContext),
  Progress(String, Difficulty),
  Ai(AiRequest),
}

#[derive(Default)]
pub struct FakeBackend {
  questions: Mutex<VecDeque<Result<Problem, ApiError>>>,
  runs: Mutex<VecDeque<Result<ExecutionResult, ApiError>>>,
  submits: Mutex<VecDeque<Result<SubmissionOutcome, ApiError>>>,
  progress: Mutex<VecDeque<Result<ProgressUpdate, ApiError>>>,
  ai: Mutex<VecDeque<Result<String, ApiError>>>,
  calls: Mutex<Vec<Call>>,
}

pub fn problem(n: u32, difficulty: Difficulty) -> Problem {
  Problem {
    id: Some(format!("p{}", n)),
    title: Some(format!("Problem {}", n)),
    category: "algorithms".into(),
    concept: "greedy".into(),
    difficulty,
    statement: format!("Title: Problem {}\nSolve it.", n),
  }
}

impl FakeBackend {
  pub fn push_question(&self, r: Result<Problem, ApiError>) { self.questions.lock().unwrap().push_back(r); }
  pub fn push_run(&self, r: Result<ExecutionResult, ApiError>) { self.runs.lock().unwrap().push_back(r); }
  pub fn push_submit(&self, r: Result<SubmissionOutcome, ApiError>) { self.submits.lock().unwrap().push_back(r); }
  pub fn push_progress(&self, r: Result<ProgressUpdate, ApiError>) { self.progress.lock().unwrap().push_back(r); }
  pub fn push_ai(&self, r: Result<String, ApiError>) { self.ai.lock().unwrap().push_back(r); }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn ai_calls(&self) -> Vec<AiRequest> {
    self.calls().into_iter().filter_map(|c| match c { Call::Ai(r) => Some(r), _ => None }).collect()
  }

  fn record(&self, call: Call) {
    self.calls.lock().unwrap().push(call);
  }
}

#[async_trait]
impl Backend for FakeBackend {
  async fn generate_question(&self, req: &QuestionRequest) -> Result<Problem, ApiError> {
    self.record(Call::Generate(req.clone()));
    let n = self.calls().iter().filter(|c| matches!(c, Call::Generate(_))).count() as u32;
    self.questions.lock().unwrap().pop_front().unwrap_or_else(|| Ok(problem(n, req.difficulty)))
  }

  async fn run_code(&self, code: &str) -> Result<ExecutionResult, ApiError> {
    self.record(Call::Run(code.to_string()));
    self.runs.lock().unwrap().pop_front().unwrap_or_else(|| Ok(ExecutionResult::ok("")))
  }

  async fn submit_solution(&self, code: &str, ctx: &ProblemContext) -> Result<SubmissionOutcome, ApiError> {
    self.record(Call::Submit(code.to_string(), ctx.clone()));
    self.submits.lock().unwrap().pop_front().unwrap_or_else(|| {
      Ok(SubmissionOutcome { success: true, message: "Accepted".into(), correct: Some(true), problem_id: None })
    })
  }

  async fn update_progress(&self, user_id: &str, difficulty: Difficulty) -> Result<ProgressUpdate, ApiError> {
    self.record(Call::Progress(user_id.to_string(), difficulty));
    self.progress.lock().unwrap().pop_front().unwrap_or_else(|| {
      Ok(ProgressUpdate { counts: DifficultyCounts::default(), current_difficulty: difficulty })
    })
  }

  async fn ask_ai(&self, req: &AiRequest) -> Result<String, ApiError> {
    self.record(Call::Ai(req.clone()));
    self.ai.lock().unwrap().pop_front().unwrap_or_else(|| Ok("OK".into()))
  }
}
