//! HTTP client for the CodeEdge backend.
//!
//! One request per operation, no retries. Failures are classified into
//! `ApiError` so callers can decide where to render them. Calls are
//! instrumented and log endpoint names, latencies and payload sizes (not contents).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::{
  AiMode, Difficulty, ExecutionResult, Problem, ProblemContext, ProgressUpdate, SubmissionOutcome,
};
use crate::protocol::*;
use crate::util::{extract_title, trunc_for_log};

const CLIENT_UA: &str = concat!("codeedge-client/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
  /// Transport failure: offline, connection refused, body read aborted.
  #[error("network error: {0}")]
  Network(String),
  /// The backend answered but the payload says the operation failed.
  #[error("{message}")]
  Backend { message: String },
  /// The response body was not what the endpoint promises.
  #[error("malformed response: {0}")]
  Parse(String),
}

impl ApiError {
  fn backend(message: impl Into<String>) -> Self {
    ApiError::Backend { message: message.into() }
  }
}

/// Parameters of a question generation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionRequest {
  pub user_id: String,
  pub category: String,
  pub concept: String,
  pub difficulty: Difficulty,
  pub use_advanced: bool,
}

/// Parameters of an `/ai` request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiRequest {
  pub question: String,
  pub mode: AiMode,
  pub problem: String,
  pub code: String,
}

/// The backend operations a session depends on.
#[async_trait]
pub trait Backend: Send + Sync {
  async fn generate_question(&self, req: &QuestionRequest) -> Result<Problem, ApiError>;
  /// A failing run is a valid `ExecutionResult`, not an error.
  async fn run_code(&self, code: &str) -> Result<ExecutionResult, ApiError>;
  async fn submit_solution(&self, code: &str, ctx: &ProblemContext) -> Result<SubmissionOutcome, ApiError>;
  async fn update_progress(&self, user_id: &str, difficulty: Difficulty) -> Result<ProgressUpdate, ApiError>;
  async fn ask_ai(&self, req: &AiRequest) -> Result<String, ApiError>;

  /// Chat is best-effort: a failed `ask_ai` yields the user-safe `fallback`
  /// text. The error is kept so the caller can flag the message.
  async fn ask_ai_or_fallback(&self, req: &AiRequest, fallback: &str) -> AiReply {
    match self.ask_ai(req).await {
      Ok(text) => AiReply { text, error: None },
      Err(e) => {
        error!(target: "codeedge", mode = req.mode.as_str(), error = %e, "AI request failed; using fallback text");
        AiReply { text: fallback.to_string(), error: Some(e) }
      }
    }
  }
}

/// Answer of a best-effort AI call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiReply {
  pub text: String,
  /// Set when `text` is the fallback.
  pub error: Option<ApiError>,
}

#[derive(Clone)]
pub struct ApiClient {
  pub client: reqwest::Client,
  pub base_url: String,
  pub user_id: String,
  pub submit_path: String,
}

impl ApiClient {
  pub fn new(base_url: &str, user_id: &str, timeout: Duration) -> Result<Self, ApiError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ApiError::Network(e.to_string()))?;
    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      user_id: user_id.to_string(),
      submit_path: "/submit-solution".into(),
    })
  }

  pub fn with_submit_path(mut self, path: &str) -> Self {
    self.submit_path = if path.starts_with('/') { path.to_string() } else { format!("/{}", path) };
    self
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  /// Send a prepared request and decode the JSON body into `T`.
  async fn send_json<T: DeserializeOwned>(&self, endpoint: &'static str, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
    let start = Instant::now();
    let res = req
      .header(USER_AGENT, CLIENT_UA)
      .header(CONTENT_TYPE, "application/json")
      .send()
      .await
      .map_err(|e| {
        error!(target: "codeedge", endpoint, error = %e, "Request failed to send");
        ApiError::Network(e.to_string())
      })?;

    let status = res.status();
    let body = res.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
    let elapsed = start.elapsed();
    info!(target: "codeedge", endpoint, %status, ?elapsed, body_len = body.len(), "Backend response received");

    match serde_json::from_str::<T>(&body) {
      Ok(v) => Ok(v),
      Err(e) if status.is_success() => {
        debug!(target: "codeedge", endpoint, body = %trunc_for_log(&body, 200), "Unparsable body");
        Err(ApiError::Parse(e.to_string()))
      }
      Err(_) => {
        let msg = serde_json::from_str::<ErrorOut>(&body)
          .ok()
          .and_then(|e| e.error.or(e.message))
          .unwrap_or_else(|| trunc_for_log(body.trim(), 200));
        Err(ApiError::backend(format!("HTTP {}: {}", status, msg)))
      }
    }
  }
}

fn failure_message(error: Option<String>, default: &str) -> String {
  error.filter(|e| !e.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

#[async_trait]
impl Backend for ApiClient {
  #[instrument(level = "info", skip(self, req), fields(category = %req.category, concept = %req.concept, difficulty = %req.difficulty))]
  async fn generate_question(&self, req: &QuestionRequest) -> Result<Problem, ApiError> {
    let query = QuestionQuery {
      user_id: &req.user_id,
      category: &req.category,
      concept: &req.concept,
      difficulty: req.difficulty,
      use_advanced: req.use_advanced,
    };
    let http = self.client.get(self.url("/generate-question")).query(&query);
    let out: QuestionOut = self.send_json("generate-question", http).await?;

    if out.success == Some(false) {
      return Err(ApiError::backend(failure_message(out.error, "Failed to generate question")));
    }
    let Some(statement) = out.statement().map(str::to_string) else {
      return Err(ApiError::backend("Backend returned an empty problem statement"));
    };

    // Advanced generation picks its own level/topic; otherwise keep what was asked for.
    let difficulty = out
      .difficulty
      .as_deref()
      .and_then(|d| d.parse::<Difficulty>().ok())
      .unwrap_or(req.difficulty);
    let problem = Problem {
      id: Some(out.problem_id.or(out.id).unwrap_or_else(|| Uuid::new_v4().to_string())),
      title: out.title.or_else(|| extract_title(&statement)),
      category: out.category.unwrap_or_else(|| req.category.clone()),
      concept: out.concept.unwrap_or_else(|| req.concept.clone()),
      difficulty,
      statement,
    };
    info!(target: "codeedge", title = ?problem.title, %difficulty, advanced = out.is_advanced, "Problem generated");
    Ok(problem)
  }

  #[instrument(level = "info", skip(self, code), fields(code_len = code.len()))]
  async fn run_code(&self, code: &str) -> Result<ExecutionResult, ApiError> {
    let http = self.client.post(self.url("/run")).json(&RunIn { code });
    let out: RunOut = self.send_json("run", http).await?;
    if out.success {
      Ok(ExecutionResult::ok(out.output.unwrap_or_default()))
    } else {
      Ok(ExecutionResult::failure(out.error.unwrap_or_default(), out.traceback))
    }
  }

  #[instrument(level = "info", skip(self, code, ctx), fields(code_len = code.len(), difficulty = %ctx.difficulty))]
  async fn submit_solution(&self, code: &str, ctx: &ProblemContext) -> Result<SubmissionOutcome, ApiError> {
    let body = SubmitIn {
      code,
      category: &ctx.category,
      concept: &ctx.concept,
      difficulty: ctx.difficulty,
      problem: ctx.statement.as_deref(),
    };
    let http = self.client.post(self.url(&self.submit_path)).json(&body);
    let out: SubmitOut = self.send_json("submit-solution", http).await?;
    if !out.success {
      return Err(ApiError::backend(failure_message(out.error, "Failed to submit solution")));
    }
    Ok(SubmissionOutcome {
      success: true,
      message: out.message.unwrap_or_else(|| "Solution submitted successfully!".into()),
      correct: out.correct,
      problem_id: out.problem_id,
    })
  }

  #[instrument(level = "info", skip(self), fields(%difficulty))]
  async fn update_progress(&self, user_id: &str, difficulty: Difficulty) -> Result<ProgressUpdate, ApiError> {
    let http = self.client.post(self.url("/update-progress")).json(&ProgressIn { user_id, difficulty });
    let out: ProgressOut = self.send_json("update-progress", http).await?;
    if !out.success {
      return Err(ApiError::backend(failure_message(out.error, "Error updating progress")));
    }
    let counts = out.progress.ok_or_else(|| ApiError::Parse("missing 'progress' object".into()))?;
    let current_difficulty = match out.current_difficulty.as_deref() {
      Some(d) => d.parse::<Difficulty>().map_err(ApiError::Parse)?,
      None => difficulty,
    };
    Ok(ProgressUpdate { counts, current_difficulty })
  }

  #[instrument(level = "info", skip(self, req), fields(mode = req.mode.as_str(), question_len = req.question.len()))]
  async fn ask_ai(&self, req: &AiRequest) -> Result<String, ApiError> {
    let body = AiIn {
      question: &req.question,
      mode: req.mode.as_str(),
      problem: &req.problem,
      code: &req.code,
      user_id: &self.user_id,
    };
    let http = self.client.post(self.url("/ai")).json(&body);
    let out: AiOut = self.send_json("ai", http).await?;
    if !out.success {
      return Err(ApiError::backend(failure_message(out.error, "Failed to get AI response")));
    }
    out.response.ok_or_else(|| ApiError::Parse("missing 'response' field".into()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{
    extract::Query,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
  };
  use serde_json::{json, Value};
  use std::collections::HashMap;

  async fn serve(app: Router) -> ApiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      axum::serve(listener, app).await.unwrap();
    });
    ApiClient::new(&format!("http://{}", addr), "tester", Duration::from_secs(5)).unwrap()
  }

  fn ctx() -> ProblemContext {
    ProblemContext {
      category: "algorithms".into(),
      concept: "greedy".into(),
      difficulty: Difficulty::Medium,
      statement: Some("Title: Coins\n...".into()),
    }
  }

  #[tokio::test]
  async fn run_code_returns_output() {
    let app = Router::new().route(
      "/run",
      post(|Json(body): Json<Value>| async move {
        assert_eq!(body["code"], "print('hi')");
        Json(json!({ "success": true, "output": "hi\n" }))
      }),
    );
    let api = serve(app).await;
    let result = api.run_code("print('hi')").await.unwrap();
    assert!(result.success);
    assert_eq!(result.output, "hi\n");
  }

  #[tokio::test]
  async fn failing_run_is_a_result_not_an_error() {
    let app = Router::new().route(
      "/run",
      post(|| async { Json(json!({ "success": false, "error": "SyntaxError", "traceback": "File <string>" })) }),
    );
    let api = serve(app).await;
    let result = api.run_code("def(").await.unwrap();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("SyntaxError"));
    assert_eq!(result.traceback.as_deref(), Some("File <string>"));
  }

  #[tokio::test]
  async fn generate_question_sends_selection_and_extracts_title() {
    let app = Router::new().route(
      "/generate-question",
      get(|Query(q): Query<HashMap<String, String>>| async move {
        assert_eq!(q.get("category").map(String::as_str), Some("data_structures"));
        assert_eq!(q.get("concept").map(String::as_str), Some("heaps"));
        assert_eq!(q.get("difficulty").map(String::as_str), Some("hard"));
        assert_eq!(q.get("use_advanced").map(String::as_str), Some("false"));
        Json(json!({
          "success": true,
          "question": "Title: K Smallest\n\nDescription: ...",
          "concept": "heaps",
          "is_advanced": false
        }))
      }),
    );
    let api = serve(app).await;
    let problem = api
      .generate_question(&QuestionRequest {
        user_id: "tester".into(),
        category: "data_structures".into(),
        concept: "heaps".into(),
        difficulty: Difficulty::Hard,
        use_advanced: false,
      })
      .await
      .unwrap();
    assert_eq!(problem.title.as_deref(), Some("K Smallest"));
    assert_eq!(problem.difficulty, Difficulty::Hard);
    assert_eq!(problem.category, "data_structures");
    assert!(problem.id.is_some());
  }

  #[tokio::test]
  async fn statement_comes_from_either_key() {
    let app = Router::new().route(
      "/generate-question",
      get(|| async {
        Json(json!({
          "success": true,
          "question": "  ",
          "problem": "Title: Merge Intervals\n\nDescription: ..."
        }))
      }),
    );
    let api = serve(app).await;
    let problem = api
      .generate_question(&QuestionRequest {
        user_id: "tester".into(),
        category: "algorithms".into(),
        concept: "sorting".into(),
        difficulty: Difficulty::Medium,
        use_advanced: false,
      })
      .await
      .unwrap();
    assert_eq!(problem.title.as_deref(), Some("Merge Intervals"));
    assert!(problem.statement.starts_with("Title: Merge Intervals"));
  }

  #[tokio::test]
  async fn backend_failure_payload_is_classified() {
    let app = Router::new().route(
      "/generate-question",
      get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "success": false, "error": "model offline" }))) }),
    );
    let api = serve(app).await;
    let err = api
      .generate_question(&QuestionRequest {
        user_id: "tester".into(),
        category: "algorithms".into(),
        concept: "sorting".into(),
        difficulty: Difficulty::Easy,
        use_advanced: true,
      })
      .await
      .unwrap_err();
    assert_eq!(err, ApiError::Backend { message: "model offline".into() });
  }

  #[tokio::test]
  async fn malformed_body_is_a_parse_error() {
    let app = Router::new().route("/ai", post(|| async { "<html>oops</html>" }));
    let api = serve(app).await;
    let req = AiRequest { question: "hi".into(), mode: AiMode::General, problem: String::new(), code: String::new() };
    let err = api.ask_ai(&req).await.unwrap_err();
    assert!(matches!(err, ApiError::Parse(_)), "got {:?}", err);

    let reply = api.ask_ai_or_fallback(&req, "Sorry, try again.").await;
    assert_eq!(reply.text, "Sorry, try again.");
    assert!(matches!(reply.error, Some(ApiError::Parse(_))));
  }

  #[tokio::test]
  async fn non_json_error_status_is_a_backend_error() {
    let app = Router::new().route("/run", post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }));
    let api = serve(app).await;
    let err = api.run_code("x = 1").await.unwrap_err();
    match err {
      ApiError::Backend { message } => assert!(message.contains("502") && message.contains("upstream down")),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn connection_refused_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let api = ApiClient::new(&format!("http://{}", addr), "tester", Duration::from_secs(2)).unwrap();
    let err = api.run_code("x = 1").await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
  }

  #[tokio::test]
  async fn ask_ai_forwards_mode_and_user() {
    let app = Router::new().route(
      "/ai",
      post(|Json(body): Json<Value>| async move {
        assert_eq!(body["type"], "code_analysis");
        assert_eq!(body["user_id"], "tester");
        Json(json!({ "success": true, "response": "Looks fine." }))
      }),
    );
    let api = serve(app).await;
    let req = AiRequest { question: "analyze".into(), mode: AiMode::CodeAnalysis, problem: "p".into(), code: "c".into() };
    assert_eq!(api.ask_ai(&req).await.unwrap(), "Looks fine.");
  }

  #[tokio::test]
  async fn submit_and_progress_round_trip() {
    let app = Router::new()
      .route(
        "/submit",
        post(|Json(body): Json<Value>| async move {
          assert_eq!(body["difficulty"], "medium");
          assert!(body["problem"].as_str().unwrap().starts_with("Title: Coins"));
          Json(json!({ "success": true, "message": "All tests passed", "correct": true }))
        }),
      )
      .route(
        "/update-progress",
        post(|| async {
          Json(json!({
            "success": true,
            "current_difficulty": "medium",
            "progress": { "easy_solved": 1, "medium_solved": 0, "hard_solved": 0 }
          }))
        }),
      );
    let api = serve(app).await.with_submit_path("submit");
    let outcome = api.submit_solution("print(1)", &ctx()).await.unwrap();
    assert_eq!(outcome.correct, Some(true));
    assert_eq!(outcome.message, "All tests passed");

    let update = api.update_progress("tester", Difficulty::Easy).await.unwrap();
    assert_eq!(update.counts.easy, 1);
    assert_eq!(update.current_difficulty, Difficulty::Medium);
  }
}
