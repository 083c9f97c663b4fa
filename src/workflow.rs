//! Core behaviors behind the view's buttons.
//!
//! This includes:
//!   - Loading a new problem (with the interview flow's welcome message)
//!   - Running the code buffer
//!   - Run-then-submit: a solution is only credited after a passing run
//!
//! Errors are rendered into the session (output area or error banner) before
//! they are returned, so callers may ignore them.

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{ApiError, QuestionRequest};
use crate::chat;
use crate::config::SubmitVia;
use crate::domain::{ChatMessage, ExecutionResult, MessageKind, ProblemContext, ProgressUpdate};
use crate::session::Session;
use crate::util::fill_template;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
  /// Rejected locally; nothing was sent.
  #[error("{0}")]
  Validation(String),
  #[error(transparent)]
  Api(#[from] ApiError),
  #[error("session closed")]
  Closed,
}

/// How a submission ended when no error occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitResult {
  Solved,
  /// Ran fine but the backend did not accept the answer.
  Incorrect,
  /// The run step failed; nothing was submitted.
  RunFailed,
}

/// Fetch a problem for the current selection and load it.
#[instrument(level = "info", skip(session), fields(route = session.route.name()))]
pub async fn load_new_problem(session: &Session) -> Result<(), WorkflowError> {
  let policy = session.policy().clone();
  let user_id = session.config.user_id.clone();
  let req = session
    .update(|s| {
      s.set_loading(true);
      s.set_error(None);
      QuestionRequest {
        user_id,
        category: s.selection.category.clone(),
        concept: s.selection.concept.clone(),
        difficulty: if policy.use_advanced { s.progress.current_difficulty } else { s.selection.difficulty },
        use_advanced: policy.use_advanced,
      }
    })
    .await
    .ok_or(WorkflowError::Closed)?;

  match session.backend.generate_question(&req).await {
    Ok(problem) => {
      let welcome = policy.welcome.then(|| {
        fill_template(&session.config.prompts.welcome_template, &[("difficulty", problem.difficulty.as_str())])
      });
      session
        .update(|s| {
          s.load_problem(problem);
          if let Some(text) = welcome {
            s.append_chat_message(ChatMessage::ai(MessageKind::Welcome, text));
          }
          s.set_loading(false);
        })
        .await
        .ok_or(WorkflowError::Closed)?;
      // The buffer was reset to the placeholder: a code change for the monitor.
      session.mark_code_changed();
      Ok(())
    }
    Err(e) => {
      warn!(target: "session", error = %e, "Problem generation failed");
      let msg = format!("Could not generate a new question: {}", e);
      session
        .update(|s| {
          s.set_loading(false);
          s.set_error(Some(msg));
        })
        .await;
      Err(e.into())
    }
  }
}

/// Run the code buffer and show the result.
#[instrument(level = "info", skip(session))]
pub async fn run(session: &Session) -> Result<ExecutionResult, WorkflowError> {
  let (code, epoch) = session.read(|s| (s.code.clone(), s.problem_epoch)).await;
  if code.trim().is_empty() {
    return Err(reject(session, "Please write some code before running").await);
  }
  let result = execute(session, &code).await?;

  if result.success && session.policy().react_to_success && result.output.contains("Success") {
    let s = session.clone();
    tokio::spawn(async move { chat::request_success_reaction(&s, epoch, code).await });
  }
  Ok(result)
}

/// Run, then submit. Counters only move after a passing run and an accepted submission.
#[instrument(level = "info", skip(session))]
pub async fn submit(session: &Session) -> Result<SubmitResult, WorkflowError> {
  let (code, epoch, problem, selection, current) = session
    .read(|s| (s.code.clone(), s.problem_epoch, s.problem.clone(), s.selection.clone(), s.progress.current_difficulty))
    .await;
  if code.trim().is_empty() {
    return Err(reject(session, "Please write some code before submitting").await);
  }

  let run = execute(session, &code).await?;
  if !run.success {
    info!(target: "session", "Run failed; submission stopped");
    return Ok(SubmitResult::RunFailed);
  }

  let policy = session.policy().clone();
  let problem_id = problem.as_ref().and_then(|p| p.id.clone());
  let solved = match policy.submit_via {
    SubmitVia::SubmitSolution => {
      let ctx = problem.as_ref().map(|p| p.context()).unwrap_or(ProblemContext {
        category: selection.category,
        concept: selection.concept,
        difficulty: selection.difficulty,
        statement: None,
      });
      let outcome = match session.backend.submit_solution(&code, &ctx).await {
        Ok(o) => o,
        Err(e) => return Err(fail(session, e).await),
      };
      let message = outcome.message.clone();
      session.update(|s| s.record_execution_result(ExecutionResult::ok(message))).await;
      if outcome.correct == Some(true) {
        Some((outcome.problem_id.or(problem_id), None))
      } else {
        None
      }
    }
    SubmitVia::UpdateProgress => {
      let difficulty = problem.as_ref().map(|p| p.difficulty).unwrap_or(current);
      match session.backend.update_progress(&session.config.user_id, difficulty).await {
        Ok(update) => Some((problem_id, Some(update))),
        Err(e) => return Err(fail(session, e).await),
      }
    }
  };

  let Some((id, update)) = solved else {
    return Ok(SubmitResult::Incorrect);
  };
  credit(session, id, update).await?;

  if policy.advance_on_success {
    tokio::select! {
      _ = session.cancelled() => return Ok(SubmitResult::Solved),
      _ = tokio::time::sleep(session.config.timers.next_problem_delay()) => {}
    }
    // The user may have moved on by hand in the meantime.
    if session.read(|s| s.problem_epoch).await == epoch {
      // Generation failures are already shown in the error banner.
      let _ = load_new_problem(session).await;
    }
  }
  Ok(SubmitResult::Solved)
}

async fn execute(session: &Session, code: &str) -> Result<ExecutionResult, WorkflowError> {
  match session.backend.run_code(code).await {
    Ok(result) => {
      let shown = result.clone();
      session.update(|s| s.record_execution_result(shown)).await;
      Ok(result)
    }
    Err(e) => Err(fail(session, e).await),
  }
}

async fn reject(session: &Session, message: &str) -> WorkflowError {
  session
    .update(|s| s.record_execution_result(ExecutionResult::failure(message, None)))
    .await;
  WorkflowError::Validation(message.to_string())
}

async fn fail(session: &Session, e: ApiError) -> WorkflowError {
  let shown = ExecutionResult::failure(e.to_string(), None);
  session.update(|s| s.record_execution_result(shown)).await;
  e.into()
}

async fn credit(session: &Session, problem_id: Option<String>, update: Option<ProgressUpdate>) -> Result<(), WorkflowError> {
  let text = session.config.prompts.solved_text.clone();
  let solved = session
    .update(|s| {
      if let Some(u) = update {
        s.apply_progress_update(u);
      }
      s.increment_solved(problem_id.as_deref());
      s.append_chat_message(ChatMessage::ai(MessageKind::SuccessReaction, text));
      s.progress.solved_count
    })
    .await
    .ok_or(WorkflowError::Closed)?;
  info!(target: "session", solved, "Problem solved");
  session.persist_progress().await;
  Ok(())
}
