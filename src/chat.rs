//! Chat controller: user turns, AI replies, code suggestions.
//!
//! Chat is best-effort. A failed AI call becomes an inline error message and
//! the session carries on. Replies that come back after the problem changed
//! are dropped.

use tracing::{debug, instrument, warn};

use crate::api::AiRequest;
use crate::domain::{AiMode, ChatMessage, MessageKind};
use crate::session::Session;
use crate::util::{fill_template, is_code_request};

const FENCE: &str = "```";

/// Code inside the first fenced block of `text`, trimmed, without the fence
/// markers or language tag. None if there is no complete block.
pub fn extract_code_block(text: &str) -> Option<String> {
  let start = text.find(FENCE)?;
  let after_open = &text[start + FENCE.len()..];
  let close = after_open.find(FENCE)?;
  let inner = &after_open[..close];

  // A bare word right after the opening fence is a language tag.
  let body = match inner.find('\n') {
    Some(nl) if is_language_tag(&inner[..nl]) => &inner[nl + 1..],
    _ => inner,
  };
  let code = body.trim();
  if code.is_empty() { None } else { Some(code.to_string()) }
}

fn is_language_tag(s: &str) -> bool {
  let s = s.trim();
  s.is_empty() || s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '#' | '_' | '.'))
}

/// Send a user message and append the AI's answer. Returns false for blank
/// input (nothing appended, nothing sent) or a closed session.
#[instrument(level = "info", skip(session, text), fields(text_len = text.len()))]
pub async fn send_user_message(session: &Session, text: &str, mode: Option<AiMode>) -> bool {
  let text = text.trim();
  if text.is_empty() {
    return false;
  }
  session.record_activity();

  let message = text.to_string();
  let Some((epoch, problem, code)) = session
    .update(|s| {
      s.append_chat_message(ChatMessage::user(message));
      s.set_loading(true);
      (
        s.problem_epoch,
        s.problem.as_ref().map(|p| p.statement.clone()).unwrap_or_default(),
        s.code.clone(),
      )
    })
    .await
  else {
    return false;
  };

  let mode = mode.unwrap_or(session.policy().chat_mode);
  let prompts = &session.config.prompts;
  let question = if mode == AiMode::Interview {
    let fence = if is_code_request(text) { prompts.code_fence_request.as_str() } else { "" };
    fill_template(
      &prompts.interview_template,
      &[("message", text), ("problem", &problem), ("code", &code), ("fence", fence)],
    )
  } else {
    text.to_string()
  };

  let req = AiRequest { question, mode, problem, code };
  let reply = session.backend.ask_ai_or_fallback(&req, &prompts.ai_fallback_text).await;

  let applied = session
    .update_if_current(epoch, |s| {
      s.set_loading(false);
      match reply.error {
        None => {
          let suggestion = extract_code_block(&reply.text);
          debug!(target: "session", has_code = suggestion.is_some(), "AI reply appended");
          s.append_chat_message(ChatMessage::ai(MessageKind::Plain, reply.text).with_suggestion(suggestion));
        }
        Some(e) => {
          s.set_error(Some(e.to_string()));
          s.append_chat_message(ChatMessage::error(reply.text));
        }
      }
    })
    .await;
  if applied.is_none() {
    session.update(|s| s.set_loading(false)).await;
  }
  true
}

/// Overwrite the code buffer with `snippet` and clear the pending suggestion.
pub async fn adopt_suggested_code(session: &Session, snippet: &str) {
  let snippet = snippet.to_string();
  if session.update(|s| s.adopt_suggested_code(&snippet)).await.is_some() {
    session.mark_code_changed();
  }
}

/// Adopt whatever suggestion is pending. Returns false if there is none.
pub async fn adopt_pending_suggestion(session: &Session) -> bool {
  match session.read(|s| s.pending_suggestion.clone()).await {
    Some(snippet) => {
      adopt_suggested_code(session, &snippet).await;
      true
    }
    None => false,
  }
}

/// Ask the interviewer to review the current code; appended as a flagged message.
#[instrument(level = "info", skip(session))]
pub async fn request_code_analysis(session: &Session) {
  let (epoch, problem, code) = session
    .read(|s| (s.problem_epoch, s.problem.as_ref().map(|p| p.statement.clone()).unwrap_or_default(), s.code.clone()))
    .await;
  if code.trim().is_empty() {
    return;
  }
  let question = fill_template(
    &session.config.prompts.analysis_template,
    &[("problem", &problem), ("code", &code)],
  );
  let req = AiRequest { question, mode: AiMode::CodeAnalysis, problem, code };
  match session.backend.ask_ai(&req).await {
    Ok(answer) => {
      session
        .update_if_current(epoch, |s| s.append_chat_message(ChatMessage::ai(MessageKind::CodeAnalysis, answer)))
        .await;
    }
    Err(e) => warn!(target: "monitor", error = %e, "Code analysis failed"),
  }
}

/// React to a run that printed "Success".
#[instrument(level = "info", skip(session, code), fields(code_len = code.len()))]
pub async fn request_success_reaction(session: &Session, epoch: u64, code: String) {
  let problem = session
    .read(|s| s.problem.as_ref().map(|p| p.statement.clone()).unwrap_or_default())
    .await;
  let question = fill_template(
    &session.config.prompts.success_template,
    &[("problem", &problem), ("code", &code)],
  );
  let req = AiRequest { question, mode: AiMode::SuccessReaction, problem, code };
  match session.backend.ask_ai(&req).await {
    Ok(answer) => {
      session
        .update_if_current(epoch, |s| s.append_chat_message(ChatMessage::ai(MessageKind::SuccessReaction, answer)))
        .await;
    }
    Err(e) => warn!(target: "session", error = %e, "Success reaction failed"),
  }
}
