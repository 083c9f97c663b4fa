//! Loading client configuration (backend URL, timers, flow policies, prompts) from TOML.
//!
//! See `ClientConfig`, `FlowPolicy` and `Prompts` for the expected schema. Every
//! field has a default, so an empty file (or no file at all) is a valid config.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tracing::{error, info};

use crate::domain::AiMode;

pub const DEFAULT_API_URL: &str = "http://localhost:5001";
pub const DEFAULT_USER_ID: &str = "user_123";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  pub api_url: String,
  pub user_id: String,
  pub request_timeout_secs: u64,
  pub submit_path: String,
  /// Where solved-problem bookkeeping is persisted. None keeps it in memory.
  pub progress_path: Option<PathBuf>,
  pub timers: Timers,
  #[serde(deserialize_with = "practice_policy")]
  pub practice: FlowPolicy,
  #[serde(deserialize_with = "interview_policy")]
  pub interview: FlowPolicy,
  pub prompts: Prompts,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      api_url: DEFAULT_API_URL.into(),
      user_id: DEFAULT_USER_ID.into(),
      request_timeout_secs: 60,
      submit_path: "/submit-solution".into(),
      progress_path: default_progress_path(),
      timers: Timers::default(),
      practice: FlowPolicy::practice(),
      interview: FlowPolicy::interview(),
      prompts: Prompts::default(),
    }
  }
}

impl ClientConfig {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  /// Apply CODEEDGE_* environment overrides on top of file values.
  pub fn apply_env(&mut self) {
    if let Ok(url) = std::env::var("CODEEDGE_API_URL") {
      if !url.trim().is_empty() {
        self.api_url = url;
      }
    }
    if let Ok(user) = std::env::var("CODEEDGE_USER_ID") {
      if !user.trim().is_empty() {
        self.user_id = user;
      }
    }
    if let Ok(path) = std::env::var("CODEEDGE_PROGRESS_PATH") {
      self.progress_path = if path.trim().is_empty() { None } else { Some(PathBuf::from(path)) };
    }
  }
}

/// Engagement timer durations.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Timers {
  pub idle_nudge_secs: u64,
  pub session_end_secs: u64,
  pub analysis_interval_secs: u64,
  pub monitor_tick_millis: u64,
  pub next_problem_delay_millis: u64,
  pub redirect_delay_millis: u64,
}

impl Default for Timers {
  fn default() -> Self {
    Self {
      idle_nudge_secs: 5 * 60,
      session_end_secs: 10 * 60,
      analysis_interval_secs: 2 * 60,
      monitor_tick_millis: 1000,
      next_problem_delay_millis: 2000,
      redirect_delay_millis: 2000,
    }
  }
}

impl Timers {
  pub fn idle_nudge(&self) -> Duration { Duration::from_secs(self.idle_nudge_secs) }
  pub fn session_end(&self) -> Duration { Duration::from_secs(self.session_end_secs) }
  pub fn analysis_interval(&self) -> Duration { Duration::from_secs(self.analysis_interval_secs) }
  pub fn monitor_tick(&self) -> Duration { Duration::from_millis(self.monitor_tick_millis.max(1)) }
  pub fn next_problem_delay(&self) -> Duration { Duration::from_millis(self.next_problem_delay_millis) }
  pub fn redirect_delay(&self) -> Duration { Duration::from_millis(self.redirect_delay_millis) }
}

/// Which endpoint marks a passing run as solved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitVia {
  SubmitSolution,
  UpdateProgress,
}

/// Per-route workflow policy. The practice page and the "Code with AI" page
/// run the same session workflow with different knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowPolicy {
  pub submit_via: SubmitVia,
  pub advance_on_success: bool,
  pub welcome: bool,
  pub use_advanced: bool,
  /// Engagement monitor (nudge, session end, analysis) enabled.
  pub monitor: bool,
  /// Ask for a success reaction after a run printing "Success".
  pub react_to_success: bool,
  pub placeholder: String,
  pub chat_mode: AiMode,
}

impl FlowPolicy {
  pub fn practice() -> Self {
    Self {
      submit_via: SubmitVia::SubmitSolution,
      advance_on_success: false,
      welcome: false,
      use_advanced: false,
      monitor: false,
      react_to_success: false,
      placeholder: "# Write your code here\n".into(),
      chat_mode: AiMode::General,
    }
  }

  pub fn interview() -> Self {
    Self {
      submit_via: SubmitVia::UpdateProgress,
      advance_on_success: true,
      welcome: true,
      use_advanced: true,
      monitor: true,
      react_to_success: true,
      placeholder: String::new(),
      chat_mode: AiMode::Interview,
    }
  }
}

/// A `[practice]` / `[interview]` TOML section. Only the named fields
/// replace the route's built-in policy.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlowPolicyToml {
  submit_via: Option<SubmitVia>,
  advance_on_success: Option<bool>,
  welcome: Option<bool>,
  use_advanced: Option<bool>,
  monitor: Option<bool>,
  react_to_success: Option<bool>,
  placeholder: Option<String>,
  chat_mode: Option<AiMode>,
}

impl FlowPolicyToml {
  fn apply(self, mut base: FlowPolicy) -> FlowPolicy {
    if let Some(v) = self.submit_via { base.submit_via = v; }
    if let Some(v) = self.advance_on_success { base.advance_on_success = v; }
    if let Some(v) = self.welcome { base.welcome = v; }
    if let Some(v) = self.use_advanced { base.use_advanced = v; }
    if let Some(v) = self.monitor { base.monitor = v; }
    if let Some(v) = self.react_to_success { base.react_to_success = v; }
    if let Some(v) = self.placeholder { base.placeholder = v; }
    if let Some(v) = self.chat_mode { base.chat_mode = v; }
    base
  }
}

fn practice_policy<'de, D: Deserializer<'de>>(d: D) -> Result<FlowPolicy, D::Error> {
  FlowPolicyToml::deserialize(d).map(|t| t.apply(FlowPolicy::practice()))
}

fn interview_policy<'de, D: Deserializer<'de>>(d: D) -> Result<FlowPolicy, D::Error> {
  FlowPolicyToml::deserialize(d).map(|t| t.apply(FlowPolicy::interview()))
}

/// Prompt templates sent to the `/ai` endpoint and fixed chat texts.
/// Override them in TOML to tune the interviewer's tone.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub interview_template: String,
  pub code_fence_request: String,
  pub analysis_template: String,
  pub success_template: String,
  pub welcome_template: String,
  pub nudge_text: String,
  pub solved_text: String,
  pub session_end_text: String,
  pub ai_fallback_text: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      interview_template: "As an interviewer, respond to the candidate's message: \"{message}\" regarding the problem: {problem}.\nThe candidate's current code is: {code}.\n{fence}\nProvide feedback, ask probing questions, or guide them through the solution process.".into(),
      code_fence_request: "If providing code, wrap it in triple backticks with python language specification (```python).".into(),
      analysis_template: "As an interviewer, analyze this code for the problem: {problem}\n\nCode:\n{code}".into(),
      success_template: "The candidate successfully solved the problem: {problem}\n\nTheir solution:\n{code}".into(),
      welcome_template: "Hi! Welcome To Code With AI. Let's get started with a {difficulty} problem!".into(),
      nudge_text: "I notice you've been working on this problem for a while. Would you like some guidance or have any specific questions about the approach?".into(),
      solved_text: "Great job! Your solution has been submitted successfully. Let's move on to the next problem!".into(),
      session_end_text: "Session completed! Redirecting to main page...".into(),
      ai_fallback_text: "Sorry, I encountered an error. Please try again.".into(),
    }
  }
}

fn default_progress_path() -> Option<PathBuf> {
  std::env::var_os("HOME")
    .or_else(|| std::env::var_os("USERPROFILE"))
    .map(|home| PathBuf::from(home).join(".codeedge").join("progress.json"))
}

/// Attempt to load `ClientConfig` from CODEEDGE_CONFIG_PATH (or an explicit path).
/// On any parsing/IO error the defaults are used; env overrides are applied last.
pub fn load_client_config(path: Option<PathBuf>) -> ClientConfig {
  let path = path.or_else(|| std::env::var_os("CODEEDGE_CONFIG_PATH").map(PathBuf::from));
  let mut cfg = match path {
    Some(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match toml::from_str::<ClientConfig>(&s) {
        Ok(cfg) => {
          info!(target: "codeedge", path = %path.display(), "Loaded client config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "codeedge", path = %path.display(), error = %e, "Failed to parse TOML config; using defaults");
          ClientConfig::default()
        }
      },
      Err(e) => {
        error!(target: "codeedge", path = %path.display(), error = %e, "Failed to read TOML config file; using defaults");
        ClientConfig::default()
      }
    },
    None => ClientConfig::default(),
  };
  cfg.apply_env();
  cfg
}
