//! Terminal view: command parsing and incremental rendering of session state.
//! Rendering returns lines instead of printing so it can be checked in tests.

use crate::domain::{ChatMessage, Difficulty, ExecutionResult, MessageKind, Role, CATALOG};
use crate::session::Route;
use crate::state::SessionState;

pub const HELP: &str = "\
Commands:
  :new                 generate a new problem
  :code                enter code (finish with a line containing only '.')
  :show                print the code buffer
  :run                 run the code
  :submit              run, then submit
  :adopt               insert the AI's suggested code
  :category <key>      pick a category
  :concept <key|random> pick a concept
  :difficulty <level>  easy | medium | hard
  :topics              list categories and concepts
  :mode <ai mode>      general | debug | explain | concept | interview
  :interview           switch to Code with AI
  :practice            switch to the practice page
  :quit                exit
Anything else is sent to the AI.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
  New,
  Code,
  Show,
  Run,
  Submit,
  Adopt,
  Category(String),
  Concept(String),
  Difficulty(String),
  Topics,
  Mode(String),
  Go(Route),
  Help,
  Quit,
  Chat(String),
  Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
  let line = line.trim();
  let Some(rest) = line.strip_prefix(':') else {
    return Command::Chat(line.to_string());
  };
  let (name, arg) = match rest.split_once(char::is_whitespace) {
    Some((n, a)) => (n, a.trim().to_string()),
    None => (rest, String::new()),
  };
  match name {
    "new" => Command::New,
    "code" => Command::Code,
    "show" => Command::Show,
    "run" => Command::Run,
    "submit" => Command::Submit,
    "adopt" => Command::Adopt,
    "category" => Command::Category(arg),
    "concept" => Command::Concept(arg),
    "difficulty" => Command::Difficulty(arg),
    "topics" => Command::Topics,
    "mode" => Command::Mode(arg),
    "interview" => Command::Go(Route::Interview),
    "practice" => Command::Go(Route::Practice),
    "help" | "h" => Command::Help,
    "quit" | "q" | "exit" => Command::Quit,
    other => Command::Unknown(other.to_string()),
  }
}

pub fn topics() -> String {
  let mut out = String::new();
  for (key, name, concepts) in CATALOG {
    out.push_str(&format!("{} ({})\n", key, name));
    for (c, label) in concepts.iter() {
      out.push_str(&format!("  {} ({})\n", c, label));
    }
  }
  out
}

/// What has already been printed.
#[derive(Debug, Default)]
pub struct View {
  epoch: u64,
  transcript_len: usize,
  output: Option<ExecutionResult>,
  error: Option<String>,
  loading: bool,
  solved: Option<(u32, Difficulty)>,
}

impl View {
  /// Lines for everything that changed since the last call.
  pub fn render(&mut self, state: &SessionState) -> Vec<String> {
    let mut lines = Vec::new();

    if state.problem_epoch != self.epoch {
      self.epoch = state.problem_epoch;
      self.transcript_len = 0;
      self.output = None;
      if let Some(p) = &state.problem {
        lines.push(format!(
          "=== {} [{} / {} / {}] ===",
          p.title.as_deref().unwrap_or("Problem"),
          p.category,
          p.concept,
          p.difficulty.label()
        ));
        lines.push(p.statement.clone());
      }
    }

    if state.transcript.len() < self.transcript_len {
      self.transcript_len = 0;
    }
    for msg in &state.transcript[self.transcript_len..] {
      lines.extend(render_message(msg));
    }
    self.transcript_len = state.transcript.len();

    if state.loading != self.loading {
      self.loading = state.loading;
      if state.loading {
        lines.push("(thinking...)".into());
      }
    }

    if state.output != self.output {
      self.output = state.output.clone();
      if let Some(out) = &state.output {
        lines.push("--- output ---".into());
        let text = out.display_text();
        lines.push(if text.is_empty() { "(no output)".into() } else { text });
      }
    }

    if state.error != self.error {
      self.error = state.error.clone();
      if let Some(e) = &state.error {
        lines.push(format!("! {}", e));
      }
    }

    let solved = (state.progress.solved_count, state.progress.current_difficulty);
    if self.solved != Some(solved) {
      self.solved = Some(solved);
      lines.push(format!("Solved: {}  Level: {}", solved.0, solved.1.label()));
    }
    lines
  }
}

fn render_message(msg: &ChatMessage) -> Vec<String> {
  let tag = match (msg.role, msg.kind) {
    (Role::User, _) => "you",
    (Role::Error, _) => "error",
    (Role::Ai, MessageKind::Welcome) => "ai:welcome",
    (Role::Ai, MessageKind::CodeAnalysis) => "ai:analysis",
    (Role::Ai, MessageKind::SuccessReaction) => "ai:success",
    (Role::Ai, MessageKind::Nudge) => "ai:nudge",
    (Role::Ai, MessageKind::SessionEnd) => "session",
    (Role::Ai, MessageKind::Plain) => "ai",
  };
  let mut lines = vec![format!("[{}] {}", tag, msg.content)];
  if msg.suggestion.is_some() {
    lines.push("(type :adopt to insert the suggested code)".into());
  }
  lines
}
