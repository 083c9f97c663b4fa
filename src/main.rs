//! CodeEdge · terminal coding-practice client
//!
//! - Practice page: pick a topic, write code, run, submit
//! - Code with AI page: interviewer chat, engagement monitor, auto-advance
//! - Talks to the CodeEdgeAI HTTP backend; solved counters persist locally
//!
//! Important env variables:
//!   CODEEDGE_CONFIG_PATH   : path to TOML config (timers, flow policies, prompts)
//!   CODEEDGE_API_URL       : backend base URL (default "http://localhost:5001")
//!   CODEEDGE_USER_ID       : user id sent to the backend (default "user_123")
//!   CODEEDGE_PROGRESS_PATH : progress file (default ~/.codeedge/progress.json; empty = memory only)
//!   LOG_LEVEL              : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT             : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod protocol;
mod api;
mod progress;
mod state;
mod session;
mod monitor;
mod chat;
mod workflow;
mod view;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;

use crate::api::{ApiClient, Backend};
use crate::config::ClientConfig;
use crate::domain::{AiMode, Difficulty};
use crate::progress::{FileProgressStore, MemoryProgressStore, ProgressStore};
use crate::session::{Route, Session, SessionEvent};
use crate::view::{parse_command, Command, View, HELP};

type Input = Lines<BufReader<Stdin>>;

#[derive(Parser, Debug)]
#[command(name = "codeedge", version, about = "Practice coding problems against the CodeEdgeAI backend")]
struct Cli {
  /// TOML config file (overrides CODEEDGE_CONFIG_PATH)
  #[arg(long)]
  config: Option<PathBuf>,

  /// Backend base URL
  #[arg(long)]
  api_url: Option<String>,

  /// User id sent with generation and progress requests
  #[arg(long)]
  user_id: Option<String>,

  /// Page to open first
  #[arg(long, value_enum, default_value_t = Page::Practice)]
  mode: Page,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Page {
  Practice,
  Interview,
}

impl From<Page> for Route {
  fn from(p: Page) -> Self {
    match p {
      Page::Practice => Route::Practice,
      Page::Interview => Route::Interview,
    }
  }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();
  let cli = Cli::parse();

  let mut cfg = config::load_client_config(cli.config);
  if let Some(url) = cli.api_url {
    cfg.api_url = url;
  }
  if let Some(user) = cli.user_id {
    cfg.user_id = user;
  }
  let config = Arc::new(cfg);

  let backend: Arc<dyn Backend> = Arc::new(
    ApiClient::new(&config.api_url, &config.user_id, config.request_timeout())?
      .with_submit_path(&config.submit_path),
  );
  let store: Arc<dyn ProgressStore> = match &config.progress_path {
    Some(path) => Arc::new(FileProgressStore::new(path)),
    None => Arc::new(MemoryProgressStore::default()),
  };
  info!(target: "codeedge", api_url = %config.api_url, user = %config.user_id, "Client starting");

  let mut input = BufReader::new(tokio::io::stdin()).lines();
  let mut route: Route = cli.mode.into();
  while let Some(next) = run_page(route, &config, &backend, &store, &mut input).await? {
    route = next;
  }
  Ok(())
}

/// Mount one page and drive it until the user leaves. Returns the next page,
/// or None to exit.
async fn run_page(
  route: Route,
  config: &Arc<ClientConfig>,
  backend: &Arc<dyn Backend>,
  store: &Arc<dyn ProgressStore>,
  input: &mut Input,
) -> std::io::Result<Option<Route>> {
  let (session, mut events) = Session::new(route, config.clone(), backend.clone(), store.clone());
  let monitor = session.start();
  let mut view = View::default();
  let mut chat_mode: Option<AiMode> = None;

  println!("-- {} --  (:help for commands)", route.name());
  print_lines(view.render(&session.snapshot().await));
  if route == Route::Interview {
    let s = session.clone();
    tokio::spawn(async move { let _ = workflow::load_new_problem(&s).await; });
  }

  let next = loop {
    tokio::select! {
      line = input.next_line() => {
        let Some(line) = line? else { break None };
        session.record_activity();
        match parse_command(&line) {
          Command::Quit => break None,
          Command::Go(r) if r != route => break Some(r),
          Command::Go(_) => {}
          Command::Code => read_code(&session, input).await?,
          other => handle(&session, other, &mut chat_mode).await,
        }
      }
      Some(event) = events.recv() => match event {
        SessionEvent::Changed => print_lines(view.render(&session.snapshot().await)),
        SessionEvent::Notice(text) => println!("** {}", text),
        SessionEvent::Navigate(r) => break Some(r),
      },
      _ = tokio::signal::ctrl_c() => break None,
    }
  };

  session.close();
  if let Some(handle) = monitor {
    let _ = handle.await;
  }
  Ok(next)
}

/// Collect lines into the code buffer until a lone ".".
async fn read_code(session: &Session, input: &mut Input) -> std::io::Result<()> {
  println!("(enter code; finish with a line containing only '.')");
  let mut code = String::new();
  while let Some(line) = input.next_line().await? {
    session.record_activity();
    if line.trim_end() == "." {
      break;
    }
    code.push_str(&line);
    code.push('\n');
  }
  session.update_code(code).await;
  Ok(())
}

async fn handle(session: &Session, command: Command, chat_mode: &mut Option<AiMode>) {
  match command {
    Command::New => {
      let s = session.clone();
      tokio::spawn(async move { let _ = workflow::load_new_problem(&s).await; });
    }
    Command::Run => {
      let s = session.clone();
      tokio::spawn(async move { let _ = workflow::run(&s).await; });
    }
    Command::Submit => {
      let s = session.clone();
      tokio::spawn(async move { let _ = workflow::submit(&s).await; });
    }
    Command::Show => {
      let code = session.read(|s| s.code.clone()).await;
      println!("{}", if code.is_empty() { "(empty)" } else { code.as_str() });
    }
    Command::Adopt => {
      if !chat::adopt_pending_suggestion(session).await {
        println!("No suggested code to insert.");
      }
    }
    Command::Category(key) => {
      if let Some(Err(e)) = session.update(|s| s.set_category(&key)).await {
        println!("{}", e);
      }
    }
    Command::Concept(key) if key == "random" => {
      session.update(|s| s.randomize_concept()).await;
      let sel = session.read(|s| s.selection.clone()).await;
      println!("Picked {} / {}", sel.category, sel.concept);
    }
    Command::Concept(key) => {
      if let Some(Err(e)) = session.update(|s| s.set_concept(&key)).await {
        println!("{}", e);
      }
    }
    Command::Difficulty(level) => match level.parse::<Difficulty>() {
      Ok(d) => {
        session.update(|s| s.set_difficulty(d)).await;
      }
      Err(e) => println!("{}", e),
    },
    Command::Topics => print!("{}", view::topics()),
    Command::Mode(name) => match name.parse::<AiMode>() {
      Ok(mode) => *chat_mode = Some(mode),
      Err(e) => println!("{}", e),
    },
    Command::Help => println!("{}", HELP),
    Command::Unknown(name) => println!("Unknown command :{} (try :help)", name),
    Command::Chat(text) => {
      if !text.is_empty() {
        let s = session.clone();
        let mode = *chat_mode;
        tokio::spawn(async move { chat::send_user_message(&s, &text, mode).await; });
      }
    }
    Command::Code | Command::Go(_) | Command::Quit => {}
  }
}

fn print_lines(lines: Vec<String>) {
  for line in lines {
    println!("{}", line);
  }
}
