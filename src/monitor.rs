//! Inactivity & engagement monitor.
//!
//! Two timers per session, both modelled as pure state over `Instant`s so
//! they can be driven by any clock:
//!   - `IdleMonitor`: active -> idle-warned (nudge) -> ended (session end)
//!   - `AnalysisSchedule`: recurring code analysis, skipped for an empty buffer
//!
//! `spawn` drives both from one ticker until the session is closed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::chat;
use crate::domain::{ChatMessage, MessageKind};
use crate::session::{Route, Session, SessionEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleState {
  Active,
  IdleWarned,
  Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorAction {
  /// Ask the user whether they are stuck.
  Nudge,
  /// End the session and navigate away.
  EndSession,
}

#[derive(Clone, Debug)]
pub struct IdleMonitor {
  state: IdleState,
  last_activity: Instant,
  last_code_change: Instant,
  idle_after: Duration,
  end_after: Duration,
}

impl IdleMonitor {
  pub fn new(now: Instant, idle_after: Duration, end_after: Duration) -> Self {
    Self { state: IdleState::Active, last_activity: now, last_code_change: now, idle_after, end_after }
  }

  #[cfg(test)]
  pub fn state(&self) -> IdleState {
    self.state
  }

  pub fn on_activity(&mut self, now: Instant) {
    if self.state == IdleState::Ended {
      return;
    }
    self.last_activity = now;
    self.state = IdleState::Active;
  }

  /// A code edit is also activity.
  pub fn on_code_change(&mut self, now: Instant) {
    if self.state == IdleState::Ended {
      return;
    }
    self.last_code_change = now;
    self.on_activity(now);
  }

  /// Advance the clock. Ended is terminal; the nudge fires once per idle stretch.
  pub fn tick(&mut self, now: Instant) -> Option<MonitorAction> {
    if self.state == IdleState::Ended {
      return None;
    }
    if now.saturating_duration_since(self.last_code_change) >= self.end_after {
      self.state = IdleState::Ended;
      return Some(MonitorAction::EndSession);
    }
    if self.state == IdleState::Active && now.saturating_duration_since(self.last_activity) >= self.idle_after {
      self.state = IdleState::IdleWarned;
      return Some(MonitorAction::Nudge);
    }
    None
  }
}

/// Fixed-interval analysis slots.
#[derive(Clone, Debug)]
pub struct AnalysisSchedule {
  interval: Duration,
  next_due: Instant,
}

impl AnalysisSchedule {
  pub fn new(now: Instant, interval: Duration) -> Self {
    let interval = interval.max(Duration::from_millis(1));
    Self { interval, next_due: now + interval }
  }

  /// True when a slot is due and there is code to analyze. A due slot is
  /// consumed even when the buffer is empty.
  pub fn poll(&mut self, now: Instant, code_is_empty: bool) -> bool {
    if now < self.next_due {
      return false;
    }
    self.next_due = now + self.interval;
    !code_is_empty
  }
}

/// Run the monitor for `session` until it is closed.
pub fn spawn(session: Session) -> JoinHandle<()> {
  tokio::spawn(async move { run(session).await })
}

#[instrument(level = "info", skip_all, fields(route = session.route.name()))]
async fn run(session: Session) {
  let timers = session.config.timers.clone();
  let mut analysis = AnalysisSchedule::new(Instant::now(), timers.analysis_interval());
  let mut ticker = tokio::time::interval(timers.monitor_tick());
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      _ = session.cancelled() => break,
      _ = ticker.tick() => {}
    }
    let now = Instant::now();

    match session.idle_tick(now) {
      Some(MonitorAction::Nudge) => nudge(&session).await,
      Some(MonitorAction::EndSession) => {
        end_session(&session, timers.redirect_delay()).await;
        break;
      }
      None => {}
    }

    let code_is_empty = session.read(|s| s.code_is_blank()).await;
    if analysis.poll(now, code_is_empty) {
      let s = session.clone();
      tokio::spawn(async move { chat::request_code_analysis(&s).await });
    }
  }
  debug!(target: "monitor", "Monitor stopped");
}

async fn nudge(session: &Session) {
  info!(target: "monitor", "User idle; nudging");
  let text = session.config.prompts.nudge_text.clone();
  session.update(|s| s.append_chat_message(ChatMessage::ai(MessageKind::Nudge, text))).await;
}

async fn end_session(session: &Session, redirect_delay: Duration) {
  info!(target: "monitor", "No code changes for too long; ending session");
  let text = session.config.prompts.session_end_text.clone();
  session
    .update(|s| s.append_chat_message(ChatMessage::ai(MessageKind::SessionEnd, text.clone())))
    .await;
  session.notify(SessionEvent::Notice(text));

  tokio::select! {
    _ = session.cancelled() => return,
    _ = tokio::time::sleep(redirect_delay) => {}
  }
  session.notify(SessionEvent::Navigate(Route::Practice));
  session.close();
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;

  use crate::config::ClientConfig;
  use crate::domain::AiMode;
  use crate::progress::MemoryProgressStore;
  use crate::testing::FakeBackend;

  const IDLE: Duration = Duration::from_secs(300);
  const END: Duration = Duration::from_secs(600);

  #[test]
  fn nudge_fires_once_per_idle_stretch() {
    let t0 = Instant::now();
    let mut m = IdleMonitor::new(t0, IDLE, END);
    assert_eq!(m.tick(t0 + Duration::from_secs(299)), None);
    assert_eq!(m.tick(t0 + IDLE), Some(MonitorAction::Nudge));
    assert_eq!(m.state(), IdleState::IdleWarned);
    assert_eq!(m.tick(t0 + Duration::from_secs(400)), None);

    // Activity resets; a new idle stretch may nudge again.
    m.on_activity(t0 + Duration::from_secs(401));
    assert_eq!(m.state(), IdleState::Active);
    assert_eq!(m.tick(t0 + Duration::from_secs(500)), None);
    m.on_code_change(t0 + Duration::from_secs(500));
    assert_eq!(m.tick(t0 + Duration::from_secs(800)), Some(MonitorAction::Nudge));
  }

  #[test]
  fn no_code_change_ends_the_session_even_when_active() {
    let t0 = Instant::now();
    let mut m = IdleMonitor::new(t0, IDLE, END);
    m.on_activity(t0 + Duration::from_secs(590));
    assert_eq!(m.tick(t0 + END), Some(MonitorAction::EndSession));
    assert_eq!(m.state(), IdleState::Ended);

    // Terminal.
    m.on_code_change(t0 + Duration::from_secs(601));
    assert_eq!(m.state(), IdleState::Ended);
    assert_eq!(m.tick(t0 + Duration::from_secs(2000)), None);
  }

  #[test]
  fn analysis_skips_empty_buffers_but_keeps_the_rhythm() {
    let t0 = Instant::now();
    let mut a = AnalysisSchedule::new(t0, Duration::from_secs(120));
    assert!(!a.poll(t0 + Duration::from_secs(60), false));
    assert!(!a.poll(t0 + Duration::from_secs(120), true));
    assert!(!a.poll(t0 + Duration::from_secs(200), false));
    assert!(a.poll(t0 + Duration::from_secs(240), false));
  }

  fn interview_session(backend: Arc<FakeBackend>, timers: crate::config::Timers) -> (Session, tokio::sync::mpsc::UnboundedReceiver<SessionEvent>) {
    let mut config = ClientConfig::default();
    config.timers = timers;
    Session::new(Route::Interview, Arc::new(config), backend, Arc::new(MemoryProgressStore::default()))
  }

  #[tokio::test(start_paused = true)]
  async fn idle_session_is_nudged_then_ended() {
    let timers = crate::config::Timers {
      idle_nudge_secs: 5,
      session_end_secs: 20,
      analysis_interval_secs: 3600,
      monitor_tick_millis: 1000,
      next_problem_delay_millis: 0,
      redirect_delay_millis: 2000,
    };
    let (session, mut rx) = interview_session(Arc::new(FakeBackend::default()), timers);
    let handle = session.start().expect("interview runs the monitor");

    let mut navigated = None;
    while let Some(ev) = rx.recv().await {
      if let SessionEvent::Navigate(route) = ev {
        navigated = Some(route);
        break;
      }
    }
    handle.await.unwrap();

    assert_eq!(navigated, Some(Route::Practice));
    assert!(session.is_closed());
    let kinds: Vec<MessageKind> = session.read(|s| s.transcript.iter().map(|m| m.kind).collect()).await;
    assert_eq!(kinds, vec![MessageKind::Nudge, MessageKind::SessionEnd]);
  }

  #[tokio::test(start_paused = true)]
  async fn loading_a_problem_restarts_the_session_end_clock() {
    let timers = crate::config::Timers {
      idle_nudge_secs: 3600,
      session_end_secs: 20,
      analysis_interval_secs: 3600,
      monitor_tick_millis: 1000,
      next_problem_delay_millis: 0,
      redirect_delay_millis: 0,
    };
    let (session, _rx) = interview_session(Arc::new(FakeBackend::default()), timers);
    let handle = session.start().unwrap();

    tokio::time::sleep(Duration::from_secs(19)).await;
    crate::workflow::load_new_problem(&session).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(!session.is_closed());
    let kinds: Vec<MessageKind> = session.read(|s| s.transcript.iter().map(|m| m.kind).collect()).await;
    assert_eq!(kinds, vec![MessageKind::Welcome]);

    // The fresh problem gets the full allowance, then the session ends.
    tokio::time::sleep(Duration::from_secs(20)).await;
    handle.await.unwrap();
    assert!(session.is_closed());
  }

  #[tokio::test(start_paused = true)]
  async fn analysis_posts_flagged_message_for_non_empty_code() {
    let backend = Arc::new(FakeBackend::default());
    backend.push_ai(Ok("Consider a hash map.".into()));
    let timers = crate::config::Timers {
      idle_nudge_secs: 3600,
      session_end_secs: 7200,
      analysis_interval_secs: 120,
      monitor_tick_millis: 1000,
      next_problem_delay_millis: 0,
      redirect_delay_millis: 0,
    };
    let (session, _rx) = interview_session(backend.clone(), timers);
    session.update_code("def solve(): pass").await;
    let handle = session.start().unwrap();

    tokio::time::sleep(Duration::from_secs(125)).await;
    session.close();
    handle.await.unwrap();

    let calls = backend.ai_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].mode, AiMode::CodeAnalysis);
    assert!(calls[0].question.contains("def solve(): pass"));
    let last = session.read(|s| s.transcript.last().cloned()).await.unwrap();
    assert_eq!(last.kind, MessageKind::CodeAnalysis);
    assert_eq!(last.content, "Consider a hash map.");
  }

  #[tokio::test(start_paused = true)]
  async fn no_timer_fires_after_teardown() {
    let backend = Arc::new(FakeBackend::default());
    let timers = crate::config::Timers {
      idle_nudge_secs: 1,
      session_end_secs: 2,
      analysis_interval_secs: 1,
      monitor_tick_millis: 100,
      next_problem_delay_millis: 0,
      redirect_delay_millis: 0,
    };
    let (session, _rx) = interview_session(backend.clone(), timers);
    session.update_code("x = 1").await;
    let handle = session.start().unwrap();
    session.close();
    handle.await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(backend.ai_calls().is_empty());
    assert!(session.read(|s| s.transcript.is_empty()).await);
  }
}
