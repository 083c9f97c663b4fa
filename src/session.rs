//! Session controller: one view-mount lifetime.
//!
//! A `Session` is cheap to clone and shared by the view loop, the engagement
//! monitor task and the spawned workflow tasks. All state mutation goes
//! through `update`, which takes the write lock once, applies the transition
//! and tells the view to re-render. Once the session is closed every update
//! is a no-op, so late backend responses never touch a torn-down view.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{info, warn};

use crate::api::Backend;
use crate::config::{ClientConfig, FlowPolicy};
use crate::monitor::{self, IdleMonitor, MonitorAction};
use crate::progress::ProgressStore;
use crate::state::SessionState;

/// The two pages of the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
  /// Pick a topic, solve, submit.
  Practice,
  /// "Code with AI": interviewer chat, engagement monitor, auto-advance.
  Interview,
}

impl Route {
  pub fn name(&self) -> &'static str {
    match self {
      Route::Practice => "practice",
      Route::Interview => "interview",
    }
  }
}

/// What the view needs to hear about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
  Changed,
  Notice(String),
  Navigate(Route),
}

#[derive(Clone)]
pub struct Session {
  pub route: Route,
  pub state: Arc<RwLock<SessionState>>,
  pub backend: Arc<dyn Backend>,
  pub store: Arc<dyn ProgressStore>,
  pub config: Arc<ClientConfig>,
  idle: Arc<Mutex<IdleMonitor>>,
  events: mpsc::UnboundedSender<SessionEvent>,
  shutdown: CancellationToken,
}

impl Session {
  /// Mount a session: load persisted progress and build fresh state.
  pub fn new(
    route: Route,
    config: Arc<ClientConfig>,
    backend: Arc<dyn Backend>,
    store: Arc<dyn ProgressStore>,
  ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
    let (events, rx) = mpsc::unbounded_channel();
    let policy = match route {
      Route::Practice => &config.practice,
      Route::Interview => &config.interview,
    };
    let snapshot = store.load();
    let state = SessionState::new(&policy.placeholder, &snapshot);
    let idle = IdleMonitor::new(Instant::now(), config.timers.idle_nudge(), config.timers.session_end());
    info!(target: "session", route = route.name(), solved = snapshot.solved_count, "Session mounted");

    let session = Self {
      route,
      state: Arc::new(RwLock::new(state)),
      backend,
      store,
      config,
      idle: Arc::new(Mutex::new(idle)),
      events,
      shutdown: CancellationToken::new(),
    };
    (session, rx)
  }

  pub fn policy(&self) -> &FlowPolicy {
    match self.route {
      Route::Practice => &self.config.practice,
      Route::Interview => &self.config.interview,
    }
  }

  /// Start background timers for flows that use them.
  pub fn start(&self) -> Option<JoinHandle<()>> {
    if self.policy().monitor {
      Some(monitor::spawn(self.clone()))
    } else {
      None
    }
  }

  /// Tear down: timers stop and later updates are ignored.
  pub fn close(&self) {
    if !self.shutdown.is_cancelled() {
      info!(target: "session", route = self.route.name(), "Session closed");
      self.shutdown.cancel();
    }
  }

  pub fn is_closed(&self) -> bool {
    self.shutdown.is_cancelled()
  }

  pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
    self.shutdown.cancelled()
  }

  pub fn notify(&self, event: SessionEvent) {
    if !self.is_closed() {
      let _ = self.events.send(event);
    }
  }

  /// Read a value out of the state.
  pub async fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
    let state = self.state.read().await;
    f(&state)
  }

  pub async fn snapshot(&self) -> SessionState {
    self.state.read().await.clone()
  }

  /// Apply one transition atomically. Returns None if the session is closed.
  pub async fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
    let out = {
      let mut state = self.state.write().await;
      if self.is_closed() {
        return None;
      }
      f(&mut state)
    };
    self.notify(SessionEvent::Changed);
    Some(out)
  }

  /// Like `update`, but only while the problem the caller started from is
  /// still loaded.
  pub async fn update_if_current<R>(&self, epoch: u64, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
    let out = {
      let mut state = self.state.write().await;
      if self.is_closed() || state.problem_epoch != epoch {
        return None;
      }
      f(&mut state)
    };
    self.notify(SessionEvent::Changed);
    Some(out)
  }

  /// Pointer movement, key press or click.
  pub fn record_activity(&self) {
    if let Ok(mut idle) = self.idle.lock() {
      idle.on_activity(Instant::now());
    }
  }

  /// Code buffer edit.
  pub async fn update_code(&self, code: impl Into<String>) {
    let code = code.into();
    if self.update(|s| s.update_code(code)).await.is_some() {
      self.mark_code_changed();
    }
  }

  pub(crate) fn mark_code_changed(&self) {
    if let Ok(mut idle) = self.idle.lock() {
      idle.on_code_change(Instant::now());
    }
  }

  pub(crate) fn idle_tick(&self, now: Instant) -> Option<MonitorAction> {
    self.idle.lock().ok().and_then(|mut idle| idle.tick(now))
  }

  /// Write the current counters to the progress store. Failures are logged.
  pub async fn persist_progress(&self) {
    let snapshot = self.read(|s| s.snapshot()).await;
    if let Err(e) = self.store.save(&snapshot) {
      warn!(target: "session", error = %e, "Failed to persist progress");
    }
  }
}
