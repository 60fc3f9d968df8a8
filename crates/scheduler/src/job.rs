//! Job abstraction and its state machine
//!
//! Every concrete job embeds a [`JobCore`] and implements [`Job::run`]. The
//! core owns the shared state (phase, failure, cancellation, error), the
//! cancellation token and the `finished`/`cancelled` signals, and implements
//! the protocol every job follows:
//!
//! - `succeed`/`fail` move the job from `Pending` to `Finished` at most once
//!   and deliver "finished" on the owning context. Thread-mode jobs hand the
//!   notification to the main loop; cooperative jobs already run there and
//!   emit it inline.
//! - `cancel` is only called from the owning context. It flips the token and
//!   emits "cancelled" synchronously. From then on the job never reports
//!   success or failure, even if a "finished" notification was already
//!   queued.
//! - `restart` is the one transition back from `Finished` to `Pending`, used
//!   by jobs that callers re-run on the same instance (loading with a
//!   password, exporting the next page).

use crate::cancel::CancellationToken;
use crate::error::{ErrorDomain, JobError};
use crate::main_loop::MainContextHandle;
use crate::priority::DispatchPriority;
use crate::signal::{HandlerId, Signal};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// How the execution engine runs a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// `run()` is called once on a worker thread and runs to completion
    Thread,

    /// `run()` is called repeatedly from the main loop, one bounded slice at
    /// a time, until it returns `false`
    Cooperative,
}

/// Lifecycle phase of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    Pending,
    Finished,
}

/// A unit of asynchronous work bound to a document
///
/// The execution engine only ever sees `Arc<dyn Job>`.
pub trait Job: Send + Sync {
    /// Shared state and protocol
    fn core(&self) -> &JobCore;

    /// Perform the work, or one slice of it
    ///
    /// Returns `true` if the engine must call `run` again. Thread-mode jobs
    /// always return `false`. Failures are recorded on the job, never
    /// returned.
    fn run(&self) -> bool;

    fn name(&self) -> &'static str {
        self.core().name()
    }

    fn cancel(&self) {
        self.core().cancel();
    }

    fn is_finished(&self) -> bool {
        self.core().is_finished()
    }

    fn is_failed(&self) -> bool {
        self.core().is_failed()
    }

    fn is_cancelled(&self) -> bool {
        self.core().is_cancelled()
    }

    fn error(&self) -> Option<JobError> {
        self.core().error()
    }

    fn run_mode(&self) -> RunMode {
        self.core().run_mode()
    }

    fn set_run_mode(&self, run_mode: RunMode) {
        self.core().set_run_mode(run_mode);
    }

    /// Connect to the "finished" notification
    fn connect_finished<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
        Self: Sized,
    {
        self.core().finished_signal().connect(move |_| handler())
    }

    /// Connect to the "cancelled" notification
    fn connect_cancelled<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
        Self: Sized,
    {
        self.core().cancelled_signal().connect(move |_| handler())
    }
}

#[derive(Debug)]
struct JobState {
    phase: JobPhase,
    run_mode: RunMode,
    failed: bool,
    cancelled: bool,
    error: Option<JobError>,
    /// A "finished" notification has been queued on the main loop but not
    /// yet delivered
    finish_in_flight: bool,
    started_at: Option<Instant>,
}

struct CoreInner {
    name: &'static str,
    main: MainContextHandle,
    token: CancellationToken,
    state: Mutex<JobState>,
    finished: Signal<()>,
    cancelled: Signal<()>,
}

impl CoreInner {
    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver_finished(&self) {
        let (cancelled, started_at) = {
            let mut state = self.state();
            state.finish_in_flight = false;
            (state.cancelled, state.started_at)
        };

        if cancelled {
            tracing::debug!(job = self.name, "job was cancelled, not emitting finished");
            return;
        }

        let elapsed_ms = started_at.map(|start| start.elapsed().as_millis() as u64);
        tracing::debug!(job = self.name, elapsed_ms, "job finished");
        self.finished.emit(&());
    }
}

/// Shared state of a job
///
/// Cloning is cheap and yields a handle to the same state, which is how
/// notifications queued on the main loop keep the job alive until delivered.
#[derive(Clone)]
pub struct JobCore {
    inner: Arc<CoreInner>,
}

impl JobCore {
    pub fn new(name: &'static str, run_mode: RunMode, main: MainContextHandle) -> Self {
        tracing::debug!(job = name, ?run_mode, "job created");
        Self {
            inner: Arc::new(CoreInner {
                name,
                main,
                token: CancellationToken::new(),
                state: Mutex::new(JobState {
                    phase: JobPhase::Pending,
                    run_mode,
                    failed: false,
                    cancelled: false,
                    error: None,
                    finish_in_flight: false,
                    started_at: None,
                }),
                finished: Signal::new("finished"),
                cancelled: Signal::new("cancelled"),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Token polled by the running job
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub fn main_context(&self) -> &MainContextHandle {
        &self.inner.main
    }

    pub fn phase(&self) -> JobPhase {
        self.inner.state().phase
    }

    pub fn run_mode(&self) -> RunMode {
        self.inner.state().run_mode
    }

    /// Configure the run mode. Only meaningful before the first `run`.
    pub fn set_run_mode(&self, run_mode: RunMode) {
        self.inner.state().run_mode = run_mode;
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state().phase == JobPhase::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.inner.state().failed
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.state().cancelled
    }

    pub fn error(&self) -> Option<JobError> {
        self.inner.state().error.clone()
    }

    pub fn finished_signal(&self) -> &Signal<()> {
        &self.inner.finished
    }

    pub fn cancelled_signal(&self) -> &Signal<()> {
        &self.inner.cancelled
    }

    /// Record the start of a run for the elapsed time logged on completion
    pub fn mark_started(&self) {
        let mut state = self.inner.state();
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
        tracing::debug!(job = self.inner.name, "job running");
    }

    /// Cancel the job
    ///
    /// Must be called from the owning context, never from the thread running
    /// the job. No-op if already cancelled, or if the job finished and its
    /// "finished" notification was already delivered.
    pub fn cancel(&self) {
        debug_assert!(
            self.inner.main.is_owner_thread(),
            "jobs can only be cancelled from the owning context"
        );

        {
            let mut state = self.inner.state();
            if state.cancelled || (state.phase == JobPhase::Finished && !state.finish_in_flight) {
                return;
            }
            state.cancelled = true;
        }

        tracing::debug!(job = self.inner.name, "job cancelled");
        self.inner.token.cancel();
        self.inner.cancelled.emit(&());
    }

    /// Mark the job as failed with a new error
    pub fn fail(&self, domain: ErrorDomain, code: i32, message: impl Into<String>) {
        self.fail_from_error(&JobError::new(domain, code, message));
    }

    /// Mark the job as failed with a copy of `error`
    ///
    /// No-op if the job already failed, finished, or was cancelled.
    pub fn fail_from_error(&self, error: &JobError) {
        {
            let mut state = self.inner.state();
            if state.failed || state.phase == JobPhase::Finished {
                return;
            }
            if self.inner.token.is_cancelled() {
                tracing::debug!(job = self.inner.name, "job was cancelled, ignoring failure");
                return;
            }
            state.failed = true;
            state.error = Some(error.clone());
        }

        tracing::debug!(job = self.inner.name, error = %error, "job failed");
        self.emit_finished();
    }

    /// Mark the job as succeeded
    ///
    /// No-op if the job already finished or was cancelled.
    pub fn succeed(&self) {
        {
            let mut state = self.inner.state();
            if state.phase == JobPhase::Finished {
                return;
            }
            if self.inner.token.is_cancelled() {
                tracing::debug!(job = self.inner.name, "job was cancelled, ignoring success");
                return;
            }
            state.failed = false;
        }

        tracing::debug!(job = self.inner.name, "job succeeded");
        self.emit_finished();
    }

    /// Move a finished job back to `Pending` so the same instance can run
    /// again, clearing the failure and error of the previous run
    pub fn restart(&self) {
        let mut state = self.inner.state();
        if state.phase == JobPhase::Finished {
            tracing::debug!(job = self.inner.name, "job restarted");
        }
        state.phase = JobPhase::Pending;
        state.failed = false;
        state.error = None;
        state.started_at = None;
    }

    /// Run `callback` on the owning context
    ///
    /// Thread-mode jobs queue it on the main loop at `priority`; cooperative
    /// jobs are already on the owning context and run it inline.
    pub fn deliver<F>(&self, priority: DispatchPriority, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.run_mode() {
            RunMode::Thread => {
                self.inner.main.invoke(priority, callback);
            }
            RunMode::Cooperative => callback(),
        }
    }

    fn emit_finished(&self) {
        if self.inner.token.is_cancelled() {
            tracing::debug!(job = self.inner.name, "job was cancelled, returning");
            return;
        }

        let run_mode = {
            let mut state = self.inner.state();
            state.phase = JobPhase::Finished;
            if state.run_mode == RunMode::Thread {
                state.finish_in_flight = true;
            }
            state.run_mode
        };

        match run_mode {
            RunMode::Thread => {
                let inner = self.inner.clone();
                let queued = self
                    .inner
                    .main
                    .invoke(DispatchPriority::Default, move || inner.deliver_finished());
                if !queued {
                    self.inner.state().finish_in_flight = false;
                }
            }
            RunMode::Cooperative => self.inner.deliver_finished(),
        }
    }
}

impl std::fmt::Debug for JobCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("JobCore")
            .field("name", &self.inner.name)
            .field("phase", &state.phase)
            .field("run_mode", &state.run_mode)
            .field("failed", &state.failed)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}
