//! PDF Editor Scheduler Library
//!
//! Asynchronous job framework with a worker pool and a cooperative main loop.
//!
//! A job is a unit of work bound to a document. It runs either on a worker
//! thread (`RunMode::Thread`) or as a sequence of short slices on the
//! application's main loop (`RunMode::Cooperative`). Either way, its
//! notifications ("finished", "cancelled", and job-specific ones) are always
//! delivered on the thread owning the [`MainContext`].
//!
//! # Example
//!
//! ```
//! use pdf_editor_scheduler::{Job, JobCore, MainContext, RunMode};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! struct Hello {
//!     core: JobCore,
//! }
//!
//! impl Job for Hello {
//!     fn core(&self) -> &JobCore {
//!         &self.core
//!     }
//!
//!     fn run(&self) -> bool {
//!         self.core.succeed();
//!         false
//!     }
//! }
//!
//! let mut main = MainContext::new();
//! let job = Arc::new(Hello {
//!     core: JobCore::new("hello", RunMode::Thread, main.handle()),
//! });
//!
//! let done = Arc::new(AtomicBool::new(false));
//! let flag = done.clone();
//! job.connect_finished(move || flag.store(true, Ordering::SeqCst));
//!
//! let worker_job = job.clone();
//! std::thread::spawn(move || worker_job.run()).join().unwrap();
//!
//! // "finished" is only emitted once the owning thread iterates its loop
//! assert!(!done.load(Ordering::SeqCst));
//! main.run_until_idle();
//! assert!(done.load(Ordering::SeqCst));
//! ```

mod cancel;
mod error;
mod job;
mod main_loop;
mod priority;
mod scheduler;
mod signal;
mod worker;

// Re-export public API
pub use cancel::CancellationToken;
pub use error::{ErrorDomain, JobError};
pub use job::{Job, JobCore, JobPhase, RunMode};
pub use main_loop::{MainContext, MainContextHandle};
pub use priority::{DispatchPriority, EntryId, JobPriority, PriorityQueue};
pub use scheduler::{JobId, JobQueue, JobScheduler, QueuedJob, SchedulerStats};
pub use signal::{HandlerId, Signal};
pub use worker::{WorkerPool, WorkerPoolConfig};
