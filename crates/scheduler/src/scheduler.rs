//! Job scheduler implementation
//!
//! The scheduler is the execution engine for jobs. Thread-mode jobs go to a
//! shared priority queue drained by the worker pool; cooperative jobs are
//! registered as idle sources on the main loop and re-invoked until their
//! `run` returns `false`.

use crate::job::{Job, RunMode};
use crate::main_loop::MainContextHandle;
use crate::priority::{EntryId, JobPriority, PriorityQueue};
use crate::worker::{WorkerPool, WorkerPoolConfig};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Unique identifier of a queued job
pub type JobId = EntryId;

/// Job scheduler statistics
#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    /// Total thread-mode jobs submitted
    pub jobs_submitted: u64,

    /// Total thread-mode jobs that ran
    pub jobs_completed: u64,

    /// Total thread-mode jobs dropped because they were cancelled while queued
    pub jobs_skipped: u64,

    /// Total cooperative jobs handed to the main loop
    pub cooperative_jobs: u64,

    /// Current queue size
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Get the number of thread-mode jobs queued or running
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted - self.jobs_completed - self.jobs_skipped
    }
}

/// A job taken from the queue by a worker
pub struct QueuedJob {
    pub id: JobId,
    pub priority: JobPriority,
    pub job: Arc<dyn Job>,
}

impl std::fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedJob")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("job", &self.job.name())
            .finish()
    }
}

/// Priority queue of thread-mode jobs shared with the worker pool
///
/// Jobs are handed out highest priority first, FIFO within a priority.
pub struct JobQueue {
    queue: PriorityQueue<JobPriority, Arc<dyn Job>>,
    stats: Mutex<SchedulerStats>,
}

impl JobQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            queue: PriorityQueue::new(),
            stats: Mutex::new(SchedulerStats::default()),
        }
    }

    fn stats_mut(&self) -> MutexGuard<'_, SchedulerStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit a job to the queue
    pub fn submit(&self, priority: JobPriority, job: Arc<dyn Job>) -> JobId {
        let name = job.name();
        let id = self.queue.push(priority, job);
        self.stats_mut().jobs_submitted += 1;

        tracing::trace!(job = name, id, ?priority, "job queued");
        id
    }

    /// Take the highest priority job, or `None` if the queue is empty
    pub fn next_job(&self) -> Option<QueuedJob> {
        self.queue
            .pop()
            .map(|(id, priority, job)| QueuedJob { id, priority, job })
    }

    /// Record that a job taken with `next_job` has run
    pub fn complete_job(&self, id: JobId) {
        self.stats_mut().jobs_completed += 1;
        tracing::trace!(id, "job completed");
    }

    /// Record that a job taken with `next_job` was dropped without running
    pub fn skip_job(&self, id: JobId) {
        self.stats_mut().jobs_skipped += 1;
        tracing::trace!(id, "job skipped");
    }

    /// Drop every queued job whose token is cancelled
    ///
    /// Returns the number of jobs removed.
    pub fn purge_cancelled(&self) -> usize {
        let removed = self.queue.remove_if(|job| job.is_cancelled());
        if removed > 0 {
            self.stats_mut().jobs_skipped += removed as u64;
            tracing::debug!(removed, "purged cancelled jobs");
        }
        removed
    }

    fn record_cooperative(&self) {
        self.stats_mut().cooperative_jobs += 1;
    }

    /// Get queue statistics
    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats_mut().clone();
        stats.queue_size = self.queue.len();
        stats
    }

    /// Number of jobs waiting for a worker
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if no job is waiting for a worker
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Execution engine for jobs
///
/// # Example
///
/// ```no_run
/// use pdf_editor_scheduler::{JobPriority, JobScheduler, MainContext, WorkerPoolConfig};
///
/// let mut main = MainContext::new();
/// let scheduler = JobScheduler::new(main.handle(), WorkerPoolConfig::new(2)).unwrap();
///
/// // scheduler.push_job(job, JobPriority::Urgent);
///
/// // The owning thread drives notifications and cooperative jobs
/// main.run_until_idle();
/// scheduler.shutdown();
/// ```
pub struct JobScheduler {
    queue: Arc<JobQueue>,
    workers: WorkerPool,
    main: MainContextHandle,
}

impl JobScheduler {
    /// Create a scheduler whose cooperative jobs run on `main`
    pub fn new(main: MainContextHandle, config: WorkerPoolConfig) -> io::Result<Self> {
        let queue = Arc::new(JobQueue::new());
        let workers = WorkerPool::new(queue.clone(), config)?;

        Ok(Self {
            queue,
            workers,
            main,
        })
    }

    /// Schedule a job according to its run mode
    ///
    /// Thread-mode jobs wait in the queue for a worker. Cooperative jobs are
    /// added to the main loop and stop being invoked once they are cancelled
    /// or their `run` returns `false`.
    pub fn push_job(&self, job: Arc<dyn Job>, priority: JobPriority) {
        match job.run_mode() {
            RunMode::Thread => {
                self.queue.submit(priority, job);
            }
            RunMode::Cooperative => {
                tracing::trace!(job = job.name(), ?priority, "cooperative job scheduled");
                self.queue.record_cooperative();
                self.main.add_idle(priority.into(), move || {
                    if job.is_cancelled() {
                        tracing::debug!(job = job.name(), "cooperative job cancelled, removing");
                        return false;
                    }
                    job.run()
                });
            }
        }
    }

    /// Drop queued thread-mode jobs that were cancelled before a worker
    /// picked them up
    pub fn purge_cancelled(&self) -> usize {
        self.queue.purge_cancelled()
    }

    /// Get scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        self.queue.stats()
    }

    /// Number of worker threads
    pub fn num_workers(&self) -> usize {
        self.workers.num_workers()
    }

    /// Stop the workers and wait for running jobs to return
    ///
    /// Queued jobs are not run. Their "finished" notification never arrives.
    pub fn shutdown(self) {
        tracing::debug!(queued = self.queue.len(), "shutting down job scheduler");
        self.workers.shutdown();
    }
}
