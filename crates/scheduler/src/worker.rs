//! Worker pool for thread-mode jobs.
//!
//! Workers run on separate threads, pull jobs from the shared [`JobQueue`],
//! and call `run()` on each exactly once. Jobs whose token was cancelled while
//! they waited in the queue are skipped without running.

use crate::scheduler::JobQueue;
use std::io;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    /// Default: number of logical CPU cores.
    pub num_workers: usize,

    /// Maximum time a worker will wait for a job before checking shutdown.
    /// Default: 10ms.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus(),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a new worker pool configuration.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    /// Set the poll interval for workers.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Pool of worker threads executing thread-mode jobs.
pub struct WorkerPool {
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create and start a new worker pool.
    ///
    /// At least one worker is always started.
    pub fn new(queue: Arc<JobQueue>, config: WorkerPoolConfig) -> io::Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let num_workers = config.num_workers.max(1);
        let mut workers = Vec::with_capacity(num_workers);

        for id in 0..num_workers {
            let worker = Worker::new(id, queue.clone(), shutdown.clone(), config.poll_interval);
            match worker {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    shutdown.store(true, Ordering::Release);
                    return Err(err);
                }
            }
        }

        tracing::debug!(num_workers, "job worker pool started");
        Ok(Self { workers, shutdown })
    }

    /// Get the number of worker threads.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Check if the worker pool is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Shutdown the worker pool gracefully.
    ///
    /// Workers finish the job they are running and exit. Blocks until all of
    /// them have terminated. Jobs still queued are not run.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Release);

        for worker in self.workers.drain(..) {
            worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Workers exit on their own once they see the flag
        self.shutdown.store(true, Ordering::Release);
    }
}

/// A single worker thread in the worker pool.
struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    /// Create and start a new worker thread.
    fn new(
        id: usize,
        queue: Arc<JobQueue>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> io::Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("pdf-job-worker-{}", id))
            .spawn(move || {
                Self::run(queue, shutdown, poll_interval);
            })?;

        Ok(Self {
            id,
            thread: Some(thread),
        })
    }

    /// Main worker loop.
    fn run(queue: Arc<JobQueue>, shutdown: Arc<AtomicBool>, poll_interval: Duration) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            if let Some(queued) = queue.next_job() {
                if queued.job.is_cancelled() {
                    tracing::debug!(job = queued.job.name(), id = queued.id, "skipping cancelled job");
                    queue.skip_job(queued.id);
                    continue;
                }

                queued.job.run();
                queue.complete_job(queued.id);
            } else {
                thread::sleep(poll_interval);
            }
        }
    }

    /// Wait for the worker thread to finish.
    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(worker = self.id, "job worker panicked");
            }
        }
    }
}

/// Get the number of logical CPU cores.
fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobCore, RunMode};
    use crate::main_loop::MainContext;
    use crate::priority::JobPriority;
    use std::sync::Mutex;

    struct RecordingJob {
        core: JobCore,
        label: u32,
        log: Arc<Mutex<Vec<u32>>>,
    }

    impl Job for RecordingJob {
        fn core(&self) -> &JobCore {
            &self.core
        }

        fn run(&self) -> bool {
            self.log.lock().unwrap().push(self.label);
            thread::sleep(Duration::from_millis(5));
            self.core.succeed();
            false
        }
    }

    fn recording_job(
        context: &MainContext,
        label: u32,
        log: &Arc<Mutex<Vec<u32>>>,
    ) -> Arc<RecordingJob> {
        Arc::new(RecordingJob {
            core: JobCore::new("recording", RunMode::Thread, context.handle()),
            label,
            log: log.clone(),
        })
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_worker_pool_config_default() {
        let config = WorkerPoolConfig::default();
        assert!(config.num_workers > 0);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_worker_pool_config_builder() {
        let config = WorkerPoolConfig::new(4).with_poll_interval(Duration::from_millis(50));
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_worker_pool_creation() {
        let queue = Arc::new(JobQueue::new());
        let pool = WorkerPool::new(queue, WorkerPoolConfig::new(2)).unwrap();
        assert_eq!(pool.num_workers(), 2);
        assert!(!pool.is_shutting_down());

        pool.shutdown();
    }

    #[test]
    fn test_worker_pool_has_at_least_one_worker() {
        let queue = Arc::new(JobQueue::new());
        let pool = WorkerPool::new(queue, WorkerPoolConfig::new(0)).unwrap();
        assert_eq!(pool.num_workers(), 1);
        pool.shutdown();
    }

    #[test]
    fn test_worker_pool_executes_jobs() {
        let context = MainContext::new();
        let queue = Arc::new(JobQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let pool = WorkerPool::new(queue.clone(), WorkerPoolConfig::new(2)).unwrap();

        for label in 0..5 {
            queue.submit(JobPriority::High, recording_job(&context, label, &log));
        }

        assert!(wait_for(|| queue.stats().jobs_completed == 5));
        assert_eq!(log.lock().unwrap().len(), 5);

        pool.shutdown();
    }

    #[test]
    fn test_worker_pool_skips_cancelled_jobs() {
        let context = MainContext::new();
        let queue = Arc::new(JobQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let kept = recording_job(&context, 1, &log);
        let cancelled = recording_job(&context, 2, &log);
        queue.submit(JobPriority::High, kept);
        queue.submit(JobPriority::High, cancelled.clone());
        cancelled.cancel();

        let pool = WorkerPool::new(queue.clone(), WorkerPoolConfig::new(1)).unwrap();
        assert!(wait_for(|| queue.is_empty() && queue.stats().pending_jobs() == 0));

        assert_eq!(*log.lock().unwrap(), vec![1]);
        assert_eq!(queue.stats().jobs_skipped, 1);
        pool.shutdown();
    }

    #[test]
    fn test_worker_pool_priority_ordering() {
        let context = MainContext::new();
        let queue = Arc::new(JobQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        // Queue before starting the single worker for deterministic ordering
        queue.submit(JobPriority::None, recording_job(&context, 3, &log));
        queue.submit(JobPriority::Urgent, recording_job(&context, 1, &log));
        queue.submit(JobPriority::Low, recording_job(&context, 2, &log));

        let pool = WorkerPool::new(queue.clone(), WorkerPoolConfig::new(1)).unwrap();
        assert!(wait_for(|| queue.stats().jobs_completed == 3));

        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        pool.shutdown();
    }

    #[test]
    fn test_worker_pool_shutdown_leaves_queued_jobs() {
        let context = MainContext::new();
        let queue = Arc::new(JobQueue::new());
        let pool = WorkerPool::new(queue.clone(), WorkerPoolConfig::new(1)).unwrap();
        pool.shutdown();

        let log = Arc::new(Mutex::new(Vec::new()));
        queue.submit(JobPriority::Urgent, recording_job(&context, 1, &log));
        thread::sleep(Duration::from_millis(30));

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_num_cpus() {
        let cpus = num_cpus();
        assert!(cpus > 0);
        assert!(cpus <= 1024); // Sanity check
    }
}
