//! Shared environment handed to every job

use crate::config::JobsConfig;
use crate::files::PrivateTempDir;
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::MainContextHandle;
use std::sync::Arc;

/// Owning main loop, document locks and configuration of a set of jobs
///
/// All jobs working on the same documents must be created from clones of
/// one context so they share the same [`DocumentAccessGuard`].
#[derive(Debug, Clone)]
pub struct JobContext {
    main: MainContextHandle,
    guard: Arc<DocumentAccessGuard>,
    config: Arc<JobsConfig>,
    private_temp_dir: Arc<PrivateTempDir>,
}

impl JobContext {
    pub fn new(main: MainContextHandle, config: JobsConfig) -> Self {
        Self {
            main,
            guard: Arc::new(DocumentAccessGuard::new()),
            config: Arc::new(config),
            private_temp_dir: Arc::new(PrivateTempDir::new()),
        }
    }

    /// Share an existing guard instead of creating a new one
    pub fn with_guard(mut self, guard: Arc<DocumentAccessGuard>) -> Self {
        self.guard = guard;
        self
    }

    pub fn main_context(&self) -> &MainContextHandle {
        &self.main
    }

    pub fn guard(&self) -> &Arc<DocumentAccessGuard> {
        &self.guard
    }

    pub fn config(&self) -> &Arc<JobsConfig> {
        &self.config
    }

    /// Directory for temporary files, inside the configured `temp_dir`
    pub fn private_temp_dir(&self) -> &Arc<PrivateTempDir> {
        &self.private_temp_dir
    }
}
