use crate::context::JobContext;
use crate::document::{DocumentError, FontInfo, SharedDocument};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{
    DispatchPriority, HandlerId, Job, JobCore, JobError, RunMode, Signal,
};
use std::sync::Arc;

/// Scans the fonts used by a document, a bounded batch per invocation
///
/// Runs cooperatively on the main loop. An invocation that cannot take both
/// document locks returns right away asking to be run again. Every scanning
/// invocation emits "updated" with the scan progress.
pub struct FontsJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    batch: usize,
    updated: Arc<Signal<f64>>,
}

impl FontsJob {
    pub fn new(context: &JobContext, document: SharedDocument) -> Self {
        Self {
            core: JobCore::new("fonts", RunMode::Cooperative, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            batch: context.config().font_scan_batch.max(1),
            updated: Arc::new(Signal::new("updated")),
        }
    }

    /// Connect to "updated", called with the scan progress in `0.0..=1.0`
    pub fn connect_updated<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.updated.connect(move |progress| handler(*progress))
    }

    pub fn disconnect_updated(&self, id: HandlerId) -> bool {
        self.updated.disconnect(id)
    }

    pub fn progress(&self) -> f64 {
        self.document.fonts().map_or(0.0, |fonts| fonts.progress())
    }

    /// Fonts found so far
    pub fn fonts(&self) -> Vec<FontInfo> {
        self.document.fonts().map(|fonts| fonts.fonts()).unwrap_or_default()
    }

    fn emit_updated(&self, progress: f64) {
        let core = self.core.clone();
        let signal = self.updated.clone();
        self.core.deliver(DispatchPriority::Default, move || {
            if !core.is_cancelled() {
                signal.emit(&progress);
            }
        });
    }

    /// One scanning invocation; returns whether more work remains
    fn scan(&self) -> bool {
        let Some(fonts) = self.document.fonts() else {
            self.core
                .fail_from_error(&JobError::from(DocumentError::Unsupported("font scanning")));
            return false;
        };

        let scanned = match self.core.run_mode() {
            RunMode::Cooperative => {
                let Some(locks) = self.guard.try_lock_both() else {
                    tracing::trace!("document busy, fonts scan postponed");
                    return true;
                };
                let scanned = fonts.scan(self.batch).map(|more| (more, fonts.progress()));
                drop(locks);
                scanned
            }
            RunMode::Thread => {
                let _document_lock = self.guard.lock_document();
                let _fonts_lock = self.guard.lock_fonts();
                fonts.scan(self.batch).map(|more| (more, fonts.progress()))
            }
        };

        match scanned {
            Ok((more, progress)) => {
                self.emit_updated(progress);
                if !more {
                    self.core.succeed();
                }
                more
            }
            Err(err) => {
                self.core.fail_from_error(&JobError::from(err));
                false
            }
        }
    }
}

impl Job for FontsJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        if self.core.is_finished() {
            return false;
        }
        self.core.mark_started();

        match self.core.run_mode() {
            RunMode::Cooperative => self.scan(),
            RunMode::Thread => {
                while self.scan() && !self.core.token().is_cancelled() {}
                false
            }
        }
    }
}
