use super::{complete, lock};
use crate::context::JobContext;
use crate::document::{
    DocumentError, DocumentResult, ExportOptions, FileExporter, RenderContext, SharedDocument,
};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{Job, JobCore, RunMode};
use std::sync::{Arc, Mutex};

/// Exports one page per run through the document's file exporter
///
/// The same job is re-run for every page: call [`set_page`](Self::set_page)
/// once the previous run finished, then queue it again. The exporter session
/// is opened with [`begin`](Self::begin) and closed with [`end`](Self::end).
pub struct ExportJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    page: Mutex<Option<usize>>,
    rc: Mutex<Option<RenderContext>>,
}

impl ExportJob {
    pub fn new(context: &JobContext, document: SharedDocument) -> Self {
        Self {
            core: JobCore::new("export", RunMode::Thread, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            page: Mutex::new(None),
            rc: Mutex::new(None),
        }
    }

    pub fn page(&self) -> Option<usize> {
        *lock(&self.page)
    }

    /// Page exported by the next run
    pub fn set_page(&self, page: usize) {
        *lock(&self.page) = Some(page);
    }

    /// Open an export session on the document
    pub fn begin(&self, options: &ExportOptions) -> DocumentResult<()> {
        let _document_lock = self.guard.lock_document();
        self.exporter()?.begin(options)
    }

    /// Close the export session, writing the output
    pub fn end(&self) -> DocumentResult<()> {
        let _document_lock = self.guard.lock_document();
        self.exporter()?.end()
    }

    fn exporter(&self) -> DocumentResult<&dyn FileExporter> {
        self.document
            .exporter()
            .ok_or(DocumentError::Unsupported("exporting"))
    }

    fn export_page(&self, index: usize) -> DocumentResult<()> {
        let _document_lock = self.guard.lock_document();

        let page = self.document.page(index)?;
        let mut rc = lock(&self.rc);
        let rc = rc.get_or_insert_with(|| RenderContext::new(page, 0, 1.0));
        rc.set_page(page);

        self.exporter()?.do_page(rc)
    }
}

impl Job for ExportJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        let Some(page) = self.page() else {
            panic!("export job run without a page");
        };

        self.core.restart();
        self.core.mark_started();
        tracing::debug!(page, "exporting page");

        complete(&self.core, self.export_page(page));
        false
    }
}
