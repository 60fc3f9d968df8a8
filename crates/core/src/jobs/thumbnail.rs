use super::{complete, lock};
use crate::context::JobContext;
use crate::document::{DocumentError, DocumentResult, RenderContext, SharedDocument, Surface};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{Job, JobCore, RunMode};
use std::sync::{Arc, Mutex};

/// Renders a small image of one page
pub struct ThumbnailJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    page: usize,
    rotation: i32,
    scale: f64,
    border: bool,
    thumbnail: Mutex<Option<Surface>>,
}

impl ThumbnailJob {
    pub fn new(
        context: &JobContext,
        document: SharedDocument,
        page: usize,
        rotation: i32,
        scale: f64,
    ) -> Self {
        Self {
            core: JobCore::new("thumbnail", RunMode::Thread, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            page,
            rotation,
            scale,
            border: true,
            thumbnail: Mutex::new(None),
        }
    }

    /// Draw a frame around the thumbnail (the default)
    pub fn with_border(mut self, border: bool) -> Self {
        self.border = border;
        self
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn take_thumbnail(&self) -> Option<Surface> {
        lock(&self.thumbnail).take()
    }

    fn render(&self) -> DocumentResult<()> {
        let _document_lock = self.guard.lock_document();

        let thumbnails = self
            .document
            .thumbnails()
            .ok_or(DocumentError::Unsupported("thumbnails"))?;
        let page = self.document.page(self.page)?;
        let rc = RenderContext::new(page, self.rotation, self.scale);
        let image = thumbnails.thumbnail(&rc, self.border)?;

        *lock(&self.thumbnail) = Some(image);
        Ok(())
    }
}

impl Job for ThumbnailJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        self.core.mark_started();
        tracing::debug!(page = self.page, "rendering thumbnail");

        complete(&self.core, self.render());
        false
    }
}
