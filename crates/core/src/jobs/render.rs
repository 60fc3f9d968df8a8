//! Page rendering job

use super::lock;
use crate::context::JobContext;
use crate::document::{
    DocumentResult, FormField, ImageRef, Link, MappingList, Rect, RenderContext, RenderFlags,
    SelectionInfo, SharedDocument, Surface,
};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{DispatchPriority, HandlerId, Job, JobCore, JobError, RunMode, Signal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Everything a render job produces
#[derive(Debug, Default)]
pub struct RenderOutput {
    pub surface: Option<Surface>,
    pub selection: Option<Surface>,
    pub selection_region: Vec<Rect>,
    pub text_mapping: Option<MappingList<String>>,
    pub link_mapping: Option<MappingList<Link>>,
    pub form_field_mapping: Option<MappingList<FormField>>,
    pub image_mapping: Option<MappingList<ImageRef>>,
}

/// Rasterizes one page, plus the mappings requested by its flags
///
/// "page-ready" is delivered as soon as the surface (and selection, if
/// requested) exists, ahead of "finished". A job cancelled while rasterizing
/// delivers neither.
pub struct RenderJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    page: usize,
    rotation: i32,
    scale: f64,
    target_width: u32,
    target_height: u32,
    flags: RenderFlags,
    selection_info: Option<SelectionInfo>,
    page_ready: Arc<Signal<()>>,
    is_page_ready: AtomicBool,
    output: Mutex<RenderOutput>,
}

impl RenderJob {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: &JobContext,
        document: SharedDocument,
        page: usize,
        rotation: i32,
        scale: f64,
        target_width: u32,
        target_height: u32,
        flags: RenderFlags,
    ) -> Self {
        tracing::debug!(page, "render job created");
        Self {
            core: JobCore::new("render", RunMode::Thread, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            page,
            rotation,
            scale,
            target_width,
            target_height,
            flags,
            selection_info: None,
            page_ready: Arc::new(Signal::new("page-ready")),
            is_page_ready: AtomicBool::new(false),
            output: Mutex::new(RenderOutput::default()),
        }
    }

    /// Also render `selection`; implies [`RenderFlags::SELECTION`]
    pub fn with_selection_info(mut self, selection: SelectionInfo) -> Self {
        self.flags |= RenderFlags::SELECTION;
        self.selection_info = Some(selection);
        self
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Size the consumer wants the surface displayed at
    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    pub fn flags(&self) -> RenderFlags {
        self.flags
    }

    /// Whether the surface has been produced
    pub fn is_page_ready(&self) -> bool {
        self.is_page_ready.load(Ordering::Acquire)
    }

    /// Connect to "page-ready"
    pub fn connect_page_ready<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.page_ready.connect(move |_| handler())
    }

    /// Inspect the outputs without taking them
    pub fn with_output<R>(&self, f: impl FnOnce(&RenderOutput) -> R) -> R {
        f(&lock(&self.output))
    }

    /// Take the outputs, leaving the job empty
    pub fn take_output(&self) -> RenderOutput {
        std::mem::take(&mut *lock(&self.output))
    }

    fn notify_page_ready(&self) {
        self.is_page_ready.store(true, Ordering::Release);

        let core = self.core.clone();
        let signal = self.page_ready.clone();
        let page = self.page;
        self.core.deliver(DispatchPriority::High, move || {
            if core.is_cancelled() {
                tracing::debug!(job = core.name(), page, "job was cancelled, not emitting page-ready");
                return;
            }
            signal.emit(&());
        });
    }

    /// Returns `Ok(false)` if the job was cancelled while rasterizing
    fn render(&self) -> DocumentResult<bool> {
        let _document_lock = self.guard.lock_document();
        let fonts_lock = self.guard.lock_fonts();

        let page = self.document.page(self.page)?;
        let rc = RenderContext::new(page, self.rotation, self.scale);
        let surface = self.document.render(&rc)?;

        // Leave as soon as possible, the locks and render context go with us
        if self.core.token().is_cancelled() {
            return Ok(false);
        }

        {
            let mut output = lock(&self.output);
            output.surface = Some(surface);

            if self.flags.contains(RenderFlags::SELECTION) {
                if let Some(selection) = self.document.selection() {
                    let info = self.selection_info.unwrap_or_default();
                    output.selection = Some(selection.render_selection(&rc, &info)?);
                    output.selection_region =
                        selection.selection_region(&rc, info.style, &info.points)?;
                }
            }
        }

        self.notify_page_ready();
        drop(fonts_lock);

        let mut text_mapping = None;
        if self.flags.contains(RenderFlags::TEXT) {
            if let Some(selection) = self.document.selection() {
                text_mapping = Some(selection.text_mapping(&rc)?);
            }
        }
        let mut link_mapping = None;
        if self.flags.contains(RenderFlags::LINKS) {
            if let Some(links) = self.document.links() {
                link_mapping = Some(links.page_links(self.page)?);
            }
        }
        let mut form_field_mapping = None;
        if self.flags.contains(RenderFlags::FORMS) {
            if let Some(forms) = self.document.forms() {
                form_field_mapping = Some(forms.form_fields(rc.page())?);
            }
        }
        let mut image_mapping = None;
        if self.flags.contains(RenderFlags::IMAGES) {
            if let Some(images) = self.document.images() {
                image_mapping = Some(images.image_mapping(self.page)?);
            }
        }

        // The main loop may read the output from "page-ready" meanwhile
        let mut output = lock(&self.output);
        output.text_mapping = text_mapping;
        output.link_mapping = link_mapping;
        output.form_field_mapping = form_field_mapping;
        output.image_mapping = image_mapping;

        Ok(true)
    }
}

impl Job for RenderJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        self.core.mark_started();
        tracing::debug!(page = self.page, "rendering page");

        match self.render() {
            Ok(true) => self.core.succeed(),
            Ok(false) => {
                tracing::debug!(page = self.page, "render job cancelled while rasterizing");
            }
            Err(err) => self.core.fail_from_error(&JobError::from(err)),
        }

        false
    }
}
