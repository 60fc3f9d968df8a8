//! Helpers shared by the integration tests

#![allow(dead_code)]

use pdf_editor_core::document::{
    Attachment, Document, DocumentFind, DocumentFonts, DocumentLinks, DocumentResult,
    DocumentSecurity, DocumentSelection, DocumentThumbnails, FontInfo, MappingList, Page, Rect,
    RenderContext, SelectionInfo, SelectionStyle, Surface,
};
use pdf_editor_core::memory::{MemoryDocument, MemoryDocumentData, MemoryPage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, Once};
use std::thread;
use std::time::Duration;

static TRACING: Once = Once::new();

/// Route job logs to the test output; `RUST_LOG=debug` shows them
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Document data with one line of text per page
pub fn sample_data(pages: &[&str]) -> MemoryDocumentData {
    MemoryDocumentData {
        pages: pages.iter().map(|text| MemoryPage::with_text(*text)).collect(),
        fonts: (0..7)
            .map(|i| FontInfo {
                name: format!("Sans-{i}"),
                kind: "TrueType".to_string(),
                embedded: true,
            })
            .collect(),
        ..MemoryDocumentData::default()
    }
}

/// Memory document that records how many callers are inside it at once and
/// can hold `render` until released
pub struct InstrumentedDocument {
    inner: MemoryDocument,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
    hold_render: AtomicBool,
    render_entered: AtomicBool,
    gate: Mutex<bool>,
    released: Condvar,
    text_mapping_delay: Duration,
}

impl InstrumentedDocument {
    pub fn new(data: MemoryDocumentData) -> Self {
        Self {
            inner: MemoryDocument::from_data(data),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            hold_render: AtomicBool::new(false),
            render_entered: AtomicBool::new(false),
            gate: Mutex::new(false),
            released: Condvar::new(),
            text_mapping_delay: Duration::ZERO,
        }
    }

    /// Make every `text_mapping` call take at least `delay`
    pub fn slow_text_mapping(mut self, delay: Duration) -> Self {
        self.text_mapping_delay = delay;
        self
    }

    /// Make `render` wait for [`release_render`](Self::release_render)
    pub fn hold_render(self) -> Self {
        self.hold_render.store(true, Ordering::SeqCst);
        self
    }

    pub fn release_render(&self) {
        *self.gate.lock().unwrap() = true;
        self.released.notify_all();
    }

    pub fn render_entered(&self) -> bool {
        self.render_entered.load(Ordering::SeqCst)
    }

    /// Largest number of callers seen inside the document at the same time
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn section<T>(&self, f: impl FnOnce() -> T) -> T {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        thread::sleep(Duration::from_millis(1));
        let result = f();

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Document for InstrumentedDocument {
    fn load(&self, location: &Path) -> DocumentResult<()> {
        self.section(|| self.inner.load(location))
    }

    fn page_count(&self) -> usize {
        self.inner.page_count()
    }

    fn page(&self, index: usize) -> DocumentResult<Page> {
        self.section(|| self.inner.page(index))
    }

    fn render(&self, rc: &RenderContext) -> DocumentResult<Surface> {
        if self.hold_render.load(Ordering::SeqCst) {
            self.render_entered.store(true, Ordering::SeqCst);
            let mut released = self.gate.lock().unwrap();
            while !*released {
                released = self.released.wait(released).unwrap();
            }
        }
        self.section(|| self.inner.render(rc))
    }

    fn save(&self, target: &Path) -> DocumentResult<()> {
        self.section(|| self.inner.save(target))
    }

    fn decompressed_on_load(&self) -> bool {
        self.inner.decompressed_on_load()
    }

    fn attachments(&self) -> DocumentResult<Vec<Attachment>> {
        self.section(|| self.inner.attachments())
    }

    fn security(&self) -> Option<&dyn DocumentSecurity> {
        Some(&self.inner)
    }

    fn links(&self) -> Option<&dyn DocumentLinks> {
        Some(&self.inner)
    }

    fn find(&self) -> Option<&dyn DocumentFind> {
        Some(self)
    }

    fn fonts(&self) -> Option<&dyn DocumentFonts> {
        Some(self)
    }

    fn thumbnails(&self) -> Option<&dyn DocumentThumbnails> {
        Some(&self.inner)
    }

    fn selection(&self) -> Option<&dyn DocumentSelection> {
        Some(self)
    }
}

impl DocumentFind for InstrumentedDocument {
    fn find_text(&self, page: &Page, text: &str, case_sensitive: bool) -> DocumentResult<Vec<Rect>> {
        self.section(|| self.inner.find_text(page, text, case_sensitive))
    }
}

impl DocumentFonts for InstrumentedDocument {
    fn scan(&self, n_fonts: usize) -> DocumentResult<bool> {
        self.section(|| self.inner.scan(n_fonts))
    }

    fn progress(&self) -> f64 {
        DocumentFonts::progress(&self.inner)
    }

    fn fonts(&self) -> Vec<FontInfo> {
        DocumentFonts::fonts(&self.inner)
    }
}

impl DocumentSelection for InstrumentedDocument {
    fn render_selection(&self, rc: &RenderContext, selection: &SelectionInfo) -> DocumentResult<Surface> {
        self.inner.render_selection(rc, selection)
    }

    fn selection_region(
        &self,
        rc: &RenderContext,
        style: SelectionStyle,
        points: &Rect,
    ) -> DocumentResult<Vec<Rect>> {
        self.inner.selection_region(rc, style, points)
    }

    fn text_mapping(&self, rc: &RenderContext) -> DocumentResult<MappingList<String>> {
        thread::sleep(self.text_mapping_delay);
        self.inner.text_mapping(rc)
    }
}
