use super::lock;
use crate::context::JobContext;
use crate::document::{DocumentError, DocumentResult, Rect, SharedDocument};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{
    DispatchPriority, HandlerId, Job, JobCore, JobError, RunMode, Signal,
};
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct FindState {
    current_page: usize,
    /// Matches per page, filled in as pages are searched
    pages: Vec<Vec<Rect>>,
    has_results: bool,
}

/// Searches every page for a string, one page per invocation
///
/// Starts at `start_page` and wraps around the end of the document. Each
/// searched page is announced with "updated(page)".
pub struct FindJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    text: String,
    case_sensitive: bool,
    start_page: usize,
    n_pages: usize,
    state: Mutex<FindState>,
    updated: Arc<Signal<usize>>,
}

impl FindJob {
    /// # Panics
    ///
    /// Panics if the document has pages and `start_page` is not one of them.
    pub fn new(
        context: &JobContext,
        document: SharedDocument,
        start_page: usize,
        text: impl Into<String>,
        case_sensitive: bool,
    ) -> Self {
        let n_pages = document.page_count();
        assert!(
            n_pages == 0 || start_page < n_pages,
            "find start page {start_page} out of range for {n_pages} pages"
        );

        Self {
            core: JobCore::new("find", RunMode::Cooperative, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            text: text.into(),
            case_sensitive,
            start_page,
            n_pages,
            state: Mutex::new(FindState {
                current_page: start_page,
                pages: vec![Vec::new(); n_pages],
                has_results: false,
            }),
            updated: Arc::new(Signal::new("updated")),
        }
    }

    /// Connect to "updated", called with the index of each searched page
    pub fn connect_updated<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.updated.connect(move |page| handler(*page))
    }

    pub fn disconnect_updated(&self, id: HandlerId) -> bool {
        self.updated.disconnect(id)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn start_page(&self) -> usize {
        self.start_page
    }

    pub fn n_pages(&self) -> usize {
        self.n_pages
    }

    /// Next page to search
    pub fn current_page(&self) -> usize {
        lock(&self.state).current_page
    }

    /// Number of matches on `page`, zero for pages not searched yet
    pub fn n_results(&self, page: usize) -> usize {
        lock(&self.state).pages.get(page).map_or(0, Vec::len)
    }

    /// Whether any page searched so far has a match
    pub fn has_results(&self) -> bool {
        lock(&self.state).has_results
    }

    /// Matches of every page, indexed by page
    pub fn results(&self) -> Vec<Vec<Rect>> {
        lock(&self.state).pages.clone()
    }

    /// Share of the document searched so far, in `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.core.is_finished() || self.n_pages == 0 {
            return 1.0;
        }

        let current = lock(&self.state).current_page;
        search_progress(self.start_page, current, self.n_pages)
    }

    fn search_page(&self, page_index: usize) -> DocumentResult<Vec<Rect>> {
        let find = self
            .document
            .find()
            .ok_or(DocumentError::Unsupported("text search"))?;
        let page = self.document.page(page_index)?;
        find.find_text(&page, &self.text, self.case_sensitive)
    }

    /// Search the current page and advance; returns whether pages remain
    fn step(&self) -> bool {
        let page_index = lock(&self.state).current_page;

        let matches = match self.core.run_mode() {
            RunMode::Cooperative => {
                let Some(_document_lock) = self.guard.try_lock_document() else {
                    tracing::trace!(page = page_index, "document busy, search postponed");
                    return true;
                };
                self.search_page(page_index)
            }
            RunMode::Thread => {
                let _document_lock = self.guard.lock_document();
                self.search_page(page_index)
            }
        };

        let matches = match matches {
            Ok(matches) => matches,
            Err(err) => {
                self.core.fail_from_error(&JobError::from(err));
                return false;
            }
        };

        let done = {
            let mut state = lock(&self.state);
            state.has_results |= !matches.is_empty();
            state.pages[page_index] = matches;
            state.current_page = (page_index + 1) % self.n_pages;
            state.current_page == self.start_page
        };

        let core = self.core.clone();
        let signal = self.updated.clone();
        self.core.deliver(DispatchPriority::Default, move || {
            if !core.is_cancelled() {
                signal.emit(&page_index);
            }
        });

        if done {
            tracing::debug!(text = %self.text, pages = self.n_pages, "search complete");
            self.core.succeed();
        }

        !done
    }
}

/// Progress of a search started at `start` that will search `current` next
fn search_progress(start: usize, current: usize, n_pages: usize) -> f64 {
    let searched = if current > start {
        current - start
    } else if current == start {
        n_pages
    } else {
        n_pages - start + current
    };

    searched as f64 / n_pages as f64
}

impl Job for FindJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        if self.core.is_finished() {
            return false;
        }
        self.core.mark_started();

        if self.n_pages == 0 {
            self.core.succeed();
            return false;
        }

        match self.core.run_mode() {
            RunMode::Cooperative => self.step(),
            RunMode::Thread => {
                while self.step() && !self.core.token().is_cancelled() {}
                false
            }
        }
    }
}
