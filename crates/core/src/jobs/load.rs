use super::{complete, lock};
use crate::context::JobContext;
use crate::document::{DocumentFactory, DocumentResult, SharedDocument};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{Job, JobCore, RunMode};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Opens a document, or reloads the one it already holds
///
/// A load that failed because the document needs a password keeps the
/// document: set the password and run the same job again to load it in place.
pub struct LoadJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    factory: Arc<dyn DocumentFactory>,
    location: Mutex<PathBuf>,
    password: Mutex<Option<String>>,
    dest_page: Option<usize>,
    search_string: Option<String>,
    document: Mutex<Option<SharedDocument>>,
}

impl LoadJob {
    pub fn new(
        context: &JobContext,
        factory: Arc<dyn DocumentFactory>,
        location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            core: JobCore::new("load", RunMode::Thread, context.main_context().clone()),
            guard: context.guard().clone(),
            factory,
            location: Mutex::new(location.into()),
            password: Mutex::new(None),
            dest_page: None,
            search_string: None,
            document: Mutex::new(None),
        }
    }

    /// Page the consumer should show once loaded
    pub fn with_dest_page(mut self, page: usize) -> Self {
        self.dest_page = Some(page);
        self
    }

    /// Text the consumer should search once loaded
    pub fn with_search_string(mut self, text: impl Into<String>) -> Self {
        self.search_string = Some(text.into());
        self
    }

    pub fn location(&self) -> PathBuf {
        lock(&self.location).clone()
    }

    pub fn set_location(&self, location: impl AsRef<Path>) {
        *lock(&self.location) = location.as_ref().to_path_buf();
    }

    /// Password used by the next run
    pub fn set_password(&self, password: impl Into<String>) {
        *lock(&self.password) = Some(password.into());
    }

    pub fn dest_page(&self) -> Option<usize> {
        self.dest_page
    }

    pub fn search_string(&self) -> Option<&str> {
        self.search_string.as_deref()
    }

    /// The document, once created
    pub fn document(&self) -> Option<SharedDocument> {
        lock(&self.document).clone()
    }

    fn apply_password(&self, document: &SharedDocument) {
        let password = lock(&self.password).clone();
        if let (Some(password), Some(security)) = (password, document.security()) {
            security.set_password(&password);
        }
    }

    fn load(&self) -> DocumentResult<()> {
        let location = self.location();

        if let Some(document) = self.document() {
            tracing::debug!(location = %location.display(), "reloading document");
            let _document_lock = self.guard.lock_document();
            let _fonts_lock = self.guard.lock_fonts();
            self.apply_password(&document);
            return document.load(&location);
        }

        let _fonts_lock = self.guard.lock_fonts();
        let document = self.factory.create(&location)?;
        *lock(&self.document) = Some(document.clone());
        self.apply_password(&document);
        document.load(&location)
    }
}

impl Job for LoadJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        self.core.restart();
        self.core.mark_started();
        tracing::debug!(location = %self.location().display(), "loading document");

        let result = self.load();
        if let Err(err) = &result {
            if err.is_password_error() {
                tracing::debug!(error = %err, "document kept for a retry with another password");
            }
        }
        complete(&self.core, result);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::document::DocumentError;
    use crate::memory::{MemoryDocumentData, MemoryDocumentFactory, MemoryPage};
    use pdf_editor_scheduler::{ErrorDomain, MainContext};

    #[test]
    fn test_load_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json.bz2");
        MemoryDocumentData {
            pages: vec![MemoryPage::default(); 4],
            ..MemoryDocumentData::default()
        }
        .write_to(&path)
        .unwrap();

        let mut main = MainContext::new();
        let context = JobContext::new(main.handle(), JobsConfig::default());
        let job = LoadJob::new(&context, Arc::new(MemoryDocumentFactory), &path)
            .with_dest_page(2)
            .with_search_string("needle");
        job.run();
        main.run_until_idle();

        assert!(job.is_finished() && !job.is_failed());
        let document = job.document().unwrap();
        assert_eq!(document.page_count(), 4);
        assert!(document.decompressed_on_load());
        assert_eq!(job.dest_page(), Some(2));
        assert_eq!(job.search_string(), Some("needle"));
    }

    #[test]
    fn test_missing_file_then_new_location() {
        let dir = tempfile::tempdir().unwrap();
        let mut main = MainContext::new();
        let context = JobContext::new(main.handle(), JobsConfig::default());
        let missing = dir.path().join("missing.json");
        let job = LoadJob::new(&context, Arc::new(MemoryDocumentFactory), missing);

        job.run();
        main.run_until_idle();
        let error = job.error().unwrap();
        assert_eq!(error.domain, ErrorDomain::Document);
        assert_eq!(error.code, DocumentError::NotFound(PathBuf::new()).code());

        let path = dir.path().join("present.json");
        MemoryDocumentData {
            pages: vec![MemoryPage::default()],
            ..MemoryDocumentData::default()
        }
        .write_to(&path)
        .unwrap();
        job.set_location(&path);
        job.run();
        main.run_until_idle();

        assert!(job.is_finished() && !job.is_failed());
        assert_eq!(job.location(), path);
    }
}
