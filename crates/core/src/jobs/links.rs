use super::{complete, lock};
use crate::context::JobContext;
use crate::document::{DocumentError, DocumentResult, LinkModel, SharedDocument};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{Job, JobCore, RunMode};
use std::sync::{Arc, Mutex};

/// Reads the document outline
pub struct LinksJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    model: Mutex<Option<LinkModel>>,
}

impl LinksJob {
    pub fn new(context: &JobContext, document: SharedDocument) -> Self {
        Self {
            core: JobCore::new("links", RunMode::Thread, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            model: Mutex::new(None),
        }
    }

    pub fn take_model(&self) -> Option<LinkModel> {
        lock(&self.model).take()
    }

    fn read_outline(&self) -> DocumentResult<()> {
        let _document_lock = self.guard.lock_document();
        let links = self
            .document
            .links()
            .ok_or(DocumentError::Unsupported("links"))?;

        *lock(&self.model) = Some(links.outline()?);
        Ok(())
    }
}

impl Job for LinksJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        self.core.mark_started();
        complete(&self.core, self.read_outline());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::document::{LinkAction, OutlineItem};
    use crate::memory::{MemoryDocument, MemoryDocumentData, MemoryPage};
    use pdf_editor_scheduler::MainContext;

    #[test]
    fn test_outline_tree() {
        let mut main = MainContext::new();
        let context = JobContext::new(main.handle(), JobsConfig::default());
        let outline = vec![OutlineItem {
            title: "Chapter 1".to_string(),
            action: Some(LinkAction::GotoPage { page: 0 }),
            children: vec![OutlineItem {
                title: "Section 1.1".to_string(),
                action: Some(LinkAction::GotoPage { page: 1 }),
                children: Vec::new(),
            }],
        }];
        let document: SharedDocument = Arc::new(MemoryDocument::from_data(MemoryDocumentData {
            pages: vec![MemoryPage::default(); 2],
            outline: outline.clone(),
            ..MemoryDocumentData::default()
        }));

        let job = LinksJob::new(&context, document);
        let finished = Arc::new(Mutex::new(0));
        let count = finished.clone();
        job.connect_finished(move || *count.lock().unwrap() += 1);

        job.run();
        assert_eq!(*finished.lock().unwrap(), 0);
        main.run_until_idle();

        assert_eq!(*finished.lock().unwrap(), 1);
        assert_eq!(job.take_model(), Some(outline));
        assert_eq!(job.take_model(), None);
    }
}
