use super::{complete, lock};
use crate::context::JobContext;
use crate::document::{Attachment, DocumentResult, SharedDocument};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{Job, JobCore, RunMode};
use std::sync::{Arc, Mutex};

/// Lists the files attached to a document
pub struct AttachmentsJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    attachments: Mutex<Vec<Attachment>>,
}

impl AttachmentsJob {
    pub fn new(context: &JobContext, document: SharedDocument) -> Self {
        Self {
            core: JobCore::new("attachments", RunMode::Thread, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            attachments: Mutex::new(Vec::new()),
        }
    }

    pub fn take_attachments(&self) -> Vec<Attachment> {
        std::mem::take(&mut *lock(&self.attachments))
    }

    fn list(&self) -> DocumentResult<()> {
        let attachments = {
            let _document_lock = self.guard.lock_document();
            self.document.attachments()?
        };
        tracing::debug!(count = attachments.len(), "attachments listed");

        *lock(&self.attachments) = attachments;
        Ok(())
    }
}

impl Job for AttachmentsJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        self.core.mark_started();
        complete(&self.core, self.list());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::memory::{MemoryDocument, MemoryDocumentData};
    use pdf_editor_scheduler::MainContext;

    #[test]
    fn test_list_attachments() {
        let main = MainContext::new();
        let context = JobContext::new(main.handle(), JobsConfig::default());
        let document: SharedDocument = Arc::new(MemoryDocument::from_data(MemoryDocumentData {
            attachments: vec![Attachment {
                name: "notes.txt".to_string(),
                description: Some("Reviewer notes".to_string()),
                mime_type: Some("text/plain".to_string()),
                data: b"looks good".to_vec(),
            }],
            ..MemoryDocumentData::default()
        }));

        let job = AttachmentsJob::new(&context, document);
        job.run();

        let attachments = job.take_attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].name, "notes.txt");
        assert_eq!(attachments[0].data, b"looks good");
    }

    #[test]
    fn test_unloaded_document_fails() {
        let main = MainContext::new();
        let context = JobContext::new(main.handle(), JobsConfig::default());
        let job = AttachmentsJob::new(&context, Arc::new(MemoryDocument::new()));

        job.run();
        assert!(job.is_failed());
        assert!(job.take_attachments().is_empty());
    }
}
