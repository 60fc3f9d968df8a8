use super::{complete, lock};
use crate::context::JobContext;
use crate::document::{DocumentError, DocumentResult, Layer, SharedDocument};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{Job, JobCore, RunMode};
use std::sync::{Arc, Mutex};

/// Reads the optional content layers of a document
pub struct LayersJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    layers: Mutex<Option<Vec<Layer>>>,
}

impl LayersJob {
    pub fn new(context: &JobContext, document: SharedDocument) -> Self {
        Self {
            core: JobCore::new("layers", RunMode::Thread, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            layers: Mutex::new(None),
        }
    }

    pub fn take_layers(&self) -> Option<Vec<Layer>> {
        lock(&self.layers).take()
    }

    fn read_layers(&self) -> DocumentResult<()> {
        let _document_lock = self.guard.lock_document();
        let layers = self
            .document
            .layers()
            .ok_or(DocumentError::Unsupported("layers"))?
            .layers()?;

        *lock(&self.layers) = Some(layers);
        Ok(())
    }
}

impl Job for LayersJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        self.core.mark_started();
        complete(&self.core, self.read_layers());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::memory::{MemoryDocument, MemoryDocumentData};
    use crate::pdf::PdfDocument;
    use pdf_editor_scheduler::MainContext;

    #[test]
    fn test_read_layers() {
        let main = MainContext::new();
        let context = JobContext::new(main.handle(), JobsConfig::default());
        let layers = vec![Layer {
            id: 1,
            title: "Annotations".to_string(),
            visible: false,
            children: Vec::new(),
        }];
        let document: SharedDocument = Arc::new(MemoryDocument::from_data(MemoryDocumentData {
            layers: layers.clone(),
            ..MemoryDocumentData::default()
        }));

        let job = LayersJob::new(&context, document);
        job.run();
        assert_eq!(job.take_layers(), Some(layers));
    }

    #[test]
    fn test_backend_without_layers() {
        let main = MainContext::new();
        let context = JobContext::new(main.handle(), JobsConfig::default());
        let job = LayersJob::new(&context, Arc::new(PdfDocument::new()));

        job.run();
        let error = job.error().unwrap();
        assert_eq!(error.code, DocumentError::Unsupported("layers").code());
        assert!(job.take_layers().is_none());
    }
}
