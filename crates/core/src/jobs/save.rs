use crate::context::JobContext;
use crate::document::SharedDocument;
use crate::files::{self, CompressionType, PrivateTempDir};
use crate::guard::DocumentAccessGuard;
use pdf_editor_scheduler::{Job, JobCore, JobError, RunMode};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

const TEMP_PREFIX: &str = "saveacopy";

/// Saves a copy of a document to `target`
///
/// The document is first written to a temporary file, recompressed when the
/// document was decompressed on load, then moved over `target`. Temporary
/// files are removed whatever the outcome.
pub struct SaveJob {
    core: JobCore,
    guard: Arc<DocumentAccessGuard>,
    document: SharedDocument,
    target: PathBuf,
    document_location: PathBuf,
    temp_root: PathBuf,
    private_dir: Arc<PrivateTempDir>,
}

impl SaveJob {
    /// `document_location` is where the document was loaded from; its
    /// extension selects the compression of the saved copy
    pub fn new(
        context: &JobContext,
        document: SharedDocument,
        target: impl Into<PathBuf>,
        document_location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            core: JobCore::new("save", RunMode::Thread, context.main_context().clone()),
            guard: context.guard().clone(),
            document,
            target: target.into(),
            document_location: document_location.into(),
            temp_root: context.config().temp_dir.clone(),
            private_dir: context.private_temp_dir().clone(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn document_location(&self) -> &Path {
        &self.document_location
    }

    fn create_temp(&self) -> io::Result<(PathBuf, NamedTempFile)> {
        let dir = self.private_dir.path_in(&self.temp_root)?;
        let temp = files::create_temp_file(&dir, TEMP_PREFIX)?;
        Ok((dir, temp))
    }

    fn save(&self) -> Result<(), JobError> {
        let (temp_dir, temp) = self.create_temp().map_err(|err| {
            let template = self.temp_root.join(format!("{TEMP_PREFIX}.XXXXXX"));
            JobError::from_io(
                &err,
                format!("Failed to create file '{}': {}", template.display(), err),
            )
        })?;

        let decompressed = {
            let _document_lock = self.guard.lock_document();
            self.document.save(temp.path())?;
            self.document.decompressed_on_load()
        };

        let compression = if decompressed {
            CompressionType::from_path(&self.document_location)
        } else {
            CompressionType::None
        };

        let result = match compression {
            CompressionType::None => files::transfer(temp, &self.target),
            kind => {
                let compressed = files::compress_file(temp.path(), kind, &temp_dir)?;
                drop(temp);
                files::transfer(compressed, &self.target)
            }
        };

        result.map_err(|err| {
            JobError::from_io(
                &err,
                format!("Failed to save to '{}': {}", self.target.display(), err),
            )
        })?;

        tracing::debug!(target = %self.target.display(), ?compression, "document saved");
        Ok(())
    }
}

impl Job for SaveJob {
    fn core(&self) -> &JobCore {
        &self.core
    }

    fn run(&self) -> bool {
        self.core.mark_started();
        tracing::debug!(
            target = %self.target.display(),
            document_location = %self.document_location.display(),
            "saving document"
        );

        match self.save() {
            Ok(()) => self.core.succeed(),
            Err(err) => self.core.fail_from_error(&err),
        }
        false
    }
}
