//! PDF Editor Core Library
//!
//! Document jobs for the PDF editor: loading, rendering, thumbnails, font
//! scanning, text search, saving, exporting and outline/attachment/layer
//! enumeration, run by the `pdf-editor-scheduler` execution engine.
//!
//! ```
//! use pdf_editor_core::memory::{MemoryDocument, MemoryDocumentData, MemoryPage};
//! use pdf_editor_core::{FindJob, JobContext, JobsConfig, SharedDocument};
//! use pdf_editor_scheduler::{Job, JobPriority, JobScheduler, MainContext};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let mut main = MainContext::new();
//! let config = JobsConfig::default();
//! let scheduler = JobScheduler::new(main.handle(), config.worker_pool_config()).unwrap();
//! let context = JobContext::new(main.handle(), config);
//!
//! let document: SharedDocument = Arc::new(MemoryDocument::from_data(MemoryDocumentData {
//!     pages: vec![MemoryPage::with_text("hello"), MemoryPage::with_text("hello again")],
//!     ..MemoryDocumentData::default()
//! }));
//! let find = Arc::new(FindJob::new(&context, document, 0, "hello", false));
//! scheduler.push_job(find.clone(), JobPriority::High);
//!
//! assert!(main.run_until(Duration::from_secs(5), || find.is_finished()));
//! assert_eq!(find.n_results(0) + find.n_results(1), 2);
//! scheduler.shutdown();
//! ```

pub mod config;
pub mod context;
pub mod document;
pub mod files;
pub mod guard;
pub mod jobs;
mod layout;
pub mod memory;
pub mod pdf;

pub use config::{ConfigError, JobsConfig};
pub use context::JobContext;
pub use document::{
    Document, DocumentError, DocumentFactory, DocumentResult, Page, Rect, RenderContext,
    RenderFlags, SharedDocument, Surface,
};
pub use guard::DocumentAccessGuard;
pub use jobs::{
    AttachmentsJob, ExportJob, FindJob, FontsJob, LayersJob, LinksJob, LoadJob, RenderJob,
    RenderOutput, SaveJob, ThumbnailJob,
};
