//! Document jobs
//!
//! Each job owns its inputs and a reference to the document, implements
//! [`Job`](pdf_editor_scheduler::Job), and exposes its outputs once
//! "finished" has been delivered. Outputs are handed to the consumer with the
//! `take_*` accessors.
//!
//! | Job | Run mode | Extra notifications |
//! |---|---|---|
//! | [`LoadJob`] | thread | |
//! | [`RenderJob`] | thread | `page-ready` |
//! | [`ThumbnailJob`] | thread | |
//! | [`FontsJob`] | cooperative | `updated(progress)` |
//! | [`FindJob`] | cooperative | `updated(page)` |
//! | [`SaveJob`] | thread | |
//! | [`ExportJob`] | thread | |
//! | [`LinksJob`], [`AttachmentsJob`], [`LayersJob`] | thread | |

mod attachments;
mod export;
mod find;
mod fonts;
mod layers;
mod links;
mod load;
mod render;
mod save;
mod thumbnail;

pub use attachments::AttachmentsJob;
pub use export::ExportJob;
pub use find::FindJob;
pub use fonts::FontsJob;
pub use layers::LayersJob;
pub use links::LinksJob;
pub use load::LoadJob;
pub use render::{RenderJob, RenderOutput};
pub use save::SaveJob;
pub use thumbnail::ThumbnailJob;

use crate::document::DocumentResult;
use pdf_editor_scheduler::{JobCore, JobError};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Record the outcome of a run on the job
pub(crate) fn complete(core: &JobCore, result: DocumentResult<()>) {
    match result {
        Ok(()) => core.succeed(),
        Err(err) => core.fail_from_error(&JobError::from(err)),
    }
}

/// Lock job-local state, recovering from poisoning
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
