//! Serialized access to a document and the font subsystem
//!
//! Two lock domains: the document lock guards every call into the document,
//! the fonts lock guards font subsystem calls. When both are needed the fonts
//! lock is taken while the document lock is held, never the other way round.
//!
//! Thread-mode jobs block on these locks. Cooperative jobs run on the main
//! loop and must use the `try_` variants, giving up their slice when a lock
//! is taken.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Held while a job talks to the document
pub type DocumentLock<'a> = MutexGuard<'a, ()>;

/// Held while a job talks to the font subsystem
pub type FontsLock<'a> = MutexGuard<'a, ()>;

/// Lock domains shared by every job working on the same documents
#[derive(Debug, Default)]
pub struct DocumentAccessGuard {
    document: Mutex<()>,
    fonts: Mutex<()>,
}

impl DocumentAccessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the document lock is available
    pub fn lock_document(&self) -> DocumentLock<'_> {
        // A job that panicked while holding the lock leaves nothing to repair
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the document lock if it is free
    pub fn try_lock_document(&self) -> Option<DocumentLock<'_>> {
        try_lock(&self.document)
    }

    /// Block until the fonts lock is available
    pub fn lock_fonts(&self) -> FontsLock<'_> {
        self.fonts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the fonts lock if it is free
    pub fn try_lock_fonts(&self) -> Option<FontsLock<'_>> {
        try_lock(&self.fonts)
    }

    /// Take both locks without blocking, in nesting order
    ///
    /// Returns `None`, holding nothing, if either is taken.
    pub fn try_lock_both(&self) -> Option<(DocumentLock<'_>, FontsLock<'_>)> {
        let document = self.try_lock_document()?;
        let fonts = self.try_lock_fonts()?;
        Some((document, fonts))
    }
}

fn try_lock(mutex: &Mutex<()>) -> Option<MutexGuard<'_, ()>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
