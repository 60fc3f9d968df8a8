//! Document model consumed by jobs
//!
//! Jobs never look inside a document. They call the operations declared here,
//! always while holding the matching lock of the [`DocumentAccessGuard`]. Every
//! capability beyond the base [`Document`] trait is optional; a job asking for
//! a capability the backend lacks fails with [`DocumentError::Unsupported`].
//!
//! [`DocumentAccessGuard`]: crate::guard::DocumentAccessGuard

use pdf_editor_scheduler::{ErrorDomain, JobError};
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rasterized page content
pub type Surface = image::RgbaImage;

/// Document shared between the application and its jobs
pub type SharedDocument = Arc<dyn Document>;

/// Rectangle in page coordinates (points)
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        (self.x2 - self.x1).abs()
    }

    pub fn height(&self) -> f64 {
        (self.y2 - self.y1).abs()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x1.min(self.x2) < other.x1.max(other.x2)
            && other.x1.min(other.x2) < self.x1.max(self.x2)
            && self.y1.min(self.y2) < other.y1.max(other.y2)
            && other.y1.min(other.y2) < self.y1.max(self.y2)
    }
}

/// A page of a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub index: usize,
    /// Width in points
    pub width: f64,
    /// Height in points
    pub height: f64,
}

/// Page, rotation and scale a render operation works with
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    page: Page,
    rotation: i32,
    scale: f64,
}

impl RenderContext {
    pub fn new(page: Page, rotation: i32, scale: f64) -> Self {
        Self {
            page,
            rotation: rotation.rem_euclid(360),
            scale,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Rebind the context to another page, keeping rotation and scale
    pub fn set_page(&mut self, page: Page) {
        self.page = page;
    }

    /// Rotation in degrees, normalized to `0..360`
    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Pixel size of the page once scaled and rotated
    pub fn pixel_size(&self) -> (u32, u32) {
        let scale = if self.scale <= 0.0 { 1.0 } else { self.scale };
        let width = (self.page.width * scale).round().max(1.0) as u32;
        let height = (self.page.height * scale).round().max(1.0) as u32;

        match self.rotation {
            90 | 270 => (height, width),
            _ => (width, height),
        }
    }
}

/// Optional outputs a render job produces next to the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderFlags(u8);

impl RenderFlags {
    pub const NONE: Self = Self(0);
    pub const SELECTION: Self = Self(1 << 0);
    pub const TEXT: Self = Self(1 << 1);
    pub const LINKS: Self = Self(1 << 2);
    pub const FORMS: Self = Self(1 << 3);
    pub const IMAGES: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for RenderFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RenderFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A value attached to an area of a page
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping<T> {
    pub area: Rect,
    pub data: T,
}

pub type MappingList<T> = Vec<Mapping<T>>;

/// Where activating a link leads
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkAction {
    GotoPage { page: usize },
    Uri { uri: String },
    Named { name: String },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Link {
    pub title: Option<String>,
    pub action: LinkAction,
}

/// Entry of the document outline
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutlineItem {
    pub title: String,
    #[serde(default)]
    pub action: Option<LinkAction>,
    #[serde(default)]
    pub children: Vec<OutlineItem>,
}

/// Outline tree of a document
pub type LinkModel = Vec<OutlineItem>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Attachment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub data: Vec<u8>,
}

/// Optional content group
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub id: u32,
    pub title: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub children: Vec<Layer>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FormField {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub value: String,
    pub area: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FontInfo {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub embedded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectionStyle {
    #[default]
    Glyph,
    Word,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Selection to draw on top of a rendered page
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SelectionInfo {
    pub points: Rect,
    pub style: SelectionStyle,
    pub text: Color,
    pub base: Color,
}

/// Where and how a file exporter writes pages
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub output: PathBuf,
    pub first_page: usize,
    pub last_page: usize,
}

/// Errors reported by document backends
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse document: {0}")]
    Parse(String),
    #[error("document is encrypted and needs a password")]
    EncryptedNeedsPassword,
    #[error("invalid password for encrypted document")]
    InvalidPassword,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("document does not support {0}")]
    Unsupported(&'static str),
    #[error("export failed: {0}")]
    Export(String),
}

impl DocumentError {
    /// Stable code carried by the job error
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 1,
            Self::Io(err) => err.raw_os_error().unwrap_or(-1),
            Self::Parse(_) => 2,
            Self::EncryptedNeedsPassword => 3,
            Self::InvalidPassword => 4,
            Self::PageOutOfRange { .. } => 5,
            Self::Unsupported(_) => 6,
            Self::Export(_) => 7,
        }
    }

    /// Whether loading failed only because of a missing or wrong password
    pub fn is_password_error(&self) -> bool {
        matches!(self, Self::EncryptedNeedsPassword | Self::InvalidPassword)
    }
}

impl From<&DocumentError> for JobError {
    fn from(error: &DocumentError) -> Self {
        let domain = match error {
            DocumentError::Io(_) => ErrorDomain::File,
            _ => ErrorDomain::Document,
        };
        JobError::new(domain, error.code(), error.to_string())
    }
}

impl From<DocumentError> for JobError {
    fn from(error: DocumentError) -> Self {
        JobError::from(&error)
    }
}

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Base document operations
///
/// Implementations use interior mutability; callers serialize access through
/// the document lock.
pub trait Document: Send + Sync {
    /// Load (or reload) the document from `location`
    fn load(&self, location: &Path) -> DocumentResult<()>;

    fn page_count(&self) -> usize;

    fn page(&self, index: usize) -> DocumentResult<Page>;

    fn render(&self, rc: &RenderContext) -> DocumentResult<Surface>;

    /// Write the document to `target`
    fn save(&self, target: &Path) -> DocumentResult<()>;

    /// Whether the file was compressed and transparently decompressed when
    /// it was loaded
    fn decompressed_on_load(&self) -> bool {
        false
    }

    fn attachments(&self) -> DocumentResult<Vec<Attachment>> {
        Ok(Vec::new())
    }

    fn security(&self) -> Option<&dyn DocumentSecurity> {
        None
    }

    fn links(&self) -> Option<&dyn DocumentLinks> {
        None
    }

    fn find(&self) -> Option<&dyn DocumentFind> {
        None
    }

    fn fonts(&self) -> Option<&dyn DocumentFonts> {
        None
    }

    fn thumbnails(&self) -> Option<&dyn DocumentThumbnails> {
        None
    }

    fn selection(&self) -> Option<&dyn DocumentSelection> {
        None
    }

    fn forms(&self) -> Option<&dyn DocumentForms> {
        None
    }

    fn images(&self) -> Option<&dyn DocumentImages> {
        None
    }

    fn layers(&self) -> Option<&dyn DocumentLayers> {
        None
    }

    fn exporter(&self) -> Option<&dyn FileExporter> {
        None
    }
}

pub trait DocumentSecurity {
    /// Password used by the next `load`
    fn set_password(&self, password: &str);
}

pub trait DocumentLinks {
    fn outline(&self) -> DocumentResult<LinkModel>;

    fn page_links(&self, page: usize) -> DocumentResult<MappingList<Link>>;
}

pub trait DocumentFind {
    /// Areas of every occurrence of `text` on `page`
    fn find_text(&self, page: &Page, text: &str, case_sensitive: bool) -> DocumentResult<Vec<Rect>>;
}

/// Incremental font scan
pub trait DocumentFonts {
    /// Scan up to `n_fonts` more fonts. Returns `true` while fonts remain.
    fn scan(&self, n_fonts: usize) -> DocumentResult<bool>;

    /// Fraction of the scan done, `1.0` once complete
    fn progress(&self) -> f64;

    /// Fonts scanned so far
    fn fonts(&self) -> Vec<FontInfo>;
}

pub trait DocumentThumbnails {
    fn thumbnail(&self, rc: &RenderContext, border: bool) -> DocumentResult<Surface>;
}

pub trait DocumentSelection {
    fn render_selection(&self, rc: &RenderContext, selection: &SelectionInfo) -> DocumentResult<Surface>;

    fn selection_region(
        &self,
        rc: &RenderContext,
        style: SelectionStyle,
        points: &Rect,
    ) -> DocumentResult<Vec<Rect>>;

    /// Areas covered by text on the page
    fn text_mapping(&self, rc: &RenderContext) -> DocumentResult<MappingList<String>>;
}

pub trait DocumentForms {
    fn form_fields(&self, page: &Page) -> DocumentResult<MappingList<FormField>>;
}

pub trait DocumentImages {
    fn image_mapping(&self, page: usize) -> DocumentResult<MappingList<ImageRef>>;
}

pub trait DocumentLayers {
    fn layers(&self) -> DocumentResult<Vec<Layer>>;
}

/// Page-by-page export to a file
pub trait FileExporter {
    fn begin(&self, options: &ExportOptions) -> DocumentResult<()>;

    fn do_page(&self, rc: &RenderContext) -> DocumentResult<()>;

    fn end(&self) -> DocumentResult<()>;
}

/// Creates an unloaded document able to read `location`
pub trait DocumentFactory: Send + Sync {
    fn create(&self, location: &Path) -> DocumentResult<SharedDocument>;
}
