//! In-memory document backend
//!
//! Documents are JSON files (optionally `.gz` or `.bz2` compressed) holding
//! the page geometry, page text, links, form fields, fonts, attachments and
//! layers. Rendering produces a blank page of the right size, which is all
//! headless tools and tests need.

use crate::document::{
    Attachment, Document, DocumentError, DocumentFactory, DocumentFind,
    DocumentFonts, DocumentForms, DocumentImages, DocumentLayers, DocumentLinks, DocumentResult,
    DocumentSecurity, DocumentSelection, DocumentThumbnails, ExportOptions, FileExporter, FontInfo,
    FormField, ImageRef, Layer, Link, LinkAction, LinkModel, Mapping, MappingList, Page, Rect,
    RenderContext, SelectionInfo, SelectionStyle, SharedDocument, Surface,
};
use crate::files::{self, CompressionType};
use crate::layout::{blank_page, draw_border, find_matches, line_rects};
use image::Rgba;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn default_width() -> f64 {
    612.0
}

fn default_height() -> f64 {
    792.0
}

/// A link placed on a page
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PageLink {
    pub area: Rect,
    #[serde(default)]
    pub title: Option<String>,
    pub action: LinkAction,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MemoryPage {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    /// Page text, one line per text row
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub links: Vec<PageLink>,
    #[serde(default)]
    pub forms: Vec<FormField>,
    #[serde(default)]
    pub images: Vec<Rect>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            text: String::new(),
            links: Vec::new(),
            forms: Vec::new(),
            images: Vec::new(),
        }
    }
}

impl MemoryPage {
    /// A letter-sized page with `text`
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Serialized content of an in-memory document
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct MemoryDocumentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub pages: Vec<MemoryPage>,
    #[serde(default)]
    pub outline: LinkModel,
    #[serde(default)]
    pub fonts: Vec<FontInfo>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl MemoryDocumentData {
    /// Serialized form written by `save`
    pub fn to_bytes(&self) -> DocumentResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|err| DocumentError::Parse(err.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> DocumentResult<Self> {
        serde_json::from_slice(bytes).map_err(|err| DocumentError::Parse(err.to_string()))
    }

    /// Write the document to `path`, compressed when the extension asks for it
    pub fn write_to(&self, path: &Path) -> DocumentResult<()> {
        let bytes = self.to_bytes()?;
        let file = fs::File::create(path)?;

        match CompressionType::from_path(path) {
            CompressionType::Gzip => {
                let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
                encoder.write_all(&bytes)?;
                encoder.finish()?;
            }
            CompressionType::Bzip2 => {
                let mut encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
                encoder.write_all(&bytes)?;
                encoder.finish()?;
            }
            CompressionType::None => {
                let mut file = file;
                file.write_all(&bytes)?;
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
struct ExportSession {
    options: ExportOptions,
    pages: Vec<usize>,
}

#[derive(Debug, Default)]
struct MemoryState {
    data: Option<MemoryDocumentData>,
    password: Option<String>,
    decompressed: bool,
    fonts_scanned: usize,
    export: Option<ExportSession>,
}

/// JSON-backed document
#[derive(Debug, Default)]
pub struct MemoryDocument {
    state: Mutex<MemoryState>,
}

impl MemoryDocument {
    /// An unloaded document; call `load` before using it
    pub fn new() -> Self {
        Self::default()
    }

    /// A document already holding `data`
    pub fn from_data(data: MemoryDocumentData) -> Self {
        let document = Self::default();
        document.state().data = Some(data);
        document
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_data<T>(
        &self,
        f: impl FnOnce(&MemoryDocumentData) -> DocumentResult<T>,
    ) -> DocumentResult<T> {
        let state = self.state();
        match state.data.as_ref() {
            Some(data) => f(data),
            None => Err(DocumentError::Parse("document is not loaded".to_string())),
        }
    }

    fn with_page<T>(
        &self,
        index: usize,
        f: impl FnOnce(&MemoryPage) -> DocumentResult<T>,
    ) -> DocumentResult<T> {
        self.with_data(|data| {
            let page = data.pages.get(index).ok_or(DocumentError::PageOutOfRange {
                page: index,
                page_count: data.pages.len(),
            })?;
            f(page)
        })
    }
}

impl Document for MemoryDocument {
    fn load(&self, location: &Path) -> DocumentResult<()> {
        if !location.exists() {
            return Err(DocumentError::NotFound(location.to_path_buf()));
        }

        let (bytes, decompressed) = files::read_decompressed(location)?;
        let data = MemoryDocumentData::from_bytes(&bytes)?;

        let mut state = self.state();
        if let Some(expected) = data.password.as_deref() {
            match state.password.as_deref() {
                None => return Err(DocumentError::EncryptedNeedsPassword),
                Some(given) if given != expected => return Err(DocumentError::InvalidPassword),
                Some(_) => {}
            }
        }

        tracing::debug!(
            location = %location.display(),
            pages = data.pages.len(),
            decompressed,
            "memory document loaded"
        );
        state.data = Some(data);
        state.decompressed = decompressed;
        state.fonts_scanned = 0;
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.state().data.as_ref().map_or(0, |data| data.pages.len())
    }

    fn page(&self, index: usize) -> DocumentResult<Page> {
        self.with_page(index, |page| {
            Ok(Page {
                index,
                width: page.width,
                height: page.height,
            })
        })
    }

    fn render(&self, rc: &RenderContext) -> DocumentResult<Surface> {
        self.with_page(rc.page().index, |_| {
            let (width, height) = rc.pixel_size();
            Ok(blank_page(width, height))
        })
    }

    fn save(&self, target: &Path) -> DocumentResult<()> {
        let bytes = self.with_data(|data| data.to_bytes())?;
        fs::write(target, bytes)?;
        Ok(())
    }

    fn decompressed_on_load(&self) -> bool {
        self.state().decompressed
    }

    fn attachments(&self) -> DocumentResult<Vec<Attachment>> {
        self.with_data(|data| Ok(data.attachments.clone()))
    }

    fn security(&self) -> Option<&dyn DocumentSecurity> {
        Some(self)
    }

    fn links(&self) -> Option<&dyn DocumentLinks> {
        Some(self)
    }

    fn find(&self) -> Option<&dyn DocumentFind> {
        Some(self)
    }

    fn fonts(&self) -> Option<&dyn DocumentFonts> {
        Some(self)
    }

    fn thumbnails(&self) -> Option<&dyn DocumentThumbnails> {
        Some(self)
    }

    fn selection(&self) -> Option<&dyn DocumentSelection> {
        Some(self)
    }

    fn forms(&self) -> Option<&dyn DocumentForms> {
        Some(self)
    }

    fn images(&self) -> Option<&dyn DocumentImages> {
        Some(self)
    }

    fn layers(&self) -> Option<&dyn DocumentLayers> {
        Some(self)
    }

    fn exporter(&self) -> Option<&dyn FileExporter> {
        Some(self)
    }
}

impl DocumentSecurity for MemoryDocument {
    fn set_password(&self, password: &str) {
        self.state().password = Some(password.to_string());
    }
}

impl DocumentLinks for MemoryDocument {
    fn outline(&self) -> DocumentResult<LinkModel> {
        self.with_data(|data| Ok(data.outline.clone()))
    }

    fn page_links(&self, page: usize) -> DocumentResult<MappingList<Link>> {
        self.with_page(page, |page| {
            Ok(page
                .links
                .iter()
                .map(|link| Mapping {
                    area: link.area,
                    data: Link {
                        title: link.title.clone(),
                        action: link.action.clone(),
                    },
                })
                .collect())
        })
    }
}

impl DocumentFind for MemoryDocument {
    fn find_text(&self, page: &Page, text: &str, case_sensitive: bool) -> DocumentResult<Vec<Rect>> {
        self.with_page(page.index, |page| Ok(find_matches(&page.text, text, case_sensitive)))
    }
}

impl DocumentFonts for MemoryDocument {
    fn scan(&self, n_fonts: usize) -> DocumentResult<bool> {
        let mut state = self.state();
        let total = state
            .data
            .as_ref()
            .map(|data| data.fonts.len())
            .ok_or_else(|| DocumentError::Parse("document is not loaded".to_string()))?;

        state.fonts_scanned = (state.fonts_scanned + n_fonts).min(total);
        Ok(state.fonts_scanned < total)
    }

    fn progress(&self) -> f64 {
        let state = self.state();
        let total = state.data.as_ref().map_or(0, |data| data.fonts.len());
        if total == 0 {
            return if state.data.is_some() { 1.0 } else { 0.0 };
        }
        state.fonts_scanned as f64 / total as f64
    }

    fn fonts(&self) -> Vec<FontInfo> {
        let state = self.state();
        state
            .data
            .as_ref()
            .map(|data| data.fonts[..state.fonts_scanned].to_vec())
            .unwrap_or_default()
    }
}

impl DocumentThumbnails for MemoryDocument {
    fn thumbnail(&self, rc: &RenderContext, border: bool) -> DocumentResult<Surface> {
        let mut image = self.render(rc)?;
        if border {
            draw_border(&mut image, Rgba([0, 0, 0, 255]));
        }
        Ok(image)
    }
}

impl DocumentSelection for MemoryDocument {
    fn render_selection(&self, rc: &RenderContext, selection: &SelectionInfo) -> DocumentResult<Surface> {
        let (width, height) = rc.pixel_size();
        let mut surface = Surface::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        let color = Rgba([selection.base.r, selection.base.g, selection.base.b, 255]);

        for area in self.selection_region(rc, selection.style, &selection.points)? {
            let scale = rc.scale();
            let x_end = ((area.x2 * scale).round() as u32).min(width);
            let y_end = ((area.y2 * scale).round() as u32).min(height);
            for y in ((area.y1 * scale).round() as u32)..y_end {
                for x in ((area.x1 * scale).round() as u32)..x_end {
                    surface.put_pixel(x, y, color);
                }
            }
        }

        Ok(surface)
    }

    fn selection_region(
        &self,
        rc: &RenderContext,
        style: SelectionStyle,
        points: &Rect,
    ) -> DocumentResult<Vec<Rect>> {
        self.with_page(rc.page().index, |page| {
            Ok(line_rects(&page.text)
                .filter(|(area, _)| area.intersects(points))
                .map(|(area, _)| match style {
                    SelectionStyle::Line => area,
                    SelectionStyle::Glyph | SelectionStyle::Word => Rect::new(
                        area.x1.max(points.x1.min(points.x2)),
                        area.y1,
                        area.x2.min(points.x1.max(points.x2)),
                        area.y2,
                    ),
                })
                .collect())
        })
    }

    fn text_mapping(&self, rc: &RenderContext) -> DocumentResult<MappingList<String>> {
        self.with_page(rc.page().index, |page| {
            Ok(line_rects(&page.text)
                .filter(|(_, line)| !line.is_empty())
                .map(|(area, line)| Mapping {
                    area,
                    data: line.to_string(),
                })
                .collect())
        })
    }
}

impl DocumentForms for MemoryDocument {
    fn form_fields(&self, page: &Page) -> DocumentResult<MappingList<FormField>> {
        self.with_page(page.index, |page| {
            Ok(page
                .forms
                .iter()
                .map(|field| Mapping {
                    area: field.area,
                    data: field.clone(),
                })
                .collect())
        })
    }
}

impl DocumentImages for MemoryDocument {
    fn image_mapping(&self, page: usize) -> DocumentResult<MappingList<ImageRef>> {
        self.with_page(page, |page| {
            Ok(page
                .images
                .iter()
                .enumerate()
                .map(|(id, area)| Mapping {
                    area: *area,
                    data: ImageRef { id: id as u32 },
                })
                .collect())
        })
    }
}

impl DocumentLayers for MemoryDocument {
    fn layers(&self) -> DocumentResult<Vec<Layer>> {
        self.with_data(|data| Ok(data.layers.clone()))
    }
}

impl FileExporter for MemoryDocument {
    fn begin(&self, options: &ExportOptions) -> DocumentResult<()> {
        let mut state = self.state();
        if state.export.is_some() {
            return Err(DocumentError::Export("an export is already in progress".to_string()));
        }
        state.export = Some(ExportSession {
            options: options.clone(),
            pages: Vec::new(),
        });
        Ok(())
    }

    fn do_page(&self, rc: &RenderContext) -> DocumentResult<()> {
        let index = rc.page().index;
        let mut state = self.state();
        let session = state
            .export
            .as_mut()
            .ok_or_else(|| DocumentError::Export("no export in progress".to_string()))?;

        if index < session.options.first_page || index > session.options.last_page {
            return Err(DocumentError::Export(format!(
                "page {index} outside the exported range {}..={}",
                session.options.first_page, session.options.last_page
            )));
        }
        session.pages.push(index);
        Ok(())
    }

    fn end(&self) -> DocumentResult<()> {
        let session = self
            .state()
            .export
            .take()
            .ok_or_else(|| DocumentError::Export("no export in progress".to_string()))?;

        let bytes = serde_json::to_vec(&serde_json::json!({ "pages": session.pages }))
            .map_err(|err| DocumentError::Export(err.to_string()))?;
        fs::write(&session.options.output, bytes)?;
        Ok(())
    }
}

/// Creates [`MemoryDocument`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryDocumentFactory;

impl DocumentFactory for MemoryDocumentFactory {
    fn create(&self, _location: &Path) -> DocumentResult<SharedDocument> {
        Ok(Arc::new(MemoryDocument::new()))
    }
}
