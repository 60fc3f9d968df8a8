//! PDF document backend built on `lopdf`
//!
//! Reads page geometry and text from the file. Pages are rasterized as blank
//! frames of the right size; encrypted files are detected but cannot be
//! opened.

use crate::document::{
    Document, DocumentError, DocumentFactory, DocumentFind, DocumentResult, DocumentSecurity,
    DocumentThumbnails, Page, Rect, RenderContext, SharedDocument, Surface,
};
use crate::files;
use crate::layout::{blank_page, draw_border, find_matches};
use image::Rgba;
use lopdf::Document as LopdfDocument;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// US Letter, used when a page has no usable MediaBox
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

#[derive(Default)]
struct PdfState {
    document: Option<LopdfDocument>,
    page_sizes: Vec<(f64, f64)>,
    password: Option<String>,
    decompressed: bool,
}

/// Document read from a PDF file
#[derive(Default)]
pub struct PdfDocument {
    state: Mutex<PdfState>,
}

impl PdfDocument {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PdfState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parse(bytes: &[u8]) -> DocumentResult<(LopdfDocument, Vec<(f64, f64)>)> {
        let document =
            LopdfDocument::load_mem(bytes).map_err(|err| DocumentError::Parse(err.to_string()))?;

        let mut sizes = Vec::new();
        for (_, object_id) in document.get_pages() {
            let size = document
                .get_dictionary(object_id)
                .ok()
                .and_then(|dict| dict.get(b"MediaBox").ok())
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(((x1 - x0).abs() as f64, (y1 - y0).abs() as f64))
                })
                .unwrap_or(DEFAULT_PAGE_SIZE);

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(DocumentError::Parse("document has no pages".to_string()));
        }

        Ok((document, sizes))
    }
}

impl Document for PdfDocument {
    fn load(&self, location: &Path) -> DocumentResult<()> {
        if !location.exists() {
            return Err(DocumentError::NotFound(location.to_path_buf()));
        }

        let (bytes, decompressed) = files::read_decompressed(location)?;
        if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(if self.state().password.is_some() {
                DocumentError::Unsupported("encrypted PDF files")
            } else {
                DocumentError::EncryptedNeedsPassword
            });
        }

        let (document, page_sizes) = Self::parse(&bytes)?;
        tracing::debug!(
            location = %location.display(),
            pages = page_sizes.len(),
            decompressed,
            "pdf document loaded"
        );

        let mut state = self.state();
        state.document = Some(document);
        state.page_sizes = page_sizes;
        state.decompressed = decompressed;
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.state().page_sizes.len()
    }

    fn page(&self, index: usize) -> DocumentResult<Page> {
        let state = self.state();
        let (width, height) = *state.page_sizes.get(index).ok_or(DocumentError::PageOutOfRange {
            page: index,
            page_count: state.page_sizes.len(),
        })?;

        Ok(Page {
            index,
            width,
            height,
        })
    }

    fn render(&self, rc: &RenderContext) -> DocumentResult<Surface> {
        self.page(rc.page().index)?;
        let (width, height) = rc.pixel_size();
        Ok(blank_page(width, height))
    }

    fn save(&self, target: &Path) -> DocumentResult<()> {
        let mut state = self.state();
        let document = state
            .document
            .as_mut()
            .ok_or_else(|| DocumentError::Parse("document is not loaded".to_string()))?;

        document
            .save(target)
            .map_err(|err| DocumentError::Io(io::Error::other(err.to_string())))?;
        Ok(())
    }

    fn decompressed_on_load(&self) -> bool {
        self.state().decompressed
    }

    fn security(&self) -> Option<&dyn DocumentSecurity> {
        Some(self)
    }

    fn find(&self) -> Option<&dyn DocumentFind> {
        Some(self)
    }

    fn thumbnails(&self) -> Option<&dyn DocumentThumbnails> {
        Some(self)
    }
}

impl DocumentSecurity for PdfDocument {
    fn set_password(&self, password: &str) {
        self.state().password = Some(password.to_string());
    }
}

impl DocumentFind for PdfDocument {
    fn find_text(&self, page: &Page, text: &str, case_sensitive: bool) -> DocumentResult<Vec<Rect>> {
        let state = self.state();
        let document = state
            .document
            .as_ref()
            .ok_or_else(|| DocumentError::Parse("document is not loaded".to_string()))?;

        // lopdf numbers pages from 1
        let page_text = document
            .extract_text(&[page.index as u32 + 1])
            .map_err(|err| DocumentError::Parse(err.to_string()))?;

        Ok(find_matches(&page_text, text, case_sensitive))
    }
}

impl DocumentThumbnails for PdfDocument {
    fn thumbnail(&self, rc: &RenderContext, border: bool) -> DocumentResult<Surface> {
        let mut image = self.render(rc)?;
        if border {
            draw_border(&mut image, Rgba([0, 0, 0, 255]));
        }
        Ok(image)
    }
}

/// Creates [`PdfDocument`]s for `.pdf` files, optionally compressed
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfDocumentFactory;

impl DocumentFactory for PdfDocumentFactory {
    fn create(&self, location: &Path) -> DocumentResult<SharedDocument> {
        let name = location
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.to_ascii_lowercase())
            .unwrap_or_default();
        let name = name
            .strip_suffix(".gz")
            .or_else(|| name.strip_suffix(".bz2"))
            .unwrap_or(&name);

        if !name.ends_with(".pdf") {
            return Err(DocumentError::Unsupported("this file type"));
        }

        Ok(Arc::new(PdfDocument::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object, Stream};

    fn write_sample_pdf(path: &Path, pages: usize) {
        let mut document = LopdfDocument::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = document.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..pages {
            let content = Stream::new(
                dictionary! {},
                b"BT /F1 12 Tf 72 720 Td (Hello PDF) Tj ET".to_vec(),
            );
            let content_id = document.add_object(content);
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        document.save(path).unwrap();
    }

    #[test]
    fn test_load_and_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.pdf");
        write_sample_pdf(&path, 3);

        let document = PdfDocumentFactory.create(&path).unwrap();
        document.load(&path).unwrap();
        assert_eq!(document.page_count(), 3);
        assert!(!document.decompressed_on_load());

        let page = document.page(2).unwrap();
        let surface = document.render(&RenderContext::new(page, 0, 0.5)).unwrap();
        assert!(surface.width() > 0 && surface.height() > 0);

        assert!(matches!(
            document.page(3),
            Err(DocumentError::PageOutOfRange { page: 3, page_count: 3 })
        ));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.pdf");
        let copy = dir.path().join("copy.pdf");
        write_sample_pdf(&path, 2);

        let document = PdfDocument::new();
        document.load(&path).unwrap();
        document.save(&copy).unwrap();

        let reloaded = PdfDocument::new();
        reloaded.load(&copy).unwrap();
        assert_eq!(reloaded.page_count(), 2);
    }

    #[test]
    fn test_factory_rejects_other_files() {
        assert!(PdfDocumentFactory.create(Path::new("doc.pdf.gz")).is_ok());
        assert!(PdfDocumentFactory.create(Path::new("DOC.PDF")).is_ok());
        assert!(matches!(
            PdfDocumentFactory.create(Path::new("doc.json")),
            Err(DocumentError::Unsupported(_))
        ));
    }

    #[test]
    fn test_encrypted_needs_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.pdf");
        std::fs::write(&path, b"%PDF-1.5\ntrailer << /Encrypt 5 0 R >>\n%%EOF").unwrap();

        let document = PdfDocument::new();
        assert!(matches!(document.load(&path), Err(DocumentError::EncryptedNeedsPassword)));
    }
}
