//! Pdfium-backed engine: real rasterization and text-layer search.

use crate::text::{find_matches, Glyph};
use crate::{
    raster_dimensions, DocumentHandle, OpenSource, PageRect, PageSize, PdfEngine,
    PdfEngineError, RenderRequest, RgbaImage,
};
use pdfium_render::prelude::*;
use std::collections::HashMap;

pub struct PdfiumEngine {
    pdfium: &'static Pdfium,
    next_handle: u64,
    docs: HashMap<DocumentHandle, PdfDocument<'static>>,
}

impl PdfiumEngine {
    /// Bind the Pdfium library.
    ///
    /// Search order:
    /// 1. Executable's directory (app bundles ship the library next to the binary)
    /// 2. Current working directory
    /// 3. System library paths
    pub fn bind() -> Result<Self, PdfEngineError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        let mut bindings = None;
        if let Some(ref dir) = exe_dir {
            bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)).ok();
        }

        let bindings = match bindings {
            Some(bindings) => bindings,
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library())
                .map_err(|err| {
                    PdfEngineError::Backend(format!("failed to bind pdfium library: {err}"))
                })?,
        };

        // Documents borrow the Pdfium instance for their whole life; the
        // engine lives as long as the process.
        let pdfium: &'static Pdfium = Box::leak(Box::new(Pdfium::new(bindings)));

        Ok(Self { pdfium, next_handle: 0, docs: HashMap::new() })
    }

    fn document(&self, handle: DocumentHandle) -> Result<&PdfDocument<'static>, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PdfPage<'_>, PdfEngineError> {
        let document = self.document(handle)?;
        let page_count = u32::from(document.pages().len());
        if page_index >= page_count {
            return Err(PdfEngineError::PageOutOfRange { page: page_index, page_count });
        }

        // page_count came from a u16, so the index fits.
        let index = page_index as u16;
        document.pages().get(index).map_err(|err| PdfEngineError::Backend(err.to_string()))
    }
}

fn map_open_error(err: PdfiumError) -> PdfEngineError {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            PdfEngineError::Encrypted
        }
        other => PdfEngineError::InvalidFormat(other.to_string()),
    }
}

impl PdfEngine for PdfiumEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let document = match source {
            OpenSource::Path(path) => {
                if !path.exists() {
                    return Err(PdfEngineError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{} does not exist", path.display()),
                    )));
                }
                self.pdfium.load_pdf_from_file(&path, None).map_err(map_open_error)?
            }
            OpenSource::Bytes(bytes) => {
                self.pdfium.load_pdf_from_byte_vec(bytes, None).map_err(map_open_error)?
            }
        };

        if document.pages().len() == 0 {
            return Err(PdfEngineError::Empty);
        }

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, document);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(u32::from(self.document(handle)?.pages().len()))
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let page = self.page(handle, page_index)?;
        Ok(PageSize { width_pt: page.width().value, height_pt: page.height().value })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page = self.page(handle, request.page_index)?;
        let size = PageSize { width_pt: page.width().value, height_pt: page.height().value };
        let (width, height) = raster_dimensions(size, request.scale);

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|err| PdfEngineError::Backend(err.to_string()))?;

        RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes().to_vec()).ok_or_else(|| {
            PdfEngineError::Backend(format!(
                "bitmap size mismatch for page {} at {width}x{height}",
                request.page_index
            ))
        })
    }

    fn search_page_text(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        query: &str,
    ) -> Result<Vec<PageRect>, PdfEngineError> {
        let page = self.page(handle, page_index)?;
        let page_height = page.height().value;

        let text_page = page
            .text()
            .map_err(|err| PdfEngineError::Backend(format!("failed to get text page: {err}")))?;

        let mut glyphs = Vec::new();
        for char_result in text_page.chars().iter() {
            let Some(ch) = char_result.unicode_char() else {
                continue;
            };

            let Ok(bounds) = char_result.loose_bounds() else {
                if ch.is_whitespace() {
                    glyphs.push(Glyph::separator());
                }
                continue;
            };

            // Pdfium reports bottom-left origin.
            let left = bounds.left().value;
            let top = page_height - bounds.top().value;
            let width = bounds.right().value - left;
            let height = bounds.top().value - bounds.bottom().value;

            glyphs.push(Glyph::new(ch, PageRect::new(left, top, width, height)));
        }

        Ok(find_matches(&glyphs, query))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}
