//! PDF engine seam for the viewer.
//!
//! Everything that needs to understand PDF bytes lives behind [`PdfEngine`]:
//! opening, page geometry, rasterization and per-page text search. The
//! default [`LopdfEngine`] is pure Rust and only draws placeholder pages; the
//! `pdfium` feature adds [`pdfium_backend::PdfiumEngine`] for real output.

use image::{ImageBuffer, Rgba};
use std::path::{Path, PathBuf};

mod lopdf_backend;
#[cfg(feature = "pdfium")]
pub mod pdfium_backend;
pub mod text;

pub use lopdf_backend::LopdfEngine;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// For engines implemented outside this crate.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Intrinsic page size in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self { width_pt, height_pt }
    }
}

/// Rectangle in page space: points, origin at the top-left of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn union(&self, other: &PageRect) -> PageRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PageRect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn scaled(&self, scale: f32) -> PageRect {
        PageRect {
            x: self.x * scale,
            y: self.y * scale,
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// Uniform-scale rasterization request; `scale` is output pixels per point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl OpenSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Bytes(_) => None,
        }
    }
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a valid PDF: {0}")]
    InvalidFormat(String),
    #[error("PDF is encrypted and cannot be opened without a password")]
    Encrypted,
    #[error("PDF has no pages")]
    Empty,
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    /// Regions of every occurrence of `query` on the page, in reading order.
    fn search_page_text(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        query: &str,
    ) -> Result<Vec<PageRect>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;

    /// Intrinsic sizes of all pages, in order.
    fn page_sizes(&self, handle: DocumentHandle) -> Result<Vec<PageSize>, PdfEngineError> {
        let count = self.page_count(handle)?;
        (0..count).map(|page| self.page_size(handle, page)).collect()
    }
}

/// Longest bitmap edge any engine produces. Matches the common GPU texture limit.
pub const MAX_RENDER_EDGE_PX: u32 = 8192;
pub const MAX_RENDER_MEGAPIXELS: u64 = 32;

/// Pixel dimensions of a page rendered at `scale`, never smaller than 1x1.
///
/// Large pages at high zoom are scaled down, keeping the aspect ratio, to fit
/// within [`MAX_RENDER_EDGE_PX`] per edge and [`MAX_RENDER_MEGAPIXELS`] total.
pub fn raster_dimensions(size: PageSize, scale: f32) -> (u32, u32) {
    let scale = if scale.is_nan() || scale <= 0.0 { 1.0 } else { scale };
    let mut width = (size.width_pt * scale).round().max(1.0);
    let mut height = (size.height_pt * scale).round().max(1.0);

    let edge = MAX_RENDER_EDGE_PX as f32;
    if width > edge || height > edge {
        let edge_scale = (edge / width).min(edge / height);
        width = (width * edge_scale).round().max(1.0);
        height = (height * edge_scale).round().max(1.0);
    }

    let max_pixels = (MAX_RENDER_MEGAPIXELS * 1_000_000) as f64;
    let pixels = f64::from(width) * f64::from(height);
    if pixels > max_pixels {
        let area_scale = (max_pixels / pixels).sqrt() as f32;
        width = (width * area_scale).floor().max(1.0);
        height = (height * area_scale).floor().max(1.0);
    }

    (width as u32, height as u32)
}

/// Engine picked at startup.
pub enum AnyEngine {
    Lopdf(LopdfEngine),
    #[cfg(feature = "pdfium")]
    Pdfium(pdfium_backend::PdfiumEngine),
}

impl AnyEngine {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lopdf(_) => "lopdf",
            #[cfg(feature = "pdfium")]
            Self::Pdfium(_) => "pdfium",
        }
    }

    fn inner(&self) -> &dyn PdfEngine {
        match self {
            Self::Lopdf(engine) => engine,
            #[cfg(feature = "pdfium")]
            Self::Pdfium(engine) => engine,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PdfEngine {
        match self {
            Self::Lopdf(engine) => engine,
            #[cfg(feature = "pdfium")]
            Self::Pdfium(engine) => engine,
        }
    }
}

impl PdfEngine for AnyEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        self.inner_mut().open(source)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        self.inner().page_count(handle)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        self.inner().page_size(handle, page_index)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        self.inner().render_page(handle, request)
    }

    fn search_page_text(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        query: &str,
    ) -> Result<Vec<PageRect>, PdfEngineError> {
        self.inner().search_page_text(handle, page_index, query)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.inner_mut().close(handle)
    }
}

/// Pdfium when it is compiled in and the library binds, otherwise lopdf.
pub fn default_engine() -> AnyEngine {
    #[cfg(feature = "pdfium")]
    match pdfium_backend::PdfiumEngine::bind() {
        Ok(engine) => return AnyEngine::Pdfium(engine),
        Err(err) => {
            tracing::warn!("pdfium unavailable, falling back to placeholder rendering: {err}");
        }
    }

    AnyEngine::Lopdf(LopdfEngine::new())
}
