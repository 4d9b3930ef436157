//! In-memory engine for exercising the viewer without real PDFs.
//!
//! Documents are registered by name; opening `OpenSource::Bytes(name)` or a
//! file whose contents are `name` yields that document.

use pdf_engine::{
    raster_dimensions, DocumentHandle, OpenSource, PageRect, PageSize, PdfEngine,
    PdfEngineError, RenderRequest, RgbaImage,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone)]
pub struct FakeDocument {
    sizes: Vec<PageSize>,
    words: Vec<Vec<String>>,
}

impl FakeDocument {
    pub fn uniform(count: u32, width: f32, height: f32) -> Self {
        Self::with_sizes(vec![PageSize::new(width, height); count as usize])
    }

    pub fn with_sizes(sizes: Vec<PageSize>) -> Self {
        let words = vec![Vec::new(); sizes.len()];
        Self { sizes, words }
    }

    /// Words shown on each page, laid out left to right on one line.
    pub fn with_words(mut self, pages: &[&[&str]]) -> Self {
        for (page, words) in self.words.iter_mut().zip(pages) {
            *page = words.iter().map(|word| word.to_string()).collect();
        }
        self
    }
}

/// Where the `n`th word on a page sits.
pub fn word_rect(n: usize) -> PageRect {
    PageRect::new(10.0 + n as f32 * 50.0, 100.0, 40.0, 12.0)
}

#[derive(Default)]
pub struct FakeEngine {
    library: HashMap<String, FakeDocument>,
    rejections: HashMap<String, fn() -> PdfEngineError>,
    open: HashMap<DocumentHandle, FakeDocument>,
    next_handle: u64,
    failing_renders: HashSet<u32>,
    failing_search: Option<u32>,
    gate: RefCell<Option<Sender<Sender<()>>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, document: FakeDocument) {
        self.library.insert(name.to_string(), document);
    }

    /// Opening `name` fails with the error `make` builds.
    pub fn reject(&mut self, name: &str, make: fn() -> PdfEngineError) {
        self.rejections.insert(name.to_string(), make);
    }

    pub fn fail_render_on(&mut self, page_index: u32) {
        self.failing_renders.insert(page_index);
    }

    pub fn fail_search_on(&mut self, page_index: u32) {
        self.failing_search = Some(page_index);
    }

    /// Number of documents currently open.
    pub fn open_documents(&self) -> usize {
        self.open.len()
    }

    /// Block the next `render_page` call. The returned channel yields a
    /// sender once the render has started; sending on it lets the render
    /// finish.
    pub fn install_gate(&mut self) -> Receiver<Sender<()>> {
        let (entered_tx, entered_rx) = mpsc::channel();
        *self.gate.get_mut() = Some(entered_tx);
        entered_rx
    }

    fn document(&self, handle: DocumentHandle) -> Result<&FakeDocument, PdfEngineError> {
        self.open.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page_size_of(document: &FakeDocument, page_index: u32) -> Result<PageSize, PdfEngineError> {
        document.sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: document.sizes.len() as u32,
        })
    }
}

impl PdfEngine for FakeEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let name = match source {
            OpenSource::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            OpenSource::Path(path) => std::fs::read_to_string(path)?,
        };
        let name = name.trim();

        if let Some(make) = self.rejections.get(name) {
            return Err(make());
        }
        let document = self
            .library
            .get(name)
            .cloned()
            .ok_or_else(|| PdfEngineError::InvalidFormat(format!("unknown fake document {name:?}")))?;
        if document.sizes.is_empty() {
            return Err(PdfEngineError::Empty);
        }

        self.next_handle += 1;
        let handle = DocumentHandle::new(self.next_handle);
        self.open.insert(handle, document);
        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.document(handle)?.sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        Self::page_size_of(self.document(handle)?, page_index)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        if let Some(entered) = self.gate.borrow_mut().take() {
            let (release_tx, release_rx) = mpsc::channel();
            if entered.send(release_tx).is_ok() {
                let _ = release_rx.recv();
            }
        }

        let size = Self::page_size_of(self.document(handle)?, request.page_index)?;
        if self.failing_renders.contains(&request.page_index) {
            return Err(PdfEngineError::Backend(format!("page {} is broken", request.page_index)));
        }

        let (width, height) = raster_dimensions(size, request.scale);
        Ok(RgbaImage::new(width, height))
    }

    fn search_page_text(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        query: &str,
    ) -> Result<Vec<PageRect>, PdfEngineError> {
        let document = self.document(handle)?;
        Self::page_size_of(document, page_index)?;
        if self.failing_search == Some(page_index) {
            return Err(PdfEngineError::Backend("text layer unavailable".into()));
        }

        let needle = query.to_lowercase();
        Ok(document.words[page_index as usize]
            .iter()
            .enumerate()
            .filter(|(_, word)| word.to_lowercase().contains(&needle))
            .map(|(n, _)| word_rect(n))
            .collect())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.open.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}
