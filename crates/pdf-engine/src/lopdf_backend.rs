use crate::text::{find_matches, Glyph};
use crate::{
    raster_dimensions, DocumentHandle, OpenSource, PageRect, PageSize, PdfEngine,
    PdfEngineError, RenderRequest, RgbaImage,
};
use image::Rgba;
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;

/// Letter, used when a page has no readable MediaBox anywhere up its tree.
const FALLBACK_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

/// Glyph advance as a fraction of the font size. The backend does not read
/// font metrics, so boxes are approximate.
const APPROX_GLYPH_ADVANCE: f32 = 0.5;
const DESCENT: f32 = 0.2;
const ASCENT: f32 = 0.8;

/// `TJ` adjustments beyond this (thousandths of an em) read as a word break.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy)]
struct PageRecord {
    object_id: ObjectId,
    size: PageSize,
    origin: (f32, f32),
}

#[derive(Debug)]
struct DocumentRecord {
    doc: Document,
    pages: Vec<PageRecord>,
}

/// Pure-Rust engine on top of `lopdf`.
///
/// Reads page geometry and the text layer; rasterization draws a blank
/// placeholder page of the right size.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(bytes: &[u8]) -> Result<DocumentRecord, PdfEngineError> {
        let header_window = &bytes[..bytes.len().min(1024)];
        if !header_window.windows(5).any(|window| window == b"%PDF-") {
            return Err(PdfEngineError::InvalidFormat("missing %PDF- header".to_owned()));
        }

        let doc = match Document::load_mem(bytes) {
            Ok(doc) => doc,
            // Encrypted object streams often fail to parse at all.
            Err(_) if trailer_declares_encryption(bytes) => return Err(PdfEngineError::Encrypted),
            Err(err) => return Err(PdfEngineError::InvalidFormat(err.to_string())),
        };
        if doc.is_encrypted() {
            return Err(PdfEngineError::Encrypted);
        }

        let pages: Vec<PageRecord> = doc
            .get_pages()
            .into_values()
            .map(|object_id| {
                let (origin, size) = media_box(&doc, object_id)
                    .unwrap_or(((0.0, 0.0), FALLBACK_PAGE_SIZE));
                PageRecord { object_id, size, origin }
            })
            .collect();

        if pages.is_empty() {
            return Err(PdfEngineError::Empty);
        }

        Ok(DocumentRecord { doc, pages })
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn page(&self, handle: DocumentHandle, page_index: u32) -> Result<(&DocumentRecord, PageRecord), PdfEngineError> {
        let record = self.record(handle)?;
        let page = record.pages.get(page_index as usize).copied().ok_or(
            PdfEngineError::PageOutOfRange {
                page: page_index,
                page_count: record.pages.len() as u32,
            },
        )?;
        Ok((record, page))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let record = Self::load(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.pages.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        Ok(self.page(handle, page_index)?.1.size)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let (width, height) = raster_dimensions(page_size, request.scale);

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn search_page_text(
        &self,
        handle: DocumentHandle,
        page_index: u32,
        query: &str,
    ) -> Result<Vec<PageRect>, PdfEngineError> {
        let (record, page) = self.page(handle, page_index)?;
        let glyphs = page_glyphs(&record.doc, page)?;
        Ok(find_matches(&glyphs, query))
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Looks for `/Encrypt` in the trailer dictionary only, or in the tail of the
/// file when the document uses a cross-reference stream.
fn trailer_declares_encryption(bytes: &[u8]) -> bool {
    const TAIL_LEN: usize = 4096;
    let tail_start = bytes
        .windows(b"trailer".len())
        .rposition(|window| window == b"trailer")
        .unwrap_or_else(|| bytes.len().saturating_sub(TAIL_LEN));
    bytes[tail_start..].windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt")
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<((f32, f32), PageSize)> {
    let mut current = Some(page_id);

    for _ in 0..MAX_TREE_DEPTH {
        let id = current?;
        let dict = doc.get_dictionary(id).ok()?;

        let rect = dict.get(b"MediaBox").ok().and_then(|obj| {
            let obj = match obj.as_reference() {
                Ok(reference) => doc.get_object(reference).ok()?,
                Err(_) => obj,
            };
            parse_rect(obj.as_array().ok()?)
        });

        if rect.is_some() {
            return rect;
        }

        current = dict.get(b"Parent").ok().and_then(|obj| obj.as_reference().ok());
    }

    None
}

fn parse_rect(array: &[Object]) -> Option<((f32, f32), PageSize)> {
    if array.len() != 4 {
        return None;
    }
    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;

    Some((
        (x0.min(x1), y0.min(y1)),
        PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() },
    ))
}

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(m1: &Matrix, m2: &Matrix) -> Matrix {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

fn translate(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn apply(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn numbers(operands: &[Object]) -> Vec<f32> {
    operands.iter().filter_map(|obj| obj.as_float().ok()).collect()
}

fn decode_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Text-object state while walking a content stream.
struct TextWalker {
    page: PageRecord,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    line_break: bool,
    glyphs: Vec<Glyph>,
}

impl TextWalker {
    fn new(page: PageRecord) -> Self {
        Self {
            page,
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            font_size: 12.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            line_break: false,
            glyphs: Vec::new(),
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = multiply(&translate(tx, ty), &self.tlm);
        self.tm = self.tlm;
        self.line_break = true;
    }

    fn break_run(&mut self) {
        if self.line_break {
            if matches!(self.glyphs.last(), Some(glyph) if glyph.bounds.is_some()) {
                self.glyphs.push(Glyph::separator());
            }
            self.line_break = false;
        }
    }

    fn show(&mut self, text: &str) {
        self.break_run();

        for ch in text.chars() {
            let advance = APPROX_GLYPH_ADVANCE * self.font_size;
            let rendering = multiply(&self.tm, &self.ctm);

            let (x0, y0) = apply(&rendering, 0.0, -DESCENT * self.font_size);
            let (x1, y1) = apply(&rendering, advance * self.horizontal_scale, ASCENT * self.font_size);

            let left = x0.min(x1) - self.page.origin.0;
            let right = x0.max(x1) - self.page.origin.0;
            let bottom = y0.min(y1) - self.page.origin.1;
            let top = y0.max(y1) - self.page.origin.1;

            self.glyphs.push(Glyph::new(
                ch,
                PageRect::new(left, self.page.size.height_pt - top, right - left, top - bottom),
            ));

            let spacing = if ch == ' ' { self.word_spacing } else { 0.0 };
            let tx = (advance + self.char_spacing + spacing) * self.horizontal_scale;
            self.tm = multiply(&translate(tx, 0.0), &self.tm);
        }
    }

    fn kern(&mut self, thousandths: f32) {
        let tx = -thousandths / 1000.0 * self.font_size * self.horizontal_scale;
        self.tm = multiply(&translate(tx, 0.0), &self.tm);
        if -thousandths > TJ_SPACE_THRESHOLD {
            self.line_break = true;
        }
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.move_line(0.0, -leading);
    }

    fn operation(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.ctm_stack.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let [a, b, c, d, e, f] = numbers(operands)[..] {
                    self.ctm = multiply(&[a, b, c, d, e, f], &self.ctm);
                }
            }
            "BT" => {
                self.tm = IDENTITY;
                self.tlm = IDENTITY;
                self.line_break = true;
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(|obj| obj.as_float().ok()) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let [leading] = numbers(operands)[..] {
                    self.leading = leading;
                }
            }
            "Tc" => {
                if let [spacing] = numbers(operands)[..] {
                    self.char_spacing = spacing;
                }
            }
            "Tw" => {
                if let [spacing] = numbers(operands)[..] {
                    self.word_spacing = spacing;
                }
            }
            "Tz" => {
                if let [scale] = numbers(operands)[..] {
                    self.horizontal_scale = scale / 100.0;
                }
            }
            "Td" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty] = numbers(operands)[..] {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let [a, b, c, d, e, f] = numbers(operands)[..] {
                    self.tlm = [a, b, c, d, e, f];
                    self.tm = self.tlm;
                    self.line_break = true;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&decode_string(bytes));
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show(&decode_string(bytes));
                }
            }
            "\"" => {
                if let [word, chars] = numbers(&operands[..operands.len().min(2)])[..] {
                    self.word_spacing = word;
                    self.char_spacing = chars;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show(&decode_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(&decode_string(bytes)),
                            other => {
                                if let Ok(adjust) = other.as_float() {
                                    self.kern(adjust);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn page_glyphs(doc: &Document, page: PageRecord) -> Result<Vec<Glyph>, PdfEngineError> {
    let bytes = doc
        .get_page_content(page.object_id)
        .map_err(|err| PdfEngineError::Backend(format!("failed to read page content: {err}")))?;
    let content = Content::decode(&bytes)
        .map_err(|err| PdfEngineError::Backend(format!("failed to decode page content: {err}")))?;

    let mut walker = TextWalker::new(page);
    for operation in &content.operations {
        walker.operation(&operation.operator, &operation.operands);
    }

    Ok(walker.glyphs)
}
