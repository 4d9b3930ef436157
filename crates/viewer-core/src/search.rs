//! Whole-document text search with a wrapping match cursor.

use crate::error::ViewerError;
use pdf_engine::{DocumentHandle, PageRect, PdfEngine};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub page_index: u32,
    /// Match bounds in page space (points, top-left origin).
    pub region: PageRect,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    query: String,
    hits: Vec<SearchHit>,
    /// `None` exactly when `hits` is empty.
    cursor: Option<usize>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search every page in order and point the cursor at the first hit.
    ///
    /// An empty query leaves the state untouched. An engine failure clears it.
    pub fn run<E>(
        &mut self,
        engine: &E,
        handle: DocumentHandle,
        page_count: u32,
        query: &str,
    ) -> Result<Option<SearchHit>, ViewerError>
    where
        E: PdfEngine + ?Sized,
    {
        let query = query.trim();
        if query.is_empty() {
            return Err(ViewerError::EmptyQuery);
        }

        let needle = query.to_lowercase();
        let mut hits = Vec::new();
        for page_index in 0..page_count {
            let regions = match engine.search_page_text(handle, page_index, &needle) {
                Ok(regions) => regions,
                Err(err) => {
                    self.reset();
                    return Err(ViewerError::Search(err));
                }
            };
            hits.extend(regions.into_iter().map(|region| SearchHit { page_index, region }));
        }

        self.query = query.to_string();
        self.cursor = if hits.is_empty() { None } else { Some(0) };
        self.hits = hits;

        Ok(self.current())
    }

    /// Move to the next hit, wrapping after the last.
    pub fn advance(&mut self) -> Option<SearchHit> {
        let cursor = self.cursor?;
        self.cursor = Some((cursor + 1) % self.hits.len());
        self.current()
    }

    /// Move to the previous hit, wrapping before the first.
    pub fn retreat(&mut self) -> Option<SearchHit> {
        let cursor = self.cursor?;
        let len = self.hits.len();
        self.cursor = Some((cursor + len - 1) % len);
        self.current()
    }

    pub fn reset(&mut self) {
        self.query.clear();
        self.hits.clear();
        self.cursor = None;
    }

    pub fn current(&self) -> Option<SearchHit> {
        self.cursor.and_then(|cursor| self.hits.get(cursor).copied())
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_active(&self) -> bool {
        !self.query.is_empty()
    }

    /// Human-readable summary for a status bar.
    pub fn status(&self) -> Option<String> {
        if !self.is_active() {
            return None;
        }

        match self.current() {
            Some(hit) => Some(format!(
                "Match {} of {} on page {}",
                self.cursor.unwrap_or(0) + 1,
                self.hits.len(),
                hit.page_index + 1
            )),
            None => Some(format!("No matches for \"{}\"", self.query)),
        }
    }
}
