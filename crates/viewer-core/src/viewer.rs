//! The viewer session: one open document plus everything the UI shows for it.
//!
//! [`Viewer`] owns the navigation and zoom state, the continuous layout, the
//! search cursor and the thumbnail cache. The UI shell feeds it input
//! (viewport size, scrolling, button presses) and reads back what to draw;
//! it never mutates view state on its own.

use crate::config::ViewerConfig;
use crate::error::{OpenFailure, ViewerError};
use crate::layout::{compute_layout, ContentRect, PageLayout};
use crate::search::{SearchHit, SearchState};
use crate::thumbnails::{ThumbnailCache, ThumbnailStrip};
use crate::zoom::ZoomPolicy;
use pdf_engine::{DocumentHandle, PageSize, PdfEngine, RenderRequest, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Scroll changes smaller than this are treated as echoes of our own requests.
const SCROLL_EPSILON: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub current_page: u32,
    pub zoom: f32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { current_page: 0, zoom: 1.0 }
    }
}

/// Visible area of the scroll surface, in display units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

/// Top-left corner of the viewport in content space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollPosition {
    pub x: f32,
    pub y: f32,
}

/// Why a page change happened. Only user navigation abandons a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOrigin {
    User,
    Search,
}

struct OpenDocument {
    handle: DocumentHandle,
    path: PathBuf,
    page_sizes: Vec<PageSize>,
}

pub struct Viewer<E: PdfEngine + Send + 'static> {
    engine: Arc<Mutex<E>>,
    config: ViewerConfig,
    document: Option<OpenDocument>,
    state: ViewState,
    layout: PageLayout,
    viewport: Viewport,
    pixel_density: f32,
    scroll: ScrollPosition,
    pending_scroll: Option<ScrollPosition>,
    search: SearchState,
    thumbnails: ThumbnailCache,
    strip: ThumbnailStrip,
    render_epoch: u64,
}

impl<E: PdfEngine + Send + 'static> Viewer<E> {
    pub fn new(engine: E, config: ViewerConfig) -> Self {
        Self::with_shared_engine(Arc::new(Mutex::new(engine)), config)
    }

    pub fn with_shared_engine(engine: Arc<Mutex<E>>, config: ViewerConfig) -> Self {
        let thumbnails = ThumbnailCache::new(config.thumbnails);
        Self {
            engine,
            state: ViewState { current_page: 0, zoom: config.zoom.clamp(1.0) },
            config,
            document: None,
            layout: PageLayout::default(),
            viewport: Viewport::default(),
            pixel_density: 1.0,
            scroll: ScrollPosition::default(),
            pending_scroll: None,
            search: SearchState::new(),
            thumbnails,
            strip: ThumbnailStrip::default(),
            render_epoch: 0,
        }
    }

    pub fn engine(&self) -> &Arc<Mutex<E>> {
        &self.engine
    }

    fn lock_engine(&self) -> MutexGuard<'_, E> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn policy(&self) -> &ZoomPolicy {
        &self.config.zoom
    }

    // ---- document lifecycle ----

    /// Open `path`, replacing the current document only on success.
    pub fn open(&mut self, path: &Path) -> Result<(), ViewerError> {
        let fail = |reason: OpenFailure| ViewerError::Open { path: path.to_path_buf(), reason };

        if !path.exists() {
            return Err(fail(OpenFailure::Missing));
        }
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(fail(OpenFailure::WrongExtension));
        }

        let (handle, page_sizes) = {
            let mut engine = self.lock_engine();
            let handle = engine.open(path.into()).map_err(|err| fail(err.into()))?;

            match engine.page_sizes(handle) {
                Ok(sizes) if !sizes.is_empty() => (handle, sizes),
                result => {
                    if let Err(err) = engine.close(handle) {
                        tracing::warn!("failed to close rejected document: {err}");
                    }
                    let reason = match result {
                        Err(err) => OpenFailure::Corrupt(err.to_string()),
                        Ok(_) => OpenFailure::Empty,
                    };
                    return Err(fail(reason));
                }
            }
        };

        self.close();

        let page_count = page_sizes.len() as u32;
        tracing::info!(path = %path.display(), page_count, "opened document");

        self.strip = ThumbnailStrip::new(&page_sizes, self.config.thumbnails);
        self.document = Some(OpenDocument { handle, path: path.to_path_buf(), page_sizes });
        self.state = ViewState { current_page: 0, zoom: self.policy().clamp(1.0) };
        self.relayout();
        self.set_scroll(ScrollPosition::default());
        self.render_epoch += 1;
        self.thumbnails.generate(Arc::clone(&self.engine), handle, page_count);

        Ok(())
    }

    /// Close the current document, if any, and return to the empty state.
    pub fn close(&mut self) {
        let Some(document) = self.document.take() else {
            return;
        };

        self.thumbnails.invalidate();
        if let Err(err) = self.lock_engine().close(document.handle) {
            tracing::warn!("failed to close {}: {err}", document.path.display());
        }
        tracing::info!(path = %document.path.display(), "closed document");

        self.search.reset();
        self.state.current_page = 0;
        self.layout = PageLayout::default();
        self.strip = ThumbnailStrip::default();
        self.scroll = ScrollPosition::default();
        self.pending_scroll = None;
        self.render_epoch += 1;
    }

    pub fn is_open(&self) -> bool {
        self.document.is_some()
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document.as_ref().map(|document| document.path.as_path())
    }

    pub fn page_count(&self) -> u32 {
        self.document.as_ref().map(|document| document.page_sizes.len() as u32).unwrap_or(0)
    }

    pub fn page_sizes(&self) -> &[PageSize] {
        self.document.as_ref().map(|document| document.page_sizes.as_slice()).unwrap_or(&[])
    }

    fn current_page_size(&self) -> Option<PageSize> {
        self.page_sizes().get(self.state.current_page as usize).copied()
    }

    // ---- accessors ----

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scroll(&self) -> ScrollPosition {
        self.scroll
    }

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    /// Changes whenever previously rendered page bitmaps become stale.
    pub fn render_epoch(&self) -> u64 {
        self.render_epoch
    }

    // ---- viewport and scrolling ----

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        let viewport = Viewport { width: width.max(0.0), height: height.max(0.0) };
        if viewport == self.viewport {
            return;
        }

        let width_changed = viewport.width != self.viewport.width;
        self.viewport = viewport;
        if width_changed {
            self.relayout();
        }
        let clamped = self.clamp_scroll(self.scroll);
        if clamped != self.scroll {
            self.set_scroll(clamped);
        }
    }

    /// Display pixels per display unit; part of the rasterization scale.
    pub fn set_pixel_density(&mut self, density: f32) {
        let density = if density.is_finite() && density > 0.0 { density } else { 1.0 };
        if density != self.pixel_density {
            self.pixel_density = density;
            self.render_epoch += 1;
        }
    }

    /// Report a scroll the user made. The current page follows the top of the
    /// viewport; search state is kept.
    pub fn on_scrolled(&mut self, x: f32, y: f32) {
        self.scroll.x = x;
        if (y - self.scroll.y).abs() <= SCROLL_EPSILON {
            return;
        }

        self.scroll.y = y;
        if self.document.is_some() {
            let page = self.layout.page_at_scroll_offset(y);
            if page != self.state.current_page {
                tracing::debug!(page = page + 1, "scrolled to page");
                self.state.current_page = page;
            }
        }
    }

    /// A programmatic scroll the shell has not applied yet. Handed out once.
    pub fn take_scroll_request(&mut self) -> Option<ScrollPosition> {
        self.pending_scroll.take()
    }

    fn clamp_scroll(&self, position: ScrollPosition) -> ScrollPosition {
        ScrollPosition {
            x: position.x.clamp(0.0, self.layout.max_scroll_x(self.viewport.width)),
            y: position.y.clamp(0.0, self.layout.max_scroll_y(self.viewport.height)),
        }
    }

    fn set_scroll(&mut self, position: ScrollPosition) {
        let position = self.clamp_scroll(position);
        self.scroll = position;
        self.pending_scroll = Some(position);
    }

    fn relayout(&mut self) {
        let scale = self.policy().display_scale(self.state.zoom);
        self.layout = compute_layout(self.page_sizes(), scale, self.viewport.width, self.config.page_gap);
    }

    // ---- navigation ----

    pub fn goto_page(&mut self, page_index: u32) -> Result<(), ViewerError> {
        self.navigate(page_index, NavigationOrigin::User)
    }

    pub fn navigate(&mut self, page_index: u32, origin: NavigationOrigin) -> Result<(), ViewerError> {
        if self.document.is_none() {
            return Err(ViewerError::NoDocument);
        }
        let page_count = self.page_count();
        if page_index >= page_count {
            return Err(ViewerError::PageOutOfRange { page: page_index, page_count });
        }

        tracing::debug!(page = page_index + 1, ?origin, "navigate");
        self.state.current_page = page_index;
        self.set_scroll(ScrollPosition {
            x: self.scroll.x,
            y: self.layout.scroll_offset_for_page(page_index),
        });

        if origin == NavigationOrigin::User {
            self.search.reset();
        }
        Ok(())
    }

    /// Returns false at the last page.
    pub fn next_page(&mut self) -> bool {
        let next = self.state.current_page + 1;
        self.document.is_some() && next < self.page_count() && self.goto_page(next).is_ok()
    }

    /// Returns false at the first page.
    pub fn prev_page(&mut self) -> bool {
        match self.state.current_page.checked_sub(1) {
            Some(prev) if self.document.is_some() => self.goto_page(prev).is_ok(),
            _ => false,
        }
    }

    // ---- zoom ----

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.policy().zoom_in(self.state.zoom));
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.policy().zoom_out(self.state.zoom));
    }

    pub fn fit_to_width(&mut self) {
        let Some(page) = self.current_page_size() else {
            return;
        };
        if let Some(zoom) = self.policy().fit_width(self.viewport.width, page) {
            self.set_zoom(zoom);
        }
    }

    pub fn fit_to_window(&mut self) {
        let Some(page) = self.current_page_size() else {
            return;
        };
        if let Some(zoom) = self.policy().fit_page(self.viewport.width, self.viewport.height, page) {
            self.set_zoom(zoom);
        }
    }

    /// Change the zoom, keeping the same spot of the current page at the top
    /// of the viewport and the horizontal center where it was.
    pub fn set_zoom(&mut self, zoom: f32) {
        let zoom = self.policy().clamp(zoom);
        if zoom == self.state.zoom {
            return;
        }

        let page = self.state.current_page;
        let into_page = self
            .layout
            .slot(page)
            .filter(|slot| slot.height > 0.0)
            .map(|slot| (self.scroll.y - slot.y_offset) / slot.height)
            .unwrap_or(0.0);
        let center_x = if self.layout.content_width() > 0.0 {
            (self.scroll.x + self.viewport.width / 2.0) / self.layout.content_width()
        } else {
            0.5
        };

        tracing::debug!(from = self.state.zoom, to = zoom, "zoom");
        self.state.zoom = zoom;
        self.relayout();
        self.render_epoch += 1;

        let y = self
            .layout
            .slot(page)
            .map(|slot| slot.y_offset + into_page * slot.height)
            .unwrap_or(0.0);
        let x = center_x * self.layout.content_width() - self.viewport.width / 2.0;
        self.set_scroll(ScrollPosition { x, y });
    }

    /// Double-click zoom: switch between the toggle zoom and 100%, then
    /// center the viewport on the clicked content point.
    pub fn toggle_zoom_at(&mut self, x: f32, y: f32) {
        let target = self.policy().toggle(self.state.zoom);
        let Some(hit) = self.layout.hit_test(x, y) else {
            self.set_zoom(target);
            return;
        };
        if target == self.state.zoom {
            return;
        }

        tracing::debug!(from = self.state.zoom, to = target, page = hit.page_index + 1, "toggle zoom");
        self.state.zoom = target;
        self.relayout();
        self.render_epoch += 1;

        let Some(slot) = self.layout.slot(hit.page_index).copied() else {
            return;
        };
        let scale = self.layout.scale();
        let point_x = slot.x_offset + hit.page_x * scale;
        let point_y = slot.y_offset + hit.page_y * scale;

        self.set_scroll(ScrollPosition {
            x: point_x - self.viewport.width / 2.0,
            y: point_y - self.viewport.height / 2.0,
        });
        self.state.current_page = self.layout.page_at_scroll_offset(self.scroll.y);
    }

    // ---- search ----

    /// Search the whole document and jump to the first match.
    pub fn search(&mut self, query: &str) -> Result<Option<SearchHit>, ViewerError> {
        let Some(document) = self.document.as_ref() else {
            return Err(ViewerError::NoDocument);
        };
        let handle = document.handle;
        let page_count = document.page_sizes.len() as u32;

        let result = {
            let engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
            self.search.run(&*engine, handle, page_count, query)
        };

        match result {
            Ok(Some(hit)) => {
                tracing::info!(query = self.search.query(), hits = self.search.hits().len(), "search");
                self.jump_to_hit(hit);
                Ok(Some(hit))
            }
            Ok(None) => {
                tracing::info!(query = self.search.query(), "search found no matches");
                Ok(None)
            }
            Err(err) => {
                if let ViewerError::Search(source) = &err {
                    tracing::warn!("search failed: {source}");
                }
                Err(err)
            }
        }
    }

    pub fn next_match(&mut self) -> Option<SearchHit> {
        let hit = self.search.advance()?;
        self.jump_to_hit(hit);
        Some(hit)
    }

    pub fn previous_match(&mut self) -> Option<SearchHit> {
        let hit = self.search.retreat()?;
        self.jump_to_hit(hit);
        Some(hit)
    }

    pub fn reset_search(&mut self) {
        self.search.reset();
    }

    fn jump_to_hit(&mut self, hit: SearchHit) {
        if hit.page_index != self.state.current_page
            && self.navigate(hit.page_index, NavigationOrigin::Search).is_err()
        {
            return;
        }

        let Some(rect) = self.layout.to_content_rect(hit.page_index, hit.region) else {
            return;
        };
        let mut position = self.scroll;
        if rect.y < position.y || rect.y + rect.height > position.y + self.viewport.height {
            position.y = rect.y + rect.height / 2.0 - self.viewport.height / 2.0;
        }
        if rect.x < position.x || rect.x + rect.width > position.x + self.viewport.width {
            position.x = rect.x + rect.width / 2.0 - self.viewport.width / 2.0;
        }
        if position != self.scroll {
            self.set_scroll(position);
        }
    }

    /// Current search match in content space, for drawing the highlight.
    pub fn highlight_rect(&self) -> Option<ContentRect> {
        let hit = self.search.current()?;
        self.layout.to_content_rect(hit.page_index, hit.region)
    }

    // ---- rendering ----

    /// Output pixels per PDF point for page bitmaps.
    pub fn render_scale(&self) -> f32 {
        self.policy().display_scale(self.state.zoom) * self.pixel_density
    }

    pub fn render_page(&self, page_index: u32) -> Result<RgbaImage, ViewerError> {
        let Some(document) = self.document.as_ref() else {
            return Err(ViewerError::NoDocument);
        };
        let page_count = document.page_sizes.len() as u32;
        if page_index >= page_count {
            return Err(ViewerError::PageOutOfRange { page: page_index, page_count });
        }

        let request = RenderRequest { page_index, scale: self.render_scale() };
        self.lock_engine()
            .render_page(document.handle, request)
            .map_err(|source| ViewerError::Render { page: page_index, source })
    }

    // ---- thumbnails ----

    /// Apply finished thumbnails. Returns how many arrived.
    pub fn poll_thumbnails(&mut self) -> usize {
        self.thumbnails.poll()
    }

    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    pub fn thumbnail(&self, page_index: u32) -> Option<&RgbaImage> {
        self.thumbnails.get(page_index)
    }

    pub fn thumbnail_strip(&self) -> &ThumbnailStrip {
        &self.strip
    }

    /// Page whose thumbnail is under a point relative to the strip's top-left.
    pub fn thumbnail_at(&self, x: f32, y: f32) -> Option<u32> {
        self.strip.hit_test(x, y)
    }

    /// Navigate to the clicked thumbnail's page. Returns whether one was hit.
    pub fn thumbnail_clicked(&mut self, x: f32, y: f32) -> Result<bool, ViewerError> {
        match self.thumbnail_at(x, y) {
            Some(page) => self.goto_page(page).map(|()| true),
            None => Ok(false),
        }
    }
}

impl<E: PdfEngine + Send + 'static> Drop for Viewer<E> {
    fn drop(&mut self) {
        self.close();
    }
}
