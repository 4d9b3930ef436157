//! The eframe application: toolbar, thumbnail sidebar, continuous page view.
//!
//! All view state lives in [`Viewer`]; this module only forwards input to it
//! and draws what it reports.

use eframe::egui;
use pdf_engine::{AnyEngine, RgbaImage};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use viewer_core::{thumbnails, CachedPage, PageCache, ViewState, Viewer, ViewerConfig, ViewerError};

/// Page textures kept around while scrolling.
const PAGE_CACHE_CAPACITY: usize = 24;

const FULL_UV: egui::Rect = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));

const HIGHLIGHT: egui::Color32 = egui::Color32::from_rgba_premultiplied(96, 86, 0, 96);

pub struct PdfViewerApp {
    viewer: Viewer<AnyEngine>,
    pages: PageCache<egui::TextureHandle>,
    thumbnails: HashMap<u32, egui::TextureHandle>,
    thumbnail_generation: u64,
    search_query: String,
    status: Option<String>,
    error_dialog: Option<ErrorDialogState>,
}

struct ErrorDialogState {
    severity: ErrorSeverity,
    message: String,
}

#[derive(Clone, Copy, PartialEq)]
enum ErrorSeverity {
    Error,
    Info,
}

impl ErrorSeverity {
    fn icon(&self) -> &'static str {
        match self {
            ErrorSeverity::Error => "❌",
            ErrorSeverity::Info => "ℹ️",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ErrorSeverity::Error => "Error",
            ErrorSeverity::Info => "Search",
        }
    }
}

/// Keyboard actions, collected inside the input lock and applied afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shortcut {
    Open,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    ZoomIn,
    ZoomOut,
    ActualSize,
    NextMatch,
    PreviousMatch,
    Dismiss,
}

impl PdfViewerApp {
    pub fn new(engine: AnyEngine, config: ViewerConfig, initial_file: Option<PathBuf>) -> Self {
        let mut app = Self {
            viewer: Viewer::new(engine, config),
            pages: PageCache::new(PAGE_CACHE_CAPACITY),
            thumbnails: HashMap::new(),
            thumbnail_generation: 0,
            search_query: String::new(),
            status: None,
            error_dialog: None,
        };

        if let Some(path) = initial_file {
            app.open_path(&path);
        }
        app
    }

    fn show_error(&mut self, severity: ErrorSeverity, message: impl Into<String>) {
        self.error_dialog = Some(ErrorDialogState { severity, message: message.into() });
    }

    fn open_file(&mut self) {
        if let Some(path) = rfd::FileDialog::new().add_filter("PDF Files", &["pdf"]).pick_file() {
            self.open_path(&path);
        }
    }

    fn open_path(&mut self, path: &Path) {
        match self.viewer.open(path) {
            Ok(()) => {
                self.search_query.clear();
                self.status = Some(format!("Opened {}", path.display()));
            }
            Err(err) => {
                tracing::warn!("{err}");
                self.show_error(ErrorSeverity::Error, format!("Failed to open PDF: {err}"));
            }
        }
    }

    fn run_search(&mut self) {
        let query = self.search_query.trim();
        if self.viewer.search_state().is_active() && self.viewer.search_state().query() == query {
            self.viewer.next_match();
            return;
        }

        match self.viewer.search(&self.search_query) {
            Ok(Some(_)) => self.status = None,
            Ok(None) => self.show_error(ErrorSeverity::Info, "No matches found."),
            Err(ViewerError::EmptyQuery | ViewerError::NoDocument) => {}
            Err(err) => self.show_error(ErrorSeverity::Error, err.to_string()),
        }
    }

    fn reset_search(&mut self) {
        self.search_query.clear();
        self.viewer.reset_search();
    }

    /// Upload thumbnails that arrived since the last frame.
    fn sync_thumbnail_textures(&mut self, ctx: &egui::Context) {
        self.viewer.poll_thumbnails();

        let generation = self.viewer.thumbnails().generation();
        if generation != self.thumbnail_generation {
            self.thumbnails.clear();
            self.thumbnail_generation = generation;
        }

        for page in 0..self.viewer.page_count() {
            if self.thumbnails.contains_key(&page) {
                continue;
            }
            if let Some(image) = self.viewer.thumbnail(page) {
                let texture = ctx.load_texture(
                    format!("thumb_{generation}_{page}"),
                    color_image(image),
                    egui::TextureOptions::LINEAR,
                );
                self.thumbnails.insert(page, texture);
            }
        }
    }

    /// Rasterize `page` unless it is cached or already failed this epoch.
    fn ensure_page_texture(&mut self, ctx: &egui::Context, page: u32) {
        if !matches!(self.pages.get(page), CachedPage::Missing) {
            return;
        }

        match self.viewer.render_page(page) {
            Ok(image) => {
                let max_side = ctx.input(|i| i.max_texture_side);
                let texture = ctx.load_texture(
                    format!("page_{page}"),
                    color_image(&fit_texture_side(image, max_side)),
                    egui::TextureOptions::LINEAR,
                );
                self.pages.insert(page, texture);
            }
            Err(err) => {
                if self.pages.mark_failed(page) {
                    tracing::error!("{err}");
                    self.status = Some("Error displaying page".to_string());
                    if self.error_dialog.is_none() {
                        self.show_error(ErrorSeverity::Error, format!("Failed to display page: {err}"));
                    }
                }
            }
        }
    }
}

impl eframe::App for PdfViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.viewer.set_pixel_density(ctx.pixels_per_point());
        self.sync_thumbnail_textures(ctx);
        self.handle_keyboard_shortcuts(ctx);

        self.draw_toolbar(ctx);
        self.draw_status_bar(ctx);
        self.draw_sidebar(ctx);
        self.draw_pages(ctx);
        self.draw_error_dialog(ctx);

        if self.viewer.is_open() && !self.viewer.thumbnails().is_complete() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }
    }
}

impl PdfViewerApp {
    fn handle_keyboard_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }

        let shortcuts = ctx.input(|i| {
            let command = i.modifiers.command;
            let bindings = [
                (command && i.key_pressed(egui::Key::O), Shortcut::Open),
                (i.key_pressed(egui::Key::PageDown) || i.key_pressed(egui::Key::ArrowRight), Shortcut::NextPage),
                (i.key_pressed(egui::Key::PageUp) || i.key_pressed(egui::Key::ArrowLeft), Shortcut::PrevPage),
                (i.key_pressed(egui::Key::Home), Shortcut::FirstPage),
                (i.key_pressed(egui::Key::End), Shortcut::LastPage),
                (command && (i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals)), Shortcut::ZoomIn),
                (command && i.key_pressed(egui::Key::Minus), Shortcut::ZoomOut),
                (command && i.key_pressed(egui::Key::Num0), Shortcut::ActualSize),
                (i.key_pressed(egui::Key::F3) && !i.modifiers.shift, Shortcut::NextMatch),
                (i.key_pressed(egui::Key::F3) && i.modifiers.shift, Shortcut::PreviousMatch),
                (i.key_pressed(egui::Key::Escape), Shortcut::Dismiss),
            ];
            bindings.into_iter().filter(|(pressed, _)| *pressed).map(|(_, action)| action).collect::<Vec<_>>()
        });

        for shortcut in shortcuts {
            match shortcut {
                Shortcut::Open => self.open_file(),
                Shortcut::NextPage => {
                    self.viewer.next_page();
                }
                Shortcut::PrevPage => {
                    self.viewer.prev_page();
                }
                Shortcut::FirstPage | Shortcut::LastPage => {
                    let Some(page) = edge_page(shortcut, self.viewer.page_count()) else {
                        continue;
                    };
                    if let Err(err) = self.viewer.goto_page(page) {
                        tracing::warn!("keyboard navigation failed: {err}");
                    }
                }
                Shortcut::ZoomIn => self.viewer.zoom_in(),
                Shortcut::ZoomOut => self.viewer.zoom_out(),
                Shortcut::ActualSize => self.viewer.set_zoom(1.0),
                Shortcut::NextMatch => {
                    self.viewer.next_match();
                }
                Shortcut::PreviousMatch => {
                    self.viewer.previous_match();
                }
                Shortcut::Dismiss => {
                    if self.error_dialog.is_some() {
                        self.error_dialog = None;
                    } else {
                        self.reset_search();
                    }
                }
            }
        }
    }

    fn draw_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.add_space(8.0);

                if ui.button("📂 Open").clicked() {
                    self.open_file();
                }

                ui.separator();

                ui.add_enabled_ui(self.viewer.is_open(), |ui| {
                    if ui.button("◀ Prev").clicked() {
                        self.viewer.prev_page();
                    }
                    ui.label(page_label(self.viewer.state(), self.viewer.page_count()));
                    if ui.button("Next ▶").clicked() {
                        self.viewer.next_page();
                    }

                    ui.separator();

                    if ui.button("−").on_hover_text("Zoom out").clicked() {
                        self.viewer.zoom_out();
                    }
                    ui.label(zoom_label(self.viewer.state().zoom));
                    if ui.button("+").on_hover_text("Zoom in").clicked() {
                        self.viewer.zoom_in();
                    }
                    if ui.button("Fit Width").clicked() {
                        self.viewer.fit_to_width();
                    }
                    if ui.button("Fit Page").clicked() {
                        self.viewer.fit_to_window();
                    }

                    ui.separator();

                    let response = ui.add(
                        egui::TextEdit::singleline(&mut self.search_query)
                            .hint_text("Search...")
                            .desired_width(180.0),
                    );
                    let submitted =
                        response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if ui.button("Search").clicked() || submitted {
                        self.run_search();
                    }
                    if ui.button("▲").on_hover_text("Previous match").clicked() {
                        self.viewer.previous_match();
                    }
                    if ui.button("▼").on_hover_text("Next match").clicked() {
                        self.viewer.next_match();
                    }
                    if ui.button("✕").on_hover_text("Clear search").clicked() {
                        self.reset_search();
                    }
                });
            });
        });
    }

    fn draw_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let text = self
                    .viewer
                    .search_state()
                    .status()
                    .or_else(|| self.status.clone())
                    .unwrap_or_else(|| "Ready".to_string());
                ui.label(text);

                if let Some(path) = self.viewer.document_path() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.weak(path.display().to_string());
                    });
                }
            });
        });
    }

    fn draw_sidebar(&mut self, ctx: &egui::Context) {
        let strip_width = self.viewer.config().thumbnails.width as f32;

        egui::SidePanel::left("thumbnails")
            .default_width(strip_width + 24.0)
            .resizable(false)
            .show(ctx, |ui| {
                ui.heading("Pages");
                ui.separator();

                if !self.viewer.is_open() {
                    ui.weak("No document loaded");
                    return;
                }

                egui::ScrollArea::vertical()
                    .id_salt("thumbnail_strip")
                    .auto_shrink([false, false])
                    .show(ui, |ui| self.draw_thumbnail_strip(ui));
            });
    }

    fn draw_thumbnail_strip(&mut self, ui: &mut egui::Ui) {
        let strip = self.viewer.thumbnail_strip();
        let size = egui::vec2(strip.width(), strip.total_height());
        let (rect, response) = ui.allocate_exact_size(size, egui::Sense::click());
        let origin = rect.min;
        let current = self.viewer.state().current_page;

        let painter = ui.painter();
        for page in 0..self.viewer.page_count() {
            let Some((top, height)) = strip.slot(page) else {
                continue;
            };
            let thumb_rect =
                egui::Rect::from_min_size(origin + egui::vec2(0.0, top), egui::vec2(strip.width(), height));
            if !ui.is_rect_visible(thumb_rect) {
                continue;
            }

            match self.thumbnails.get(&page) {
                Some(texture) => {
                    painter.image(texture.id(), thumb_rect, FULL_UV, egui::Color32::WHITE);
                }
                None => {
                    painter.rect_filled(thumb_rect, 2.0, ui.visuals().widgets.inactive.bg_fill);
                }
            }

            let stroke = if page == current {
                egui::Stroke::new(2.0, ui.visuals().selection.bg_fill)
            } else {
                egui::Stroke::new(1.0, ui.visuals().widgets.inactive.bg_stroke.color)
            };
            painter.rect_stroke(thumb_rect, 2.0, stroke, egui::StrokeKind::Outside);
            painter.text(
                thumb_rect.right_bottom() - egui::vec2(4.0, 4.0),
                egui::Align2::RIGHT_BOTTOM,
                (page + 1).to_string(),
                egui::FontId::proportional(11.0),
                ui.visuals().weak_text_color(),
            );
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let point = pos - origin;
                if let Err(err) = self.viewer.thumbnail_clicked(point.x, point.y) {
                    tracing::warn!("thumbnail navigation failed: {err}");
                }
            }
        }
    }

    fn draw_pages(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.viewer.is_open() {
                ui.centered_and_justified(|ui| {
                    ui.heading("Open a PDF to get started");
                });
                return;
            }

            let available = ui.available_size();
            self.viewer.set_viewport(available.x, available.y);
            self.pages.sync_epoch(self.viewer.render_epoch());

            let mut area = egui::ScrollArea::both().id_salt("pages").auto_shrink([false, false]);
            if let Some(target) = self.viewer.take_scroll_request() {
                area = area.scroll_offset(egui::vec2(target.x, target.y));
            }

            let layout = self.viewer.layout();
            let content_size = egui::vec2(layout.content_width(), layout.total_height());

            let output = area.show_viewport(ui, |ui, viewport| {
                ui.set_min_size(content_size);
                let origin = ui.min_rect().min;
                self.draw_visible_pages(ui, origin, content_size, viewport);
            });

            self.viewer.on_scrolled(output.state.offset.x, output.state.offset.y);
        });
    }

    fn draw_visible_pages(
        &mut self,
        ui: &mut egui::Ui,
        origin: egui::Pos2,
        content_size: egui::Vec2,
        viewport: egui::Rect,
    ) {
        let surface = egui::Rect::from_min_size(origin, content_size);
        let response = ui.interact(surface, ui.id().with("page_surface"), egui::Sense::click());

        let visible = self.viewer.layout().visible_pages(viewport.min.y, viewport.height());
        for page in visible {
            let Some(slot) = self.viewer.layout().slot(page).copied() else {
                continue;
            };
            let rect = egui::Rect::from_min_size(
                origin + egui::vec2(slot.x_offset, slot.y_offset),
                egui::vec2(slot.width, slot.height),
            );

            self.ensure_page_texture(ui.ctx(), page);

            let painter = ui.painter();
            match self.pages.get(page) {
                CachedPage::Ready(texture) => {
                    painter.image(texture.id(), rect, FULL_UV, egui::Color32::WHITE);
                }
                CachedPage::Failed => {
                    painter.rect_filled(rect, 0.0, ui.visuals().extreme_bg_color);
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "Error displaying page.",
                        egui::FontId::proportional(14.0),
                        ui.visuals().error_fg_color,
                    );
                }
                CachedPage::Missing => {
                    painter.rect_filled(rect, 0.0, egui::Color32::WHITE);
                }
            }
        }

        if let Some(highlight) = self.viewer.highlight_rect() {
            let rect = egui::Rect::from_min_size(
                origin + egui::vec2(highlight.x, highlight.y),
                egui::vec2(highlight.width, highlight.height),
            );
            ui.painter().rect_filled(rect, 0.0, HIGHLIGHT);
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let point = pos - origin;
                self.viewer.toggle_zoom_at(point.x, point.y);
            }
        }
    }

    fn draw_error_dialog(&mut self, ctx: &egui::Context) {
        let Some(error) = &self.error_dialog else {
            return;
        };

        let title = format!("{} {}", error.severity.icon(), error.severity.title());
        let message = error.message.clone();

        let mut should_close = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(&message);
                ui.add_space(12.0);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("OK").clicked() {
                        should_close = true;
                    }
                });
            });

        if should_close {
            self.error_dialog = None;
        }
    }
}

fn color_image(image: &RgbaImage) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied(
        [image.width() as usize, image.height() as usize],
        image.as_raw(),
    )
}

/// Downscale `image` so neither side exceeds the GPU's texture limit. The
/// texture is painted into its layout slot, so the on-screen size is unchanged.
fn fit_texture_side(image: RgbaImage, max_side: usize) -> RgbaImage {
    let max_side = u32::try_from(max_side).unwrap_or(u32::MAX).max(1);
    let longest = image.width().max(image.height());
    if longest <= max_side {
        return image;
    }
    let width = (u64::from(image.width()) * u64::from(max_side) / u64::from(longest)) as u32;
    thumbnails::fit_to_width(&image, width)
}

/// Target of the first/last page shortcuts, or `None` with no pages to visit.
fn edge_page(shortcut: Shortcut, page_count: u32) -> Option<u32> {
    let last = page_count.checked_sub(1)?;
    match shortcut {
        Shortcut::LastPage => Some(last),
        _ => Some(0),
    }
}

fn page_label(state: ViewState, page_count: u32) -> String {
    if page_count == 0 {
        return "Page: 0/0".to_string();
    }
    format!("Page: {}/{}", state.current_page + 1, page_count)
}

fn zoom_label(zoom: f32) -> String {
    format!("{:.0}%", zoom * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_label_is_one_based() {
        assert_eq!(page_label(ViewState { current_page: 0, zoom: 1.0 }, 3), "Page: 1/3");
        assert_eq!(page_label(ViewState { current_page: 2, zoom: 1.0 }, 3), "Page: 3/3");
        assert_eq!(page_label(ViewState::default(), 0), "Page: 0/0");
    }

    #[test]
    fn zoom_label_rounds_to_percent() {
        assert_eq!(zoom_label(1.0), "100%");
        assert_eq!(zoom_label(1.25), "125%");
        assert_eq!(zoom_label(0.2), "20%");
    }

    #[test]
    fn color_image_keeps_dimensions() {
        let image = RgbaImage::new(7, 3);

        assert_eq!(color_image(&image).size, [7, 3]);
    }

    #[test]
    fn edge_shortcuts_need_an_open_document() {
        assert_eq!(edge_page(Shortcut::FirstPage, 0), None);
        assert_eq!(edge_page(Shortcut::LastPage, 0), None);
        assert_eq!(edge_page(Shortcut::FirstPage, 4), Some(0));
        assert_eq!(edge_page(Shortcut::LastPage, 4), Some(3));
    }

    #[test]
    fn textures_larger_than_the_gpu_limit_are_downscaled() {
        let image = RgbaImage::new(400, 1000);

        let fitted = fit_texture_side(image, 500);

        assert_eq!(fitted.dimensions(), (200, 500));
    }

    #[test]
    fn textures_within_the_gpu_limit_are_untouched() {
        let image = RgbaImage::new(400, 1000);

        assert_eq!(fit_texture_side(image, 2048).dimensions(), (400, 1000));
    }
}
