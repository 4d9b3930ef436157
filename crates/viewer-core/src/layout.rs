//! Continuous-document layout: every page stacked vertically in one
//! scrollable surface, narrower pages centered horizontally.

use pdf_engine::{PageRect, PageSize};
use std::ops::RangeInclusive;

/// Vertical space between consecutive pages, in display units.
pub const DEFAULT_PAGE_GAP: f32 = 20.0;

/// Where one page sits in content space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSlot {
    pub page_index: u32,
    pub width: f32,
    pub height: f32,
    pub x_offset: f32,
    pub y_offset: f32,
}

impl PageSlot {
    pub fn bottom(&self) -> f32 {
        self.y_offset + self.height
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x_offset
            && x <= self.x_offset + self.width
            && y >= self.y_offset
            && y <= self.bottom()
    }
}

/// Rectangle in content space (display units, origin at the top-left of the
/// first page's row).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A content-space point resolved to a page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHit {
    pub page_index: u32,
    /// Position inside the page, in PDF points from the page's top-left.
    pub page_x: f32,
    pub page_y: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    slots: Vec<PageSlot>,
    total_height: f32,
    content_width: f32,
    scale: f32,
}

/// Stack `page_sizes` top to bottom at a uniform `scale`.
pub fn compute_layout(
    page_sizes: &[PageSize],
    scale: f32,
    viewport_width: f32,
    gap: f32,
) -> PageLayout {
    let mut slots = Vec::with_capacity(page_sizes.len());
    let mut cursor = 0.0;
    let mut widest: f32 = 0.0;

    for (index, size) in page_sizes.iter().enumerate() {
        let width = size.width_pt * scale;
        let height = size.height_pt * scale;

        slots.push(PageSlot {
            page_index: index as u32,
            width,
            height,
            x_offset: ((viewport_width - width) / 2.0).max(0.0),
            y_offset: cursor,
        });

        widest = widest.max(width);
        cursor += height + gap;
    }

    let total_height = slots.last().map(PageSlot::bottom).unwrap_or(0.0);

    PageLayout { slots, total_height, content_width: widest.max(viewport_width), scale }
}

impl PageLayout {
    pub fn slots(&self) -> &[PageSlot] {
        &self.slots
    }

    pub fn slot(&self, page_index: u32) -> Option<&PageSlot> {
        self.slots.get(page_index as usize)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn total_height(&self) -> f32 {
        self.total_height
    }

    /// Width of the scrollable surface: the widest page or the viewport.
    pub fn content_width(&self) -> f32 {
        self.content_width
    }

    /// Display units per PDF point.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// The page whose top is the last one at or above `scroll_y`.
    pub fn page_at_scroll_offset(&self, scroll_y: f32) -> u32 {
        let at_or_above = self.slots.partition_point(|slot| slot.y_offset <= scroll_y);
        at_or_above.saturating_sub(1) as u32
    }

    /// Scroll position that puts the top of `page_index` at the top of the
    /// viewport. Indices past the end map to the last page.
    pub fn scroll_offset_for_page(&self, page_index: u32) -> f32 {
        let index = (page_index as usize).min(self.slots.len().saturating_sub(1));
        self.slots.get(index).map(|slot| slot.y_offset).unwrap_or(0.0)
    }

    pub fn max_scroll_y(&self, viewport_height: f32) -> f32 {
        (self.total_height - viewport_height).max(0.0)
    }

    pub fn max_scroll_x(&self, viewport_width: f32) -> f32 {
        (self.content_width - viewport_width).max(0.0)
    }

    /// Pages intersecting the vertical window `[scroll_y, scroll_y + viewport_height]`.
    pub fn visible_pages(&self, scroll_y: f32, viewport_height: f32) -> RangeInclusive<u32> {
        if self.slots.is_empty() {
            return 0..=0;
        }

        let start = self.page_at_scroll_offset(scroll_y.max(0.0));
        let end = self.page_at_scroll_offset((scroll_y + viewport_height).max(0.0));

        start..=end
    }

    pub fn hit_test(&self, x: f32, y: f32) -> Option<PageHit> {
        let slot = self.slot(self.page_at_scroll_offset(y))?;
        if !slot.contains(x, y) || self.scale <= 0.0 {
            return None;
        }

        Some(PageHit {
            page_index: slot.page_index,
            page_x: (x - slot.x_offset) / self.scale,
            page_y: (y - slot.y_offset) / self.scale,
        })
    }

    /// Map a page-space rectangle (points) into content space.
    pub fn to_content_rect(&self, page_index: u32, rect: PageRect) -> Option<ContentRect> {
        let slot = self.slot(page_index)?;
        let scaled = rect.scaled(self.scale);

        Some(ContentRect {
            x: slot.x_offset + scaled.x,
            y: slot.y_offset + scaled.y,
            width: scaled.width,
            height: scaled.height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pages(count: usize, width: f32, height: f32) -> Vec<PageSize> {
        vec![PageSize::new(width, height); count]
    }

    #[test]
    fn three_letter_pages_stack_with_gap() {
        let layout = compute_layout(&pages(3, 600.0, 800.0), 1.0, 600.0, DEFAULT_PAGE_GAP);

        let offsets: Vec<f32> = layout.slots().iter().map(|slot| slot.y_offset).collect();
        assert_eq!(offsets, vec![0.0, 820.0, 1640.0]);
        assert_eq!(layout.total_height(), 2440.0);
    }

    #[test]
    fn narrow_pages_are_centered_and_wide_pages_overflow() {
        let sizes = vec![PageSize::new(400.0, 500.0), PageSize::new(1200.0, 500.0)];
        let layout = compute_layout(&sizes, 1.0, 1000.0, 10.0);

        assert_eq!(layout.slots()[0].x_offset, 300.0);
        assert_eq!(layout.slots()[1].x_offset, 0.0);
        assert_eq!(layout.content_width(), 1200.0);
        assert_eq!(layout.max_scroll_x(1000.0), 200.0);
    }

    #[test]
    fn zoom_scales_both_axes_uniformly() {
        let layout = compute_layout(&pages(1, 600.0, 800.0), 1.5, 0.0, 20.0);

        let slot = layout.slots()[0];
        assert_eq!((slot.width, slot.height), (900.0, 1200.0));
    }

    #[test]
    fn scroll_offsets_clamp_to_document_bounds() {
        let layout = compute_layout(&pages(3, 600.0, 800.0), 1.0, 600.0, 20.0);

        assert_eq!(layout.page_at_scroll_offset(-50.0), 0);
        assert_eq!(layout.page_at_scroll_offset(819.0), 0);
        assert_eq!(layout.page_at_scroll_offset(820.0), 1);
        assert_eq!(layout.page_at_scroll_offset(10_000.0), 2);
        assert_eq!(layout.scroll_offset_for_page(99), 1640.0);
    }

    #[test]
    fn empty_layout_is_inert() {
        let layout = compute_layout(&[], 1.0, 800.0, 20.0);

        assert_eq!(layout.total_height(), 0.0);
        assert_eq!(layout.page_at_scroll_offset(100.0), 0);
        assert_eq!(layout.scroll_offset_for_page(3), 0.0);
        assert_eq!(layout.visible_pages(0.0, 500.0), 0..=0);
        assert!(layout.hit_test(10.0, 10.0).is_none());
    }

    #[test]
    fn visible_range_tracks_scroll_window() {
        let layout = compute_layout(&pages(3, 600.0, 1000.0), 1.0, 600.0, 100.0);

        assert_eq!(layout.visible_pages(1100.0, 900.0), 1..=1);
        assert_eq!(layout.visible_pages(1500.0, 900.0), 1..=2);
    }

    #[test]
    fn hit_test_maps_back_to_page_points() {
        let layout = compute_layout(&pages(2, 100.0, 200.0), 2.0, 400.0, 20.0);

        let hit = layout.hit_test(150.0, 420.0 + 100.0).expect("inside page 1");
        assert_eq!(hit.page_index, 1);
        assert_eq!((hit.page_x, hit.page_y), (25.0, 50.0));

        assert!(layout.hit_test(10.0, 10.0).is_none(), "left margin is not a page");
        assert!(layout.hit_test(150.0, 410.0).is_none(), "gap is not a page");
    }

    #[test]
    fn page_rects_map_into_content_space() {
        let layout = compute_layout(&pages(2, 100.0, 200.0), 2.0, 400.0, 20.0);

        let rect = layout
            .to_content_rect(1, PageRect::new(10.0, 20.0, 30.0, 5.0))
            .expect("page exists");

        assert_eq!(rect, ContentRect { x: 120.0, y: 460.0, width: 60.0, height: 10.0 });
        assert!(layout.to_content_rect(2, PageRect::new(0.0, 0.0, 1.0, 1.0)).is_none());
    }

    fn page_sizes() -> impl Strategy<Value = Vec<PageSize>> {
        prop::collection::vec((10.0f32..1000.0, 10.0f32..1000.0), 1..40)
            .prop_map(|sizes| sizes.into_iter().map(|(w, h)| PageSize::new(w, h)).collect())
    }

    proptest! {
        #[test]
        fn scroll_offset_round_trips_to_page(
            sizes in page_sizes(),
            scale in 0.1f32..4.0,
            gap in 0.0f32..50.0,
        ) {
            let layout = compute_layout(&sizes, scale, 800.0, gap);
            for index in 0..sizes.len() as u32 {
                prop_assert_eq!(layout.page_at_scroll_offset(layout.scroll_offset_for_page(index)), index);
            }
        }

        #[test]
        fn offsets_strictly_increase_by_at_least_gap(
            sizes in page_sizes(),
            scale in 0.1f32..4.0,
            gap in 1.0f32..50.0,
        ) {
            let layout = compute_layout(&sizes, scale, 800.0, gap);
            for pair in layout.slots().windows(2) {
                prop_assert!(pair[1].y_offset > pair[0].y_offset);
                prop_assert!(pair[1].y_offset - pair[0].bottom() >= gap - 0.05);
            }
        }
    }
}
