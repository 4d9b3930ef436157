//! Zoom policy: step, bounds, fit modes and the double-click toggle.

use pdf_engine::PageSize;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomPolicy {
    pub min: f32,
    pub max: f32,
    /// Multiplier applied by one zoom-in step; zoom-out divides by it.
    pub step: f32,
    /// Display units per PDF point at zoom 1.0. Set to 2.0 to show pages at
    /// the size of a rasterizer that oversamples by two.
    pub base_scale: f32,
    /// Double-click zooms in below this factor and resets at or above it.
    pub toggle_threshold: f32,
    pub toggle_zoom: f32,
}

impl Default for ZoomPolicy {
    fn default() -> Self {
        Self {
            min: 0.2,
            max: 5.0,
            step: 1.25,
            base_scale: 1.0,
            toggle_threshold: 1.5,
            toggle_zoom: 2.0,
        }
    }
}

impl ZoomPolicy {
    pub fn clamp(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return 1.0_f32.clamp(self.min, self.max);
        }
        zoom.clamp(self.min, self.max)
    }

    pub fn zoom_in(&self, zoom: f32) -> f32 {
        self.clamp(zoom * self.step)
    }

    pub fn zoom_out(&self, zoom: f32) -> f32 {
        self.clamp(zoom / self.step)
    }

    /// Zoom at which `page` is exactly as wide as the viewport.
    pub fn fit_width(&self, viewport_width: f32, page: PageSize) -> Option<f32> {
        if viewport_width <= 0.0 || page.width_pt <= 0.0 || self.base_scale <= 0.0 {
            return None;
        }
        Some(self.clamp(viewport_width / (page.width_pt * self.base_scale)))
    }

    /// Zoom at which the whole of `page` fits inside the viewport.
    pub fn fit_page(&self, viewport_width: f32, viewport_height: f32, page: PageSize) -> Option<f32> {
        if viewport_width <= 0.0
            || viewport_height <= 0.0
            || page.width_pt <= 0.0
            || page.height_pt <= 0.0
            || self.base_scale <= 0.0
        {
            return None;
        }

        let width = viewport_width / (page.width_pt * self.base_scale);
        let height = viewport_height / (page.height_pt * self.base_scale);

        Some(self.clamp(width.min(height)))
    }

    pub fn toggle(&self, zoom: f32) -> f32 {
        if zoom < self.toggle_threshold {
            self.clamp(self.toggle_zoom)
        } else {
            self.clamp(1.0)
        }
    }

    /// Display units per point for a zoom factor.
    pub fn display_scale(&self, zoom: f32) -> f32 {
        zoom * self.base_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fit_width_respects_base_scale() {
        let policy = ZoomPolicy::default();
        assert_eq!(policy.fit_width(1000.0, PageSize::new(500.0, 800.0)), Some(2.0));

        let oversampled = ZoomPolicy { base_scale: 2.0, ..ZoomPolicy::default() };
        assert_eq!(oversampled.fit_width(1000.0, PageSize::new(500.0, 800.0)), Some(1.0));
    }

    #[test]
    fn fit_page_uses_smallest_dimension_ratio() {
        let policy = ZoomPolicy::default();
        assert_eq!(policy.fit_page(1000.0, 800.0, PageSize::new(500.0, 2000.0)), Some(0.4));
    }

    #[test]
    fn fits_are_clamped_and_reject_degenerate_input() {
        let policy = ZoomPolicy::default();

        assert_eq!(policy.fit_width(100_000.0, PageSize::new(100.0, 100.0)), Some(5.0));
        assert_eq!(policy.fit_width(0.0, PageSize::new(100.0, 100.0)), None);
        assert_eq!(policy.fit_page(100.0, 100.0, PageSize::new(0.0, 100.0)), None);
    }

    #[test]
    fn toggle_alternates_between_zoomed_and_base() {
        let policy = ZoomPolicy::default();

        assert_eq!(policy.toggle(1.0), 2.0);
        assert_eq!(policy.toggle(2.0), 1.0);
        assert_eq!(policy.toggle(0.5), 2.0);
    }

    #[test]
    fn non_finite_zoom_resets_to_actual_size() {
        assert_eq!(ZoomPolicy::default().clamp(f32::NAN), 1.0);
    }

    proptest! {
        #[test]
        fn repeated_zoom_out_settles_on_the_floor(start in 0.01f32..100.0) {
            let policy = ZoomPolicy::default();
            let mut zoom = start;
            for _ in 0..200 {
                zoom = policy.zoom_out(zoom);
            }
            prop_assert_eq!(zoom, policy.min);
            prop_assert_eq!(policy.zoom_out(zoom), policy.min);
        }

        #[test]
        fn repeated_zoom_in_settles_on_the_ceiling(start in 0.01f32..100.0) {
            let policy = ZoomPolicy::default();
            let mut zoom = start;
            for _ in 0..200 {
                zoom = policy.zoom_in(zoom);
            }
            prop_assert_eq!(zoom, policy.max);
            prop_assert_eq!(policy.zoom_in(zoom), policy.max);
        }
    }
}
