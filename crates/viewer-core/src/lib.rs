//! Page and scroll model of the viewer: continuous layout, navigation and
//! zoom, search, thumbnails. Nothing here depends on a UI toolkit.

mod cancel;
pub mod config;
pub mod error;
pub mod layout;
pub mod page_cache;
pub mod search;
pub mod thumbnails;
pub mod viewer;
pub mod zoom;

#[cfg(test)]
mod test_support;

pub use cancel::CancellationToken;
pub use config::{ConfigError, ViewerConfig};
pub use error::{OpenFailure, ViewerError};
pub use layout::{compute_layout, ContentRect, PageHit, PageLayout, PageSlot, DEFAULT_PAGE_GAP};
pub use page_cache::{CachedPage, PageCache};
pub use search::{SearchHit, SearchState};
pub use thumbnails::{ThumbnailCache, ThumbnailEvent, ThumbnailSpec, ThumbnailStrip};
pub use viewer::{NavigationOrigin, ScrollPosition, ViewState, Viewer, Viewport};
pub use zoom::ZoomPolicy;
