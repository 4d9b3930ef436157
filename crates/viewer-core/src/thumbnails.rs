//! Background thumbnail generation.
//!
//! One worker thread per document rasterizes every page at a small scale and
//! posts the results over a channel. The UI thread drains the channel with
//! [`ThumbnailCache::poll`]; every event carries the generation it was
//! produced for, and anything from an older generation is dropped, so a
//! worker still finishing the previous document can never write into the
//! cache of the current one.

use crate::cancel::CancellationToken;
use image::imageops::{self, FilterType};
use pdf_engine::{DocumentHandle, PageSize, PdfEngine, RenderRequest, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailSpec {
    /// Rasterization scale before resizing.
    pub scale: f32,
    /// Final thumbnail width in pixels; height follows the page aspect ratio.
    pub width: u32,
    /// Vertical space between thumbnails in the strip.
    pub spacing: f32,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self { scale: 0.2, width: 120, spacing: 8.0 }
    }
}

#[derive(Debug)]
pub enum ThumbnailEvent {
    Rendered { generation: u64, page_index: u32, image: RgbaImage },
    Failed { generation: u64, page_index: u32, error: String },
    Finished { generation: u64 },
}

impl ThumbnailEvent {
    pub fn generation(&self) -> u64 {
        match self {
            Self::Rendered { generation, .. }
            | Self::Failed { generation, .. }
            | Self::Finished { generation } => *generation,
        }
    }
}

pub struct ThumbnailCache {
    spec: ThumbnailSpec,
    generation: u64,
    images: HashMap<u32, RgbaImage>,
    complete: bool,
    cancel: CancellationToken,
    tx: Sender<ThumbnailEvent>,
    rx: Receiver<ThumbnailEvent>,
}

impl ThumbnailCache {
    pub fn new(spec: ThumbnailSpec) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            spec,
            generation: 0,
            images: HashMap::new(),
            complete: false,
            cancel: CancellationToken::new(),
            tx,
            rx,
        }
    }

    pub fn spec(&self) -> ThumbnailSpec {
        self.spec
    }

    /// Bumped on every [`generate`](Self::generate) and [`invalidate`](Self::invalidate).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Drop everything and stop any running worker.
    pub fn invalidate(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation += 1;
        self.images.clear();
        self.complete = false;
    }

    /// Start rendering thumbnails for `handle` on a background thread.
    pub fn generate<E>(&mut self, engine: Arc<Mutex<E>>, handle: DocumentHandle, page_count: u32)
    where
        E: PdfEngine + Send + 'static,
    {
        self.invalidate();

        let generation = self.generation;
        let spec = self.spec;
        let cancel = self.cancel.clone();
        let tx = self.tx.clone();

        let spawned = thread::Builder::new()
            .name("thumbnails".into())
            .spawn(move || run_worker(engine, handle, page_count, spec, generation, cancel, tx));

        match spawned {
            Ok(_) => tracing::debug!(generation, page_count, "thumbnail worker started"),
            Err(err) => {
                tracing::error!("failed to spawn thumbnail worker: {err}");
                self.complete = true;
            }
        }
    }

    /// Apply every pending event. Returns how many were applied.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.rx.try_recv() {
            if event.generation() != self.generation {
                continue;
            }

            match event {
                ThumbnailEvent::Rendered { page_index, image, .. } => {
                    self.images.insert(page_index, image);
                }
                ThumbnailEvent::Failed { page_index, error, .. } => {
                    tracing::warn!(page = page_index + 1, "thumbnail failed: {error}");
                }
                ThumbnailEvent::Finished { .. } => self.complete = true,
            }
            applied += 1;
        }
        applied
    }

    pub fn get(&self, page_index: u32) -> Option<&RgbaImage> {
        self.images.get(&page_index)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// True once the current generation's worker has finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

impl Drop for ThumbnailCache {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn run_worker<E>(
    engine: Arc<Mutex<E>>,
    handle: DocumentHandle,
    page_count: u32,
    spec: ThumbnailSpec,
    generation: u64,
    cancel: CancellationToken,
    tx: Sender<ThumbnailEvent>,
) where
    E: PdfEngine,
{
    for page_index in 0..page_count {
        if cancel.is_cancelled() {
            tracing::debug!(generation, page_index, "thumbnail worker cancelled");
            return;
        }

        let rendered = {
            let engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            engine.render_page(handle, RenderRequest { page_index, scale: spec.scale })
        };

        let event = match rendered {
            Ok(image) => ThumbnailEvent::Rendered {
                generation,
                page_index,
                image: fit_to_width(&image, spec.width),
            },
            Err(err) => ThumbnailEvent::Failed { generation, page_index, error: err.to_string() },
        };

        if tx.send(event).is_err() {
            return;
        }
    }

    let _ = tx.send(ThumbnailEvent::Finished { generation });
}

/// Resize to exactly `width` pixels wide, keeping the aspect ratio.
pub fn fit_to_width(image: &RgbaImage, width: u32) -> RgbaImage {
    let width = width.max(1);
    let height = thumbnail_height(image.width(), image.height(), width);
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

fn thumbnail_height(source_width: u32, source_height: u32, width: u32) -> u32 {
    if source_width == 0 {
        return width;
    }
    let height = (u64::from(source_height) * u64::from(width) + u64::from(source_width) / 2)
        / u64::from(source_width);
    height.max(1) as u32
}

/// Vertical strip geometry used to place thumbnails and map clicks back to pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThumbnailStrip {
    /// `(top, height)` of each page's thumbnail.
    slots: Vec<(f32, f32)>,
    width: f32,
}

impl ThumbnailStrip {
    /// Lay out one thumbnail per page from the pages' aspect ratios.
    pub fn new(page_sizes: &[PageSize], spec: ThumbnailSpec) -> Self {
        let width = spec.width as f32;
        let mut top = 0.0;
        let slots = page_sizes
            .iter()
            .map(|size| {
                let height = if size.width_pt > 0.0 {
                    width * size.height_pt / size.width_pt
                } else {
                    width
                };
                let slot = (top, height);
                top += height + spec.spacing;
                slot
            })
            .collect();

        Self { slots, width }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn total_height(&self) -> f32 {
        self.slots.last().map(|(top, height)| top + height).unwrap_or(0.0)
    }

    /// `(top, height)` of one page's thumbnail.
    pub fn slot(&self, page_index: u32) -> Option<(f32, f32)> {
        self.slots.get(page_index as usize).copied()
    }

    /// Page under a point relative to the strip's top-left, if any.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<u32> {
        if x < 0.0 || x > self.width || y < 0.0 {
            return None;
        }

        let index = self.slots.partition_point(|(top, _)| *top <= y).checked_sub(1)?;
        let (top, height) = self.slots[index];
        (y <= top + height).then_some(index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeDocument, FakeEngine};
    use pdf_engine::OpenSource;
    use std::time::{Duration, Instant};

    fn open_shared(
        engine: FakeEngine,
        name: &str,
    ) -> (Arc<Mutex<FakeEngine>>, DocumentHandle) {
        let engine = Arc::new(Mutex::new(engine));
        let handle = engine
            .lock()
            .expect("lock")
            .open(OpenSource::Bytes(name.as_bytes().to_vec()))
            .expect("open fake");
        (engine, handle)
    }

    fn wait_until_complete(cache: &mut ThumbnailCache) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cache.is_complete() {
            assert!(Instant::now() < deadline, "thumbnail worker did not finish");
            cache.poll();
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn renders_every_page_at_fixed_width() {
        let mut engine = FakeEngine::new();
        engine.insert("doc", FakeDocument::uniform(3, 600.0, 800.0));
        let (engine, handle) = open_shared(engine, "doc");
        let mut cache = ThumbnailCache::new(ThumbnailSpec::default());

        assert!(cache.get(0).is_none());
        cache.generate(engine, handle, 3);
        wait_until_complete(&mut cache);

        assert_eq!(cache.len(), 3);
        for page in 0..3 {
            let thumb = cache.get(page).expect("thumbnail");
            assert_eq!((thumb.width(), thumb.height()), (120, 160));
        }
    }

    #[test]
    fn failed_pages_are_skipped() {
        let mut engine = FakeEngine::new();
        engine.insert("doc", FakeDocument::uniform(3, 600.0, 800.0));
        engine.fail_render_on(1);
        let (engine, handle) = open_shared(engine, "doc");
        let mut cache = ThumbnailCache::new(ThumbnailSpec::default());

        cache.generate(engine, handle, 3);
        wait_until_complete(&mut cache);

        assert!(cache.get(0).is_some());
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn previous_document_results_never_land_in_the_cache() {
        let mut engine = FakeEngine::new();
        engine.insert("old", FakeDocument::uniform(4, 600.0, 800.0));
        let entered = engine.install_gate();
        let (engine, old) = open_shared(engine, "old");
        let mut cache = ThumbnailCache::new(ThumbnailSpec::default());

        cache.generate(Arc::clone(&engine), old, 4);
        let release = entered.recv_timeout(Duration::from_secs(10)).expect("worker entered render");

        // The gated worker holds the first engine's lock, so the new document
        // lives in a second engine.
        let mut second = FakeEngine::new();
        second.insert("new", FakeDocument::uniform(2, 300.0, 600.0));
        let (second, new) = open_shared(second, "new");
        cache.generate(second, new, 2);

        release.send(()).expect("release gate");
        wait_until_complete(&mut cache);
        thread::sleep(Duration::from_millis(50));
        cache.poll();

        assert_eq!(cache.len(), 2);
        for page in 0..2 {
            let thumb = cache.get(page).expect("thumbnail");
            assert_eq!((thumb.width(), thumb.height()), (120, 240));
        }
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn invalidate_clears_and_bumps_generation() {
        let mut engine = FakeEngine::new();
        engine.insert("doc", FakeDocument::uniform(1, 600.0, 800.0));
        let (engine, handle) = open_shared(engine, "doc");
        let mut cache = ThumbnailCache::new(ThumbnailSpec::default());
        cache.generate(engine, handle, 1);
        wait_until_complete(&mut cache);
        let generation = cache.generation();

        cache.invalidate();

        assert!(cache.is_empty());
        assert!(!cache.is_complete());
        assert_eq!(cache.generation(), generation + 1);
    }

    #[test]
    fn strip_hit_test_maps_clicks_to_pages() {
        let sizes = [PageSize::new(600.0, 800.0), PageSize::new(300.0, 600.0)];
        let strip = ThumbnailStrip::new(&sizes, ThumbnailSpec::default());

        assert_eq!(strip.slot(0), Some((0.0, 160.0)));
        assert_eq!(strip.slot(1), Some((168.0, 240.0)));
        assert_eq!(strip.total_height(), 408.0);

        assert_eq!(strip.hit_test(60.0, 10.0), Some(0));
        assert_eq!(strip.hit_test(60.0, 164.0), None);
        assert_eq!(strip.hit_test(60.0, 300.0), Some(1));
        assert_eq!(strip.hit_test(500.0, 10.0), None);
        assert_eq!(strip.hit_test(60.0, 1000.0), None);
    }

    #[test]
    fn aspect_ratio_is_preserved_when_resizing() {
        let image = RgbaImage::new(120, 160);
        assert_eq!(fit_to_width(&image, 60).dimensions(), (60, 80));
        assert_eq!(thumbnail_height(0, 10, 50), 50);
    }
}
