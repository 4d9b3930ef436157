//! Bounded cache of rendered pages for the UI shell.

use std::collections::{HashMap, HashSet, VecDeque};

/// What the shell knows about one page at the current render epoch.
#[derive(Debug, PartialEq)]
pub enum CachedPage<'a, V> {
    Ready(&'a V),
    Failed,
    Missing,
}

/// Least-recently-used page bitmaps (or textures) for one render epoch.
///
/// Entries are only valid for the epoch they were rendered at; moving to a new
/// epoch drops everything. Failed pages are remembered so each failure is
/// reported once per epoch.
#[derive(Debug, Clone)]
pub struct PageCache<V> {
    capacity: usize,
    epoch: u64,
    map: HashMap<u32, V>,
    order: VecDeque<u32>,
    failed: HashSet<u32>,
}

impl<V> PageCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            epoch: 0,
            map: HashMap::new(),
            order: VecDeque::new(),
            failed: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Switch to `epoch`, discarding everything from an older one.
    /// Returns whether anything was discarded.
    pub fn sync_epoch(&mut self, epoch: u64) -> bool {
        if epoch == self.epoch {
            return false;
        }

        self.epoch = epoch;
        let had_entries = !self.map.is_empty() || !self.failed.is_empty();
        self.map.clear();
        self.order.clear();
        self.failed.clear();
        had_entries
    }

    pub fn get(&mut self, page_index: u32) -> CachedPage<'_, V> {
        if self.failed.contains(&page_index) {
            return CachedPage::Failed;
        }
        if self.map.contains_key(&page_index) {
            self.touch(page_index);
        }
        match self.map.get(&page_index) {
            Some(value) => CachedPage::Ready(value),
            None => CachedPage::Missing,
        }
    }

    pub fn insert(&mut self, page_index: u32, value: V) {
        self.failed.remove(&page_index);
        if self.map.insert(page_index, value).is_some() {
            self.touch(page_index);
            return;
        }

        self.order.push_back(page_index);
        while self.map.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
    }

    /// Remember a failure. Returns true the first time this epoch.
    pub fn mark_failed(&mut self, page_index: u32) -> bool {
        self.failed.insert(page_index)
    }

    fn touch(&mut self, page_index: u32) {
        if let Some(index) = self.order.iter().position(|&existing| existing == page_index) {
            let Some(found) = self.order.remove(index) else {
                return;
            };
            self.order.push_back(found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_page() {
        let mut cache = PageCache::new(2);
        cache.insert(0, "zero");
        cache.insert(1, "one");
        assert_eq!(cache.get(0), CachedPage::Ready(&"zero"));

        cache.insert(2, "two");

        assert_eq!(cache.get(1), CachedPage::Missing);
        assert_eq!(cache.get(0), CachedPage::Ready(&"zero"));
        assert_eq!(cache.get(2), CachedPage::Ready(&"two"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn new_epoch_drops_pages_and_failures() {
        let mut cache = PageCache::new(4);
        cache.insert(0, 10);
        assert!(cache.mark_failed(1));
        assert!(!cache.mark_failed(1), "second report is suppressed");
        assert_eq!(cache.get(1), CachedPage::Failed);

        assert!(!cache.sync_epoch(0));
        assert!(cache.sync_epoch(1));

        assert!(cache.is_empty());
        assert_eq!(cache.get(1), CachedPage::Missing);
        assert!(cache.mark_failed(1));
    }

    #[test]
    fn successful_render_clears_failure() {
        let mut cache = PageCache::new(4);
        cache.mark_failed(3);

        cache.insert(3, 'x');

        assert_eq!(cache.get(3), CachedPage::Ready(&'x'));
    }
}
