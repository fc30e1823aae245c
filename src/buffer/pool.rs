use super::page::Page;
use linked_hash_map::LinkedHashMap;
use std::sync::Mutex;

pub type FrameKey = (String, u64);

/// Process-wide, fixed-capacity buffer pool shared by every table's storage
/// engine. Frames are kept in LRU recency order via `linked_hash_map`, the
/// same primitive the Storage Engine's own page cache used before the
/// buffer pool was pulled out into its own component.
///
/// The pool never touches disk. `add_or_update_page` only ever *returns*
/// the evicted frame; flushing a dirty eviction to disk is the Failure
/// Recovery Manager's job (`FailureRecoveryManager::write_disk`).
pub struct BufferPool {
    inner: Mutex<LinkedHashMap<FrameKey, Page>>,
    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        BufferPool {
            inner: Mutex::new(LinkedHashMap::new()),
            capacity,
        }
    }

    /// Returns the cached page if present, refreshing its recency.
    pub fn get_page(&self, table: &str, block_id: u64) -> Option<Page> {
        let mut map = self.inner.lock().unwrap();
        map.get_refresh(&(table.to_string(), block_id)).cloned()
    }

    /// Inserts or replaces a page at MRU position. If the key already
    /// existed its contents are replaced; otherwise, if the pool is full,
    /// the LRU frame is evicted and returned to the caller.
    pub fn add_or_update_page(&self, table: &str, block_id: u64, page: Page) -> Option<(FrameKey, Page)> {
        let key = (table.to_string(), block_id);
        let mut map = self.inner.lock().unwrap();
        map.remove(&key);
        map.insert(key, page);
        if map.len() > self.capacity {
            map.pop_front()
        } else {
            None
        }
    }

    pub fn mark_clean(&self, table: &str, block_id: u64) {
        let mut map = self.inner.lock().unwrap();
        if let Some(page) = map.get_mut(&(table.to_string(), block_id)) {
            page.is_dirty = false;
        }
    }

    pub fn get_dirty_pages(&self) -> Vec<(FrameKey, Page)> {
        let map = self.inner.lock().unwrap();
        map.iter()
            .filter(|(_, p)| p.is_dirty)
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect()
    }

    /// Returns every dirty page and clears the dirty flag on all of them in
    /// the pool, without evicting anything.
    pub fn flush_dirties(&self) -> Vec<(FrameKey, Page)> {
        let mut map = self.inner.lock().unwrap();
        let mut flushed = Vec::new();
        for (k, p) in map.iter_mut() {
            if p.is_dirty {
                flushed.push((k.clone(), p.clone()));
                p.is_dirty = false;
            }
        }
        flushed
    }

    /// Returns every page currently resident, dirty or not, without
    /// clearing anything (used by a full shutdown flush).
    pub fn flush_all(&self) -> Vec<(FrameKey, Page)> {
        let map = self.inner.lock().unwrap();
        map.iter().map(|(k, p)| (k.clone(), p.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_lru_frame_when_over_capacity() {
        let pool = BufferPool::new(2);
        assert!(pool.add_or_update_page("t", 0, Page::new_empty()).is_none());
        assert!(pool.add_or_update_page("t", 1, Page::new_empty()).is_none());
        // touching block 0 makes it MRU, so block 1 should be evicted next
        pool.get_page("t", 0);
        let evicted = pool.add_or_update_page("t", 2, Page::new_empty());
        assert_eq!(evicted.unwrap().0, ("t".to_string(), 1));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn dirty_tracking_round_trip() {
        let pool = BufferPool::new(10);
        let mut page = Page::new_empty();
        page.is_dirty = true;
        pool.add_or_update_page("t", 0, page);
        assert_eq!(pool.get_dirty_pages().len(), 1);
        pool.mark_clean("t", 0);
        assert_eq!(pool.get_dirty_pages().len(), 0);
    }

    #[test]
    fn flush_dirties_clears_flag() {
        let pool = BufferPool::new(10);
        let mut page = Page::new_empty();
        page.is_dirty = true;
        pool.add_or_update_page("t", 5, page);
        let flushed = pool.flush_dirties();
        assert_eq!(flushed.len(), 1);
        assert_eq!(pool.get_dirty_pages().len(), 0);
    }
}
