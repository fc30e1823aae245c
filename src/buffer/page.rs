use crate::config::PAGE_SIZE_BYTES;

/// A fixed 4096-byte block of table storage. A page belongs to exactly one
/// table and one `block_id`; `is_dirty` is a transient, in-memory flag only
/// — it is never persisted.
#[derive(Clone)]
pub struct Page {
    pub data: Vec<u8>,
    pub is_dirty: bool,
}

impl Page {
    pub fn new_empty() -> Self {
        Page {
            data: vec![0u8; PAGE_SIZE_BYTES],
            is_dirty: true,
        }
    }

    pub fn from_disk_bytes(data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), PAGE_SIZE_BYTES);
        Page { data, is_dirty: false }
    }

    pub fn size() -> usize {
        PAGE_SIZE_BYTES
    }
}
