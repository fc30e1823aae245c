use crate::buffer::Page;
use crate::catalog::schema::TableSchema;
use crate::common::{DbError, DbResult};
use crate::config::{DB_DIR, PAGE_SIZE_BYTES};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Bytes reserved ahead of each on-disk page for its CRC32 checksum.
const CHECKSUM_LEN: usize = 4;
/// Total disk footprint of one block, header or data: checksum plus page body.
const DISK_BLOCK_LEN: u64 = (PAGE_SIZE_BYTES + CHECKSUM_LEN) as u64;

/// Low-level per-table disk handle: block 0 is always the schema header,
/// blocks 1.. are data blocks. Deliberately holds no page cache of its own
/// — the process-wide `BufferPool` is the only cache, so every method here
/// touches the filesystem. Every block is written with a leading CRC32 of
/// its body and checked on read, so a torn or bit-rotted write surfaces as
/// a `CorruptionError` instead of silently handing back garbage rows.
pub struct TableFile {
    file: File,
}

fn table_path(table: &str) -> PathBuf {
    PathBuf::from(DB_DIR).join(format!("{table}.dat"))
}

impl TableFile {
    pub fn create(table: &str, schema: &TableSchema) -> DbResult<Self> {
        std::fs::create_dir_all(DB_DIR)?;
        let path = table_path(table);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    DbError::SchemaError(format!("table '{table}' already exists"))
                } else {
                    DbError::IoError(e)
                }
            })?;
        let mut table_file = TableFile { file };
        table_file.write_raw_block(0, &Page::from_disk_bytes(schema.to_header_bytes()?))?;
        Ok(table_file)
    }

    pub fn open(table: &str) -> DbResult<Self> {
        let path = table_path(table);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DbError::SchemaError(format!("unknown table '{table}'"))
                } else {
                    DbError::IoError(e)
                }
            })?;
        Ok(TableFile { file })
    }

    pub fn read_header(&mut self) -> DbResult<TableSchema> {
        let page = self.read_raw_block(0)?;
        TableSchema::from_header_bytes(&page.data)
    }

    /// `block_id` is 0-based for the header, 1-based for data; block N lives
    /// at file offset `N * DISK_BLOCK_LEN`, checksum first, page body after.
    pub fn read_raw_block(&mut self, block_id: u64) -> DbResult<Page> {
        self.file.seek(SeekFrom::Start(block_id * DISK_BLOCK_LEN))?;
        let mut checksum_buf = [0u8; CHECKSUM_LEN];
        self.file.read_exact(&mut checksum_buf)?;
        let mut buf = vec![0u8; PAGE_SIZE_BYTES];
        self.file.read_exact(&mut buf)?;
        let expected = u32::from_le_bytes(checksum_buf);
        let actual = crc32fast::hash(&buf);
        if actual != expected {
            return Err(DbError::CorruptionError(format!(
                "checksum mismatch on block {block_id}: expected {expected:08x}, got {actual:08x}"
            )));
        }
        Ok(Page::from_disk_bytes(buf))
    }

    pub fn write_raw_block(&mut self, block_id: u64, page: &Page) -> DbResult<()> {
        if page.data.len() != PAGE_SIZE_BYTES {
            return Err(DbError::CorruptionError("page has wrong size".to_string()));
        }
        let checksum = crc32fast::hash(&page.data);
        self.file.seek(SeekFrom::Start(block_id * DISK_BLOCK_LEN))?;
        self.file.write_all(&checksum.to_le_bytes())?;
        self.file.write_all(&page.data)?;
        self.file.flush()?;
        Ok(())
    }

    /// Appends a new data block and returns its (1-based) block id.
    pub fn append_raw_block(&mut self, page: &Page) -> DbResult<u64> {
        let next_block = self.block_count() + 1;
        self.write_raw_block(next_block, page)?;
        Ok(next_block)
    }

    pub fn truncate_last_block(&mut self) -> DbResult<()> {
        let count = self.block_count();
        if count == 0 {
            return Ok(());
        }
        let len = count * DISK_BLOCK_LEN;
        self.file.set_len(len)?;
        Ok(())
    }

    /// Number of data blocks (excluding the header block).
    pub fn block_count(&self) -> u64 {
        let len = self.file.metadata().map(|m| m.len()).unwrap_or(0);
        len.saturating_sub(DISK_BLOCK_LEN) / DISK_BLOCK_LEN
    }
}
