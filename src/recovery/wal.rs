use super::log_entry::{LogEntry, LogKind};
use crate::common::{DbResult, RowId};
use crate::config::{LOG_DIR, WAL_FILE_NAME, WAL_FLUSH_THRESHOLD};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Append-only write-ahead log. Entries accumulate in an in-memory buffer
/// and are flushed to `logs/mDBMS.log` either when the buffer reaches
/// `WAL_FLUSH_THRESHOLD` entries or immediately on `Commit`/`Abort`/
/// `Checkpoint`, so a crash never loses the record of a transaction's
/// outcome even if its earlier data-change entries are still buffered.
pub struct Wal {
    buffer: Mutex<Vec<LogEntry>>,
    next_lsn: AtomicU64,
    path: PathBuf,
}

static WAL: OnceLock<Wal> = OnceLock::new();

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
}

impl Wal {
    fn new(path: PathBuf, starting_lsn: u64) -> Self {
        Wal {
            buffer: Mutex::new(Vec::new()),
            next_lsn: AtomicU64::new(starting_lsn),
            path,
        }
    }

    pub fn global() -> &'static Wal {
        WAL.get_or_init(|| {
            let path = PathBuf::from(LOG_DIR).join(WAL_FILE_NAME);
            let starting_lsn = read_max_lsn(&path).map(|l| l + 1).unwrap_or(1);
            Wal::new(path, starting_lsn)
        })
    }

    fn allocate_lsn(&self) -> u64 {
        self.next_lsn.fetch_add(1, Ordering::SeqCst)
    }

    fn push(&self, kind: LogKind, tx_id: u64, table: &str, row_id: Option<RowId>, before: Option<String>, after: Option<String>) -> DbResult<LogEntry> {
        let entry = LogEntry {
            lsn: self.allocate_lsn(),
            kind: kind.clone(),
            timestamp_millis: now_millis(),
            tx_id,
            table: table.to_string(),
            row_id,
            before_image: before,
            after_image: after,
        };
        let force_flush = matches!(kind, LogKind::Commit | LogKind::Abort | LogKind::Checkpoint);
        let mut buffer = self.buffer.lock().unwrap();
        buffer.push(entry.clone());
        let over_threshold = buffer.len() >= WAL_FLUSH_THRESHOLD;
        if force_flush || over_threshold {
            self.flush_locked(&mut buffer)?;
        }
        Ok(entry)
    }

    pub fn log_begin(&self, tx_id: u64) -> DbResult<LogEntry> {
        self.push(LogKind::Begin, tx_id, "", None, None, None)
    }

    pub fn log_commit(&self, tx_id: u64) -> DbResult<LogEntry> {
        self.push(LogKind::Commit, tx_id, "", None, None, None)
    }

    pub fn log_abort(&self, tx_id: u64) -> DbResult<LogEntry> {
        self.push(LogKind::Abort, tx_id, "", None, None, None)
    }

    pub fn log_checkpoint(&self) -> DbResult<LogEntry> {
        self.push(LogKind::Checkpoint, 0, "", None, None, None)
    }

    pub fn log_insert(&self, tx_id: u64, table: &str, row_id: RowId, after: String) -> DbResult<LogEntry> {
        self.push(LogKind::Insert, tx_id, table, Some(row_id), None, Some(after))
    }

    pub fn log_update(&self, tx_id: u64, table: &str, row_id: RowId, before: String, after: String) -> DbResult<LogEntry> {
        self.push(LogKind::Update, tx_id, table, Some(row_id), Some(before), Some(after))
    }

    pub fn log_delete(&self, tx_id: u64, table: &str, row_id: RowId, before: String) -> DbResult<LogEntry> {
        self.push(LogKind::Delete, tx_id, table, Some(row_id), Some(before), None)
    }

    fn flush_locked(&self, buffer: &mut Vec<LogEntry>) -> DbResult<()> {
        if buffer.is_empty() {
            return Ok(());
        }
        std::fs::create_dir_all(LOG_DIR)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        for entry in buffer.iter() {
            writeln!(file, "{}", entry.to_line())?;
        }
        file.flush()?;
        buffer.clear();
        Ok(())
    }

    pub fn flush(&self) -> DbResult<()> {
        let mut buffer = self.buffer.lock().unwrap();
        self.flush_locked(&mut buffer)
    }

    /// Reads every durable entry from disk, in LSN order.
    pub fn read_all(&self) -> DbResult<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(LogEntry::from_line(&line)?);
        }
        Ok(entries)
    }

    /// Like `read_all`, but also appends whatever hasn't reached the
    /// threshold-or-Commit/Abort flush yet. LSNs are allocated before an
    /// entry is pushed into the buffer, so on-disk entries always sort
    /// before buffered ones; no merge-sort is needed, just concatenation.
    /// Undo must see these: a `BEGIN; UPDATE; ROLLBACK` that never crosses
    /// `WAL_FLUSH_THRESHOLD` entries would otherwise leave its own update
    /// invisible to its own rollback.
    pub fn read_all_including_buffered(&self) -> DbResult<Vec<LogEntry>> {
        let mut entries = self.read_all()?;
        entries.extend(self.buffer.lock().unwrap().iter().cloned());
        Ok(entries)
    }
}

fn read_max_lsn(path: &PathBuf) -> Option<u64> {
    let file = std::fs::File::open(path).ok()?;
    let reader = BufReader::new(file);
    let mut max_lsn = None;
    for line in reader.lines().flatten() {
        if let Ok(entry) = LogEntry::from_line(&line) {
            max_lsn = Some(max_lsn.map_or(entry.lsn, |m: u64| m.max(entry.lsn)));
        }
    }
    max_lsn
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn commit_forces_immediate_flush() {
        let dir = TempDir::new().unwrap();
        let wal = Wal::new(dir.path().join("mDBMS.log"), 1);
        wal.log_begin(1).unwrap();
        assert_eq!(wal.buffer.lock().unwrap().len(), 1);
        wal.log_commit(1).unwrap();
        assert_eq!(wal.buffer.lock().unwrap().len(), 0);
        let entries = wal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn log_lines_round_trip_through_read_all() {
        let dir = TempDir::new().unwrap();
        let wal = Wal::new(dir.path().join("mDBMS.log"), 1);
        wal.log_insert(5, "students", RowId::from_location(1, 0), "id=1,name=ann".into()).unwrap();
        wal.log_commit(5).unwrap();
        let entries = wal.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].table, "students");
    }
}
