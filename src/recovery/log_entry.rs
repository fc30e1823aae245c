use crate::common::{DbError, DbResult, RowId};

#[derive(Debug, Clone, PartialEq)]
pub enum LogKind {
    Begin,
    Commit,
    Abort,
    Insert,
    Update,
    Delete,
    Checkpoint,
}

impl LogKind {
    fn tag(&self) -> &'static str {
        match self {
            LogKind::Begin => "BEGIN",
            LogKind::Commit => "COMMIT",
            LogKind::Abort => "ABORT",
            LogKind::Insert => "INSERT",
            LogKind::Update => "UPDATE",
            LogKind::Delete => "DELETE",
            LogKind::Checkpoint => "CHECKPOINT",
        }
    }

    fn from_tag(tag: &str) -> DbResult<Self> {
        Ok(match tag {
            "BEGIN" => LogKind::Begin,
            "COMMIT" => LogKind::Commit,
            "ABORT" => LogKind::Abort,
            "INSERT" => LogKind::Insert,
            "UPDATE" => LogKind::Update,
            "DELETE" => LogKind::Delete,
            "CHECKPOINT" => LogKind::Checkpoint,
            other => return Err(DbError::CorruptionError(format!("unknown log entry kind '{other}'"))),
        })
    }
}

/// One line of `logs/mDBMS.log`. Data-change entries carry a before-image
/// (for undo) and an after-image (for redo) as JSON object encodings of a
/// row's columns (`recovery::image`) — the Failure Recovery Manager applies
/// these directly through `StorageEngine`'s row-addressed writes rather than
/// replaying SQL text, so redo/undo never re-enter the planner.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub lsn: u64,
    pub kind: LogKind,
    pub timestamp_millis: u64,
    pub tx_id: u64,
    pub table: String,
    pub row_id: Option<RowId>,
    pub before_image: Option<String>,
    pub after_image: Option<String>,
}

fn escape(field: &str) -> String {
    field.replace('\\', "\\\\").replace('|', "\\|").replace('\n', "\\n")
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('|') => out.push('|'),
                Some('n') => out.push('\n'),
                Some(other) => { out.push('\\'); out.push(other); }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn opt_field(value: &Option<String>) -> String {
    match value {
        Some(s) => escape(s),
        None => "-".to_string(),
    }
}

fn parse_opt_field(field: &str) -> Option<String> {
    if field == "-" {
        None
    } else {
        Some(unescape(field))
    }
}

impl LogEntry {
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}|{}",
            self.lsn,
            self.kind.tag(),
            self.timestamp_millis,
            self.tx_id,
            escape(&self.table),
            self.row_id.as_ref().map(|r| escape(&r.0)).unwrap_or_else(|| "-".to_string()),
            opt_field(&self.before_image),
            opt_field(&self.after_image),
        )
    }

    pub fn from_line(line: &str) -> DbResult<Self> {
        let fields: Vec<&str> = split_unescaped(line);
        if fields.len() != 8 {
            return Err(DbError::CorruptionError(format!(
                "malformed WAL line (expected 8 fields, got {}): {line}", fields.len()
            )));
        }
        let lsn = fields[0].parse().map_err(|_| DbError::CorruptionError("bad LSN in WAL line".into()))?;
        let kind = LogKind::from_tag(fields[1])?;
        let timestamp_millis = fields[2].parse().map_err(|_| DbError::CorruptionError("bad timestamp in WAL line".into()))?;
        let tx_id = fields[3].parse().map_err(|_| DbError::CorruptionError("bad tx id in WAL line".into()))?;
        let table = unescape(fields[4]);
        let row_id = if fields[5] == "-" { None } else { Some(RowId(unescape(fields[5]))) };
        let before_image = parse_opt_field(fields[6]);
        let after_image = parse_opt_field(fields[7]);
        Ok(LogEntry { lsn, kind, timestamp_millis, tx_id, table, row_id, before_image, after_image })
    }
}

/// Splits on `|` while respecting `\`-escaped pipes, unlike a plain `split('|')`.
fn split_unescaped(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let bytes = line.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == b'|' {
            fields.push(&line[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    fields.push(&line[start..]);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_pipes_and_backslashes_in_payload() {
        let entry = LogEntry {
            lsn: 7,
            kind: LogKind::Update,
            timestamp_millis: 123456,
            tx_id: 42,
            table: "students".into(),
            row_id: Some(RowId::from_location(3, 1)),
            before_image: Some("name=a|b\\c".into()),
            after_image: Some("name=x".into()),
        };
        let line = entry.to_line();
        let parsed = LogEntry::from_line(&line).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn checkpoint_entries_have_no_row_or_images() {
        let entry = LogEntry {
            lsn: 1,
            kind: LogKind::Checkpoint,
            timestamp_millis: 1,
            tx_id: 0,
            table: String::new(),
            row_id: None,
            before_image: None,
            after_image: None,
        };
        let parsed = LogEntry::from_line(&entry.to_line()).unwrap();
        assert_eq!(parsed, entry);
    }
}
