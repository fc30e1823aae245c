use crate::common::{DbError, DbResult};
use crate::config::{MAX_COL_NAME_SIZE, MAX_TABLE_NAME_SIZE, PAGE_SIZE_BYTES};

/// A column's declared type. `Str(n)` carries its declared length in bytes,
/// matching spec's fixed-length string column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int32,
    Float32,
    Str(usize),
}

impl ColumnType {
    fn tag(&self) -> u8 {
        match self {
            ColumnType::Int32 => 1,
            ColumnType::Float32 => 2,
            ColumnType::Str(_) => 3,
        }
    }

    fn from_tag(tag: u8, declared_len: u32) -> DbResult<Self> {
        match tag {
            1 => Ok(ColumnType::Int32),
            2 => Ok(ColumnType::Float32),
            3 => Ok(ColumnType::Str(declared_len as usize)),
            other => Err(DbError::CorruptionError(format!("unknown column type tag {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    pub indexed: bool,
}

/// An ordered sequence of `(column_name, type, declared_length)`, immutable
/// once persisted into a table's 4096-byte header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
}

const HEADER_MAGIC: u32 = 0x4d44_4253; // "MDBS"
const COLUMN_RECORD_SIZE: usize = MAX_COL_NAME_SIZE + 1 + 4 + 1; // name + tag + declared_len + indexed

impl TableSchema {
    pub fn new(table_name: &str, columns: Vec<ColumnDef>) -> DbResult<Self> {
        if table_name.len() > MAX_TABLE_NAME_SIZE {
            return Err(DbError::SchemaError(format!(
                "table name '{table_name}' exceeds {MAX_TABLE_NAME_SIZE} bytes"
            )));
        }
        for col in &columns {
            if col.name.len() > MAX_COL_NAME_SIZE {
                return Err(DbError::SchemaError(format!(
                    "column name '{}' exceeds {MAX_COL_NAME_SIZE} bytes", col.name
                )));
            }
        }
        let schema = TableSchema { table_name: table_name.to_string(), columns };
        if schema.header_size() > PAGE_SIZE_BYTES {
            return Err(DbError::SchemaError("schema too large for one header page".to_string()));
        }
        Ok(schema)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_width(&self) -> usize {
        self.columns
            .iter()
            .map(|c| crate::common::Value::encoded_len(&c.ty))
            .sum()
    }

    fn header_size(&self) -> usize {
        4 + 4 + 2 + self.columns.len() * COLUMN_RECORD_SIZE
    }

    pub fn to_header_bytes(&self) -> DbResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(PAGE_SIZE_BYTES);
        buf.extend_from_slice(&HEADER_MAGIC.to_le_bytes());
        buf.extend_from_slice(&(self.columns.len() as u32).to_le_bytes());
        let mut name_bytes = self.table_name.clone().into_bytes();
        name_bytes.resize(MAX_TABLE_NAME_SIZE, 0);
        // table name padded into 2 reserved bytes' worth of space is folded
        // into the trailing padding below; store it right after the count.
        buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
        buf.extend_from_slice(&name_bytes);
        for col in &self.columns {
            let mut col_name = col.name.clone().into_bytes();
            col_name.resize(MAX_COL_NAME_SIZE, 0);
            buf.extend_from_slice(&col_name);
            buf.push(col.ty.tag());
            let declared_len = match col.ty {
                ColumnType::Str(n) => n as u32,
                _ => 0,
            };
            buf.extend_from_slice(&declared_len.to_le_bytes());
            buf.push(col.indexed as u8);
        }
        buf.resize(PAGE_SIZE_BYTES, 0);
        Ok(buf)
    }

    pub fn from_header_bytes(bytes: &[u8]) -> DbResult<Self> {
        if bytes.len() < PAGE_SIZE_BYTES {
            return Err(DbError::CorruptionError("header block too short".to_string()));
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        if magic != HEADER_MAGIC {
            return Err(DbError::CorruptionError("bad table header magic".to_string()));
        }
        let col_count = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let name_len = u16::from_le_bytes(bytes[8..10].try_into().unwrap()) as usize;
        let mut offset = 10;
        let table_name = decode_padded_str(&bytes[offset..offset + name_len]);
        offset += name_len;

        let mut columns = Vec::with_capacity(col_count);
        for _ in 0..col_count {
            let name = decode_padded_str(&bytes[offset..offset + MAX_COL_NAME_SIZE]);
            offset += MAX_COL_NAME_SIZE;
            let tag = bytes[offset];
            offset += 1;
            let declared_len = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
            offset += 4;
            let indexed = bytes[offset] != 0;
            offset += 1;
            columns.push(ColumnDef {
                name,
                ty: ColumnType::from_tag(tag, declared_len)?,
                indexed,
            });
        }
        Ok(TableSchema { table_name, columns })
    }
}

fn decode_padded_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let schema = TableSchema::new(
            "students",
            vec![
                ColumnDef { name: "StudentID".into(), ty: ColumnType::Int32, indexed: true },
                ColumnDef { name: "FullName".into(), ty: ColumnType::Str(32), indexed: false },
            ],
        ).unwrap();
        let bytes = schema.to_header_bytes().unwrap();
        assert_eq!(bytes.len(), PAGE_SIZE_BYTES);
        let parsed = TableSchema::from_header_bytes(&bytes).unwrap();
        assert_eq!(parsed, schema);
    }
}
