use crate::catalog::schema::{ColumnDef, ColumnType};
use crate::common::{DbError, DbResult};
use std::cmp::Ordering;

/// A dynamically typed column value. The schema's declared type for a
/// column disambiguates which on-disk width a `Null` occupies, since
/// every column is stored fixed-width regardless of nullness.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int32(i32),
    Float32(f32),
    Str(String),
    Null,
}

const TAG_NULL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STR: u8 = 3;

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int32(_) => "int32",
            Value::Float32(_) => "float32",
            Value::Str(_) => "string",
            Value::Null => "null",
        }
    }

    pub fn matches_type(&self, ty: &ColumnType) -> bool {
        matches!(
            (self, ty),
            (Value::Int32(_), ColumnType::Int32)
                | (Value::Float32(_), ColumnType::Float32)
                | (Value::Str(_), ColumnType::Str(_))
                | (Value::Null, _)
        )
    }

    /// Serialized width in bytes for a column of the given declared type.
    /// Identical for the null and non-null case so in-place rewrites never
    /// change a row's footprint.
    pub fn encoded_len(ty: &ColumnType) -> usize {
        match ty {
            ColumnType::Int32 => 1 + 4,
            ColumnType::Float32 => 1 + 4,
            ColumnType::Str(len) => 1 + *len,
        }
    }

    pub fn to_bytes(&self, col: &ColumnDef) -> DbResult<Vec<u8>> {
        let width = Self::encoded_len(&col.ty);
        let mut buf = Vec::with_capacity(width);
        match self {
            Value::Null => {
                buf.push(TAG_NULL);
                buf.resize(width, 0);
            }
            Value::Int32(v) => {
                buf.push(TAG_INT);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Float32(v) => {
                buf.push(TAG_FLOAT);
                buf.extend_from_slice(&v.to_le_bytes());
            }
            Value::Str(s) => {
                buf.push(TAG_STR);
                let declared_len = match col.ty {
                    ColumnType::Str(n) => n,
                    _ => return Err(DbError::SchemaError(format!(
                        "column {} is not a string column", col.name
                    ))),
                };
                let truncated: String = s.chars().take(declared_len).collect();
                let mut bytes = truncated.into_bytes();
                bytes.resize(declared_len, 0);
                buf.extend_from_slice(&bytes);
            }
        }
        if buf.len() != width {
            return Err(DbError::CorruptionError(format!(
                "encoded value for column {} has width {}, expected {}",
                col.name, buf.len(), width
            )));
        }
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8], ty: &ColumnType) -> DbResult<Self> {
        if bytes.is_empty() {
            return Err(DbError::CorruptionError("empty value bytes".to_string()));
        }
        let tag = bytes[0];
        let payload = &bytes[1..];
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_INT => {
                if payload.len() < 4 {
                    return Err(DbError::CorruptionError("truncated int32 value".to_string()));
                }
                let mut b = [0u8; 4];
                b.copy_from_slice(&payload[..4]);
                Ok(Value::Int32(i32::from_le_bytes(b)))
            }
            TAG_FLOAT => {
                if payload.len() < 4 {
                    return Err(DbError::CorruptionError("truncated float32 value".to_string()));
                }
                let mut b = [0u8; 4];
                b.copy_from_slice(&payload[..4]);
                Ok(Value::Float32(f32::from_le_bytes(b)))
            }
            TAG_STR => {
                let declared_len = match ty {
                    ColumnType::Str(n) => *n,
                    _ => return Err(DbError::CorruptionError("type tag mismatch for string column".to_string())),
                };
                if payload.len() < declared_len {
                    return Err(DbError::CorruptionError("truncated string value".to_string()));
                }
                let raw = &payload[..declared_len];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                let s = String::from_utf8_lossy(&raw[..end]).into_owned();
                Ok(Value::Str(s))
            }
            other => Err(DbError::CorruptionError(format!("unknown value tag {other}"))),
        }
    }

    /// Comparison used by predicate evaluation and ORDER BY. `None` when the
    /// two values are not of directly comparable variants.
    pub fn partial_cmp_value(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => a.partial_cmp(b),
            (Value::Float32(a), Value::Float32(b)) => a.partial_cmp(b),
            (Value::Int32(a), Value::Float32(b)) => (*a as f32).partial_cmp(b),
            (Value::Float32(a), Value::Int32(b)) => a.partial_cmp(&(*b as f32)),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Null => write!(f, "null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_col() -> ColumnDef {
        ColumnDef { name: "a".into(), ty: ColumnType::Int32, indexed: false }
    }
    fn str_col(len: usize) -> ColumnDef {
        ColumnDef { name: "b".into(), ty: ColumnType::Str(len), indexed: false }
    }

    #[test]
    fn round_trips_int32() {
        let col = int_col();
        let v = Value::Int32(-42);
        let bytes = v.to_bytes(&col).unwrap();
        assert_eq!(bytes.len(), Value::encoded_len(&col.ty));
        assert_eq!(Value::from_bytes(&bytes, &col.ty).unwrap(), v);
    }

    #[test]
    fn truncates_long_strings() {
        let col = str_col(4);
        let v = Value::Str("hello world".to_string());
        let bytes = v.to_bytes(&col).unwrap();
        assert_eq!(Value::from_bytes(&bytes, &col.ty).unwrap(), Value::Str("hell".to_string()));
    }

    #[test]
    fn null_keeps_fixed_width() {
        let col = str_col(10);
        let null_bytes = Value::Null.to_bytes(&col).unwrap();
        let val_bytes = Value::Str("hi".to_string()).to_bytes(&col).unwrap();
        assert_eq!(null_bytes.len(), val_bytes.len());
    }
}
