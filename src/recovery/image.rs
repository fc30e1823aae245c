use crate::catalog::schema::{ColumnType, TableSchema};
use crate::common::{DbError, DbResult, Value};
use std::collections::HashMap;

/// Encodes a row's columns the same way the wire protocol's `EncodedRow`
/// does (`{ "col": { "type": "...", "value": "..." } }`), per spec.md
/// §6's requirement that before/after images be JSON object encodings of a
/// row's columns. Recovery decodes this directly back into `Value`s rather
/// than replaying SQL text, so the JSON shape only needs to round-trip a
/// flat column map, not arbitrary nesting.
pub fn encode_image(columns: &HashMap<String, Value>) -> String {
    let mut map = serde_json::Map::new();
    let mut keys: Vec<&String> = columns.keys().collect();
    keys.sort();
    for key in keys {
        let value = &columns[key];
        let mut entry = serde_json::Map::new();
        entry.insert("type".to_string(), serde_json::Value::String(value.type_name().to_string()));
        entry.insert("value".to_string(), serde_json::Value::String(value.to_string()));
        map.insert(key.clone(), serde_json::Value::Object(entry));
    }
    serde_json::Value::Object(map).to_string()
}

pub fn decode_image(text: &str, schema: &TableSchema) -> DbResult<HashMap<String, Value>> {
    if text.is_empty() {
        return Ok(HashMap::new());
    }
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DbError::CorruptionError(format!("malformed row image: {e}")))?;
    let obj = parsed
        .as_object()
        .ok_or_else(|| DbError::CorruptionError("row image is not a JSON object".to_string()))?;

    let mut columns = HashMap::new();
    for (name, entry) in obj {
        let col = schema
            .column(name)
            .ok_or_else(|| DbError::SchemaError(format!("unknown column '{name}' in row image")))?;
        let ty = entry.get("type").and_then(|v| v.as_str()).unwrap_or("null");
        let raw = entry.get("value").and_then(|v| v.as_str()).unwrap_or("null");
        columns.insert(name.clone(), parse_typed(raw, ty, &col.ty)?);
    }
    Ok(columns)
}

fn parse_typed(raw: &str, ty: &str, declared: &ColumnType) -> DbResult<Value> {
    match ty {
        "null" => Ok(Value::Null),
        "int32" => raw
            .parse::<i32>()
            .map(Value::Int32)
            .map_err(|_| DbError::CorruptionError(format!("bad int32 row image value '{raw}'"))),
        "float32" => raw
            .parse::<f32>()
            .map(Value::Float32)
            .map_err(|_| DbError::CorruptionError(format!("bad float32 row image value '{raw}'"))),
        "string" => match declared {
            ColumnType::Str(_) => Ok(Value::Str(raw.to_string())),
            _ => Err(DbError::CorruptionError("string row image value for a non-string column".to_string())),
        },
        other => Err(DbError::CorruptionError(format!("unknown value type '{other}' in row image"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::schema::ColumnDef;

    #[test]
    fn round_trips_row_image() {
        let schema = TableSchema::new(
            "t",
            vec![
                ColumnDef { name: "id".into(), ty: ColumnType::Int32, indexed: false },
                ColumnDef { name: "name".into(), ty: ColumnType::Str(16), indexed: false },
            ],
        )
        .unwrap();
        let mut columns = HashMap::new();
        columns.insert("id".to_string(), Value::Int32(7));
        columns.insert("name".to_string(), Value::Str("a,b=c|d".into()));
        let image = encode_image(&columns);
        let decoded = decode_image(&image, &schema).unwrap();
        assert_eq!(decoded, columns);
    }

    #[test]
    fn decodes_null_column() {
        let schema = TableSchema::new(
            "t",
            vec![ColumnDef { name: "id".into(), ty: ColumnType::Int32, indexed: false }],
        )
        .unwrap();
        let mut columns = HashMap::new();
        columns.insert("id".to_string(), Value::Null);
        let image = encode_image(&columns);
        let decoded = decode_image(&image, &schema).unwrap();
        assert_eq!(decoded, columns);
    }
}
