use super::condition::Condition;
use super::hash_index::HashIndex;
use super::registry;
use super::stats::TableStats;
use crate::buffer::{BufferPool, Page};
use crate::catalog::schema::TableSchema;
use crate::catalog::Catalog;
use crate::common::{DbError, DbResult, Row, RowId, Value};
use crate::config::PAGE_SIZE_BYTES;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

const ROW_COUNT_HEADER: usize = 2;

fn blocking_factor(row_width: usize) -> usize {
    (PAGE_SIZE_BYTES - ROW_COUNT_HEADER) / row_width.max(1)
}

fn read_row_count(page: &Page) -> u16 {
    u16::from_le_bytes([page.data[0], page.data[1]])
}

fn write_row_count(page: &mut Page, n: u16) {
    let bytes = n.to_le_bytes();
    page.data[0] = bytes[0];
    page.data[1] = bytes[1];
    page.is_dirty = true;
}

fn slot_offset(slot: u16, row_width: usize) -> usize {
    ROW_COUNT_HEADER + slot as usize * row_width
}

fn encode_row(schema: &TableSchema, values: &HashMap<String, Value>) -> DbResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(schema.row_width());
    for col in &schema.columns {
        let value = values.get(&col.name).unwrap_or(&Value::Null);
        if !value.matches_type(&col.ty) {
            return Err(DbError::SchemaError(format!(
                "value for column '{}' has type {}, expected {:?}",
                col.name, value.type_name(), col.ty
            )));
        }
        buf.extend_from_slice(&value.to_bytes(col)?);
    }
    Ok(buf)
}

fn decode_row(schema: &TableSchema, bytes: &[u8]) -> DbResult<HashMap<String, Value>> {
    let mut columns = HashMap::with_capacity(schema.columns.len());
    let mut offset = 0;
    for col in &schema.columns {
        let width = Value::encoded_len(&col.ty);
        let value = Value::from_bytes(&bytes[offset..offset + width], &col.ty)?;
        columns.insert(col.name.clone(), value);
        offset += width;
    }
    Ok(columns)
}

/// Writes a page for `table`/`block_id` straight to disk through the
/// registry, bypassing the buffer pool. Called both internally (to flush an
/// evicted dirty frame that belongs to a different table than the one being
/// serviced) and by the Failure Recovery Manager during checkpointing.
pub fn write_disk(table: &str, block_id: u64, page: &Page) -> DbResult<()> {
    let handle = registry::handle_for(table)?;
    let mut file = handle.lock().unwrap();
    file.write_raw_block(block_id, page)
}

fn get_or_load_page(table: &str, block_id: u64, pool: &BufferPool) -> DbResult<Page> {
    if let Some(page) = pool.get_page(table, block_id) {
        return Ok(page);
    }
    let handle = registry::handle_for(table)?;
    let page = {
        let mut file = handle.lock().unwrap();
        file.read_raw_block(block_id)?
    };
    if let Some(((evicted_table, evicted_block), evicted_page)) =
        pool.add_or_update_page(table, block_id, page.clone())
    {
        if evicted_page.is_dirty {
            write_disk(&evicted_table, evicted_block, &evicted_page)?;
        }
    }
    Ok(page)
}

fn put_page(table: &str, block_id: u64, mut page: Page, pool: &BufferPool) -> DbResult<()> {
    page.is_dirty = true;
    if let Some(((evicted_table, evicted_block), evicted_page)) =
        pool.add_or_update_page(table, block_id, page)
    {
        if evicted_page.is_dirty && (evicted_table != table || evicted_block != block_id) {
            write_disk(&evicted_table, evicted_block, &evicted_page)?;
        }
    }
    Ok(())
}

/// Read request: an optional column projection and an optional DNF filter.
/// `columns: None` means "all columns".
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub table: String,
    pub columns: Option<Vec<String>>,
    pub condition: Condition,
}

/// Write request shared by insert and update. For insert, `condition` is
/// empty and `assignments` must cover every column (defaulting missing ones
/// to `Null`); for update, `condition` selects the rows to touch and
/// `assignments` carries only the changed columns.
#[derive(Debug, Clone)]
pub struct DataWrite {
    pub table: String,
    pub assignments: HashMap<String, Value>,
    pub condition: Condition,
}

#[derive(Debug, Clone)]
pub struct Deletion {
    pub table: String,
    pub condition: Condition,
}

/// Facade over block-level reads/writes/deletes plus the per-table
/// secondary hash indexes, analogous to the teacher's `StorageManager` but
/// delegating all caching to the shared `BufferPool` instead of keeping its
/// own page cache.
pub struct StorageEngine {
    indexes: Mutex<HashMap<(String, String), HashIndex>>,
}

static ENGINE: OnceLock<StorageEngine> = OnceLock::new();

impl StorageEngine {
    pub fn global() -> &'static StorageEngine {
        ENGINE.get_or_init(|| StorageEngine { indexes: Mutex::new(HashMap::new()) })
    }

    pub fn create_table(&self, schema: TableSchema) -> DbResult<()> {
        registry::register_created(&schema.table_name, &schema)?;
        let table_name = schema.table_name.clone();
        Catalog::global().register(&table_name, schema);
        Ok(())
    }

    fn block_count(&self, table: &str) -> DbResult<u64> {
        let handle = registry::handle_for(table)?;
        let count = handle.lock().unwrap().block_count();
        Ok(count)
    }

    pub fn read_block(&self, req: Retrieval, pool: &BufferPool) -> DbResult<Vec<Row>> {
        let schema = Catalog::global().get(&req.table)?;
        req.condition.validate_columns(&schema)?;
        let total_blocks = self.block_count(&req.table)?;
        let row_width = schema.row_width();
        let mut out = Vec::new();
        for block_id in 1..=total_blocks {
            let page = get_or_load_page(&req.table, block_id, pool)?;
            let row_count = read_row_count(&page);
            for slot in 0..row_count {
                let offset = slot_offset(slot, row_width);
                let columns = decode_row(&schema, &page.data[offset..offset + row_width])?;
                let id = RowId::from_location(block_id, slot);
                let row = Row::new(id, columns);
                if req.condition.eval(&row)? {
                    out.push(project(row, req.columns.as_deref()));
                }
            }
        }
        Ok(out)
    }

    pub fn add_block(&self, req: DataWrite, pool: &BufferPool) -> DbResult<RowId> {
        let schema = Catalog::global().get(&req.table)?;
        for col in &schema.columns {
            if let Some(value) = req.assignments.get(&col.name) {
                if !value.matches_type(&col.ty) {
                    return Err(DbError::SchemaError(format!(
                        "value for column '{}' has type {}, expected {:?}",
                        col.name, value.type_name(), col.ty
                    )));
                }
            }
        }
        let row_width = schema.row_width();
        let factor = blocking_factor(row_width);
        let total_blocks = self.block_count(&req.table)?;

        let mut target_block = None;
        for block_id in 1..=total_blocks {
            let page = get_or_load_page(&req.table, block_id, pool)?;
            if (read_row_count(&page) as usize) < factor {
                target_block = Some((block_id, page));
                break;
            }
        }
        let (block_id, mut page) = match target_block {
            Some(found) => found,
            None => {
                let handle = registry::handle_for(&req.table)?;
                let new_id = handle.lock().unwrap().append_raw_block(&Page::new_empty())?;
                (new_id, Page::new_empty())
            }
        };

        let row_count = read_row_count(&page);
        let row_bytes = encode_row(&schema, &req.assignments)?;
        let offset = slot_offset(row_count, row_width);
        page.data[offset..offset + row_width].copy_from_slice(&row_bytes);
        write_row_count(&mut page, row_count + 1);
        put_page(&req.table, block_id, page, pool)?;

        let id = RowId::from_location(block_id, row_count);
        self.reindex_insert(&req.table, &schema, &req.assignments, &id);
        Ok(id)
    }

    pub fn write_block(&self, req: DataWrite, pool: &BufferPool) -> DbResult<Vec<RowId>> {
        let schema = Catalog::global().get(&req.table)?;
        req.condition.validate_columns(&schema)?;
        let row_width = schema.row_width();
        let total_blocks = self.block_count(&req.table)?;
        let mut touched = Vec::new();

        for block_id in 1..=total_blocks {
            let mut page = get_or_load_page(&req.table, block_id, pool)?;
            let row_count = read_row_count(&page);
            let mut changed = false;
            for slot in 0..row_count {
                let offset = slot_offset(slot, row_width);
                let mut columns = decode_row(&schema, &page.data[offset..offset + row_width])?;
                let id = RowId::from_location(block_id, slot);
                let row = Row::new(id.clone(), columns.clone());
                if !req.condition.eval(&row)? {
                    continue;
                }
                for (k, v) in &req.assignments {
                    columns.insert(k.clone(), v.clone());
                }
                let new_bytes = encode_row(&schema, &columns)?;
                page.data[offset..offset + row_width].copy_from_slice(&new_bytes);
                changed = true;
                touched.push(id.clone());
                self.reindex_insert(&req.table, &schema, &columns, &id);
            }
            if changed {
                put_page(&req.table, block_id, page, pool)?;
            }
        }
        Ok(touched)
    }

    pub fn delete_block(&self, req: Deletion, pool: &BufferPool) -> DbResult<Vec<RowId>> {
        let schema = Catalog::global().get(&req.table)?;
        req.condition.validate_columns(&schema)?;
        let row_width = schema.row_width();
        let total_blocks = self.block_count(&req.table)?;
        let mut removed = Vec::new();

        for block_id in 1..=total_blocks {
            let mut page = get_or_load_page(&req.table, block_id, pool)?;
            let row_count = read_row_count(&page) as usize;
            let mut surviving: Vec<Vec<u8>> = Vec::with_capacity(row_count);
            let mut any_removed = false;
            for slot in 0..row_count as u16 {
                let offset = slot_offset(slot, row_width);
                let bytes = page.data[offset..offset + row_width].to_vec();
                let columns = decode_row(&schema, &bytes)?;
                let id = RowId::from_location(block_id, slot);
                let row = Row::new(id.clone(), columns);
                if req.condition.eval(&row)? {
                    removed.push(id);
                    any_removed = true;
                } else {
                    surviving.push(bytes);
                }
            }
            if any_removed {
                for (slot, bytes) in surviving.iter().enumerate() {
                    let offset = slot_offset(slot as u16, row_width);
                    page.data[offset..offset + row_width].copy_from_slice(bytes);
                }
                let tail_start = slot_offset(surviving.len() as u16, row_width);
                for b in &mut page.data[tail_start..] {
                    *b = 0;
                }
                write_row_count(&mut page, surviving.len() as u16);
                put_page(&req.table, block_id, page, pool)?;
            }
        }
        if !removed.is_empty() {
            self.invalidate_indexes(&req.table);
        }
        Ok(removed)
    }

    /// Writes `values` at the exact `(block, slot)` location named by
    /// `row_id`, extending the table file with empty blocks if needed.
    /// Used only by the recovery path, which must restore rows at their
    /// original addresses rather than wherever `add_block`'s first-fit
    /// policy would place them.
    pub fn put_row_at(&self, table: &str, row_id: &RowId, values: HashMap<String, Value>, pool: &BufferPool) -> DbResult<()> {
        let schema = Catalog::global().get(table)?;
        let (block_id, slot) = row_id
            .location()
            .ok_or_else(|| DbError::CorruptionError(format!("malformed row id '{}'", row_id.0)))?;
        let row_width = schema.row_width();
        let total_blocks = self.block_count(table)?;
        if block_id > total_blocks {
            let handle = registry::handle_for(table)?;
            let mut file = handle.lock().unwrap();
            while file.block_count() < block_id {
                file.append_raw_block(&Page::new_empty())?;
            }
        }
        let mut page = get_or_load_page(table, block_id, pool)?;
        let row_count = read_row_count(&page);
        let row_bytes = encode_row(&schema, &values)?;
        let offset = slot_offset(slot, row_width);
        if offset + row_width > page.data.len() {
            return Err(DbError::CorruptionError("row offset exceeds page size".to_string()));
        }
        page.data[offset..offset + row_width].copy_from_slice(&row_bytes);
        if slot >= row_count {
            write_row_count(&mut page, slot + 1);
        }
        put_page(table, block_id, page, pool)?;
        self.reindex_insert(table, &schema, &values, row_id);
        Ok(())
    }

    /// Zeroes the row at `row_id`'s exact location without compacting the
    /// block, so sibling rows keep their addresses. This is a tombstone,
    /// not a true delete (the slot still counts toward the block's row
    /// count and reads back as all-`Null`); only the recovery path uses it,
    /// since an ordinary `DELETE` goes through `delete_block`'s compaction.
    pub fn delete_row_at(&self, table: &str, row_id: &RowId, pool: &BufferPool) -> DbResult<()> {
        let schema = Catalog::global().get(table)?;
        let (block_id, slot) = row_id
            .location()
            .ok_or_else(|| DbError::CorruptionError(format!("malformed row id '{}'", row_id.0)))?;
        let total_blocks = self.block_count(table)?;
        if block_id > total_blocks {
            return Ok(());
        }
        let row_width = schema.row_width();
        let mut page = get_or_load_page(table, block_id, pool)?;
        if slot >= read_row_count(&page) {
            return Ok(());
        }
        let offset = slot_offset(slot, row_width);
        for b in &mut page.data[offset..offset + row_width] {
            *b = 0;
        }
        page.is_dirty = true;
        put_page(table, block_id, page, pool)?;
        self.invalidate_indexes(table);
        Ok(())
    }

    pub fn get_row(&self, table: &str, row_id: &RowId, pool: &BufferPool) -> DbResult<Option<Row>> {
        let schema = Catalog::global().get(table)?;
        let (block_id, slot) = row_id
            .location()
            .ok_or_else(|| DbError::CorruptionError(format!("malformed row id '{}'", row_id.0)))?;
        let total_blocks = self.block_count(table)?;
        if block_id > total_blocks {
            return Ok(None);
        }
        let row_width = schema.row_width();
        let page = get_or_load_page(table, block_id, pool)?;
        if slot >= read_row_count(&page) {
            return Ok(None);
        }
        let offset = slot_offset(slot, row_width);
        let columns = decode_row(&schema, &page.data[offset..offset + row_width])?;
        Ok(Some(Row::new(row_id.clone(), columns)))
    }

    pub fn set_index(&self, table: &str, column: &str, pool: &BufferPool) -> DbResult<()> {
        let schema = Catalog::global().get(table)?;
        if schema.column(column).is_none() {
            return Err(DbError::SchemaError(format!("unknown column '{column}' in table '{table}'")));
        }
        let rows = self.read_block(
            Retrieval { table: table.to_string(), columns: None, condition: Condition::all() },
            pool,
        )?;
        let mut index = HashIndex::new(column);
        for row in &rows {
            if let Some(v) = row.get(column) {
                index.insert(&v.to_string(), row.id.clone());
            }
        }
        self.indexes.lock().unwrap().insert((table.to_string(), column.to_string()), index);
        Ok(())
    }

    pub fn lookup_index(&self, table: &str, column: &str, key: &str) -> Option<Vec<RowId>> {
        self.indexes
            .lock()
            .unwrap()
            .get(&(table.to_string(), column.to_string()))
            .map(|idx| idx.lookup(key).to_vec())
    }

    pub fn has_index(&self, table: &str, column: &str) -> bool {
        self.indexes.lock().unwrap().contains_key(&(table.to_string(), column.to_string()))
    }

    fn reindex_insert(&self, table: &str, schema: &TableSchema, values: &HashMap<String, Value>, id: &RowId) {
        let mut indexes = self.indexes.lock().unwrap();
        for col in &schema.columns {
            if let Some(index) = indexes.get_mut(&(table.to_string(), col.name.clone())) {
                if let Some(v) = values.get(&col.name) {
                    index.insert(&v.to_string(), id.clone());
                }
            }
        }
    }

    fn invalidate_indexes(&self, table: &str) {
        let mut indexes = self.indexes.lock().unwrap();
        for ((t, _), index) in indexes.iter_mut() {
            if t == table {
                index.clear();
            }
        }
    }

    pub fn get_stats(&self, table: &str, pool: &BufferPool) -> DbResult<TableStats> {
        let schema = Catalog::global().get(table)?;
        let row_width = schema.row_width();
        let factor = blocking_factor(row_width);
        let rows = self.read_block(
            Retrieval { table: table.to_string(), columns: None, condition: Condition::all() },
            pool,
        )?;
        let mut stats = TableStats::new(row_width, factor);
        stats.tuple_count = rows.len() as u64;
        stats.block_count = self.block_count(table)?;
        for col in &schema.columns {
            let mut distinct = std::collections::HashSet::new();
            for row in &rows {
                if let Some(v) = row.get(&col.name) {
                    distinct.insert(v.to_string());
                }
            }
            stats.distinct_values.insert(col.name.clone(), distinct.len());
        }
        Ok(stats)
    }
}

fn project(row: Row, columns: Option<&[String]>) -> Row {
    match columns {
        None => row,
        Some(cols) => {
            let filtered = row
                .columns
                .into_iter()
                .filter(|(k, _)| cols.contains(k))
                .collect();
            Row::new(row.id, filtered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::catalog::schema::{ColumnDef, ColumnType};
    use tempfile::TempDir;

    fn with_tempdir<F: FnOnce()>(f: F) {
        let dir = TempDir::new().unwrap();
        let prev = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        f();
        std::env::set_current_dir(prev).unwrap();
    }

    fn schema() -> TableSchema {
        TableSchema::new(
            "widgets",
            vec![
                ColumnDef { name: "id".into(), ty: ColumnType::Int32, indexed: true },
                ColumnDef { name: "name".into(), ty: ColumnType::Str(16), indexed: false },
            ],
        )
        .unwrap()
    }

    #[test]
    fn insert_then_read_round_trips() {
        with_tempdir(|| {
            let engine = StorageEngine::global();
            let pool = BufferPool::new(4);
            engine.create_table(schema()).unwrap();

            let mut values = HashMap::new();
            values.insert("id".to_string(), Value::Int32(1));
            values.insert("name".to_string(), Value::Str("widget-a".into()));
            engine
                .add_block(DataWrite { table: "widgets".into(), assignments: values, condition: Condition::all() }, &pool)
                .unwrap();

            let rows = engine
                .read_block(Retrieval { table: "widgets".into(), columns: None, condition: Condition::all() }, &pool)
                .unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get("name"), Some(&Value::Str("widget-a".into())));
        });
    }

    #[test]
    fn update_and_delete_affect_matching_rows_only() {
        with_tempdir(|| {
            let engine = StorageEngine::global();
            let pool = BufferPool::new(4);
            engine.create_table(schema()).unwrap();

            for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
                let mut values = HashMap::new();
                values.insert("id".to_string(), Value::Int32(id));
                values.insert("name".to_string(), Value::Str(name.into()));
                engine
                    .add_block(DataWrite { table: "widgets".into(), assignments: values, condition: Condition::all() }, &pool)
                    .unwrap();
            }

            use super::super::condition::{Comparison, CompareOp, Operand};
            let cond = Condition(vec![vec![Comparison {
                left: Operand::Column("id".into()),
                op: CompareOp::Eq,
                right: Operand::Literal(Value::Int32(2)),
            }]]);

            let mut update_values = HashMap::new();
            update_values.insert("name".to_string(), Value::Str("bee".into()));
            let updated = engine
                .write_block(DataWrite { table: "widgets".into(), assignments: update_values, condition: cond.clone() }, &pool)
                .unwrap();
            assert_eq!(updated.len(), 1);

            let deleted = engine.delete_block(Deletion { table: "widgets".into(), condition: cond }, &pool).unwrap();
            assert_eq!(deleted.len(), 1);

            let rows = engine
                .read_block(Retrieval { table: "widgets".into(), columns: None, condition: Condition::all() }, &pool)
                .unwrap();
            assert_eq!(rows.len(), 2);
        });
    }
}
