pub mod schema;

use crate::common::{DbError, DbResult};
use schema::TableSchema;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Process-wide map from table name to its immutable schema. The schema
/// itself is persisted inside each table's header page
/// (`storage::table_file::TableFile`); the catalog is a read-through cache
/// populated at `open_table`/`create_table` time, mirroring the teacher's
/// `SysCatalog::global()` singleton but holding plain schema metadata
/// instead of a full system-table row store, since bulk DDL is out of
/// scope beyond bootstrapping tables.
pub struct Catalog {
    schemas: Mutex<HashMap<String, TableSchema>>,
}

static CATALOG: OnceLock<Catalog> = OnceLock::new();

impl Catalog {
    pub fn global() -> &'static Catalog {
        CATALOG.get_or_init(|| Catalog {
            schemas: Mutex::new(HashMap::new()),
        })
    }

    pub fn register(&self, table: &str, schema: TableSchema) {
        self.schemas.lock().unwrap().insert(table.to_string(), schema);
    }

    pub fn get(&self, table: &str) -> DbResult<TableSchema> {
        self.schemas
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| DbError::SchemaError(format!("unknown table '{table}'")))
    }

    pub fn exists(&self, table: &str) -> bool {
        self.schemas.lock().unwrap().contains_key(table)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.schemas.lock().unwrap().keys().cloned().collect()
    }
}
