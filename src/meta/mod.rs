pub mod mysql;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::conn::{CancelToken, Connection};
use crate::error::Result;
use crate::sql_util::del_escape;
use crate::types::{DbType, TableMeta};

pub use mysql::MysqlTableMetaLoader;

/// Reflects table structure from one engine's catalog.
pub trait TableMetaLoader: Send + Sync {
    fn db_type(&self) -> DbType;

    fn load_one(
        &self,
        cancel: &CancelToken,
        db_name: &str,
        table_name: &str,
        conn: &mut dyn Connection,
    ) -> Result<TableMeta>;

    /// Bulk preload. No engine implements it yet.
    fn load_all(&self) -> Result<Vec<TableMeta>> {
        Ok(Vec::new())
    }
}

/// Where the rollback engine gets table metadata from.
pub trait TableMetaSource: Send + Sync {
    fn table_meta(
        &self,
        cancel: &CancelToken,
        table_name: &str,
        conn: &mut dyn Connection,
    ) -> Result<Arc<TableMeta>>;
}

/// Memoizes `TableMeta` per table name, loading on a miss.
pub struct TableMetaCache {
    db_name: String,
    loader: Box<dyn TableMetaLoader>,
    tables: Mutex<HashMap<String, Arc<TableMeta>>>,
}

impl TableMetaCache {
    pub fn new(db_name: impl Into<String>, loader: Box<dyn TableMetaLoader>) -> Self {
        TableMetaCache {
            db_name: db_name.into(),
            loader,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn mysql(db_name: impl Into<String>) -> Self {
        Self::new(db_name, Box::new(MysqlTableMetaLoader::new()))
    }

    fn cache_key(&self, table_name: &str) -> String {
        del_escape(table_name, self.loader.db_type())
    }

    /// Drop a cached entry so the next lookup reloads it (after DDL).
    pub fn refresh(&self, table_name: &str) {
        let key = self.cache_key(table_name);
        self.lock().remove(&key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<TableMeta>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TableMetaSource for TableMetaCache {
    fn table_meta(
        &self,
        cancel: &CancelToken,
        table_name: &str,
        conn: &mut dyn Connection,
    ) -> Result<Arc<TableMeta>> {
        let key = self.cache_key(table_name);
        if let Some(meta) = self.lock().get(&key) {
            return Ok(Arc::clone(meta));
        }

        // Not holding the lock while the catalog is queried
        debug!(table = %key, "table meta cache miss");
        let meta = Arc::new(self.loader.load_one(cancel, &self.db_name, &key, conn)?);
        let mut tables = self.lock();
        let entry = tables.entry(key).or_insert(meta);
        Ok(Arc::clone(entry))
    }
}
