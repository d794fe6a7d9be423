use indexmap::IndexMap;
use tracing::{debug, error};

use crate::conn::{CancelToken, Connection};
use crate::error::{Result, UndoError};
use crate::sql_util::{del_escape, split_qualified};
use crate::types::{ColumnMeta, DbType, IndexMeta, IndexType, SqlDataType, TableMeta};
use crate::value::{opt_text, text, Row, Value};

use super::TableMetaLoader;

pub const COLUMN_SCHEMA_SQL: &str = "SELECT `TABLE_CATALOG`, `TABLE_NAME`, `TABLE_SCHEMA`, \
     `COLUMN_NAME`, `DATA_TYPE`, `COLUMN_TYPE`, `COLUMN_KEY`, `IS_NULLABLE`, `EXTRA` \
     FROM `INFORMATION_SCHEMA`.`COLUMNS` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? \
     ORDER BY `ORDINAL_POSITION`";

pub const INDEX_SCHEMA_SQL: &str = "SELECT `INDEX_NAME`, `COLUMN_NAME`, `NON_UNIQUE`, \
     `INDEX_TYPE`, `COLLATION`, `CARDINALITY` \
     FROM `INFORMATION_SCHEMA`.`STATISTICS` WHERE `TABLE_SCHEMA` = ? AND `TABLE_NAME` = ? \
     ORDER BY `INDEX_NAME`, `SEQ_IN_INDEX`";

/// Loads table structure from MySQL's `INFORMATION_SCHEMA`.
#[derive(Debug, Default)]
pub struct MysqlTableMetaLoader;

impl MysqlTableMetaLoader {
    pub fn new() -> Self {
        MysqlTableMetaLoader
    }

    fn get_columns(
        &self,
        cancel: &CancelToken,
        db_name: &str,
        table_name: &str,
        conn: &mut dyn Connection,
    ) -> Result<Vec<ColumnMeta>> {
        cancel.check()?;
        let rows = conn
            .query(
                cancel,
                COLUMN_SCHEMA_SQL,
                &[Value::from(db_name), Value::from(table_name)],
            )
            .map_err(|e| UndoError::execution(format!("query columns of {table_name}"), e))?;

        let columns = rows
            .iter()
            .map(Self::scan_column)
            .collect::<Result<Vec<_>>>()?;

        if columns.is_empty() {
            return Err(UndoError::NotFound(format!(
                "could not find any column in the table: {table_name}"
            )));
        }
        Ok(columns)
    }

    fn scan_column(row: &Row) -> Result<ColumnMeta> {
        let table = text(row, 1, "TABLE_NAME")?;
        let schema = text(row, 2, "TABLE_SCHEMA")?;
        let column_name = text(row, 3, "COLUMN_NAME")?;
        let data_type = text(row, 4, "DATA_TYPE")?;
        let column_type = opt_text(row, 5, "COLUMN_TYPE")?;
        let column_key = opt_text(row, 6, "COLUMN_KEY")?;
        let is_nullable = opt_text(row, 7, "IS_NULLABLE")?;
        let extra = opt_text(row, 8, "EXTRA")?;

        Ok(ColumnMeta {
            schema,
            table,
            column_name: column_name.trim_matches(|c| c == '`' || c == ' ').to_string(),
            data_type: SqlDataType::from_type_name(&data_type),
            column_type,
            column_key,
            nullable: is_nullable.eq_ignore_ascii_case("yes"),
            auto_increment: extra.to_lowercase().contains("auto_increment"),
            extra,
        })
    }

    fn get_indexes(
        &self,
        cancel: &CancelToken,
        db_name: &str,
        table_name: &str,
        conn: &mut dyn Connection,
    ) -> Result<Vec<IndexMeta>> {
        cancel.check()?;
        let rows = conn
            .query(
                cancel,
                INDEX_SCHEMA_SQL,
                &[Value::from(db_name), Value::from(table_name)],
            )
            .map_err(|e| UndoError::execution(format!("query indexes of {table_name}"), e))?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in &rows {
            let index_name = text(row, 0, "INDEX_NAME")?;
            let column_name = text(row, 1, "COLUMN_NAME")?;
            let non_unique_raw = text(row, 2, "NON_UNIQUE")?;
            let non_unique = non_unique_raw == "1" || non_unique_raw.eq_ignore_ascii_case("yes");

            indexes.push(IndexMeta {
                schema: db_name.to_string(),
                table: table_name.to_string(),
                index_type: IndexType::classify(&index_name, non_unique),
                index_name,
                column_name,
                non_unique,
                columns: Vec::new(),
            });
        }
        Ok(indexes)
    }
}

impl TableMetaLoader for MysqlTableMetaLoader {
    fn db_type(&self) -> DbType {
        DbType::MySql
    }

    fn load_one(
        &self,
        cancel: &CancelToken,
        db_name: &str,
        table_name: &str,
        conn: &mut dyn Connection,
    ) -> Result<TableMeta> {
        let unescaped = del_escape(table_name, DbType::MySql);
        let (schema, table) = match split_qualified(&unescaped) {
            (Some(schema), table) => (schema.to_string(), table.to_string()),
            (None, table) => (db_name.to_string(), table.to_string()),
        };

        let column_metas = self
            .get_columns(cancel, &schema, &table, conn)
            .inspect_err(|e| error!(table = %table, error = %e, "load columns failed"))?;

        let mut columns = IndexMap::with_capacity(column_metas.len());
        let mut column_names = Vec::with_capacity(column_metas.len());
        for column in column_metas {
            column_names.push(column.column_name.clone());
            columns.insert(column.column_name.clone(), column);
        }

        let index_rows = self
            .get_indexes(cancel, &schema, &table, conn)
            .inspect_err(|e| error!(table = %table, error = %e, "load indexes failed"))?;

        // One catalog row per (index, column); merge by index name
        let mut indexes: IndexMap<String, IndexMeta> = IndexMap::new();
        for index in index_rows {
            let column = columns.get(&index.column_name).cloned().ok_or_else(|| {
                UndoError::NotFound(format!(
                    "index {} references unknown column {} in table {table}",
                    index.index_name, index.column_name
                ))
            })?;
            match indexes.get_mut(&index.index_name) {
                Some(existing) => existing.columns.push(column),
                None => {
                    let mut index = index;
                    index.columns.push(column);
                    indexes.insert(index.index_name.clone(), index);
                }
            }
        }

        if indexes.is_empty() {
            return Err(UndoError::NotFound(format!(
                "could not find any index in the table: {table}"
            )));
        }

        debug!(
            table = %table,
            columns = column_names.len(),
            indexes = indexes.len(),
            "loaded table meta"
        );

        Ok(TableMeta {
            table_name: table,
            columns,
            column_names,
            indexes,
        })
    }
}
