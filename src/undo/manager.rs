use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::{UndoConfig, COMPRESSOR_NONE};
use crate::conn::{CancelToken, Connection};
use crate::error::{Result, UndoError};
use crate::meta::{TableMetaCache, TableMetaSource};
use crate::types::DbType;

use super::context::{self, decode_map};
use super::executor::UndoExecutorRegistry;
use super::parser::UndoLogParserRegistry;
use super::store::{UndoLogRecord, UndoLogStore};
use super::{BranchUndoLog, UndoLogStatus};

/// How a rollback attempt ended inside its local transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UndoOutcome {
    /// An undo row was not in `Normal` status; nothing was compensated.
    Skipped(UndoLogStatus),
    /// `rows` undo rows were found and `entries` compensations applied.
    Applied { rows: usize, entries: usize },
}

/// Rolls back branch transactions from their persisted undo logs.
///
/// Holds the collaborators a rollback needs: the undo log store, a table
/// metadata source, the undo executor registry and the payload parsers.
/// One `run_undo` call borrows the connection exclusively and hosts every
/// compensation plus the undo row deletion in a single local transaction.
pub struct UndoLogManager {
    db_type: DbType,
    config: UndoConfig,
    store: UndoLogStore,
    table_meta: Arc<dyn TableMetaSource>,
    executors: UndoExecutorRegistry,
    parsers: UndoLogParserRegistry,
}

impl UndoLogManager {
    pub fn new(
        db_type: DbType,
        config: UndoConfig,
        table_meta: Arc<dyn TableMetaSource>,
        executors: UndoExecutorRegistry,
        parsers: UndoLogParserRegistry,
    ) -> Self {
        UndoLogManager {
            db_type,
            store: UndoLogStore::new(config.undo_log_table.clone()),
            config,
            table_meta,
            executors,
            parsers,
        }
    }

    /// Manager for MySQL: catalog-backed table meta cache, MySQL undo
    /// executors and the JSON parser. Fails if `config` names no schema.
    pub fn mysql(config: UndoConfig) -> Result<Self> {
        config.validate()?;
        let table_meta = Arc::new(TableMetaCache::mysql(config.db_name.clone()));
        Ok(Self::new(
            DbType::MySql,
            config,
            table_meta,
            UndoExecutorRegistry::mysql(),
            UndoLogParserRegistry::default(),
        ))
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn config(&self) -> &UndoConfig {
        &self.config
    }

    pub fn store(&self) -> &UndoLogStore {
        &self.store
    }

    pub fn delete_undo_log(
        &self,
        cancel: &CancelToken,
        xid: &str,
        branch_id: i64,
        conn: &mut dyn Connection,
    ) -> Result<()> {
        self.store.delete_undo_log(cancel, xid, branch_id, conn)
    }

    pub fn batch_delete_undo_log(
        &self,
        cancel: &CancelToken,
        xids: &[String],
        branch_ids: &[i64],
        conn: &mut dyn Connection,
    ) -> Result<()> {
        self.store
            .batch_delete_undo_log(cancel, xids, branch_ids, conn)
    }

    /// `run_undo` for this manager's own engine.
    pub fn undo(
        &self,
        cancel: &CancelToken,
        xid: &str,
        branch_id: i64,
        conn: &mut dyn Connection,
    ) -> Result<()> {
        self.run_undo(cancel, self.db_type, xid, branch_id, conn)
    }

    /// Compensate branch (xid, branch_id) and retire its undo rows.
    ///
    /// The undo rows are read `FOR UPDATE`, so concurrent attempts on the
    /// same branch serialize on the row lock. If any row is not in `Normal`
    /// status the whole attempt is a no-op: the local transaction is rolled
    /// back and `Ok(())` returned. Any other failure rolls the local
    /// transaction back and is returned; a failing rollback is only logged.
    pub fn run_undo(
        &self,
        cancel: &CancelToken,
        db_type: DbType,
        xid: &str,
        branch_id: i64,
        conn: &mut dyn Connection,
    ) -> Result<()> {
        cancel.check()?;
        conn.begin(cancel).map_err(|e| {
            error!(xid, branch_id, error = %e, "begin undo transaction failed");
            UndoError::execution("begin undo transaction", e)
        })?;

        let outcome = match self.undo_in_tx(cancel, db_type, xid, branch_id, conn) {
            Ok(outcome) => outcome,
            Err(err) => {
                Self::abort(cancel, xid, branch_id, conn);
                return Err(err);
            }
        };

        match outcome {
            UndoOutcome::Skipped(status) => {
                info!(
                    xid,
                    branch_id,
                    status = status.code(),
                    "undo log is not in normal status, skip rollback"
                );
                // Nothing was written; just release the row lock
                if let Err(e) = conn.rollback(cancel) {
                    warn!(xid, branch_id, error = %e, "release undo log lock failed");
                }
                Ok(())
            }
            UndoOutcome::Applied { rows, entries } => {
                let committed = cancel.check().and_then(|_| {
                    conn.commit(cancel)
                        .map_err(|e| UndoError::execution("commit undo transaction", e))
                });
                if let Err(err) = committed {
                    error!(xid, branch_id, error = %err, "commit undo transaction failed");
                    Self::abort(cancel, xid, branch_id, conn);
                    return Err(err);
                }
                info!(xid, branch_id, rows, entries, "branch rolled back");
                Ok(())
            }
        }
    }

    fn undo_in_tx(
        &self,
        cancel: &CancelToken,
        db_type: DbType,
        xid: &str,
        branch_id: i64,
        conn: &mut dyn Connection,
    ) -> Result<UndoOutcome> {
        let records = self.store.select_for_update(cancel, xid, branch_id, conn)?;

        let mut branch_logs = Vec::with_capacity(records.len());
        for record in &records {
            if !record.log_status.can_undo() {
                return Ok(UndoOutcome::Skipped(record.log_status));
            }
            let branch_log = self.decode_record(record).inspect_err(|e| {
                error!(xid, branch_id, error = %e, "decode undo log failed");
            })?;
            branch_logs.push(branch_log);
        }

        let mut entries = 0;
        for mut branch_log in branch_logs {
            // Statements were logged oldest first; compensate newest first
            let undo_logs = &mut branch_log.sql_undo_logs;
            if undo_logs.len() > 1 {
                undo_logs.reverse();
            }

            for undo_log in undo_logs.iter_mut() {
                cancel.check()?;

                let meta = self
                    .table_meta
                    .table_meta(cancel, &undo_log.table_name, conn)
                    .map_err(|e| match e {
                        UndoError::NotFound(msg) => UndoError::Resolution(msg),
                        other => other,
                    })
                    .inspect_err(|e| {
                        error!(xid, branch_id, table = %undo_log.table_name, error = %e, "get table meta failed");
                    })?;
                undo_log.set_table_meta(meta);

                let executor = self
                    .executors
                    .resolve(db_type, undo_log.sql_type)
                    .inspect_err(|e| {
                        error!(xid, branch_id, error = %e, "get undo executor failed");
                    })?;

                executor
                    .execute_on(cancel, db_type, undo_log, conn)
                    .inspect_err(|e| {
                        error!(xid, branch_id, table = %undo_log.table_name, error = %e, "execute undo failed");
                    })?;
                entries += 1;
            }
        }

        if !records.is_empty() {
            self.store.delete_undo_log(cancel, xid, branch_id, conn)?;
        }

        Ok(UndoOutcome::Applied {
            rows: records.len(),
            entries,
        })
    }

    /// Decode a row's `rollback_info` with the parser named in its context,
    /// falling back to the configured default serializer.
    pub fn decode_record(&self, record: &UndoLogRecord) -> Result<BranchUndoLog> {
        let context = decode_map(&record.context);
        let serializer = context::serializer(&context).unwrap_or(self.config.default_serializer.as_str());
        let payload = self.rollback_info(&record.rollback_info, self.compressor(&context));

        let parser = self.parsers.get(serializer)?;
        debug!(serializer = parser.name(), bytes = payload.len(), "decode undo log");
        parser.decode(payload)
    }

    // The row's context wins; otherwise the configured compressor applies.
    fn compressor<'a>(&'a self, context: &'a HashMap<String, String>) -> &'a str {
        context::compressor_type(context).unwrap_or(if self.config.compress_enabled {
            self.config.compress_type.as_str()
        } else {
            COMPRESSOR_NONE
        })
    }

    // Compression is reserved: payloads are stored uncompressed for now.
    fn rollback_info<'a>(&self, data: &'a [u8], compressor: &str) -> &'a [u8] {
        if !compressor.eq_ignore_ascii_case(COMPRESSOR_NONE) {
            warn!(compressor, "undo log compression is not supported, using payload as stored");
        }
        data
    }

    fn abort(cancel: &CancelToken, xid: &str, branch_id: i64, conn: &mut dyn Connection) {
        if let Err(e) = conn.rollback(cancel) {
            error!(xid, branch_id, error = %e, "rollback undo transaction failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::test_support::{column_row, index_row, MemoryConnection};
    use crate::types::SqlType;
    use crate::undo::executor::UndoExecutor;
    use crate::undo::parser::{JsonUndoLogParser, UndoLogParser};
    use crate::undo::{Field, KeyType, RowImage, SqlUndoLog, TableImage};
    use crate::value::Value;

    const XID: &str = "10.0.0.1:8091:2001";
    const BRANCH: i64 = 3001;
    const NORMAL: i64 = 0;
    const GLOBAL_FINISHED: i64 = 1;

    type Calls = Arc<Mutex<Vec<(SqlType, String)>>>;

    struct RecordingExecutor {
        calls: Calls,
    }

    impl UndoExecutor for RecordingExecutor {
        fn execute_on(
            &self,
            _cancel: &CancelToken,
            _db_type: DbType,
            undo_log: &SqlUndoLog,
            _conn: &mut dyn Connection,
        ) -> Result<()> {
            assert!(undo_log.table_meta().is_some(), "table meta attached before execute");
            self.calls
                .lock()
                .unwrap()
                .push((undo_log.sql_type, undo_log.table_name.clone()));
            Ok(())
        }
    }

    fn recording_registry(calls: &Calls) -> UndoExecutorRegistry {
        let mut registry = UndoExecutorRegistry::empty();
        for sql_type in [SqlType::Insert, SqlType::Update, SqlType::Delete] {
            registry.register(
                DbType::MySql,
                sql_type,
                Box::new(RecordingExecutor {
                    calls: Arc::clone(calls),
                }),
            );
        }
        registry
    }

    fn manager_with(executors: UndoExecutorRegistry) -> UndoLogManager {
        let config = UndoConfig::default().with_db_name("shop");
        UndoLogManager::new(
            DbType::MySql,
            config,
            Arc::new(TableMetaCache::mysql("shop")),
            executors,
            UndoLogParserRegistry::default(),
        )
    }

    fn recording_manager() -> (UndoLogManager, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        (manager_with(recording_registry(&calls)), calls)
    }

    fn shop_conn(tables: &[&str]) -> MemoryConnection {
        let mut conn = MemoryConnection::new();
        for table in tables {
            conn.add_table(
                "shop",
                table,
                vec![
                    column_row("shop", table, "id", "bigint", "PRI", "NO", ""),
                    column_row("shop", table, "name", "varchar", "", "YES", ""),
                ],
                vec![index_row("PRIMARY", "id", "0")],
            );
        }
        conn
    }

    fn payload(entries: &[(SqlType, &str)]) -> Vec<u8> {
        let log = BranchUndoLog {
            xid: XID.to_string(),
            branch_id: BRANCH,
            sql_undo_logs: entries
                .iter()
                .map(|(sql_type, table)| SqlUndoLog::new(*sql_type, *table))
                .collect(),
        };
        JsonUndoLogParser.encode(&log).unwrap()
    }

    fn calls_of(calls: &Calls) -> Vec<(SqlType, String)> {
        calls.lock().unwrap().clone()
    }

    #[test]
    fn test_replays_entries_in_reverse_order() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&["t1", "t2", "t3"]);
        conn.insert_undo_row(
            XID,
            BRANCH,
            NORMAL,
            "serializer=json",
            payload(&[
                (SqlType::Insert, "t1"),
                (SqlType::Update, "t2"),
                (SqlType::Delete, "t3"),
            ]),
        );

        manager
            .run_undo(&CancelToken::new(), DbType::MySql, XID, BRANCH, &mut conn)
            .unwrap();

        assert_eq!(
            calls_of(&calls),
            vec![
                (SqlType::Delete, "t3".to_string()),
                (SqlType::Update, "t2".to_string()),
                (SqlType::Insert, "t1".to_string()),
            ]
        );
        assert_eq!(conn.undo_row_count(XID, BRANCH), 0);
    }

    #[test]
    fn test_single_entry_order_unchanged() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "", payload(&[(SqlType::Insert, "t1")]));

        manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap();

        assert_eq!(calls_of(&calls), vec![(SqlType::Insert, "t1".to_string())]);
    }

    #[test]
    fn test_rows_replayed_in_arrival_order() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&["t1", "t2", "t3"]);
        conn.insert_undo_row(
            XID,
            BRANCH,
            NORMAL,
            "serializer=json",
            payload(&[(SqlType::Insert, "t1"), (SqlType::Update, "t2")]),
        );
        conn.insert_undo_row(XID, BRANCH, NORMAL, "serializer=json", payload(&[(SqlType::Delete, "t3")]));

        manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap();

        let tables: Vec<String> = calls_of(&calls).into_iter().map(|(_, t)| t).collect();
        assert_eq!(tables, vec!["t2", "t1", "t3"]);
        assert_eq!(conn.undo_row_count(XID, BRANCH), 0);
        assert_eq!(conn.commits(), 1);
    }

    // Documents the early return on a finished branch: no compensation, the
    // row is kept and the local transaction is rolled back.
    #[test]
    fn test_global_finished_is_skipped() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(
            XID,
            BRANCH,
            GLOBAL_FINISHED,
            "serializer=json",
            payload(&[(SqlType::Update, "t1")]),
        );

        manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap();

        assert!(calls_of(&calls).is_empty());
        assert_eq!(conn.undo_row_count(XID, BRANCH), 1);
        assert!(conn.executed().is_empty());
        assert_eq!(conn.commits(), 0);
        assert_eq!(conn.rollbacks(), 1);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_finished_row_after_normal_row_skips_everything() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "", payload(&[(SqlType::Update, "t1")]));
        conn.insert_undo_row(XID, BRANCH, GLOBAL_FINISHED, "", payload(&[(SqlType::Update, "t1")]));

        manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap();

        assert!(calls_of(&calls).is_empty());
        assert_eq!(conn.undo_row_count(XID, BRANCH), 2);
    }

    #[test]
    fn test_end_to_end_update_compensation() {
        let manager = manager_with(UndoExecutorRegistry::mysql());
        let mut conn = shop_conn(&["t1"]);

        let mut entry = SqlUndoLog::new(SqlType::Update, "t1");
        let row = |name: &str| RowImage {
            fields: vec![
                Field {
                    name: "id".to_string(),
                    key_type: KeyType::PrimaryKey,
                    value: Value::Int(1),
                },
                Field {
                    name: "name".to_string(),
                    key_type: KeyType::Null,
                    value: Value::from(name),
                },
            ],
        };
        entry.before_image = TableImage {
            table_name: "t1".to_string(),
            rows: vec![row("before")],
        };
        entry.after_image = TableImage {
            table_name: "t1".to_string(),
            rows: vec![row("after")],
        };
        let log = BranchUndoLog {
            xid: XID.to_string(),
            branch_id: BRANCH,
            sql_undo_logs: vec![entry],
        };
        let info = JsonUndoLogParser.encode(&log).unwrap();
        conn.insert_undo_row(XID, BRANCH, NORMAL, "serializer=json", info);

        manager
            .run_undo(&CancelToken::new(), DbType::MySql, XID, BRANCH, &mut conn)
            .unwrap();

        assert_eq!(conn.catalog_queries(), 2);
        let compensations = conn.compensations();
        assert_eq!(compensations.len(), 1);
        assert_eq!(
            compensations[0].0,
            "UPDATE `t1` SET `name` = ? WHERE `id` = ?"
        );
        assert_eq!(compensations[0].1, vec![Value::from("before"), Value::Int(1)]);
        assert_eq!(conn.undo_row_count(XID, BRANCH), 0);
        assert_eq!(conn.commits(), 1);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_no_undo_row_commits_empty_transaction() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);

        manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap();

        assert!(calls_of(&calls).is_empty());
        assert!(conn.executed().is_empty());
        assert_eq!(conn.commits(), 1);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_decode_failure_rolls_back() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "serializer=json", b"not json".to_vec());

        let err = manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap_err();

        assert!(matches!(err, UndoError::Decode(_)));
        assert!(calls_of(&calls).is_empty());
        assert_eq!(conn.undo_row_count(XID, BRANCH), 1);
        assert_eq!(conn.rollbacks(), 1);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_executor_failure_rolls_back_and_keeps_row() {
        let manager = manager_with(UndoExecutorRegistry::mysql());
        let mut conn = shop_conn(&["t1"]);
        let mut entry = SqlUndoLog::new(SqlType::Insert, "t1");
        entry.after_image.rows.push(RowImage {
            fields: vec![Field {
                name: "id".to_string(),
                key_type: KeyType::PrimaryKey,
                value: Value::Int(9),
            }],
        });
        let log = BranchUndoLog {
            sql_undo_logs: vec![entry],
            ..BranchUndoLog::default()
        };
        conn.insert_undo_row(XID, BRANCH, NORMAL, "", JsonUndoLogParser.encode(&log).unwrap());
        conn.fail_on("DELETE FROM `t1`");

        let err = manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap_err();

        assert!(matches!(err, UndoError::Execution { .. }));
        assert_eq!(conn.undo_row_count(XID, BRANCH), 1);
        assert_eq!(conn.rollbacks(), 1);
        assert_eq!(conn.commits(), 0);
    }

    #[test]
    fn test_missing_executor_is_resolution_error() {
        let manager = manager_with(UndoExecutorRegistry::empty());
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "", payload(&[(SqlType::Update, "t1")]));

        let err = manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap_err();

        assert!(matches!(err, UndoError::Resolution(_)));
        assert_eq!(conn.rollbacks(), 1);
    }

    #[test]
    fn test_missing_table_is_resolution_error() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&[]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "", payload(&[(SqlType::Update, "ghost")]));

        let err = manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap_err();

        assert!(matches!(err, UndoError::Resolution(_)));
        assert!(calls_of(&calls).is_empty());
        assert_eq!(conn.undo_row_count(XID, BRANCH), 1);
    }

    #[test]
    fn test_unknown_serializer_is_resolution_error() {
        let (manager, _calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "serializer=kryo", payload(&[(SqlType::Update, "t1")]));

        let err = manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap_err();
        assert!(matches!(err, UndoError::Resolution(_)));
    }

    #[test]
    fn test_compressor_in_context_is_passed_through() {
        let (manager, calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(
            XID,
            BRANCH,
            NORMAL,
            "serializer=json&compressorType=GZIP",
            payload(&[(SqlType::Update, "t1")]),
        );

        manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap();
        assert_eq!(calls_of(&calls).len(), 1);
    }

    #[test]
    fn test_compressor_falls_back_to_config() {
        let mut config = UndoConfig::default().with_db_name("shop");
        config.compress_enabled = true;
        config.compress_type = "GZIP".to_string();
        let manager = UndoLogManager::new(
            DbType::MySql,
            config,
            Arc::new(TableMetaCache::mysql("shop")),
            UndoExecutorRegistry::empty(),
            UndoLogParserRegistry::default(),
        );

        assert_eq!(manager.compressor(&decode_map("serializer=json")), "GZIP");
        assert_eq!(manager.compressor(&decode_map("compressorType=NONE")), "NONE");

        let (plain, _calls) = recording_manager();
        assert_eq!(plain.compressor(&decode_map("")), COMPRESSOR_NONE);

        // payload still decodes as stored
        let record = UndoLogRecord {
            log_status: UndoLogStatus::Normal,
            context: String::new(),
            rollback_info: payload(&[(SqlType::Insert, "t1")]),
        };
        assert_eq!(manager.decode_record(&record).unwrap().sql_undo_logs.len(), 1);
    }

    struct CancellingExecutor {
        cancel: CancelToken,
        calls: Calls,
    }

    impl UndoExecutor for CancellingExecutor {
        fn execute_on(
            &self,
            _cancel: &CancelToken,
            _db_type: DbType,
            undo_log: &SqlUndoLog,
            _conn: &mut dyn Connection,
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((undo_log.sql_type, undo_log.table_name.clone()));
            self.cancel.cancel();
            Ok(())
        }
    }

    #[test]
    fn test_cancel_during_replay_stops_remaining_entries() {
        let cancel = CancelToken::new();
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let mut registry = UndoExecutorRegistry::empty();
        registry.register(
            DbType::MySql,
            SqlType::Update,
            Box::new(CancellingExecutor {
                cancel: cancel.clone(),
                calls: Arc::clone(&calls),
            }),
        );
        let manager = manager_with(registry);
        let mut conn = shop_conn(&["t1", "t2"]);
        conn.insert_undo_row(
            XID,
            BRANCH,
            NORMAL,
            "",
            payload(&[(SqlType::Update, "t1"), (SqlType::Update, "t2")]),
        );

        let err = manager.undo(&cancel, XID, BRANCH, &mut conn).unwrap_err();

        assert!(matches!(err, UndoError::Cancelled));
        // newest entry ran, the older one never did
        assert_eq!(calls_of(&calls), vec![(SqlType::Update, "t2".to_string())]);
        assert_eq!(conn.undo_row_count(XID, BRANCH), 1);
        assert_eq!(conn.rollbacks(), 1);
        assert_eq!(conn.commits(), 0);
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_failed_rollback_is_logged_not_raised() {
        let (manager, _calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "", b"{".to_vec());
        conn.fail_rollback();

        let err = manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap_err();

        // the original fault is returned, not the rollback failure
        assert!(matches!(err, UndoError::Decode(_)));
    }

    #[test]
    fn test_commit_failure_is_returned() {
        let (manager, _calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "", payload(&[(SqlType::Update, "t1")]));
        conn.fail_commit();

        let err = manager.undo(&CancelToken::new(), XID, BRANCH, &mut conn).unwrap_err();

        assert!(matches!(err, UndoError::Execution { .. }));
        assert_eq!(conn.rollbacks(), 1);
        assert_eq!(conn.undo_row_count(XID, BRANCH), 1);
    }

    #[test]
    fn test_cancelled_before_start_touches_nothing() {
        let (manager, _calls) = recording_manager();
        let mut conn = shop_conn(&["t1"]);
        conn.insert_undo_row(XID, BRANCH, NORMAL, "", payload(&[(SqlType::Update, "t1")]));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = manager.undo(&cancel, XID, BRANCH, &mut conn).unwrap_err();

        assert!(matches!(err, UndoError::Cancelled));
        assert!(conn.queries().is_empty());
        assert_eq!(conn.commits() + conn.rollbacks(), 0);
    }

    #[test]
    fn test_mysql_manager_reports_engine() {
        let manager = UndoLogManager::mysql(UndoConfig::default().with_db_name("shop")).unwrap();
        assert_eq!(manager.db_type(), DbType::MySql);
        assert_eq!(manager.store().table(), "undo_log");
    }

    #[test]
    fn test_mysql_manager_requires_db_name() {
        assert!(matches!(
            UndoLogManager::mysql(UndoConfig::default()),
            Err(UndoError::Config(_))
        ));
    }
}
