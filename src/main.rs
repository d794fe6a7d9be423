use std::env;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use branch_undo::undo::{
    BranchUndoLog, UndoExecutorRegistry, UndoLogParserRegistry, UndoLogRecord, UndoLogStatus,
};
use branch_undo::{DbType, SqlType, TableMetaCache, UndoConfig, UndoLogManager};

// Decodes a persisted rollback_info payload and prints the order in which
// rollback would compensate its entries.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(path) = args.first() else {
        bail!("usage: branch-undo <rollback_info file> [context]");
    };
    let context = args.get(1).map(String::as_str).unwrap_or("");

    let log = load(Path::new(path), context, UndoConfig::from_env())?;
    info!(xid = %log.xid, branch_id = log.branch_id, entries = log.sql_undo_logs.len(), "decoded undo log");
    print!("{}", describe(&log));
    Ok(())
}

fn load(path: &Path, context: &str, config: UndoConfig) -> Result<BranchUndoLog> {
    let rollback_info = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let record = UndoLogRecord {
        log_status: UndoLogStatus::Normal,
        context: context.to_string(),
        rollback_info,
    };
    // Decoding never reads the catalog, so no schema is required here
    let table_meta = Arc::new(TableMetaCache::mysql(config.db_name.clone()));
    let manager = UndoLogManager::new(
        DbType::MySql,
        config,
        table_meta,
        UndoExecutorRegistry::mysql(),
        UndoLogParserRegistry::default(),
    );
    Ok(manager.decode_record(&record)?)
}

fn describe(log: &BranchUndoLog) -> String {
    let mut out = format!("xid={} branch_id={}\n", log.xid, log.branch_id);

    for (step, entry) in log.sql_undo_logs.iter().rev().enumerate() {
        let compensation = match entry.sql_type {
            SqlType::Insert => "DELETE",
            SqlType::Update => "UPDATE",
            SqlType::Delete => "INSERT",
        };
        out.push_str(&format!(
            "{}. {compensation} {} (undo of {}, before={} rows, after={} rows)\n",
            step + 1,
            entry.table_name,
            entry.sql_type,
            entry.before_image.rows.len(),
            entry.after_image.rows.len(),
        ));
    }
    out
}
