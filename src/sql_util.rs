use crate::types::DbType;

fn escape_char(db_type: DbType) -> char {
    match db_type {
        DbType::MySql | DbType::MariaDb => '`',
        DbType::PostgreSql | DbType::Oracle => '"',
    }
}

/// Strip identifier quoting from a possibly schema-qualified name:
/// "`db`.`t`" becomes "db.t".
pub fn del_escape(name: &str, db_type: DbType) -> String {
    let quote = escape_char(db_type);
    name.split('.')
        .map(|part| part.trim().trim_matches(quote).trim())
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote an identifier, each dot-separated part separately. Already quoted
/// parts are left alone.
pub fn add_escape(name: &str, db_type: DbType) -> String {
    let quote = escape_char(db_type);
    name.split('.')
        .map(|part| {
            if part.len() >= 2 && part.starts_with(quote) && part.ends_with(quote) {
                part.to_string()
            } else {
                format!("{quote}{part}{quote}")
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Split an unescaped name into (schema, table). The schema is `None` when
/// the name is not qualified.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((schema, table)) if !schema.is_empty() => (Some(schema), table),
        _ => (None, name),
    }
}

/// "(?,?,?)" for `size` placeholders.
pub fn placeholders(size: usize) -> String {
    let marks = vec!["?"; size];
    format!("({})", marks.join(","))
}
