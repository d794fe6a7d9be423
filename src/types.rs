use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    MySql,
    PostgreSql,
    Oracle,
    MariaDb,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbType::MySql => "mysql",
            DbType::PostgreSql => "postgresql",
            DbType::Oracle => "oracle",
            DbType::MariaDb => "mariadb",
        };
        write!(f, "{name}")
    }
}

/// Kind of the original data-modifying statement an undo entry compensates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Insert => "INSERT",
            SqlType::Update => "UPDATE",
            SqlType::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

/// Engine-agnostic column type, normalized from the catalog's `DATA_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDataType {
    Bit,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Numeric,
    Char,
    Varchar,
    LongVarchar,
    Date,
    Time,
    Timestamp,
    Binary,
    VarBinary,
    LongVarBinary,
    Json,
    Other,
}

impl SqlDataType {
    pub fn from_type_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "bit" => SqlDataType::Bit,
            "bool" | "boolean" => SqlDataType::Boolean,
            "tinyint" => SqlDataType::TinyInt,
            "smallint" => SqlDataType::SmallInt,
            "int" | "integer" | "mediumint" => SqlDataType::Integer,
            "bigint" => SqlDataType::BigInt,
            "float" | "real" => SqlDataType::Real,
            "double" | "double precision" => SqlDataType::Double,
            "decimal" => SqlDataType::Decimal,
            "numeric" => SqlDataType::Numeric,
            "char" | "enum" | "set" => SqlDataType::Char,
            "varchar" => SqlDataType::Varchar,
            "text" | "tinytext" | "mediumtext" | "longtext" => SqlDataType::LongVarchar,
            "date" | "year" => SqlDataType::Date,
            "time" => SqlDataType::Time,
            "datetime" | "timestamp" => SqlDataType::Timestamp,
            "binary" => SqlDataType::Binary,
            "varbinary" => SqlDataType::VarBinary,
            "blob" | "tinyblob" | "mediumblob" | "longblob" => SqlDataType::LongVarBinary,
            "json" => SqlDataType::Json,
            _ => SqlDataType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Primary,
    Unique,
    Normal,
}

impl IndexType {
    pub fn classify(index_name: &str, non_unique: bool) -> Self {
        if index_name.eq_ignore_ascii_case("primary") {
            IndexType::Primary
        } else if !non_unique {
            IndexType::Unique
        } else {
            IndexType::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub schema: String,
    pub table: String,
    pub column_name: String,
    pub data_type: SqlDataType,
    pub column_type: String,
    pub column_key: String,
    pub nullable: bool,
    pub extra: String,
    pub auto_increment: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMeta {
    pub schema: String,
    pub table: String,
    pub index_name: String,
    pub column_name: String, // first column of the index
    pub non_unique: bool,
    pub index_type: IndexType,
    pub columns: Vec<ColumnMeta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableMeta {
    pub table_name: String,
    pub columns: IndexMap<String, ColumnMeta>,
    pub column_names: Vec<String>, // catalog order
    pub indexes: IndexMap<String, IndexMeta>,
}

impl TableMeta {
    pub fn get_column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.get(name)
    }

    pub fn primary_index(&self) -> Option<&IndexMeta> {
        self.indexes
            .values()
            .find(|idx| idx.index_type == IndexType::Primary)
    }

    /// Primary key column names in index order, empty when the table has no
    /// primary index.
    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_index()
            .map(|idx| idx.columns.iter().map(|c| c.column_name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_index().is_some_and(|idx| {
            idx.columns
                .iter()
                .any(|c| c.column_name.eq_ignore_ascii_case(column))
        })
    }
}
