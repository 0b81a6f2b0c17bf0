//! Logical column types and descriptors. Pure data.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlValueType {
    Boolean,
    Integer,
    Float,
    Varchar,
    Blob,
    /// Type not yet known (e.g. an untyped NULL literal).
    Any,
}

impl fmt::Display for SqlValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SqlValueType::Boolean => "BOOLEAN",
            SqlValueType::Integer => "INTEGER",
            SqlValueType::Float => "FLOAT",
            SqlValueType::Varchar => "VARCHAR",
            SqlValueType::Blob => "BLOB",
            SqlValueType::Any => "ANY",
        };
        f.write_str(s)
    }
}

/// Parameter name → inferred type.
pub type ParamTypes = HashMap<String, SqlValueType>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColDescriptor {
    pub table: String,
    pub column: String,
    pub value_type: SqlValueType,
}

impl ColDescriptor {
    pub fn new(table: impl Into<String>, column: impl Into<String>, value_type: SqlValueType) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            value_type,
        }
    }

    /// Fully qualified `table.column` key used to resolve selectors.
    pub fn selector(&self) -> String {
        encode_selector(&self.table, &self.column)
    }
}

pub fn encode_selector(table: &str, column: &str) -> String {
    format!("{}.{}", table, column)
}

/// Index/range hints the storage layer used to produce rows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanSpecs {
    pub index: String,
    pub desc_order: bool,
}
