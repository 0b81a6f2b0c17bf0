//! Typed values and rows.
//!
//! `Value::Null` carries the type it stands in for, which is what lets a
//! predicate distinguish "unknown boolean" from "not a boolean at all".

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::schema::{encode_selector, ColDescriptor, SqlValueType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null(SqlValueType),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Varchar(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn value_type(&self) -> SqlValueType {
        match self {
            Value::Null(t) => *t,
            Value::Bool(_) => SqlValueType::Boolean,
            Value::Integer(_) => SqlValueType::Integer,
            Value::Float(_) => SqlValueType::Float,
            Value::Varchar(_) => SqlValueType::Varchar,
            Value::Blob(_) => SqlValueType::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// Compare two non-null values of compatible types.
    ///
    /// Integers and floats compare numerically; any other mix is `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        match (self, other) {
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Varchar(a), Varchar(b)) => Some(a.cmp(b)),
            (Blob(a), Blob(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Runtime parameter values, keyed by name (without the `@`).
pub type Params = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub values_by_position: Vec<Value>,
    pub values_by_selector: HashMap<String, Value>,
}

impl Row {
    /// Build a row addressable by both position and `table.column` selector.
    pub fn new(cols: &[ColDescriptor], values: Vec<Value>) -> Self {
        let values_by_selector = cols
            .iter()
            .zip(values.iter())
            .map(|(c, v)| (c.selector(), v.clone()))
            .collect();
        Self {
            values_by_position: values,
            values_by_selector,
        }
    }

    pub fn len(&self) -> usize {
        self.values_by_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values_by_position.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Value> {
        self.values_by_position.get(pos)
    }

    pub fn by_selector(&self, table: &str, column: &str) -> Option<&Value> {
        self.values_by_selector.get(&encode_selector(table, column))
    }
}
