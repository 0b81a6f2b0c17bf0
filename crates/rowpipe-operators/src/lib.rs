#![forbid(unsafe_code)]
//! rowpipe-operators: the row-source and predicate contracts every stage
//! speaks, plus the simple stages and expressions built on them.
//!
//! Design intent:
//! - Stages are pull-based: a consumer calls `read` until `NoMoreRows`.
//! - A `RowReader` is driven by one caller at a time; nothing here spawns threads.
//! - Predicates (`ValueExp`) are immutable once bound and may be shared across threads.

pub mod expr;
pub mod traits;
pub mod values;

pub use expr::{parse_predicate, CmpOp, ColumnRef, Comparison, Literal, Param};
pub use traits::{CloseCallback, RowReader, ValueExp};
pub use values::ValuesReader;
