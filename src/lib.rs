#![forbid(unsafe_code)]
//! rowpipe: pull-based row readers with a concurrent filter stage.
//!
//! Re-exports the pieces most callers need so integration tests and benches
//! can use a single import path.

pub use rowpipe_core::prelude;
pub use rowpipe_exec::{ConditionalRowReader, FilterStatsSnapshot, LifecycleState};
pub use rowpipe_operators::{parse_predicate, RowReader, ValueExp, ValuesReader};
