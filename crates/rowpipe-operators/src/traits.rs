//! Row-source and predicate contracts.
//!
//! Every stage of a query pipeline (scan, filter, projection, join, ...)
//! implements `RowReader`, so stages compose by wrapping a boxed upstream.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rowpipe_core::prelude::*;

/// Invoked once after the reader that owns it is closed.
pub type CloseCallback = Box<dyn FnOnce() + Send + 'static>;

/// Sequential provider of rows.
///
/// Invariants:
/// - `read` is never invoked concurrently; implementations need not be
///   re-entrant.
/// - `read` fails with `Error::NoMoreRows` once exhausted.
/// - Metadata accessors describe the rows `read` produces and do not change
///   while reading.
pub trait RowReader: Send {
    /// Transaction the rows are read under, if any.
    fn tx(&self) -> Option<Arc<TxContext>>;

    fn table_alias(&self) -> String;

    fn parameters(&self) -> Arc<Params>;

    /// Declared output ordering; empty when rows are unordered.
    fn order_by(&self) -> Vec<ColDescriptor>;

    fn scan_specs(&self) -> Option<ScanSpecs>;

    fn columns(&self, ctx: &CancellationToken) -> Result<Vec<ColDescriptor>>;

    /// Column descriptors keyed by `table.column` selector.
    fn cols_by_selector(&self, ctx: &CancellationToken) -> Result<HashMap<String, ColDescriptor>> {
        Ok(self
            .columns(ctx)?
            .into_iter()
            .map(|c| (c.selector(), c))
            .collect())
    }

    /// Record the types this stage requires of runtime parameters.
    fn infer_parameters(&self, ctx: &CancellationToken, params: &mut ParamTypes) -> Result<()>;

    fn read(&mut self, ctx: &CancellationToken) -> Result<Row>;

    fn close(&mut self) -> Result<()>;

    fn on_close(&mut self, callback: CloseCallback);
}

/// Expression evaluated against rows.
///
/// `reduce` may run on many threads at once against different rows, so
/// implementations must not mutate shared state.
pub trait ValueExp: Send + Sync + fmt::Display + fmt::Debug {
    /// Resulting type given the visible columns. Parameter types may be
    /// recorded into `params` as a side effect.
    fn infer_type(
        &self,
        cols: &HashMap<String, ColDescriptor>,
        params: &mut ParamTypes,
        implicit_table: &str,
    ) -> Result<SqlValueType>;

    /// Fail unless this expression can produce a value of type `t`.
    fn requires_type(
        &self,
        t: SqlValueType,
        cols: &HashMap<String, ColDescriptor>,
        params: &mut ParamTypes,
        implicit_table: &str,
    ) -> Result<()>;

    /// Bind parameter values. Pure: returns a new expression.
    fn substitute(&self, params: &Params) -> Result<Arc<dyn ValueExp>>;

    fn reduce(&self, tx: Option<&TxContext>, row: &Row, implicit_table: &str) -> Result<Value>;
}
