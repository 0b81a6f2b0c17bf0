//! Shared fixtures for the filter stage tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rowpipe::prelude::*;
use rowpipe_operators::{CloseCallback, RowReader, ValueExp, ValuesReader};

pub fn int_cols() -> Vec<ColDescriptor> {
    vec![ColDescriptor::new("t1", "val", SqlValueType::Integer)]
}

/// `t1.val` = 0..n in order.
pub fn int_reader(n: i64) -> ValuesReader {
    ValuesReader::new(
        "t1",
        int_cols(),
        (0..n).map(|i| vec![Value::Integer(i)]).collect(),
    )
}

pub fn row_val(row: &Row) -> i64 {
    match row.get(0) {
        Some(Value::Integer(v)) => *v,
        other => panic!("expected integer row, got {:?}", other),
    }
}

/// Read until the first error; returns the delivered values and that error.
pub fn drain(reader: &mut dyn RowReader, ctx: &CancellationToken) -> (Vec<i64>, Error) {
    let mut out = Vec::new();
    loop {
        match reader.read(ctx) {
            Ok(row) => out.push(row_val(&row)),
            Err(e) => return (out, e),
        }
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

type PredicateFn = dyn Fn(&Row) -> Result<Value> + Send + Sync;

/// Predicate backed by a closure over the row.
#[derive(Clone)]
pub struct FnPredicate {
    name: &'static str,
    f: Arc<PredicateFn>,
}

impl FnPredicate {
    pub fn new(
        name: &'static str,
        f: impl Fn(&Row) -> Result<Value> + Send + Sync + 'static,
    ) -> Arc<dyn ValueExp> {
        Arc::new(Self {
            name,
            f: Arc::new(f),
        })
    }

    /// Boolean predicate over `t1.val`.
    pub fn on_val(
        name: &'static str,
        f: impl Fn(i64) -> bool + Send + Sync + 'static,
    ) -> Arc<dyn ValueExp> {
        Self::new(name, move |row| Ok(Value::Bool(f(row_val(row)))))
    }
}

impl fmt::Debug for FnPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnPredicate({})", self.name)
    }
}

impl fmt::Display for FnPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl ValueExp for FnPredicate {
    fn infer_type(
        &self,
        _cols: &HashMap<String, ColDescriptor>,
        _params: &mut ParamTypes,
        _implicit_table: &str,
    ) -> Result<SqlValueType> {
        Ok(SqlValueType::Boolean)
    }

    fn requires_type(
        &self,
        t: SqlValueType,
        _cols: &HashMap<String, ColDescriptor>,
        _params: &mut ParamTypes,
        _implicit_table: &str,
    ) -> Result<()> {
        if t != SqlValueType::Boolean {
            return Err(Error::TypeMismatch {
                expected: t,
                found: SqlValueType::Boolean,
            });
        }
        Ok(())
    }

    fn substitute(&self, _params: &Params) -> Result<Arc<dyn ValueExp>> {
        Ok(Arc::new(self.clone()))
    }

    fn reduce(&self, _tx: Option<&TxContext>, row: &Row, _implicit_table: &str) -> Result<Value> {
        (self.f)(row)
    }
}

/// Observable upstream: counts reads, optionally fails at a position and
/// optionally sleeps before each read.
pub struct ScriptedReader {
    inner: ValuesReader,
    pos: usize,
    fail_at: Option<usize>,
    read_delay: Option<Duration>,
    pub reads: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
}

impl ScriptedReader {
    pub fn new(n: i64) -> Self {
        Self {
            inner: int_reader(n),
            pos: 0,
            fail_at: None,
            read_delay: None,
            reads: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_at(mut self, pos: usize) -> Self {
        self.fail_at = Some(pos);
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }
}

impl RowReader for ScriptedReader {
    fn tx(&self) -> Option<Arc<TxContext>> {
        self.inner.tx()
    }

    fn table_alias(&self) -> String {
        self.inner.table_alias()
    }

    fn parameters(&self) -> Arc<Params> {
        self.inner.parameters()
    }

    fn order_by(&self) -> Vec<ColDescriptor> {
        self.inner.order_by()
    }

    fn scan_specs(&self) -> Option<ScanSpecs> {
        self.inner.scan_specs()
    }

    fn columns(&self, ctx: &CancellationToken) -> Result<Vec<ColDescriptor>> {
        self.inner.columns(ctx)
    }

    fn infer_parameters(&self, ctx: &CancellationToken, params: &mut ParamTypes) -> Result<()> {
        self.inner.infer_parameters(ctx, params)
    }

    fn read(&mut self, ctx: &CancellationToken) -> Result<Row> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            thread::sleep(delay);
        }
        if self.fail_at == Some(self.pos) {
            return Err(Error::Upstream(format!("disk failure at row {}", self.pos)));
        }
        let row = self.inner.read(ctx)?;
        self.pos += 1;
        Ok(row)
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.inner.close()
    }

    fn on_close(&mut self, callback: CloseCallback) {
        self.inner.on_close(callback);
    }
}
