//! In-memory row source.
//!
//! Serves a fixed list of rows in order. Useful as the leaf of a pipeline in
//! tests and for `VALUES (...)` style inputs.

use std::sync::Arc;

use rowpipe_core::prelude::*;

use crate::traits::{CloseCallback, RowReader};

pub struct ValuesReader {
    table_alias: String,
    cols: Vec<ColDescriptor>,
    rows: std::vec::IntoIter<Row>,
    params: Arc<Params>,
    order_by: Vec<ColDescriptor>,
    scan_specs: Option<ScanSpecs>,
    tx: Option<Arc<TxContext>>,
    callbacks: Vec<CloseCallback>,
    closed: bool,
}

impl ValuesReader {
    /// `rows` are positional values matching `cols`.
    pub fn new(
        table_alias: impl Into<String>,
        cols: Vec<ColDescriptor>,
        rows: Vec<Vec<Value>>,
    ) -> Self {
        let rows: Vec<Row> = rows.into_iter().map(|vals| Row::new(&cols, vals)).collect();
        Self {
            table_alias: table_alias.into(),
            cols,
            rows: rows.into_iter(),
            params: Arc::new(Params::new()),
            order_by: Vec::new(),
            scan_specs: None,
            tx: None,
            callbacks: Vec::new(),
            closed: false,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = Arc::new(params);
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<ColDescriptor>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_scan_specs(mut self, specs: ScanSpecs) -> Self {
        self.scan_specs = Some(specs);
        self
    }

    pub fn with_tx(mut self, tx: TxContext) -> Self {
        self.tx = Some(Arc::new(tx));
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Rows not yet returned by `read`.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowReader for ValuesReader {
    fn tx(&self) -> Option<Arc<TxContext>> {
        self.tx.clone()
    }

    fn table_alias(&self) -> String {
        self.table_alias.clone()
    }

    fn parameters(&self) -> Arc<Params> {
        Arc::clone(&self.params)
    }

    fn order_by(&self) -> Vec<ColDescriptor> {
        self.order_by.clone()
    }

    fn scan_specs(&self) -> Option<ScanSpecs> {
        self.scan_specs.clone()
    }

    fn columns(&self, _ctx: &CancellationToken) -> Result<Vec<ColDescriptor>> {
        Ok(self.cols.clone())
    }

    fn infer_parameters(&self, _ctx: &CancellationToken, _params: &mut ParamTypes) -> Result<()> {
        // Literal rows reference no parameters.
        Ok(())
    }

    fn read(&mut self, ctx: &CancellationToken) -> Result<Row> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if self.closed {
            return Err(Error::Upstream("read on closed reader".into()));
        }
        self.rows.next().ok_or(Error::NoMoreRows)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for cb in self.callbacks.drain(..) {
            cb();
        }
        Ok(())
    }

    fn on_close(&mut self, callback: CloseCallback) {
        self.callbacks.push(callback);
    }
}
