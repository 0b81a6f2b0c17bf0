//! Concurrent, order-preserving filter stage.
//!
//! `ConditionalRowReader` wraps an upstream `RowReader` and only yields rows
//! for which the condition evaluates to `true`. Evaluation runs on a worker
//! pool, but rows come out in exactly the order upstream produced them, so
//! ordering guarantees of the upstream (e.g. index scans) survive.
//!
//! Construction is cheap: no thread exists until the first `read`. `close`
//! cancels the pipeline and closes upstream without waiting for the threads
//! to exit; if upstream is mid-read on the feeder, the feeder closes it on
//! its way out. Use `wait_for_shutdown` when deterministic teardown matters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::select;
use once_cell::sync::OnceCell;

use rowpipe_core::prelude::*;
use rowpipe_operators::{CloseCallback, RowReader, ValueExp};

use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::pipeline::{EvalContext, Outcome, Pipeline, PipelineParams};
use crate::reorder::ReorderBuffer;
use crate::stats::{FilterStats, FilterStatsSnapshot};
use crate::upstream::SharedUpstream;

/// Upstream metadata that stays fixed while reading, captured at construction
/// so accessors never wait on the feeder.
struct UpstreamMeta {
    table_alias: String,
    params: Arc<Params>,
    order_by: Vec<ColDescriptor>,
    scan_specs: Option<ScanSpecs>,
    tx: Option<Arc<TxContext>>,
}

struct ColumnSet {
    list: Vec<ColDescriptor>,
    by_selector: HashMap<String, ColDescriptor>,
}

pub struct ConditionalRowReader {
    upstream: Arc<SharedUpstream>,
    meta: UpstreamMeta,
    columns: OnceCell<ColumnSet>,
    condition: Arc<dyn ValueExp>,
    cfg: FilterConfig,

    lifecycle: Lifecycle,
    pipeline: Option<Pipeline>,

    reorder: ReorderBuffer,
    /// Set once an error or end-of-stream has been delivered.
    exhausted: bool,

    stats: Arc<FilterStats>,
    live_threads: Arc<AtomicUsize>,
}

impl ConditionalRowReader {
    /// Wrap `upstream` with the default configuration.
    pub fn new(upstream: Box<dyn RowReader>, condition: Arc<dyn ValueExp>) -> Self {
        Self::build(upstream, condition, FilterConfig::default())
    }

    pub fn with_config(
        upstream: Box<dyn RowReader>,
        condition: Arc<dyn ValueExp>,
        cfg: FilterConfig,
    ) -> Result<Self> {
        cfg.validate()?;
        Ok(Self::build(upstream, condition, cfg))
    }

    fn build(upstream: Box<dyn RowReader>, condition: Arc<dyn ValueExp>, cfg: FilterConfig) -> Self {
        let meta = UpstreamMeta {
            table_alias: upstream.table_alias(),
            params: upstream.parameters(),
            order_by: upstream.order_by(),
            scan_specs: upstream.scan_specs(),
            tx: upstream.tx(),
        };
        Self {
            upstream: Arc::new(SharedUpstream::new(upstream)),
            meta,
            columns: OnceCell::new(),
            condition,
            cfg,
            lifecycle: Lifecycle::new(),
            pipeline: None,
            reorder: ReorderBuffer::new(),
            exhausted: false,
            stats: Arc::new(FilterStats::default()),
            live_threads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.cfg
    }

    pub fn condition(&self) -> &Arc<dyn ValueExp> {
        &self.condition
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn stats(&self) -> FilterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Pipeline threads (feeder, workers, monitor) currently alive.
    pub fn live_threads(&self) -> usize {
        self.live_threads.load(Ordering::SeqCst)
    }

    /// Block until every pipeline thread has exited or `timeout` elapses.
    /// Returns true if the pipeline is gone (or never started).
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        match &self.pipeline {
            Some(p) => p.wait_for_shutdown(timeout),
            None => true,
        }
    }

    /// Column descriptors, fetched from upstream once and then served from
    /// the cache.
    fn column_set(&self, ctx: &CancellationToken) -> Result<&ColumnSet> {
        self.columns.get_or_try_init(|| {
            let upstream = self.upstream.lock();
            Ok(ColumnSet {
                list: upstream.columns(ctx)?,
                by_selector: upstream.cols_by_selector(ctx)?,
            })
        })
    }

    fn start(&mut self, ctx: &CancellationToken) -> Result<Pipeline> {
        // Fill the column cache while upstream is still idle. A failure here
        // is reported by the caller's own `columns` call instead.
        let _ = self.column_set(ctx);

        let eval = Arc::new(EvalContext {
            condition: Arc::clone(&self.condition),
            params: Arc::clone(&self.meta.params),
            tx: self.meta.tx.clone(),
            table_alias: self.meta.table_alias.clone(),
        });

        Pipeline::start(
            Arc::clone(&self.upstream),
            eval,
            PipelineParams {
                workers: self.cfg.workers,
                queue_capacity: self.cfg.queue_capacity,
                window: self.cfg.in_flight_window(),
            },
            ctx.child_token(),
            Arc::clone(&self.stats),
            &self.live_threads,
        )
    }

    /// Nothing more will be delivered: stop the pipeline and drop buffered results.
    fn exhaust(&mut self) {
        self.exhausted = true;
        self.reorder.clear();
        if let Some(p) = &self.pipeline {
            p.cancel();
        }
    }

    fn next_row(&mut self, ctx: &CancellationToken) -> Result<Row> {
        let Self {
            pipeline,
            reorder,
            stats,
            ..
        } = self;
        let pipeline = pipeline
            .as_ref()
            .ok_or_else(|| Error::Invariant("filter pipeline not started".into()))?;

        loop {
            if let Some(outcome) = reorder.pop_next() {
                pipeline.release_slot();
                match outcome {
                    Outcome::Row(row) => return Ok(row),
                    Outcome::Filtered => continue,
                    Outcome::Failed(e) => return Err(e),
                }
            }

            select! {
                recv(pipeline.results) -> msg => match msg {
                    Ok(item) => {
                        reorder.insert(item)?;
                        stats.record_buffered(reorder.len());
                    }
                    Err(_) if pipeline.is_cancelled() => return Err(Error::Cancelled),
                    Err(_) if reorder.is_empty() => return Err(Error::NoMoreRows),
                    Err(_) => {
                        return Err(Error::Invariant(format!(
                            "result stream ended before {}",
                            reorder.next_seq()
                        )))
                    }
                },
                recv(ctx.done()) -> _ => return Err(Error::Cancelled),
            }
        }
    }
}

impl RowReader for ConditionalRowReader {
    fn tx(&self) -> Option<Arc<TxContext>> {
        self.meta.tx.clone()
    }

    fn table_alias(&self) -> String {
        self.meta.table_alias.clone()
    }

    fn parameters(&self) -> Arc<Params> {
        Arc::clone(&self.meta.params)
    }

    fn order_by(&self) -> Vec<ColDescriptor> {
        self.meta.order_by.clone()
    }

    fn scan_specs(&self) -> Option<ScanSpecs> {
        self.meta.scan_specs.clone()
    }

    fn columns(&self, ctx: &CancellationToken) -> Result<Vec<ColDescriptor>> {
        Ok(self.column_set(ctx)?.list.clone())
    }

    fn cols_by_selector(&self, ctx: &CancellationToken) -> Result<HashMap<String, ColDescriptor>> {
        Ok(self.column_set(ctx)?.by_selector.clone())
    }

    /// Planning-time call. Once reading has started it may wait for an
    /// in-flight upstream read.
    fn infer_parameters(&self, ctx: &CancellationToken, params: &mut ParamTypes) -> Result<()> {
        self.upstream.lock().infer_parameters(ctx, params)?;
        let cols = &self.column_set(ctx)?.by_selector;
        self.condition
            .requires_type(SqlValueType::Boolean, cols, params, &self.meta.table_alias)
    }

    fn read(&mut self, ctx: &CancellationToken) -> Result<Row> {
        if self.lifecycle.try_start() {
            match self.start(ctx) {
                Ok(p) => self.pipeline = Some(p),
                Err(e) => {
                    self.exhausted = true;
                    return Err(e);
                }
            }
        }

        if self.lifecycle.state() == LifecycleState::Closed || self.exhausted {
            return Err(Error::NoMoreRows);
        }

        let res = self.next_row(ctx);
        match &res {
            Ok(_) => {}
            // The caller may retry with a live context; nothing was consumed.
            Err(Error::Cancelled) if !self.pipeline.as_ref().is_some_and(Pipeline::is_cancelled) => {}
            Err(_) => self.exhaust(),
        }
        res
    }

    fn close(&mut self) -> Result<()> {
        let prev = self.lifecycle.close();
        if let Some(p) = &self.pipeline {
            p.cancel();
        }

        if prev != LifecycleState::Closed {
            #[cfg(feature = "tracing")]
            {
                let snapshot = self.stats.snapshot();
                tracing::debug!(
                    rows_read = snapshot.rows_read,
                    rows_passed = snapshot.rows_passed,
                    rows_filtered = snapshot.rows_filtered,
                    eval_errors = snapshot.eval_errors,
                    peak_buffered = snapshot.peak_buffered,
                    "conditional reader closed"
                );
            }
        }

        // Never waits behind an upstream read in progress on the feeder.
        self.upstream.request_close()
    }

    fn on_close(&mut self, callback: CloseCallback) {
        self.upstream.on_close(callback);
    }
}

impl Drop for ConditionalRowReader {
    fn drop(&mut self) {
        // Never leave pipeline threads blocked behind a dropped reader.
        if let Some(p) = &self.pipeline {
            p.cancel();
        }
    }
}
