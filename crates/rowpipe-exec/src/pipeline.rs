//! Feeder, worker pool and monitor threads behind the conditional reader.
//!
//! upstream → feeder → work queue → workers → result queue → reader.
//! Every blocking send/recv also waits on the pipeline's cancellation token.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender};

use rowpipe_core::prelude::*;
use rowpipe_operators::ValueExp;

use crate::stats::FilterStats;
use crate::upstream::SharedUpstream;

/// Result of processing one upstream read.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// Predicate held.
    Row(Row),
    /// Predicate was false or a NULL boolean.
    Filtered,
    /// Terminal: upstream error, end-of-stream, or evaluation failure.
    Failed(Error),
}

#[derive(Debug)]
pub(crate) struct TaggedItem {
    pub seq: Seq,
    pub outcome: Outcome,
}

/// Read-only state every worker evaluates against.
pub(crate) struct EvalContext {
    pub condition: Arc<dyn ValueExp>,
    pub params: Arc<Params>,
    pub tx: Option<Arc<TxContext>>,
    pub table_alias: String,
}

/// Bind parameters, evaluate, and interpret the result tri-state.
pub(crate) fn evaluate(ctx: &EvalContext, row: Row) -> Outcome {
    let cond = match ctx.condition.substitute(&ctx.params) {
        Ok(c) => c,
        Err(e) => return Outcome::Failed(Error::filter_condition(e)),
    };

    match cond.reduce(ctx.tx.as_deref(), &row, &ctx.table_alias) {
        Ok(Value::Bool(true)) => Outcome::Row(row),
        Ok(Value::Bool(false)) => Outcome::Filtered,
        Ok(Value::Null(SqlValueType::Boolean)) => Outcome::Filtered,
        Ok(other) => Outcome::Failed(Error::filter_condition(Error::InvalidConditionResult {
            expected: SqlValueType::Boolean,
            found: other.value_type(),
        })),
        Err(e) => Outcome::Failed(Error::filter_condition(e)),
    }
}

/// Decrements the live-thread gauge when the owning thread exits.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(live))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn spawn_named<F>(name: String, live: &Arc<AtomicUsize>, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let guard = LiveGuard::new(live);
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _guard = guard;
            f()
        })
        .map_err(|e| Error::Invariant(format!("spawn {}: {}", name, e)))
}

pub(crate) struct PipelineParams {
    pub workers: usize,
    pub queue_capacity: usize,
    pub window: usize,
}

/// Handles the reader keeps on a running pipeline.
pub(crate) struct Pipeline {
    pub results: Receiver<TaggedItem>,
    window: Receiver<()>,
    token: CancellationToken,
    shutdown: Receiver<()>,
}

impl Pipeline {
    pub fn start(
        upstream: Arc<SharedUpstream>,
        eval: Arc<EvalContext>,
        params: PipelineParams,
        token: CancellationToken,
        stats: Arc<FilterStats>,
        live: &Arc<AtomicUsize>,
    ) -> Result<Self> {
        let (work_tx, work_rx) = bounded::<TaggedItem>(params.queue_capacity);
        let (result_tx, result_rx) = bounded::<TaggedItem>(params.queue_capacity);
        let (window_tx, window_rx) = bounded::<()>(params.window);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let spawned = Self::spawn_all(
            upstream,
            eval,
            &params,
            (work_tx, work_rx),
            result_tx,
            window_tx,
            shutdown_tx,
            &token,
            stats,
            live,
        );
        if let Err(e) = spawned {
            // Unwind whatever did start.
            token.cancel();
            return Err(e);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            workers = params.workers,
            queue_capacity = params.queue_capacity,
            window = params.window,
            "filter pipeline started"
        );

        Ok(Self {
            results: result_rx,
            window: window_rx,
            token,
            shutdown: shutdown_rx,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_all(
        upstream: Arc<SharedUpstream>,
        eval: Arc<EvalContext>,
        params: &PipelineParams,
        (work_tx, work_rx): (Sender<TaggedItem>, Receiver<TaggedItem>),
        result_tx: Sender<TaggedItem>,
        window_tx: Sender<()>,
        shutdown_tx: Sender<()>,
        token: &CancellationToken,
        stats: Arc<FilterStats>,
        live: &Arc<AtomicUsize>,
    ) -> Result<()> {
        let mut workers = Vec::with_capacity(params.workers);
        for id in 0..params.workers {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let eval = Arc::clone(&eval);
            let token = token.clone();
            let stats = Arc::clone(&stats);
            workers.push(spawn_named(
                format!("rowpipe-filter-{}", id),
                live,
                move || run_worker(id, work_rx, result_tx, eval, token, stats),
            )?);
        }
        drop(work_rx);

        let feeder = {
            let token = token.clone();
            let stats = Arc::clone(&stats);
            spawn_named("rowpipe-feeder".to_string(), live, move || {
                run_feeder(upstream, work_tx, window_tx, token, stats)
            })?
        };

        spawn_named("rowpipe-monitor".to_string(), live, move || {
            run_monitor(feeder, workers, result_tx, shutdown_tx)
        })?;

        Ok(())
    }

    /// Return one in-flight slot to the feeder after an item is consumed.
    pub fn release_slot(&self) {
        let _ = self.window.try_recv();
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the feeder and every worker have exited.
    pub fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        match self.shutdown.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

fn run_feeder(
    upstream: Arc<SharedUpstream>,
    work_tx: Sender<TaggedItem>,
    window_tx: Sender<()>,
    token: CancellationToken,
    stats: Arc<FilterStats>,
) {
    feed(&upstream, work_tx, window_tx, &token, &stats);
    // A close that arrived while we were inside `read` is ours to finish.
    upstream.close_if_requested();
}

fn feed(
    upstream: &SharedUpstream,
    work_tx: Sender<TaggedItem>,
    window_tx: Sender<()>,
    token: &CancellationToken,
    stats: &FilterStats,
) {
    let mut seq = Seq::ZERO;
    loop {
        if token.is_cancelled() {
            return;
        }

        // The guard is released before any blocking send.
        let read = upstream.lock().read(token);
        let (outcome, terminal) = match read {
            Ok(row) => {
                stats.record_read();
                (Outcome::Row(row), false)
            }
            Err(e) => (Outcome::Failed(e), true),
        };

        let reserved = select! {
            send(window_tx, ()) -> res => res.is_ok(),
            recv(token.done()) -> _ => false,
        };
        if !reserved {
            return;
        }

        let item = TaggedItem { seq, outcome };
        let sent = select! {
            send(work_tx, item) -> res => res.is_ok(),
            recv(token.done()) -> _ => false,
        };
        if !sent {
            return;
        }

        if terminal {
            #[cfg(feature = "tracing")]
            tracing::trace!(seq = seq.get(), "feeder reached end of upstream");
            return;
        }
        seq = seq.next();
    }
}

fn run_worker(
    id: usize,
    work_rx: Receiver<TaggedItem>,
    result_tx: Sender<TaggedItem>,
    eval: Arc<EvalContext>,
    token: CancellationToken,
    stats: Arc<FilterStats>,
) {
    loop {
        let next = select! {
            recv(work_rx) -> msg => msg.ok(),
            recv(token.done()) -> _ => None,
        };
        // Disconnected work queue: the feeder is done and the queue is drained.
        let Some(item) = next else { break };

        let TaggedItem { seq, outcome } = item;
        let outcome = match outcome {
            Outcome::Row(row) => {
                let out = evaluate(&eval, row);
                match &out {
                    Outcome::Row(_) => stats.record_passed(),
                    Outcome::Filtered => stats.record_filtered(),
                    Outcome::Failed(_) => stats.record_eval_error(),
                }
                out
            }
            terminal => terminal,
        };

        let item = TaggedItem { seq, outcome };
        let sent = select! {
            send(result_tx, item) -> res => res.is_ok(),
            recv(token.done()) -> _ => false,
        };
        if !sent {
            break;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(worker = id, "filter worker exiting");
    #[cfg(not(feature = "tracing"))]
    let _ = id;
}

fn run_monitor(
    feeder: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    result_tx: Sender<TaggedItem>,
    shutdown_tx: Sender<()>,
) {
    if feeder.join().is_err() {
        #[cfg(feature = "tracing")]
        tracing::warn!("filter feeder panicked");
    }
    for worker in workers {
        if worker.join().is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!("filter worker panicked");
        }
    }
    // Last sender: the reader now sees end-of-stream.
    drop(result_tx);
    drop(shutdown_tx);
}
