#![forbid(unsafe_code)]
//! rowpipe-exec: the concurrent conditional row reader.
//!
//! A single feeder thread pulls rows from the upstream reader, a fixed
//! worker pool evaluates the filter predicate, and the consumer's own `read`
//! call reassembles results in upstream order. Threads are started lazily on
//! the first read and torn down cooperatively through a shared
//! cancellation token.

pub mod filter;
pub mod lifecycle;
mod pipeline;
mod reorder;
pub mod stats;
mod upstream;

pub use filter::ConditionalRowReader;
pub use lifecycle::LifecycleState;
pub use stats::FilterStatsSnapshot;
