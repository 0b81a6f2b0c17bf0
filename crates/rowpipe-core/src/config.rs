//! Filter stage configuration that callers can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default capacity of each of the two pipeline queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of predicate worker threads. Fixed for the pipeline's lifetime.
    pub workers: usize,

    /// Capacity of the work queue and of the result queue.
    pub queue_capacity: usize,

    /// Hard cap on items dispatched by the feeder but not yet consumed by the
    /// reader. This also bounds the reorder buffer. `None` derives the cap
    /// from the queue capacity and worker count.
    pub max_in_flight: Option<usize>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_in_flight: None,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl FilterConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ROWPIPE_FILTER_WORKERS`: worker thread count
    /// - `ROWPIPE_FILTER_QUEUE_CAPACITY`: per-queue capacity
    /// - `ROWPIPE_FILTER_MAX_IN_FLIGHT`: in-flight window
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("ROWPIPE_FILTER_WORKERS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.workers = v;
            }
        }

        if let Ok(s) = std::env::var("ROWPIPE_FILTER_QUEUE_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.queue_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("ROWPIPE_FILTER_MAX_IN_FLIGHT") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_in_flight = Some(v);
            }
        }

        cfg
    }

    /// Parse a (possibly partial) JSON document; missing fields use defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: FilterConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_max_in_flight(mut self, window: usize) -> Self {
        self.max_in_flight = Some(window);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.max_in_flight == Some(0) {
            return Err(Error::Config("max_in_flight must be at least 1".into()));
        }
        Ok(())
    }

    /// Effective in-flight window.
    pub fn in_flight_window(&self) -> usize {
        self.max_in_flight.unwrap_or_else(|| {
            self.queue_capacity
                .saturating_mul(2)
                .saturating_add(self.workers)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = FilterConfig::default();
        assert!(cfg.workers >= 1);
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(cfg.validate().is_ok());
        assert_eq!(
            cfg.in_flight_window(),
            2 * DEFAULT_QUEUE_CAPACITY + cfg.workers
        );
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = FilterConfig::from_json(r#"{"workers": 3, "max_in_flight": 16}"#).unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(cfg.in_flight_window(), 16);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert!(FilterConfig::default().with_workers(0).validate().is_err());
        assert!(FilterConfig::default()
            .with_queue_capacity(0)
            .validate()
            .is_err());
        assert!(FilterConfig::default()
            .with_max_in_flight(0)
            .validate()
            .is_err());
        assert!(matches!(
            FilterConfig::from_json(r#"{"workers": 0}"#),
            Err(Error::Config(_))
        ));
    }
}
