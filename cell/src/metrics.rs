//! Counters describing how a cell has been used.
//!
//! Only [`MetricsSnapshot`] is public; the live counters stay inside the cell.
//!
//! ```compile_fail
//! use fibre_cell::metrics::Metrics;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cell.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Reads ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) contended: CachePadded<AtomicU64>,

  // --- Refreshes ---
  pub(crate) refreshes: CachePadded<AtomicU64>,
  pub(crate) factory_failures: CachePadded<AtomicU64>,
  pub(crate) suppressed_failures: CachePadded<AtomicU64>,
  pub(crate) background_dispatches: CachePadded<AtomicU64>,

  // --- Writes ---
  pub(crate) manual_sets: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      contended: CachePadded::new(AtomicU64::new(0)),
      refreshes: CachePadded::new(AtomicU64::new(0)),
      factory_failures: CachePadded::new(AtomicU64::new(0)),
      suppressed_failures: CachePadded::new(AtomicU64::new(0)),
      background_dispatches: CachePadded::new(AtomicU64::new(0)),
      manual_sets: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      hits: self.hits.load(Ordering::Relaxed),
      contended: self.contended.load(Ordering::Relaxed),
      refreshes: self.refreshes.load(Ordering::Relaxed),
      factory_failures: self.factory_failures.load(Ordering::Relaxed),
      suppressed_failures: self.suppressed_failures.load(Ordering::Relaxed),
      background_dispatches: self.background_dispatches.load(Ordering::Relaxed),
      manual_sets: self.manual_sets.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cell's metrics.
#[derive(Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
  /// Reads served from a fresh value without touching the refresh lock.
  pub hits: u64,
  /// Refresh attempts that found another refresh in flight and returned the
  /// resident value instead.
  pub contended: u64,
  /// Successful factory invocations.
  pub refreshes: u64,
  /// Failed factory invocations, suppressed or not.
  pub factory_failures: u64,
  /// Factory failures absorbed by the suppression policy.
  pub suppressed_failures: u64,
  /// Refreshes handed to the spawner by the refresh-ahead operations.
  pub background_dispatches: u64,
  /// Values written through `set_async`.
  pub manual_sets: u64,
  /// The number of seconds the cell has existed.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("contended", &self.contended)
      .field("refreshes", &self.refreshes)
      .field("factory_failures", &self.factory_failures)
      .field("suppressed_failures", &self.suppressed_failures)
      .field("background_dispatches", &self.background_dispatches)
      .field("manual_sets", &self.manual_sets)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
