use crate::entry::Generation;
use crate::error::RefreshError;
use crate::task::{self, TaskCompleter, TaskHandle};
use crate::metrics::Metrics;
use crate::sync::RefreshGate;
use crate::time::Clock;
use crate::TaskSpawner;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

/// The value factory, type-erased.
pub(crate) type Factory<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

/// A manual write that arrived while the refresh lock was held.
struct PendingSet<T, E> {
  value: T,
  completer: TaskCompleter<E>,
}

/// The internal, thread-safe core of the cell.
pub(crate) struct CellShared<T, E> {
  generation: RwLock<Arc<Generation<T>>>,
  gate: RefreshGate,
  // Drained by whoever releases the gate, in arrival order.
  pending_sets: Mutex<VecDeque<PendingSet<T, E>>>,
  factory: Factory<T, E>,
  pub(crate) time_to_live: Duration,
  pub(crate) suppress_factory_errors: bool,
  pub(crate) clock: Arc<dyn Clock>,
  pub(crate) spawner: Arc<dyn TaskSpawner>,
  pub(crate) metrics: Metrics,
}

impl<T, E> fmt::Debug for CellShared<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let generation = self.current();
    f.debug_struct("CellShared")
      .field("initialized", &generation.is_initialized())
      .field("expires_at", &generation.expires_at)
      .field("time_to_live", &self.time_to_live)
      .field("suppress_factory_errors", &self.suppress_factory_errors)
      .field("refreshing", &self.gate.is_held())
      .field("pending_sets", &self.pending_sets.lock().len())
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<T, E> CellShared<T, E> {
  pub(crate) fn new(
    initial: Generation<T>,
    factory: Factory<T, E>,
    time_to_live: Duration,
    suppress_factory_errors: bool,
    clock: Arc<dyn Clock>,
    spawner: Arc<dyn TaskSpawner>,
  ) -> Self {
    Self {
      generation: RwLock::new(Arc::new(initial)),
      gate: RefreshGate::new(),
      pending_sets: Mutex::new(VecDeque::new()),
      factory,
      time_to_live,
      suppress_factory_errors,
      clock,
      spawner,
      metrics: Metrics::new(),
    }
  }

  /// Returns the currently published generation.
  ///
  /// The read lock is held only long enough to clone the `Arc`; writers hold the
  /// write lock only long enough to swap it.
  #[inline]
  pub(crate) fn current(&self) -> Arc<Generation<T>> {
    self.generation.read().clone()
  }

  #[inline]
  pub(crate) fn now(&self) -> Duration {
    self.clock.now()
  }

  fn publish(&self, generation: Generation<T>) {
    let previous = std::mem::replace(&mut *self.generation.write(), Arc::new(generation));
    // The old generation may hold the last reference to a value; drop it unlocked.
    drop(previous);
  }

  fn next_expiry(&self) -> Duration {
    self.now().saturating_add(self.time_to_live)
  }

  /// Takes the refresh lock if no refresh is in flight.
  pub(crate) fn try_acquire(shared: &Arc<Self>) -> Option<RefreshPermit<T, E>> {
    if shared.gate.try_acquire() {
      Some(RefreshPermit {
        shared: Arc::clone(shared),
      })
    } else {
      Metrics::record(&shared.metrics.contended);
      None
    }
  }

  fn store(&self, value: T) {
    let expires_at = self.next_expiry();
    self.publish(Generation::new(Arc::new(value), expires_at));
    Metrics::record(&self.metrics.manual_sets);
  }

  /// Releases the refresh lock, first applying every write queued behind it.
  ///
  /// The queue is checked and the gate released under the same queue lock, so a
  /// write is either seen here or finds the gate free.
  fn release(&self) {
    loop {
      let mut pending = self.pending_sets.lock();
      match pending.pop_front() {
        Some(set) => {
          drop(pending);
          self.store(set.value);
          set.completer.complete(Ok(()));
        }
        None => {
          self.gate.release();
          return;
        }
      }
    }
  }
}

impl<T, E> CellShared<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  /// Writes `value` once no refresh is in flight, without blocking any thread.
  ///
  /// With the lock free, the write runs on the spawner. Otherwise it is queued
  /// and applied by the current holder as it releases the lock.
  pub(crate) fn schedule_set(shared: &Arc<Self>, value: T) -> TaskHandle<E> {
    let (handle, completer) = task::pair();
    let mut pending = shared.pending_sets.lock();
    if !shared.gate.try_acquire() {
      pending.push_back(PendingSet { value, completer });
      tracing::debug!(queued = pending.len(), "refresh in flight, queueing manual set");
      return handle;
    }
    drop(pending);

    let permit = RefreshPermit {
      shared: Arc::clone(shared),
    };
    shared.spawner.spawn(Box::new(move || {
      permit.store(value);
      completer.complete(Ok(()));
    }));
    handle
  }
}

/// Proof of holding the refresh lock. Every write to the cell goes through one.
///
/// The lock is released when the permit is dropped, including during a panic
/// unwinding out of the factory. Writes queued by `set_async` meanwhile are
/// applied just before that.
pub(crate) struct RefreshPermit<T, E> {
  shared: Arc<CellShared<T, E>>,
}

impl<T, E> Drop for RefreshPermit<T, E> {
  fn drop(&mut self) {
    self.shared.release();
  }
}

impl<T, E> RefreshPermit<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  /// Invokes the factory and publishes the outcome according to the failure policy.
  ///
  /// | initialized | suppress | outcome                                   |
  /// |-------------|----------|-------------------------------------------|
  /// | no          | any      | `Uninitialized`, nothing published        |
  /// | yes         | no       | `Factory`, nothing published              |
  /// | yes         | yes      | previous value, expiry pushed out one TTL |
  pub(crate) fn refresh(self) -> Result<Arc<T>, RefreshError<E>> {
    let shared = &self.shared;
    let produced = (shared.factory)();
    let expires_at = shared.next_expiry();

    let err = match produced {
      Ok(value) => {
        let value = Arc::new(value);
        shared.publish(Generation::new(Arc::clone(&value), expires_at));
        Metrics::record(&shared.metrics.refreshes);
        return Ok(value);
      }
      Err(err) => err,
    };

    Metrics::record(&shared.metrics.factory_failures);
    let current = shared.current();
    match &current.value {
      None => {
        tracing::warn!(error = %err, "value factory failed and the cell has never been initialized");
        Err(RefreshError::Uninitialized(err))
      }
      Some(previous) if shared.suppress_factory_errors => {
        tracing::warn!(
          error = %err,
          backoff = ?shared.time_to_live,
          "value factory failed, keeping the previous value"
        );
        let previous = Arc::clone(previous);
        shared.publish(Generation::new(Arc::clone(&previous), expires_at));
        Metrics::record(&shared.metrics.suppressed_failures);
        Ok(previous)
      }
      Some(_) => {
        tracing::debug!(error = %err, "value factory failed");
        Err(RefreshError::Factory(err))
      }
    }
  }

  /// Writes `value` as the new generation without consulting the factory.
  pub(crate) fn store(self, value: T) {
    self.shared.store(value);
  }

  /// Moves this permit into a background task that runs [`refresh`](Self::refresh).
  pub(crate) fn spawn_refresh(self) -> TaskHandle<E> {
    let (handle, completer) = task::pair();
    let spawner = Arc::clone(&self.shared.spawner);
    Metrics::record(&self.shared.metrics.background_dispatches);
    tracing::debug!("dispatching background refresh");

    spawner.spawn(Box::new(move || {
      let outcome = self.refresh().map(|_| ());
      if let Err(err) = &outcome {
        tracing::error!(error = %err, "background refresh failed");
      }
      completer.complete(outcome);
    }));
    handle
  }
}
