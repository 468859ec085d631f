use crate::builder::CellBuilder;
use crate::error::RefreshError;
use crate::task::TaskHandle;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::shared::CellShared;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A single-slot cache that refreshes its value through a factory once the
/// value's time-to-live has elapsed.
///
/// At most one factory call is ever in flight per cell. Callers that find a
/// refresh already running never wait for it: they get whatever value is
/// resident at that moment, which may be stale.
///
/// Cloning the cell is cheap and every clone shares the same slot.
pub struct AutoRefreshCell<T, E> {
  pub(crate) shared: Arc<CellShared<T, E>>,
}

impl<T, E> Clone for AutoRefreshCell<T, E> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T, E> fmt::Debug for AutoRefreshCell<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AutoRefreshCell")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<T, E> AutoRefreshCell<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  /// Returns a builder for configuring a new cell.
  pub fn builder() -> CellBuilder<T, E> {
    CellBuilder::new()
  }

  /// Returns the cached value, refreshing it inline first if it has expired.
  ///
  /// This is read-through: the caller that wins the refresh pays the factory's
  /// latency. Callers that lose the race return the resident value at once.
  ///
  /// # Returns
  ///
  /// - `Ok(Some(value))` in the normal case.
  /// - `Ok(None)` only if the cell has never been populated and another caller
  ///   is populating it right now.
  /// - `Err(_)` if this caller ran the factory and the failure policy did not
  ///   absorb the error.
  pub fn get(&self) -> Result<Option<Arc<T>>, RefreshError<E>> {
    let generation = self.shared.current();
    if !generation.is_expired(self.shared.now()) {
      Metrics::record(&self.shared.metrics.hits);
      tracing::trace!("serving fresh value");
      return Ok(generation.value.clone());
    }
    self.force_get()
  }

  /// Refreshes the value inline regardless of its expiry and returns the result.
  ///
  /// If another refresh is already in flight, returns the resident value
  /// without invoking the factory.
  pub fn force_get(&self) -> Result<Option<Arc<T>>, RefreshError<E>> {
    match CellShared::try_acquire(&self.shared) {
      Some(permit) => permit.refresh().map(Some),
      None => {
        tracing::debug!("refresh already in flight, serving resident value");
        Ok(self.shared.current().value.clone())
      }
    }
  }

  /// Returns the cached value at once, dispatching a background refresh if it
  /// has expired.
  ///
  /// The refreshed value is never returned by this call; it becomes visible to
  /// later reads once the background task completes. The first population of
  /// an empty cell runs inline, as in [`get`](Self::get), since there is no
  /// value to serve meanwhile.
  pub fn get_with_refresh_ahead(&self) -> Result<RefreshAhead<T, E>, RefreshError<E>> {
    let generation = self.shared.current();
    if !generation.is_expired(self.shared.now()) {
      Metrics::record(&self.shared.metrics.hits);
      return Ok(RefreshAhead::resident(generation.value.clone()));
    }
    self.force_get_with_refresh_ahead()
  }

  /// Like [`get_with_refresh_ahead`](Self::get_with_refresh_ahead), but
  /// dispatches a refresh regardless of expiry.
  pub fn force_get_with_refresh_ahead(&self) -> Result<RefreshAhead<T, E>, RefreshError<E>> {
    let Some(permit) = CellShared::try_acquire(&self.shared) else {
      tracing::debug!("refresh already in flight, serving resident value");
      return Ok(RefreshAhead::resident(self.shared.current().value.clone()));
    };

    // The permit excludes every other writer, so this read is the value the
    // background refresh will replace.
    match self.shared.current().value.clone() {
      Some(stale) => Ok(RefreshAhead {
        value: Some(stale),
        background: BackgroundRefresh::Dispatched(permit.spawn_refresh()),
      }),
      None => {
        let value = permit.refresh()?;
        Ok(RefreshAhead::resident(Some(value)))
      }
    }
  }

  /// Writes `value` into the cell from a background task and returns a handle
  /// to that task.
  ///
  /// The write waits for any in-flight refresh to finish, then stores the
  /// value with a full time-to-live. The factory is not invoked. Waiting never
  /// occupies a thread: a write that arrives during a refresh is queued and
  /// applied as that refresh releases the lock. Queued writes apply in call
  /// order, so the last one wins.
  pub fn set_async(&self, value: T) -> TaskHandle<E> {
    CellShared::schedule_set(&self.shared, value)
  }
}

impl<T, E> AutoRefreshCell<T, E> {
  /// Returns the resident value without checking expiry or refreshing.
  pub fn peek(&self) -> Option<Arc<T>> {
    self.shared.current().value.clone()
  }

  /// Returns `true` once the cell has held a value. Never reverts to `false`.
  pub fn is_initialized(&self) -> bool {
    self.shared.current().is_initialized()
  }

  /// The clock reading after which the resident value is stale, or `None` if
  /// the cell has never been populated.
  pub fn expires_at(&self) -> Option<Duration> {
    self.shared.current().expires_at
  }

  pub fn is_expired(&self) -> bool {
    self.shared.current().is_expired(self.shared.now())
  }

  pub fn time_to_live(&self) -> Duration {
    self.shared.time_to_live
  }

  pub fn suppresses_factory_errors(&self) -> bool {
    self.shared.suppress_factory_errors
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }
}

/// The result of a refresh-ahead read: the value served now, plus the
/// background refresh it started, if any.
#[derive(Debug)]
pub struct RefreshAhead<T, E> {
  /// The value resident when the call was made. `None` only if the cell has
  /// never been populated and another caller is populating it.
  pub value: Option<Arc<T>>,
  pub background: BackgroundRefresh<E>,
}

impl<T, E> RefreshAhead<T, E> {
  fn resident(value: Option<Arc<T>>) -> Self {
    Self {
      value,
      background: BackgroundRefresh::NotDispatched,
    }
  }

  /// Returns `true` if this call dispatched a background refresh.
  pub fn is_dispatched(&self) -> bool {
    matches!(self.background, BackgroundRefresh::Dispatched(_))
  }

  /// Splits the envelope into the served value and the task handle, if any.
  pub fn into_parts(self) -> (Option<Arc<T>>, Option<TaskHandle<E>>) {
    let handle = match self.background {
      BackgroundRefresh::Dispatched(handle) => Some(handle),
      BackgroundRefresh::NotDispatched => None,
    };
    (self.value, handle)
  }
}

/// Whether a refresh-ahead read handed a refresh to the spawner.
#[derive(Debug)]
pub enum BackgroundRefresh<E> {
  /// The value was fresh, or another refresh was already in flight, or the
  /// first population ran inline.
  NotDispatched,
  /// A background refresh was started. Its failures, if the policy does not
  /// absorb them, surface only through this handle.
  Dispatched(TaskHandle<E>),
}
