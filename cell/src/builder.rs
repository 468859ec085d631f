use crate::config::CellConfig;
use crate::entry::Generation;
use crate::error::BuildError;
use crate::handles::AutoRefreshCell;
use crate::runtime::{TaskSpawner, ThreadSpawner};
use crate::shared::CellShared;
use crate::time::{Clock, MonotonicClock};

use core::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// A builder for creating [`AutoRefreshCell`] instances.
pub struct CellBuilder<T, E> {
  pub(crate) time_to_live: Option<Duration>,
  pub(crate) suppress_factory_errors: bool,
  initial_value: Option<T>,
  clock: Option<Arc<dyn Clock>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
  _error_marker: PhantomData<fn() -> E>,
}

impl<T, E> fmt::Debug for CellBuilder<T, E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CellBuilder")
      .field("time_to_live", &self.time_to_live)
      .field("suppress_factory_errors", &self.suppress_factory_errors)
      .field("has_initial_value", &self.initial_value.is_some())
      .field("has_clock", &self.clock.is_some())
      .field("has_spawner", &self.spawner.is_some())
      .finish()
  }
}

impl<T, E> CellBuilder<T, E> {
  /// Creates a new `CellBuilder` with default settings.
  ///
  /// A time-to-live must be set before building.
  pub fn new() -> Self {
    Self {
      time_to_live: None,
      suppress_factory_errors: false,
      initial_value: None,
      clock: None,
      spawner: None,
      _error_marker: PhantomData,
    }
  }

  /// Sets how long a freshly produced value stays fresh.
  pub fn time_to_live(mut self, duration: Duration) -> Self {
    self.time_to_live = Some(duration);
    self
  }

  /// Sets whether factory failures on an initialized cell are absorbed.
  ///
  /// When enabled, a failed refresh keeps the previous value and still pushes
  /// the expiry out by one time-to-live, so a failing factory is retried at
  /// most once per interval. A failure while the cell is still empty is
  /// always returned to the caller.
  ///
  /// Defaults to `false`.
  pub fn suppress_factory_errors(mut self, suppress: bool) -> Self {
    self.suppress_factory_errors = suppress;
    self
  }

  /// Starts the cell populated with `value`, fresh for one time-to-live.
  ///
  /// Without an initial value the cell starts empty and expired, and the
  /// first read populates it inline.
  pub fn initial_value(mut self, value: T) -> Self {
    self.initial_value = Some(value);
    self
  }

  /// Applies a loaded [`CellConfig`], overriding the corresponding settings.
  pub fn config(mut self, config: &CellConfig) -> Self {
    self.time_to_live = Some(config.time_to_live);
    self.suppress_factory_errors = config.suppress_factory_errors;
    self
  }

  /// Sets the clock used for expiry. Defaults to [`MonotonicClock`].
  pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = Some(clock);
    self
  }

  /// Sets where background refreshes and writes run. Defaults to [`ThreadSpawner`].
  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  /// Validates the builder configuration.
  pub(crate) fn validate(&self) -> Result<Duration, BuildError> {
    match self.time_to_live {
      None => Err(BuildError::MissingTimeToLive),
      Some(ttl) if ttl.is_zero() => Err(BuildError::ZeroTimeToLive),
      Some(ttl) => Ok(ttl),
    }
  }
}

impl<T, E> Default for CellBuilder<T, E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T, E> CellBuilder<T, E>
where
  T: Send + Sync + 'static,
  E: std::error::Error + Send + Sync + 'static,
{
  /// Builds the cell around `factory`.
  ///
  /// The factory is called with no arguments whenever the cell refreshes. It
  /// may keep its own state, but must be safe to call from any thread; calls
  /// never overlap for a given cell.
  pub fn build<F>(self, factory: F) -> Result<AutoRefreshCell<T, E>, BuildError>
  where
    F: Fn() -> Result<T, E> + Send + Sync + 'static,
  {
    let time_to_live = self.validate()?;
    let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock));
    let spawner = self.spawner.unwrap_or_else(|| Arc::new(ThreadSpawner));

    let initial = match self.initial_value {
      Some(value) => Generation::new(Arc::new(value), clock.now().saturating_add(time_to_live)),
      None => Generation::empty(),
    };

    let shared = CellShared::new(
      initial,
      Box::new(factory),
      time_to_live,
      self.suppress_factory_errors,
      clock,
      spawner,
    );
    Ok(AutoRefreshCell {
      shared: Arc::new(shared),
    })
  }
}
