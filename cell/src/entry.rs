use std::sync::Arc;
use std::time::Duration;

/// One published state of the cell: a value and the instant it goes stale.
///
/// Generations are immutable. A refresh builds a new one and swaps it in with a
/// single store, so a reader always sees a value together with the expiry that
/// was computed for it.
#[derive(Debug)]
pub(crate) struct Generation<T> {
  /// The cached value. `None` until the cell is first populated.
  pub(crate) value: Option<Arc<T>>,
  /// Clock reading after which `value` is stale. `None` means "already expired".
  pub(crate) expires_at: Option<Duration>,
}

impl<T> Generation<T> {
  /// The state of a cell that has never been populated.
  pub(crate) fn empty() -> Self {
    Self {
      value: None,
      expires_at: None,
    }
  }

  pub(crate) fn new(value: Arc<T>, expires_at: Duration) -> Self {
    Self {
      value: Some(value),
      expires_at: Some(expires_at),
    }
  }

  #[inline]
  pub(crate) fn is_initialized(&self) -> bool {
    self.value.is_some()
  }

  /// A value is fresh up to and including its expiry instant.
  #[inline]
  pub(crate) fn is_expired(&self, now: Duration) -> bool {
    match self.expires_at {
      Some(expires_at) => now > expires_at,
      None => true,
    }
  }
}
