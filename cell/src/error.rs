use thiserror::Error;

/// Errors that can occur when building a cell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// No time-to-live was configured. Every cell needs one.
  #[error("a time-to-live must be configured")]
  MissingTimeToLive,
  /// The cell was configured with a time-to-live of zero, which would make
  /// every value stale the moment it is stored.
  #[error("time-to-live cannot be zero")]
  ZeroTimeToLive,
}

/// Errors surfaced by a refresh of the cell.
///
/// `E` is the error type of the value factory. It is carried through verbatim.
#[derive(Debug, Error)]
pub enum RefreshError<E> {
  /// The factory failed while the cell had never held a value.
  /// This is returned regardless of the error suppression policy.
  #[error("value factory failed before the cell was initialized")]
  Uninitialized(#[source] E),
  /// The factory failed on an initialized cell that does not suppress errors.
  /// The previous value and its expiry are left untouched.
  #[error("value factory failed")]
  Factory(#[source] E),
  /// A background task was dropped before it could finish, either because the
  /// spawner could not run it or because it panicked.
  #[error("background task was abandoned before completing")]
  Abandoned,
}

impl<E> RefreshError<E> {
  /// Returns `true` if the failure happened before the cell held any value.
  pub fn is_uninitialized(&self) -> bool {
    matches!(self, RefreshError::Uninitialized(_))
  }

  /// Consumes the error, returning the factory's own error if there was one.
  pub fn into_factory_error(self) -> Option<E> {
    match self {
      RefreshError::Uninitialized(err) | RefreshError::Factory(err) => Some(err),
      RefreshError::Abandoned => None,
    }
  }
}
