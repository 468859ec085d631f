use std::sync::atomic::{AtomicBool, Ordering};

/// A binary exclusion gate that is only ever tried, never waited on.
///
/// Unlike a `MutexGuard`, holding the gate is not tied to a borrow or a thread:
/// the holder may hand it to a background task, which releases it when done.
/// Callers pair every successful `try_acquire` with exactly one `release`.
#[derive(Debug, Default)]
pub(crate) struct RefreshGate {
  held: AtomicBool,
}

impl RefreshGate {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Acquires the gate if it is free. Never waits.
  pub(crate) fn try_acquire(&self) -> bool {
    self
      .held
      .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
      .is_ok()
  }

  pub(crate) fn release(&self) {
    self.held.store(false, Ordering::Release);
  }

  pub(crate) fn is_held(&self) -> bool {
    self.held.load(Ordering::Relaxed)
  }
}
