use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

// The single, static reference point for `MonotonicClock`.
// It is initialized lazily on its first use.
static CELL_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// A source of the current time, expressed as a `Duration` since a fixed origin.
///
/// The origin is up to the implementation; the cell only ever compares
/// readings taken from the same clock. Readings must never go backwards.
pub trait Clock: Send + Sync + 'static {
  /// Returns the current time as a `Duration` since this clock's origin.
  fn now(&self) -> Duration;
}

/// The default clock. Measures time since a process-wide, lazily captured `Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
  #[inline]
  fn now(&self) -> Duration {
    Instant::now().saturating_duration_since(*CELL_EPOCH)
  }
}

/// A wall clock measuring time since the UNIX epoch.
///
/// Wall time can be adjusted by the host; a reading earlier than a previous one
/// only delays the next expiry, it never corrupts the cell.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Duration {
    SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or(Duration::ZERO)
  }
}

/// A clock that only moves when told to.
///
/// Useful in tests and for callers that drive time from their own tick source.
/// Share it through an `Arc` to keep a handle after passing it to the builder.
#[derive(Default)]
pub struct ManualClock {
  nanos: AtomicU64,
}

impl ManualClock {
  /// Creates a clock reading `start`.
  pub fn new(start: Duration) -> Self {
    Self {
      nanos: AtomicU64::new(saturating_nanos(start)),
    }
  }

  /// Moves the clock forward by `by`, stopping at the largest representable reading.
  pub fn advance(&self, by: Duration) {
    let by = saturating_nanos(by);
    // The closure always returns `Some`, so the update cannot fail.
    let _ = self
      .nanos
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
        Some(now.saturating_add(by))
      });
  }

  /// Sets the clock to `to`. Ignored if `to` is earlier than the current reading.
  pub fn set(&self, to: Duration) {
    self.nanos.fetch_max(saturating_nanos(to), Ordering::SeqCst);
  }
}

// `ManualClock` keeps nanoseconds in a `u64`, which covers about 584 years.
fn saturating_nanos(duration: Duration) -> u64 {
  u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl Clock for ManualClock {
  #[inline]
  fn now(&self) -> Duration {
    Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
  }
}

impl fmt::Debug for ManualClock {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManualClock").field("now", &self.now()).finish()
  }
}
