#![allow(dead_code)]

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fibre_cell::{AutoRefreshCell, CellBuilder, ManualClock, Task, TaskSpawner};

pub const TTL: Duration = Duration::from_secs(10);

// A factory error carrying the attempt number it failed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryError(pub u64);

impl fmt::Display for FactoryError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "factory attempt {} failed", self.0)
  }
}

impl std::error::Error for FactoryError {}

/// A stateful factory that yields `start, start + 1, ...` and can be told to fail.
#[derive(Clone)]
pub struct Counter {
  next: Arc<AtomicU64>,
  calls: Arc<AtomicUsize>,
  failing: Arc<AtomicBool>,
  delay: Duration,
}

impl Counter {
  pub fn starting_at(start: u64) -> Self {
    Self {
      next: Arc::new(AtomicU64::new(start)),
      calls: Arc::new(AtomicUsize::new(0)),
      failing: Arc::new(AtomicBool::new(false)),
      delay: Duration::ZERO,
    }
  }

  pub fn always_failing() -> Self {
    let counter = Self::starting_at(1);
    counter.set_failing(true);
    counter
  }

  /// Makes every call sleep for `delay` before producing.
  pub fn slow(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn produce(&self) -> Result<u64, FactoryError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
    if !self.delay.is_zero() {
      thread::sleep(self.delay);
    }
    if self.failing.load(Ordering::SeqCst) {
      return Err(FactoryError(call));
    }
    Ok(self.next.fetch_add(1, Ordering::SeqCst))
  }

  pub fn factory(&self) -> impl Fn() -> Result<u64, FactoryError> + Send + Sync + 'static {
    let counter = self.clone();
    move || counter.produce()
  }
}

/// A builder preset with a manual clock starting at one hour.
pub fn builder(clock: &Arc<ManualClock>) -> CellBuilder<u64, FactoryError> {
  AutoRefreshCell::builder()
    .time_to_live(TTL)
    .clock(clock.clone())
}

pub fn manual_clock() -> Arc<ManualClock> {
  Arc::new(ManualClock::new(Duration::from_secs(3600)))
}

/// A spawner that throws every task away.
pub struct DroppingSpawner;

impl TaskSpawner for DroppingSpawner {
  fn spawn(&self, task: Task) {
    drop(task);
  }
}

/// Routes tracing output through the test harness. Safe to call from every test.
pub fn init_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}
