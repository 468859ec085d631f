#[cfg(feature = "rayon")]
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// A unit of blocking work handed to a [`TaskSpawner`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A trait for running a unit of work off the calling thread.
///
/// A task may block for as long as the value factory runs, but never waits on
/// another task. Fixed-size pools are fine; a slow factory ties up one of
/// their threads while it runs.
///
/// An implementation that cannot run a task should simply drop it. The cell
/// notices and resolves the task's handle with
/// [`RefreshError::Abandoned`](crate::RefreshError::Abandoned).
pub trait TaskSpawner: Send + Sync + 'static {
  /// Runs `task` in the background.
  fn spawn(&self, task: Task);
}

/// Runs every task on a freshly spawned, named OS thread.
///
/// This is the default spawner. It needs no runtime and is fine for cells whose
/// refreshes are infrequent, which is the point of a TTL.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl TaskSpawner for ThreadSpawner {
  fn spawn(&self, task: Task) {
    let spawned = thread::Builder::new()
      .name("fibre-cell-refresh".into())
      .spawn(task);
    if let Err(err) = spawned {
      tracing::error!(error = %err, "failed to spawn background refresh thread");
    }
  }
}

#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioSpawner(tokio::runtime::Handle);

#[cfg(feature = "tokio")]
impl TokioSpawner {
  /// Creates a spawner that uses the current Tokio runtime context.
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self(tokio::runtime::Handle::current())
  }

  /// Creates a spawner for an explicit runtime handle.
  pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
    Self(handle)
  }
}

#[cfg(feature = "tokio")]
impl TaskSpawner for TokioSpawner {
  fn spawn(&self, task: Task) {
    // Tasks block, so they belong on the blocking pool.
    drop(self.0.spawn_blocking(task));
  }
}

/// Runs tasks on the global rayon thread pool.
///
/// A panicking task is caught and logged; its handle resolves to
/// [`RefreshError::Abandoned`](crate::RefreshError::Abandoned).
#[cfg(feature = "rayon")]
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonSpawner;

#[cfg(feature = "rayon")]
impl TaskSpawner for RayonSpawner {
  fn spawn(&self, task: Task) {
    // A panic escaping a rayon job aborts the process.
    rayon::spawn(move || {
      if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
        tracing::error!("background task panicked");
      }
    });
  }
}
