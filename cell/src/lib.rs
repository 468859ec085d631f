//! A single-slot, time-to-live cache cell that refreshes its value through a
//! caller-supplied factory.
//!
//! # Features
//! - **One refresh at a time**: A non-blocking try-lock guarantees at most one
//!   factory call in flight. Callers that lose the race never wait; they get
//!   the resident value.
//! - **Read-through & Refresh-ahead**: Refresh inline on expiry with `get`, or
//!   serve the stale value and refresh in the background with
//!   `get_with_refresh_ahead`.
//! - **Failure Policy**: Factory errors are values. An initialized cell can
//!   absorb them and back off for a full time-to-live.
//! - **Pluggable Time & Tasks**: Bring your own `Clock` and `TaskSpawner`,
//!   or use the defaults.
//! - **Observability**: Emits `tracing` events and exposes lock-free metrics.

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod handles;
pub mod metrics;
pub mod runtime;
pub mod task;
pub mod time;

// Internal, crate-only modules
mod entry;
mod shared;
mod sync;

// Re-export the primary user-facing types for convenience
pub use builder::CellBuilder;
pub use config::CellConfig;
pub use error::{BuildError, RefreshError};
pub use handles::{AutoRefreshCell, BackgroundRefresh, RefreshAhead};
pub use metrics::MetricsSnapshot;
pub use runtime::{Task, TaskSpawner, ThreadSpawner};
pub use task::{TaskHandle, TaskOutcome};
pub use time::{Clock, ManualClock, MonotonicClock, SystemClock};

#[cfg(feature = "rayon")]
pub use runtime::RayonSpawner;
#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
