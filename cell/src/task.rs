use crate::error::RefreshError;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread, ThreadId};
use std::time::{Duration, Instant};

/// The result a background task resolves to.
pub type TaskOutcome<E> = Result<(), RefreshError<E>>;

/// Represents a waiter parked on a `TaskHandle`.
enum Waiter {
  Sync(Thread),
  Async(Waker),
}

impl Waiter {
  fn is_thread(&self, id: ThreadId) -> bool {
    matches!(self, Waiter::Sync(thread) if thread.id() == id)
  }

  fn wake(self) {
    match self {
      Waiter::Sync(thread) => thread.unpark(),
      Waiter::Async(waker) => waker.wake(),
    }
  }
}

enum State<E> {
  Running,
  Finished(TaskOutcome<E>),
  Taken,
}

/// The mutex-protected core shared by a handle and its completer.
struct Inner<E> {
  state: State<E>,
  waiters: VecDeque<Waiter>,
}

impl<E> Inner<E> {
  /// Registers the current thread for an unpark, once.
  fn park_current(&mut self) {
    let id = thread::current().id();
    if !self.waiters.iter().any(|w| w.is_thread(id)) {
      self.waiters.push_back(Waiter::Sync(thread::current()));
    }
  }
}

struct Completion<E> {
  inner: Mutex<Inner<E>>,
}

impl<E> Completion<E> {
  fn finish(&self, outcome: TaskOutcome<E>) {
    let mut inner = self.inner.lock();
    if !matches!(inner.state, State::Running) {
      return;
    }
    inner.state = State::Finished(outcome);
    for waiter in inner.waiters.drain(..) {
      waiter.wake();
    }
  }
}

/// Creates a linked handle/completer pair for a task about to be spawned.
pub(crate) fn pair<E>() -> (TaskHandle<E>, TaskCompleter<E>) {
  let completion = Arc::new(Completion {
    inner: Mutex::new(Inner {
      state: State::Running,
      waiters: VecDeque::new(),
    }),
  });
  (
    TaskHandle {
      completion: Arc::clone(&completion),
    },
    TaskCompleter {
      completion: Some(completion),
    },
  )
}

/// The producing side of a [`TaskHandle`], moved into the background task.
///
/// Dropping it without calling [`complete`](Self::complete) resolves the
/// handle to [`RefreshError::Abandoned`].
pub(crate) struct TaskCompleter<E> {
  completion: Option<Arc<Completion<E>>>,
}

impl<E> TaskCompleter<E> {
  pub(crate) fn complete(mut self, outcome: TaskOutcome<E>) {
    if let Some(completion) = self.completion.take() {
      completion.finish(outcome);
    }
  }
}

impl<E> Drop for TaskCompleter<E> {
  fn drop(&mut self) {
    if let Some(completion) = self.completion.take() {
      completion.finish(Err(RefreshError::Abandoned));
    }
  }
}

/// A handle to a task dispatched by the cell.
///
/// The task runs whether or not anyone holds the handle; dropping the handle
/// does not cancel it. The handle can be waited on from a thread with
/// [`wait`](Self::wait) or awaited from async code.
#[must_use = "dropping a TaskHandle discards the task's outcome, but not the task"]
pub struct TaskHandle<E> {
  completion: Arc<Completion<E>>,
}

impl<E> TaskHandle<E> {
  /// Returns `true` once the task has completed, successfully or not.
  pub fn is_finished(&self) -> bool {
    !matches!(self.completion.inner.lock().state, State::Running)
  }

  /// Blocks the current thread until the task completes.
  pub fn wait(self) -> TaskOutcome<E> {
    let mut inner = self.completion.inner.lock();
    loop {
      if let Some(outcome) = take_outcome(&mut inner.state) {
        return outcome;
      }
      inner.park_current();
      drop(inner); // Unlock before parking.
      thread::park();
      inner = self.completion.inner.lock();
    }
  }

  /// Blocks until the task completes or `timeout` elapses.
  ///
  /// On timeout the handle is given back so the caller can keep waiting later.
  pub fn wait_timeout(self, timeout: Duration) -> Result<TaskOutcome<E>, Self> {
    let deadline = Instant::now() + timeout;
    let mut inner = self.completion.inner.lock();
    loop {
      if let Some(outcome) = take_outcome(&mut inner.state) {
        return Ok(outcome);
      }
      let now = Instant::now();
      if now >= deadline {
        // Nobody may unpark this thread once it has stopped waiting.
        let id = thread::current().id();
        inner.waiters.retain(|w| !w.is_thread(id));
        drop(inner);
        return Err(self);
      }
      inner.park_current();
      drop(inner);
      thread::park_timeout(deadline - now);
      inner = self.completion.inner.lock();
    }
  }
}

fn take_outcome<E>(state: &mut State<E>) -> Option<TaskOutcome<E>> {
  match std::mem::replace(state, State::Taken) {
    State::Finished(outcome) => Some(outcome),
    State::Running => {
      *state = State::Running;
      None
    }
    // Only the single owning handle takes the outcome, and it is consumed doing so.
    State::Taken => Some(Err(RefreshError::Abandoned)),
  }
}

impl<E> Future for TaskHandle<E> {
  type Output = TaskOutcome<E>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let mut inner = self.completion.inner.lock();
    match take_outcome(&mut inner.state) {
      Some(outcome) => Poll::Ready(outcome),
      None => {
        if !inner.waiters.iter().any(|w| match w {
          Waiter::Async(waker) => waker.will_wake(cx.waker()),
          Waiter::Sync(_) => false,
        }) {
          inner.waiters.push_back(Waiter::Async(cx.waker().clone()));
        }
        Poll::Pending
      }
    }
  }
}

impl<E> fmt::Debug for TaskHandle<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TaskHandle")
      .field("finished", &self.is_finished())
      .finish()
  }
}
