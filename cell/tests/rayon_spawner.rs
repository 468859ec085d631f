mod common;

use common::{builder, init_tracing, manual_clock, Counter, FactoryError, TTL};
use fibre_cell::{AutoRefreshCell, RayonSpawner, RefreshError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

const PATIENCE: Duration = Duration::from_secs(5);

// Every task in this binary shares one rayon thread, so any task that waited
// on another would never finish.
fn single_thread_pool() {
  static POOL: Once = Once::new();
  POOL.call_once(|| {
    rayon::ThreadPoolBuilder::new()
      .num_threads(1)
      .build_global()
      .unwrap();
  });
}

fn occupy_pool() {
  rayon::spawn(|| thread::sleep(Duration::from_millis(200)));
}

#[test]
fn test_rayon_set_then_refresh_ahead_both_finish() {
  init_tracing();
  single_thread_pool();
  let clock = manual_clock();
  let counter = Counter::starting_at(2);
  let cell = builder(&clock)
    .initial_value(1)
    .spawner(Arc::new(RayonSpawner))
    .build(counter.factory())
    .unwrap();

  occupy_pool();
  let set = cell.set_async(100);
  let ahead = cell.force_get_with_refresh_ahead().unwrap();
  assert!(!ahead.is_dispatched(), "the queued write holds the lock");
  assert_eq!(*ahead.value.unwrap(), 1);

  set.wait_timeout(PATIENCE).expect("set finishes").unwrap();
  assert_eq!(*cell.peek().unwrap(), 100);
  assert_eq!(counter.calls(), 0);
}

#[test]
fn test_rayon_set_queued_behind_refresh_finishes() {
  init_tracing();
  single_thread_pool();
  let clock = manual_clock();
  let counter = Counter::starting_at(2);
  let cell = builder(&clock)
    .initial_value(1)
    .spawner(Arc::new(RayonSpawner))
    .build(counter.factory())
    .unwrap();

  occupy_pool();
  let (_, refresh) = cell.force_get_with_refresh_ahead().unwrap().into_parts();
  let set = cell.set_async(100);

  set.wait_timeout(PATIENCE).expect("set finishes").unwrap();
  refresh
    .unwrap()
    .wait_timeout(PATIENCE)
    .expect("refresh finishes")
    .unwrap();

  assert_eq!(*cell.peek().unwrap(), 100, "the write lands after the refresh");
  assert_eq!(counter.calls(), 1);
}

#[test]
fn test_rayon_panicking_factory_abandons_the_refresh() {
  init_tracing();
  single_thread_pool();
  let clock = manual_clock();
  let calls = Arc::new(AtomicUsize::new(0));
  let cell = AutoRefreshCell::<u64, FactoryError>::builder()
    .time_to_live(TTL)
    .clock(clock.clone())
    .initial_value(1)
    .spawner(Arc::new(RayonSpawner))
    .build({
      let calls = calls.clone();
      move || {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
          panic!("factory blew up");
        }
        Ok(2)
      }
    })
    .unwrap();

  let (stale, refresh) = cell.force_get_with_refresh_ahead().unwrap().into_parts();
  assert_eq!(*stale.unwrap(), 1);

  let outcome = refresh
    .unwrap()
    .wait_timeout(PATIENCE)
    .expect("refresh resolves");
  assert!(matches!(outcome, Err(RefreshError::Abandoned)));

  assert_eq!(*cell.peek().unwrap(), 1);
  assert_eq!(*cell.force_get().unwrap().unwrap(), 2, "the refresh lock was released");
}
