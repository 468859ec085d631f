use fibre_cell::{AutoRefreshCell, CellConfig};
use std::io;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
struct Data {
  version: usize,
  content: String,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let load_counter = Arc::new(AtomicUsize::new(0));
  let config = CellConfig::new(Duration::from_secs(2));

  let cell = AutoRefreshCell::builder()
    .config(&config)
    .suppress_factory_errors(true)
    .build({
      let counter = load_counter.clone();
      move || {
        let version = counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[Factory] Loading version {}...", version);
        thread::sleep(Duration::from_millis(500)); // Simulate slow load
        Ok::<_, io::Error>(Data {
          version,
          content: format!("Content version {}", version),
        })
      }
    })
    .unwrap();

  println!("--- Step 1: Initial Load (inline) ---");
  let value1 = cell.get_with_refresh_ahead().unwrap();
  println!("Received: {:?}", value1.value);
  assert!(!value1.is_dispatched());

  println!("\n--- Step 2: Fresh Read ---");
  let value2 = cell.get().unwrap().unwrap();
  println!("Received: {:?}", *value2);
  assert_eq!(value2.version, 1);

  println!("\n--- Step 3: Wait for TTL to expire (3 seconds) ---");
  thread::sleep(Duration::from_secs(3));

  println!("\n--- Step 4: Stale Read ---");
  let (stale, handle) = cell.get_with_refresh_ahead().unwrap().into_parts();
  let stale = stale.unwrap();
  println!("IMMEDIATELY Received (stale): {:?}", *stale);
  assert_eq!(stale.version, 1, "Should return stale version 1 immediately");

  println!("\n--- Step 5: Wait for Background Refresh to Complete ---");
  if let Some(handle) = handle {
    handle.wait().unwrap();
  }
  assert_eq!(load_counter.load(Ordering::Relaxed), 2);

  println!("\n--- Step 6: Final Read (Fresh) ---");
  let value3 = cell.get().unwrap().unwrap();
  println!("Received (refreshed): {:?}", *value3);
  assert_eq!(value3.version, 2, "Should now have the refreshed version 2");

  println!("\nCell metrics: {:#?}", cell.metrics());
}
