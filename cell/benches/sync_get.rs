use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fibre_cell::AutoRefreshCell;
use std::io;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn build_cell() -> AutoRefreshCell<u64, io::Error> {
  AutoRefreshCell::builder()
    .time_to_live(Duration::from_secs(3600))
    .initial_value(42)
    .build(|| Ok(42))
    .unwrap()
}

fn bench_fresh_get(c: &mut Criterion) {
  let mut group = c.benchmark_group("sync_get");
  group.throughput(Throughput::Elements(1));

  let cell = build_cell();
  group.bench_function("fresh_hit", |b| {
    b.iter(|| black_box(cell.get().unwrap()));
  });

  group.bench_function("peek", |b| {
    b.iter(|| black_box(cell.peek()));
  });

  // Every call takes the refresh lock and runs the factory inline.
  group.bench_function("force_get_uncontended", |b| {
    b.iter(|| black_box(cell.force_get().unwrap()));
  });

  group.finish();
}

fn bench_contended_get(c: &mut Criterion) {
  let mut group = c.benchmark_group("sync_get_contended");

  for concurrency in [2usize, 4, 8] {
    group.throughput(Throughput::Elements(concurrency as u64));
    group.bench_function(format!("fresh_hit/{concurrency}_threads"), |b| {
      b.iter_custom(|iters| {
        let cell = build_cell();
        let barrier = Arc::new(Barrier::new(concurrency + 1));
        let handles: Vec<_> = (0..concurrency)
          .map(|_| {
            let cell = cell.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
              barrier.wait();
              for _ in 0..iters {
                black_box(cell.get().unwrap());
              }
            })
          })
          .collect();

        let start = Instant::now();
        barrier.wait();
        for handle in handles {
          handle.join().unwrap();
        }
        start.elapsed()
      });
    });
  }

  group.finish();
}

criterion_group!(benches, bench_fresh_get, bench_contended_get);
criterion_main!(benches);
