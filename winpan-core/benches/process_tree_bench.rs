#[macro_use]
extern crate criterion;

use criterion::Criterion;

use winpan_core::alloc::Arena;
use winpan_core::process::{MemorySource, ProcFs, ProcessTree};

/// A wide, shallow table resembling a desktop session.
fn synthetic_source(processes: i32) -> MemorySource {
    MemorySource::from_pairs((2..processes).map(|pid| (pid, (pid / 8).max(1))))
}

fn bench_scan_and_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("descendant_query");

    for processes in [256, 1024, 3072] {
        group.throughput(criterion::Throughput::Elements(processes as u64));
        group.bench_function(format!("memory_{}", processes), |b| {
            let source = synthetic_source(processes);
            let mut arena = Arena::with_capacity(1024 * 1024);
            b.iter(|| {
                {
                    let tree = ProcessTree::scan(&arena, &source, 12).unwrap();
                    criterion::black_box(tree.descendants(1).unwrap().len());
                }
                arena.reset();
            });
        });
    }

    if std::path::Path::new("/proc/1/stat").exists() {
        group.bench_function("procfs", |b| {
            let source = ProcFs::default();
            let mut arena = Arena::with_capacity(1024 * 1024);
            b.iter(|| {
                {
                    let tree = ProcessTree::scan(&arena, &source, 12).unwrap();
                    criterion::black_box(tree.descendants(1).unwrap().len());
                }
                arena.reset();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scan_and_collect);
criterion_main!(benches);
