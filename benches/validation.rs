//! Criterion benchmarks for validation
//!
//! Measures host resolution and full namespace validation passes over
//! generated snapshots, sequentially and on worker threads.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use meshcheck::common::Host;
use meshcheck::{Snapshot, ValidationConfig, ValidationEngine};

// =============================================================================
// Test Fixtures
// =============================================================================

fn service_manifests(i: usize, rng: &mut impl Rng) -> String {
    let weight = rng.gen_range(10..=100);
    let host = match rng.gen_range(0..3) {
        0 => format!("svc-{i}"),
        1 => format!("svc-{i}.bench"),
        _ => format!("svc-{i}.bench.svc.cluster.local"),
    };
    format!(
        r#"
apiVersion: v1
kind: Service
metadata:
  name: svc-{i}
  namespace: bench
spec:
  selector:
    app: svc-{i}
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: svc-{i}-v1
  namespace: bench
spec:
  template:
    metadata:
      labels:
        app: svc-{i}
        version: v1
---
apiVersion: networking.istio.io/v1beta1
kind: DestinationRule
metadata:
  name: svc-{i}
  namespace: bench
spec:
  host: {host}
  subsets:
  - name: v1
    labels:
      version: v1
  - name: v2
    labels:
      version: v2
---
apiVersion: networking.istio.io/v1beta1
kind: VirtualService
metadata:
  name: svc-{i}
  namespace: bench
spec:
  hosts:
  - {host}
  http:
  - route:
    - destination:
        host: svc-{i}
        subset: v1
      weight: {weight}
---
"#
    )
}

/// A namespace of `n` services, each with a workload, a rule and a virtual service
fn generated_snapshot(n: usize) -> Snapshot {
    let mut rng = rand::thread_rng();
    let manifests: String = (0..n).map(|i| service_manifests(i, &mut rng)).collect();
    Snapshot::from_yaml(&manifests).expect("generated snapshot should parse")
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_host_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_resolution");
    let namespaces = vec!["bookinfo".to_string(), "istio-system".to_string()];
    group.throughput(Throughput::Elements(1));

    for raw in ["reviews", "reviews.bookinfo", "reviews.bookinfo.svc.cluster.local", "*.local"] {
        group.bench_with_input(BenchmarkId::new("resolve", raw), &raw, |b, &raw| {
            b.iter(|| black_box(Host::resolve(black_box(raw), "bookinfo", "Kubernetes", &namespaces)));
        });
    }

    let a = Host::resolve("reviews", "bookinfo", "Kubernetes", &namespaces);
    let b = Host::resolve("*.bookinfo.svc.cluster.local", "bookinfo", "Kubernetes", &namespaces);
    group.bench_function("matches_wildcard", |bench| {
        bench.iter(|| black_box(a.matches(black_box(&b))));
    });

    group.finish();
}

fn bench_validate_namespace(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_namespace");

    for size in [10, 100, 500] {
        let snapshot = generated_snapshot(size);
        let config = ValidationConfig::default();
        let context = snapshot.context_for("bench", &config);
        group.throughput(Throughput::Elements(size as u64));

        for workers in [1, 4] {
            let engine = ValidationEngine::new(config.clone().with_workers(workers));
            group.bench_with_input(
                BenchmarkId::new(format!("workers_{workers}"), size),
                &context,
                |b, context| {
                    b.iter(|| black_box(engine.validate(context)));
                },
            );
        }
    }

    group.finish();
}

fn bench_snapshot_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_loading");
    let mut rng = rand::thread_rng();

    for size in [10, 100] {
        let manifests: String = (0..size).map(|i| service_manifests(i, &mut rng)).collect();
        group.throughput(Throughput::Bytes(manifests.len() as u64));
        group.bench_with_input(BenchmarkId::new("from_yaml", size), &manifests, |b, manifests| {
            b.iter(|| black_box(Snapshot::from_yaml(manifests)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_host_resolution,
    bench_validate_namespace,
    bench_snapshot_loading
);
criterion_main!(benches);
