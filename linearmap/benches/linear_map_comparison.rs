use std::collections::HashMap;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use linearmap::LinearMap;
use rand::{distr::Alphanumeric, Rng};

/// Generates random string keys with u64 values.
fn generate_data(size: usize) -> Vec<(String, u64)> {
    let mut rng = rand::rng();
    (0..size)
        .map(|i| {
            let key_len = rng.random_range(1..=25);
            let key: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(key_len)
                .map(char::from)
                .collect();
            (key, i as u64)
        })
        .collect()
}

fn benchmark_map_comparisons(c: &mut Criterion) {
    for &size in &[10_000, 100_000, 1_000_000] {
        let mut group = c.benchmark_group(format!("size={size}"));
        if size >= 1_000_000 {
            group.sample_size(10);
            group.measurement_time(Duration::from_secs(20));
        }

        let data = generate_data(size);

        group.bench_function("LinearMap - put", |b| {
            b.iter(|| {
                let mut map = LinearMap::new();
                for (k, v) in &data {
                    map.put(k.clone(), *v).unwrap();
                }
                black_box(map)
            })
        });

        group.bench_function("std::HashMap - insert", |b| {
            b.iter(|| {
                let mut map = HashMap::new();
                for (k, v) in &data {
                    map.insert(k.clone(), *v);
                }
                black_box(map)
            })
        });

        let linear: LinearMap<String, u64> = data.iter().cloned().collect();
        let std_map: HashMap<String, u64> = data.iter().cloned().collect();

        group.bench_function("LinearMap - get", |b| {
            b.iter(|| {
                for (k, _) in &data {
                    black_box(linear.get(k));
                }
            })
        });

        group.bench_function("std::HashMap - get", |b| {
            b.iter(|| {
                for (k, _) in &data {
                    black_box(std_map.get(k));
                }
            })
        });

        group.bench_function("LinearMap - partition(8)", |b| {
            b.iter_with_setup(|| linear.clone(), |m| black_box(m.partition(8)))
        });

        group.finish();
    }
}

criterion_group!(benches, benchmark_map_comparisons);
criterion_main!(benches);
