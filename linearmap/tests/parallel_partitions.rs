use std::collections::HashSet;

use linearmap::{Error, LinearMap};
use rayon::prelude::*;

fn word_counts(n: u32) -> LinearMap<String, u32> {
    let mut map = LinearMap::with_capacity(16).unwrap();
    for i in 0..n {
        map.put(format!("word-{i}"), i).unwrap();
    }
    map
}

#[test]
fn partitions_can_be_processed_in_parallel() {
    let map = word_counts(10_000);
    let expected: u64 = map.values().map(|v| *v as u64).sum();

    let parts = map.partition(8);
    assert_eq!(parts.len(), 8);

    let total: u64 = parts
        .par_iter()
        .map(|part| part.values().map(|v| *v as u64).sum::<u64>())
        .sum();
    assert_eq!(total, expected);
}

#[test]
fn partitions_are_independently_mutable() {
    let map = word_counts(2_000);
    let parts: Vec<LinearMap<String, u32>> = map
        .partition(4)
        .into_par_iter()
        .map(|mut part| {
            let keys: Vec<String> = part.keys().cloned().collect();
            for k in keys {
                if let Some(v) = part.get_mut(&k) {
                    *v += 1;
                }
            }
            part
        })
        .collect();

    let mut seen = HashSet::new();
    for part in &parts {
        for (k, v) in part.iter() {
            let i: u32 = k.trim_start_matches("word-").parse().unwrap();
            assert_eq!(*v, i + 1);
            assert!(seen.insert(k.clone()), "{k} appears in two partitions");
        }
    }
    assert_eq!(seen.len(), 2_000);
}

#[test]
fn partitions_merge_back() {
    let map = word_counts(3_000);
    let expected = map.clone();

    let merged = map
        .partition(6)
        .into_iter()
        .try_fold(None::<LinearMap<String, u32>>, |acc, part| {
            Ok::<_, Error>(Some(match acc {
                Some(mut acc) => {
                    let mut part = part;
                    acc.merge(&mut part)?;
                    acc
                }
                None => part,
            }))
        })
        .unwrap()
        .unwrap();

    assert_eq!(merged, expected);
}

#[test]
fn custom_strategy_survives_partition() {
    // case-insensitive keys
    let mut map = LinearMap::with_hasher(
        8,
        |k: &String| {
            k.to_ascii_lowercase()
                .bytes()
                .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
        },
        |a: &String, b: &String| a.eq_ignore_ascii_case(b),
    )
    .unwrap();

    for word in ["Alpha", "beta", "GAMMA", "delta"] {
        map.put(word.to_string(), word.len()).unwrap();
    }
    assert_eq!(map.put("ALPHA".to_string(), 0).unwrap(), Some(5));

    for part in map.partition(2) {
        for (k, _) in part.iter() {
            assert!(part.contains(&k.to_uppercase()));
        }
    }
}
