//! Benchmarks the sparsity-map algebra on wide interval sets — union and
//! difference are on the hot path of every collect/delete.

use criterion::{criterion_group, criterion_main, Criterion};

use chrono::{Days, NaiveDate};
use tidemark_core::domain::{DateInterval, SparsityMap};
use tidemark_core::Unit;

fn striped_map(stripes: u64, width: u64, gap: u64) -> SparsityMap {
    let base = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let mut map = SparsityMap::empty(Unit::Days);
    for i in 0..stripes {
        let start = base
            .checked_add_days(Days::new(i * (width + gap)))
            .unwrap();
        let end = start.checked_add_days(Days::new(width - 1)).unwrap();
        let interval = DateInterval::new(start, end).unwrap();
        map = map.union(&SparsityMap::from_interval(Unit::Days, interval));
    }
    map
}

fn bench_algebra(c: &mut Criterion) {
    // 100 disjoint week-wide stripes vs an offset copy.
    let a = striped_map(100, 7, 7);
    let b = striped_map(100, 7, 9);

    c.bench_function("union_100_stripes", |bench| {
        bench.iter(|| a.union(&b))
    });

    c.bench_function("difference_100_stripes", |bench| {
        bench.iter(|| a.difference(&b))
    });

    c.bench_function("parse_serialize_round_trip", |bench| {
        let serialized = a.to_string();
        bench.iter(|| SparsityMap::parse(Unit::Days, &serialized).unwrap().to_string())
    });
}

criterion_group!(benches, bench_algebra);
criterion_main!(benches);
