use std::collections::{BTreeSet, HashMap};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use adaptest_core::selector::{ItemSelector, SelectionContext};
use adaptest_core::{CalibratedItem, ContentArea, IrtParams};

fn bank(size: usize) -> Vec<CalibratedItem> {
    (0..size)
        .map(|i| {
            CalibratedItem::new(
                format!("q{i:05}"),
                ContentArea::ALL[i % ContentArea::ALL.len()],
                IrtParams::new(0.6 + (i % 15) as f64 * 0.1, -3.0 + (i % 61) as f64 * 0.1, 0.15),
            )
        })
        .collect()
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    let selector = ItemSelector::default();
    let areas: BTreeSet<ContentArea> = ContentArea::ALL.into_iter().collect();
    let deficits: BTreeSet<ContentArea> = [ContentArea::Pediatria].into_iter().collect();
    let administered: BTreeSet<String> = (0..40).map(|i| format!("q{i:05}")).collect();
    let rates = HashMap::new();

    for size in [500, 5_000] {
        let items = bank(size);
        let ctx = SelectionContext {
            theta: 0.7,
            areas: &areas,
            deficits: &deficits,
            administered: &administered,
            exposure_rates: &rates,
        };
        group.bench_function(format!("bank_{size}"), |b| {
            b.iter(|| selector.select(black_box(&items), black_box(&ctx)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_select);
criterion_main!(benches);
