use criterion::{Criterion, black_box, criterion_group, criterion_main};
use opsight::{Operation, investment_bank};
use rust_decimal::Decimal;

fn month_of_operations(n: usize) -> Vec<Operation> {
    (0..n)
        .map(|i| {
            let day = i % 28 + 1;
            let month = if i % 3 == 0 { 11 } else { 12 };
            let cents = -((i as i64 * 7919) % 1_000_000);
            Operation::new(
                &format!("{day:02}.{month:02}.2021 12:00:00"),
                Decimal::new(cents, 2),
            )
        })
        .collect()
}

fn bench_round_up(c: &mut Criterion) {
    let ops = month_of_operations(10_000);
    let limit = Decimal::from(50);
    c.bench_function("investment_bank 10k", |b| {
        b.iter(|| investment_bank(black_box("2021-12"), black_box(&ops), limit))
    });
}

criterion_group!(benches, bench_round_up);
criterion_main!(benches);
