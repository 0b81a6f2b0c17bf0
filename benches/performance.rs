use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rowpipe::prelude::*;
use rowpipe::{parse_predicate, ConditionalRowReader, RowReader, ValuesReader};

fn make_reader(rows: i64) -> ValuesReader {
    ValuesReader::new(
        "t1",
        vec![
            ColDescriptor::new("t1", "id", SqlValueType::Integer),
            ColDescriptor::new("t1", "name", SqlValueType::Varchar),
        ],
        (0..rows)
            .map(|i| vec![Value::Integer(i), Value::Varchar(format!("name-{}", i % 16))])
            .collect(),
    )
}

fn drain(reader: &mut ConditionalRowReader) -> usize {
    let ctx = CancellationToken::new();
    let mut n = 0;
    while reader.read(&ctx).is_ok() {
        n += 1;
    }
    n
}

fn bench_conditional_reader(c: &mut Criterion) {
    let condition = Arc::new(parse_predicate("id >= 5000").unwrap());
    let mut group = c.benchmark_group("conditional_reader");
    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| {
                let mut reader = ConditionalRowReader::with_config(
                    Box::new(make_reader(10_000)),
                    condition.clone(),
                    FilterConfig::default().with_workers(w),
                )
                .unwrap();
                let n = drain(&mut reader);
                reader.close().unwrap();
                n
            })
        });
    }
    group.finish();
}

criterion_group!(filters, bench_conditional_reader);
criterion_main!(filters);
