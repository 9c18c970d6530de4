use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};

use event_stream_processing::config::ProcessorOptions;
use event_stream_processing::events::{
    infer_schema, read_events, ChunkRange, CollectionBuilder, EventBatch, NotLoad, TypeRegistry,
};
use event_stream_processing::execution::Processor;
use event_stream_processing::processing::{filter, with_method};
use event_stream_processing::sink::MemorySink;
use event_stream_processing::source::{EventTable, MemoryBackend, MemoryTable};
use event_stream_processing::types::Array;
use event_stream_processing::ProcessorResult;

const ROWS: usize = 20_000;

fn jets(rows: usize, scale: f64) -> Array {
    Array::jagged_f64(
        (0..rows)
            .map(|i| (0..i % 5).map(|j| scale * (i + j) as f64).collect())
            .collect(),
    )
}

fn table(rows: usize) -> MemoryTable {
    MemoryTable::new(vec![
        ("run".to_string(), Array::from_i64((0..rows as i64).collect())),
        ("Jet_pt".to_string(), jets(rows, 1.0)),
        ("Jet_eta".to_string(), jets(rows, 0.001)),
        ("Jet_phi".to_string(), jets(rows, 0.002)),
        ("Jet_mass".to_string(), jets(rows, 0.1)),
        ("HLT_IsoMu24".to_string(), Array::from_bool((0..rows).map(|i| i % 2 == 0).collect())),
    ])
    .unwrap()
}

fn benchmark_read_events(c: &mut Criterion) {
    let t = table(ROWS);
    let schema = infer_schema(&t.column_names());
    let types = TypeRegistry::nanoaod();
    let builder = CollectionBuilder::new(&types);
    let not_load = NotLoad::new(["HLT*"]);

    c.bench_function("read_events_20k", |b| {
        b.iter(|| {
            let batch = read_events(
                &t,
                &schema,
                black_box(ChunkRange::new(0, ROWS)),
                &not_load,
                &builder,
                &mut |_| {},
            )
            .unwrap();
            black_box(batch.len())
        })
    });
}

fn benchmark_processor_run(c: &mut Criterion) {
    let mut backend = MemoryBackend::new();
    backend.insert("bench", table(ROWS));

    c.bench_function("processor_run_20k_chunk_4k", |b| {
        b.iter(|| {
            let opts = ProcessorOptions::default()
                .with_chunk_size(4_096)
                .with_not_load(["HLT*"]);
            let mut p = Processor::new(
                ["bench"],
                opts,
                |batch: EventBatch| -> ProcessorResult<EventBatch> {
                    let batch = filter(&batch, |row| row.num("Jet") >= 2);
                    with_method(batch, "Jet", "mass", "m")
                },
            )
            .unwrap()
            .with_types(TypeRegistry::nanoaod());
            let mut sink = MemorySink::new();
            let summary = p.run(&backend, &mut sink).unwrap();
            black_box(summary.metrics.rows_written)
        })
    });
}

criterion_group!(benches, benchmark_read_events, benchmark_processor_run);
criterion_main!(benches);
