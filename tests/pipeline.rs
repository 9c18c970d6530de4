use std::sync::{Arc, Mutex};

use event_stream_processing::config::ProcessorOptions;
use event_stream_processing::events::{Behavior, EventBatch, Notice, TypeRegistry};
use event_stream_processing::execution::{ProcessorEvent, ProcessorObserver, Processor, Severity};
use event_stream_processing::processing::{filter, filter_objects, with_method};
use event_stream_processing::sink::MemorySink;
use event_stream_processing::source::{MemoryBackend, MemoryTable};
use event_stream_processing::types::{Array, DataType, Record, Value};
use event_stream_processing::{ProcessorError, ProcessorResult};

/// Jet multiplicity per row: `i % 3` below 100, none from 100 to 199, two from 200 on.
fn jet_count(i: usize) -> usize {
    match i {
        0..=99 => i % 3,
        100..=199 => 0,
        _ => 2,
    }
}

fn events_table(rows: usize) -> MemoryTable {
    let pt = (0..rows)
        .map(|i| (0..jet_count(i)).map(|j| 20.0 + (i * 10 + j) as f64).collect())
        .collect();
    let eta = (0..rows)
        .map(|i| (0..jet_count(i)).map(|j| if j == 0 { -1.5 } else { 0.5 }).collect())
        .collect();
    MemoryTable::new(vec![
        ("Jet_pt".to_string(), Array::jagged_f64(pt)),
        ("Jet_eta".to_string(), Array::jagged_f64(eta)),
        ("run".to_string(), Array::from_i64((0..rows as i64).collect())),
    ])
    .unwrap()
}

fn backend_with(path: &str, table: MemoryTable) -> (MemoryBackend, Arc<MemoryTable>) {
    let mut backend = MemoryBackend::new();
    let table = backend.insert(path, table);
    (backend, table)
}

fn identity(batch: EventBatch) -> ProcessorResult<EventBatch> {
    Ok(batch)
}

#[derive(Default)]
struct Recorder(Mutex<Vec<ProcessorEvent>>);

impl ProcessorObserver for Recorder {
    fn on_event(&self, event: &ProcessorEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

impl Recorder {
    fn events(&self) -> Vec<ProcessorEvent> {
        self.0.lock().unwrap().clone()
    }
}

#[test]
fn two_jet_selection_survives_an_empty_middle_chunk() {
    let (backend, table) = backend_with("events", events_table(250));
    let mut seen = Vec::new();
    let mut sink = MemorySink::new();

    let summary = {
        let mut p = Processor::new(
            ["events"],
            ProcessorOptions::default().with_chunk_size(100),
            |batch: EventBatch| -> ProcessorResult<EventBatch> {
                let jet = batch.grouped("Jet").expect("Jet is grouped");
                seen.push((
                    batch.len(),
                    batch.field_names().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                    jet.field_names().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                    jet.is_jagged(),
                    batch.leaf("run").is_some(),
                ));
                Ok(filter(&batch, |row| row.num("Jet") >= 2))
            },
        )
        .unwrap();
        p.run(&backend, &mut sink).unwrap()
    };

    assert_eq!(table.ranges(), vec![(0, 100), (100, 200), (200, 250)]);
    let lens: Vec<usize> = seen.iter().map(|s| s.0).collect();
    assert_eq!(lens, vec![100, 100, 50]);
    for (_, fields, jet_fields, jagged, has_run) in &seen {
        assert_eq!(fields, &vec!["Jet".to_string(), "run".to_string()]);
        assert_eq!(jet_fields, &vec!["pt".to_string(), "eta".to_string()]);
        assert!(*jagged);
        assert!(*has_run);
    }

    // Rows 2, 5, ..., 98 from the first chunk and all 50 from the last.
    assert_eq!(summary.metrics.chunks_read, 3);
    assert_eq!(summary.metrics.chunks_discarded, 1);
    assert_eq!(summary.metrics.chunks_written, 2);
    assert_eq!(summary.metrics.rows_written, 83);
    assert_eq!(sink.creates(), 1);
    assert_eq!(sink.extends(), 1);
    assert!(sink.is_closed());

    let runs = sink.column("run").unwrap();
    let expected: Vec<i64> = (2..100).step_by(3).chain(200..250).map(|i| i as i64).collect();
    assert_eq!(runs, Array::from_i64(expected));
    let counts = sink.column("nJet").unwrap();
    assert!(counts.values().iter().all(|v| v.as_i64() == Some(2)));
}

#[test]
fn max_events_caps_rows_read_per_file() {
    let (backend, table) = backend_with("events", events_table(250));
    let mut sink = MemorySink::new();
    let mut p = Processor::new(
        ["events"],
        ProcessorOptions::default().with_chunk_size(40).with_max_events(90),
        identity,
    )
    .unwrap();
    let summary = p.run(&backend, &mut sink).unwrap();

    // ceil(90 / 40) chunks, the last one clipped at the cap.
    assert_eq!(summary.metrics.chunks_read, 3);
    assert_eq!(table.ranges(), vec![(0, 40), (40, 80), (80, 90)]);
    assert_eq!(summary.metrics.rows_read, 90);
    assert_eq!(sink.row_count(), 90);
}

#[test]
fn cap_applies_to_each_file_separately() {
    let mut backend = MemoryBackend::new();
    let first = backend.insert("first", events_table(30));
    let second = backend.insert("second", events_table(250));
    let mut sink = MemorySink::new();
    let mut p = Processor::new(
        ["first", "second"],
        ProcessorOptions::default().with_chunk_size(25).with_max_events(50),
        identity,
    )
    .unwrap();
    let summary = p.run(&backend, &mut sink).unwrap();

    assert_eq!(first.ranges(), vec![(0, 25), (25, 30)]);
    assert_eq!(second.ranges(), vec![(0, 25), (25, 50)]);
    assert_eq!(summary.metrics.files_processed, 2);
    assert_eq!(summary.metrics.rows_read, 80);
    assert_eq!(sink.row_count(), 80);
}

#[test]
fn output_does_not_depend_on_chunk_size() {
    let run_with = |chunk_size: usize| {
        let (backend, _) = backend_with("events", events_table(250));
        let mut sink = MemorySink::new();
        let mut p = Processor::new(
            ["events"],
            ProcessorOptions::default().with_chunk_size(chunk_size),
            |batch: EventBatch| -> ProcessorResult<EventBatch> {
                let batch = filter(&batch, |row| row.num("Jet") >= 1);
                filter_objects(batch, "Jet", |jet| jet.get_f64("eta").is_some_and(|eta| eta > 0.0))
            },
        )
        .unwrap();
        let summary = p.run(&backend, &mut sink).unwrap();
        assert!(summary.metrics.max_chunk_rows <= chunk_size);
        (
            sink.column("run").unwrap(),
            sink.column("nJet").unwrap(),
            sink.column("Jet_pt").unwrap(),
            sink.column("Jet_eta").unwrap(),
        )
    };

    let reference = run_with(250);
    for chunk_size in [1, 7, 64, 100, 1000] {
        assert_eq!(run_with(chunk_size), reference, "chunk_size={chunk_size}");
    }
}

#[test]
fn empty_table_yields_no_output_and_no_error() {
    let table = MemoryTable::new(vec![
        ("Jet_pt".to_string(), Array::empty(DataType::list(DataType::Float64))),
        ("run".to_string(), Array::empty(DataType::Int64)),
    ])
    .unwrap();
    let (backend, table) = backend_with("empty", table);
    let recorder = Arc::new(Recorder::default());
    let mut sink = MemorySink::new();
    let mut p = Processor::new(["empty"], ProcessorOptions::default(), identity)
        .unwrap()
        .with_observer(recorder.clone());
    let summary = p.run(&backend, &mut sink).unwrap();

    assert_eq!(table.reads(), 0);
    assert_eq!(summary.metrics.rows_read, 0);
    assert!(summary.schema.is_none());
    assert_eq!(sink.creates(), 0);
    assert!(sink.is_closed());
    assert!(recorder.events().iter().any(|e| matches!(
        e,
        ProcessorEvent::FileFinished { rows_read: 0, .. }
    )));
}

#[test]
fn schema_change_between_files_halts_the_run() {
    let mut backend = MemoryBackend::new();
    backend.insert("a", events_table(20));
    backend.insert(
        "b",
        MemoryTable::new(vec![
            ("run".to_string(), Array::from_i64(vec![1, 2])),
            ("MET_pt".to_string(), Array::from_f64(vec![10.0, 20.0])),
        ])
        .unwrap(),
    );
    backend.insert("c", events_table(20));

    let recorder = Arc::new(Recorder::default());
    let mut sink = MemorySink::new();
    let mut p = Processor::new(["a", "b", "c"], ProcessorOptions::default(), identity)
        .unwrap()
        .with_observer(recorder.clone());
    let err = p.run(&backend, &mut sink).unwrap_err();

    let ProcessorError::SchemaMismatchOnExtend { missing, unexpected, retyped } = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(missing, vec!["nJet", "Jet_pt", "Jet_eta"]);
    assert_eq!(unexpected, vec!["MET_pt"]);
    assert!(retyped.is_empty());

    assert_eq!(sink.row_count(), 20);
    assert!(!sink.is_closed());
    let events = recorder.events();
    assert!(!events.iter().any(|e| matches!(e, ProcessorEvent::FileStarted { path, .. } if path.ends_with("c"))));
    assert_eq!(events.last().map(ProcessorEvent::severity), Some(Severity::Error));
}

#[test]
fn not_load_skips_fields_and_collections() {
    let table = MemoryTable::new(vec![
        ("run".to_string(), Array::from_i64(vec![1, 2, 3])),
        ("Jet_pt".to_string(), Array::jagged_f64(vec![vec![30.0], vec![], vec![40.0, 50.0]])),
        ("Jet_btag".to_string(), Array::jagged_f64(vec![vec![0.9], vec![], vec![0.1, 0.2]])),
        ("HLT_IsoMu24".to_string(), Array::from_bool(vec![true, false, true])),
        ("HLT_Ele32".to_string(), Array::from_bool(vec![false, false, true])),
        ("Muon_pt".to_string(), Array::jagged_f64(vec![vec![], vec![15.0], vec![]])),
    ])
    .unwrap();
    let (backend, _) = backend_with("events", table);
    let recorder = Arc::new(Recorder::default());
    let mut sink = MemorySink::new();
    let mut p = Processor::new(
        ["events"],
        ProcessorOptions::default().with_not_load(["HLT", "Jet_btag", "Muon_*"]),
        identity,
    )
    .unwrap()
    .with_types(TypeRegistry::nanoaod())
    .with_observer(recorder.clone());
    let summary = p.run(&backend, &mut sink).unwrap();

    let names: Vec<&str> = summary.schema.as_ref().unwrap().field_names().collect();
    assert_eq!(names, vec!["run", "nJet", "Jet_pt"]);
    assert_eq!(summary.metrics.collections_dropped, 1);

    let dropped: Vec<(Notice, Severity)> = recorder
        .events()
        .into_iter()
        .filter_map(|e| {
            let severity = e.severity();
            match e {
                ProcessorEvent::Notice { notice, .. } => Some((notice, severity)),
                _ => None,
            }
        })
        .collect();
    assert_eq!(
        dropped,
        vec![(
            Notice::MissingCollectionData {
                collection: "Muon".to_string()
            },
            Severity::Warning
        )]
    );
}

#[test]
fn untagged_collections_are_reported() {
    let (backend, _) = backend_with("events", events_table(10));
    let recorder = Arc::new(Recorder::default());
    let mut p = Processor::new(["events"], ProcessorOptions::default(), identity)
        .unwrap()
        .with_observer(recorder.clone());
    p.run(&backend, MemorySink::new()).unwrap();

    let notices: Vec<ProcessorEvent> = recorder
        .events()
        .into_iter()
        .filter(|e| matches!(e, ProcessorEvent::Notice { .. }))
        .collect();
    assert_eq!(notices.len(), 1);
    assert!(matches!(
        &notices[0],
        ProcessorEvent::Notice {
            notice: Notice::NoTypeTagRegistered { collection },
            ..
        } if collection == "Jet"
    ));
    assert_eq!(notices[0].severity(), Severity::Info);
}

#[test]
fn missing_source_is_an_io_error() {
    let backend = MemoryBackend::new();
    let mut p = Processor::new(["nowhere"], ProcessorOptions::default(), identity).unwrap();
    let err = p.run(&backend, MemorySink::new()).unwrap_err();
    assert!(matches!(err, ProcessorError::Io(_)));
}

#[test]
fn method_fields_keep_their_type_in_chunks_without_objects() {
    // One jet in rows 0..10, none in rows 10..20.
    let table = || {
        MemoryTable::new(vec![
            ("run".to_string(), Array::from_i64((0..20).collect())),
            (
                "Jet_pt".to_string(),
                Array::jagged_f64((0..20).map(|i| if i < 10 { vec![10.0 * i as f64] } else { vec![] }).collect()),
            ),
        ])
        .unwrap()
    };
    let types = || {
        TypeRegistry::new().with_type("Jet", "Jet").with_behavior(Behavior::new().with_method(
            "Jet",
            "hard",
            DataType::Bool,
            |jet: &Record| Value::Bool(jet.get_f64("pt").is_some_and(|pt| pt > 45.0)),
        ))
    };

    let run_with = |chunk_size: usize| {
        let (backend, _) = backend_with("events", table());
        let mut sink = MemorySink::new();
        let mut p = Processor::new(
            ["events"],
            ProcessorOptions::default().with_chunk_size(chunk_size),
            |batch: EventBatch| -> ProcessorResult<EventBatch> { with_method(batch, "Jet", "hard", "hard") },
        )
        .unwrap()
        .with_types(types());
        let summary = p.run(&backend, &mut sink).unwrap();
        assert_eq!(summary.metrics.rows_written, 20);
        assert_eq!(
            sink.schema().unwrap().field("Jet_hard").unwrap().data_type,
            DataType::list(DataType::Bool)
        );
        sink.column("Jet_hard").unwrap()
    };

    let whole = run_with(20);
    assert_eq!(run_with(10), whole);
    assert_eq!(run_with(3), whole);
    assert_eq!(whole.get(6), Some(&Value::List(vec![Value::Bool(true)])));
    assert_eq!(whole.get(15), Some(&Value::List(vec![])));
}
