//! Event and object selection for [`crate::events::EventBatch`].

use crate::error::{ProcessorError, ProcessorResult};
use crate::events::{Collection, EventBatch, EventRow};
use crate::types::Record;

/// Returns a new batch containing only the events for which `predicate` returns `true`.
pub fn filter<F>(batch: &EventBatch, mut predicate: F) -> EventBatch
where
    F: FnMut(&EventRow<'_>) -> bool,
{
    let mask: Vec<bool> = batch.rows().map(|row| predicate(&row)).collect();
    batch.filter(&mask)
}

/// Keeps only the objects of a jagged collection for which `predicate` returns `true`.
///
/// The number of events is unchanged; events whose objects are all rejected keep an empty
/// list.
pub fn filter_objects<F>(
    mut batch: EventBatch,
    collection: &str,
    mut predicate: F,
) -> ProcessorResult<EventBatch>
where
    F: FnMut(&Record) -> bool,
{
    let Some(Collection::Grouped(records)) = batch.get(collection) else {
        return Err(ProcessorError::UnknownColumn {
            name: collection.to_string(),
        });
    };

    let keep: Vec<Vec<bool>> = (0..records.len())
        .map(|row| records.records(row).iter().map(&mut predicate).collect())
        .collect();
    let selected = records.select(&keep)?;
    batch.insert(collection, Collection::Grouped(selected))?;
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordArray;
    use crate::types::{Array, Value};

    fn sample_batch() -> EventBatch {
        let jets = RecordArray::zip(
            "Jet",
            vec![
                ("pt".to_string(), Array::jagged_f64(vec![vec![50.0, 20.0], vec![], vec![35.0, 31.0, 5.0]])),
                ("eta".to_string(), Array::jagged_f64(vec![vec![0.1, 2.9], vec![], vec![0.0, 1.0, 4.0]])),
            ],
            None,
        )
        .unwrap();
        EventBatch::new(vec![
            ("Jet".to_string(), Collection::Grouped(jets)),
            ("run".to_string(), Collection::Leaf(Array::from_i64(vec![1, 2, 3]))),
        ])
        .unwrap()
    }

    #[test]
    fn filter_events_by_object_count() {
        let batch = sample_batch();
        let out = filter(&batch, |row| row.num("Jet") >= 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out.leaf("run").unwrap(), &Array::from_i64(vec![1, 3]));
        // Input batch is untouched.
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn filter_can_return_empty_batch() {
        let batch = sample_batch();
        let out = filter(&batch, |_| false);
        assert!(out.is_empty());
        assert_eq!(out.field_names(), vec!["Jet", "run"]);
    }

    #[test]
    fn filter_objects_by_kinematics() {
        let batch = sample_batch();
        let out = filter_objects(batch, "Jet", |jet| jet.get_f64("pt").is_some_and(|pt| pt > 30.0)).unwrap();
        assert_eq!(out.len(), 3);

        let nums: Vec<usize> = out.rows().map(|r| r.num("Jet")).collect();
        assert_eq!(nums, vec![1, 0, 2]);
        assert_eq!(
            out.row(2).field("Jet", "eta"),
            Some(&Value::List(vec![Value::Float64(0.0), Value::Float64(1.0)]))
        );
    }

    #[test]
    fn filter_objects_needs_a_grouped_collection() {
        assert!(matches!(
            filter_objects(sample_batch(), "run", |_| true),
            Err(ProcessorError::UnknownColumn { .. })
        ));
        assert!(matches!(
            filter_objects(sample_batch(), "Muon", |_| true),
            Err(ProcessorError::UnknownColumn { .. })
        ));
    }
}
