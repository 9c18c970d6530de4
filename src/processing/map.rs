//! Derived fields for [`crate::events::EventBatch`].

use crate::error::{ProcessorError, ProcessorResult};
use crate::events::{Collection, EventBatch, EventRow};
use crate::types::{Array, DataType, Record, Value};

/// Adds (or replaces) a top-level field computed from every event.
///
/// `data_type` is the declared type of the new column; `mapper` must return values of that
/// type (or [`Value::Null`]).
pub fn with_field<F>(
    mut batch: EventBatch,
    name: &str,
    data_type: DataType,
    mut mapper: F,
) -> ProcessorResult<EventBatch>
where
    F: FnMut(&EventRow<'_>) -> Value,
{
    let values: Vec<Value> = batch.rows().map(|row| mapper(&row)).collect();
    batch.insert(name, Collection::Leaf(Array::new(data_type, values)))?;
    Ok(batch)
}

/// Adds a field to every object of a grouped collection.
///
/// `data_type` is the per-object type; for jagged collections the stored column is a list of
/// it.
pub fn with_object_field<F>(
    mut batch: EventBatch,
    collection: &str,
    name: &str,
    data_type: DataType,
    mut mapper: F,
) -> ProcessorResult<EventBatch>
where
    F: FnMut(&Record) -> Value,
{
    let Some(Collection::Grouped(records)) = batch.get_mut(collection) else {
        return Err(ProcessorError::UnknownColumn {
            name: collection.to_string(),
        });
    };

    let array = if records.is_jagged() {
        let values = (0..records.len())
            .map(|row| Value::List(records.records(row).iter().map(&mut mapper).collect()))
            .collect();
        Array::new(DataType::list(data_type), values)
    } else {
        let values = (0..records.len())
            .map(|row| records.record(row, 0).map_or(Value::Null, |r| mapper(&r)))
            .collect();
        Array::new(data_type, values)
    };
    records.insert_field(name, array)?;
    Ok(batch)
}

/// Stores the result of a behavior method as a new field `name` of `collection`.
pub fn with_method(
    mut batch: EventBatch,
    collection: &str,
    method: &str,
    name: &str,
) -> ProcessorResult<EventBatch> {
    let Some(Collection::Grouped(records)) = batch.get_mut(collection) else {
        return Err(ProcessorError::UnknownColumn {
            name: collection.to_string(),
        });
    };
    let array = records.call(method)?;
    records.insert_field(name, array)?;
    Ok(batch)
}
