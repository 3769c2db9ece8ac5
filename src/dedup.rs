use std::collections::HashMap;

use crate::record::Record;

/// Removes every record whose identifier occurs more than once in `records`.
///
/// A repeated identifier is ambiguous input: no occurrence is treated as
/// authoritative, so none of them survive the batch. Order is preserved for
/// the records that remain. Single pass to count, single pass to filter.
pub fn dedup_records(records: Vec<Record>) -> Vec<Record> {
    let mut occurrences: HashMap<i64, usize> = HashMap::with_capacity(records.len());
    for rec in &records {
        *occurrences.entry(rec.id).or_insert(0) += 1;
    }
    records
        .into_iter()
        .filter(|rec| occurrences[&rec.id] == 1)
        .collect()
}
