use crate::error::PartitionError;
use chrono::Utc;
use model::records::{batch::BatchJob, record::Dataset};

/// Splits `dataset` into `ceil(len / batch_size)` contiguous jobs, numbered
/// from 1. Each job owns a copy of its rows.
pub fn partition(dataset: &Dataset, batch_size: usize) -> Result<Vec<BatchJob>, PartitionError> {
    if batch_size == 0 {
        return Err(PartitionError::ZeroBatchSize);
    }

    let created_at = Utc::now();
    Ok(dataset
        .records
        .chunks(batch_size)
        .enumerate()
        .map(|(i, rows)| BatchJob {
            index: i + 1,
            offset: i * batch_size,
            columns: dataset.columns.clone(),
            records: rows.to_vec(),
            created_at,
        })
        .collect())
}
