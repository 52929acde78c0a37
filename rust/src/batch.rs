//! Batch applicator: one generated code per visible record.
//!
//! A run has three phases. Every record is read first; any read failure
//! stops the run before anything is written. Codes are then generated in
//! list order, so the n-th non-null id always receives sequence n. Finally
//! all writes are dispatched together and every one of them is awaited
//! before the run reports success or failure.

use futures::future::{join_all, try_join_all};
use log::{debug, info, warn};
use std::fmt;
use thiserror::Error;

use crate::code::{Clock, CodeGen};
use crate::store::{CellValue, Record, RecordId, RecordStore, StoreError};

/// A code written into one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenCode {
    pub record_id: RecordId,
    pub code: String,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Written codes in list order.
    pub written: Vec<WrittenCode>,
    /// Null ids passed over.
    pub skipped: usize,
}

/// Where a record failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
        })
    }
}

/// One record the store refused.
#[derive(Error, Debug)]
#[error("{stage} of record {record_id} failed: {source}")]
pub struct RecordFailure {
    pub record_id: RecordId,
    pub stage: Stage,
    pub source: StoreError,
}

/// A run that did not complete.
#[derive(Error, Debug)]
pub enum BatchError {
    /// A record could not be read; nothing was written.
    #[error("batch aborted before writing: {0}")]
    Read(#[source] RecordFailure),
    /// Some writes failed; the rest landed.
    #[error("{} write(s) failed, {} landed", .failed.len(), .written.len())]
    Write {
        written: Vec<WrittenCode>,
        failed: Vec<RecordFailure>,
    },
}

impl BatchError {
    /// Codes that reached the store before the run gave up.
    pub fn written(&self) -> &[WrittenCode] {
        match self {
            Self::Read(_) => &[],
            Self::Write { written, .. } => written,
        }
    }
}

/// Write one generated code per non-null id into `target_field`.
///
/// The generator's counter is reset before and after the run whatever the
/// outcome, so the same generator can drive the next batch.
pub async fn apply_batch<S, C>(
    store: &S,
    table_id: &str,
    record_ids: &[Option<RecordId>],
    target_field: &str,
    generator: &mut CodeGen<C>,
) -> Result<BatchReport, BatchError>
where
    S: RecordStore,
    C: Clock,
{
    generator.reset();
    let result = run(store, table_id, record_ids, target_field, generator).await;
    generator.reset();
    result
}

async fn run<S, C>(
    store: &S,
    table_id: &str,
    record_ids: &[Option<RecordId>],
    target_field: &str,
    generator: &mut CodeGen<C>,
) -> Result<BatchReport, BatchError>
where
    S: RecordStore,
    C: Clock,
{
    let present: Vec<&RecordId> = record_ids.iter().flatten().collect();
    let skipped = record_ids.len() - present.len();
    if skipped > 0 {
        warn!("skipping {skipped} record(s) without an id in table {table_id}");
    }
    info!(
        "applying codes to {} record(s) in table {table_id}, field {target_field}",
        present.len()
    );

    let records = try_join_all(present.iter().map(|id| async move {
        store
            .get_record(table_id, id)
            .await
            .map_err(|source| RecordFailure {
                record_id: (*id).clone(),
                stage: Stage::Read,
                source,
            })
    }))
    .await
    .map_err(|failure| {
        warn!("{failure}");
        BatchError::Read(failure)
    })?;

    let mut planned: Vec<(WrittenCode, Record)> = Vec::with_capacity(records.len());
    for (id, mut record) in present.into_iter().zip(records) {
        let sequence = generator.sequence();
        let code = generator.next_code();
        debug!("record {id} <- {code} (sequence {sequence})");
        record
            .fields
            .insert(target_field.to_string(), CellValue::text(code.clone()));
        planned.push((
            WrittenCode {
                record_id: id.clone(),
                code,
            },
            record,
        ));
    }

    let outcomes = join_all(
        planned
            .iter()
            .map(|(w, record)| store.set_record(table_id, &w.record_id, record.clone())),
    )
    .await;

    let mut written = Vec::with_capacity(planned.len());
    let mut failed = Vec::new();
    for ((w, _), outcome) in planned.into_iter().zip(outcomes) {
        match outcome {
            Ok(()) => written.push(w),
            Err(source) => {
                let failure = RecordFailure {
                    record_id: w.record_id,
                    stage: Stage::Write,
                    source,
                };
                warn!("{failure}");
                failed.push(failure);
            }
        }
    }

    if failed.is_empty() {
        info!("wrote {} code(s) to table {table_id}", written.len());
        Ok(BatchReport { written, skipped })
    } else {
        Err(BatchError::Write { written, failed })
    }
}
