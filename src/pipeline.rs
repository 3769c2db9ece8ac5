use std::thread;

use crossbeam_channel::{bounded, select};
use log::debug;
use rayon::ThreadPoolBuilder;

use crate::error::IngestError;
use crate::filter::BusinessFilter;
use crate::record::Record;

/// Applies the business filter across a deduplicated record set with a
/// fixed number of parallel workers, funnelling accepted records into a
/// single writer callback.
///
/// The record set is split into at most `workers` contiguous chunks of
/// `ceil(n / workers)` records (the last chunk may be smaller). Each chunk
/// is filtered by an independent task on a dedicated thread pool; accepted
/// records flow through a bounded channel to the writer, which runs on the
/// calling thread so the storage transaction handle never crosses threads.
/// Workers block on emission when the writer lags (the channel is the only
/// point of serialization and the only shared mutable structure).
///
/// Completion is signalled on a second channel once every worker has
/// finished emitting; the writer waits in a select over data and
/// completion, then drains whatever is still buffered, so it neither
/// terminates early nor blocks forever after the last producer is done.
///
/// No ordering is guaranteed across workers: the writer sees accepted
/// records in arbitrary interleaving, which is safe because upstream
/// deduplication makes writes commutative per identifier.
pub struct FilterPipeline {
    workers: usize,
    pool: rayon::ThreadPool,
}

impl FilterPipeline {
    /// Builds the worker pool. `workers` is clamped to a minimum of 1.
    pub fn new(workers: usize) -> Result<Self, IngestError> {
        let workers = workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("filter-{i}"))
            .build()?;
        Ok(Self { workers, pool })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs the pipeline over `records`, invoking `write` once per accepted
    /// record. Returns the number of records written.
    ///
    /// A failed write stops consumption: the receiver is dropped, in-flight
    /// workers observe the disconnect and discard the rest of their output,
    /// and the first write error is returned to the caller.
    pub fn run<W>(
        &self,
        records: &[Record],
        filter: &BusinessFilter,
        mut write: W,
    ) -> Result<usize, IngestError>
    where
        W: FnMut(&Record) -> Result<(), IngestError>,
    {
        if records.is_empty() {
            return Ok(0);
        }

        let chunk_size = records.len().div_ceil(self.workers);
        let capacity = (self.workers * 2).max(16);
        let (record_tx, record_rx) = bounded::<Record>(capacity);
        let (done_tx, done_rx) = bounded::<()>(1);

        let mut written = 0usize;
        let mut write_err: Option<IngestError> = None;

        thread::scope(|scope| {
            scope.spawn(move || {
                self.pool.scope(|s| {
                    for chunk in records.chunks(chunk_size) {
                        let tx = record_tx.clone();
                        s.spawn(move |_| {
                            for rec in filter.filter_chunk(chunk) {
                                // a closed channel means the writer gave up;
                                // the transaction is rolling back, so the
                                // rest of this chunk's output is discarded
                                if tx.send(rec).is_err() {
                                    break;
                                }
                            }
                        });
                    }
                });
                // all workers finished emitting
                let _ = done_tx.send(());
            });

            loop {
                select! {
                    recv(record_rx) -> msg => match msg {
                        Ok(rec) => {
                            if let Err(e) = write(&rec) {
                                write_err = Some(e);
                                break;
                            }
                            written += 1;
                        }
                        Err(_) => break,
                    },
                    recv(done_rx) -> _ => {
                        while let Ok(rec) = record_rx.try_recv() {
                            if let Err(e) = write(&rec) {
                                write_err = Some(e);
                                break;
                            }
                            written += 1;
                        }
                        break;
                    }
                }
            }
            // unblocks any producer still waiting to send after a failure
            drop(record_rx);
        });

        debug!(
            "filter pipeline: {} of {} records accepted across {} workers",
            written,
            records.len(),
            self.workers
        );

        match write_err {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }
}
