use thiserror::Error;

/// Failures raised while ingesting a file into the sales store.
///
/// Every variant aborts the current file's transaction; `StoreConnection`
/// and `WorkerPool` additionally abort the whole run before any file is
/// touched. A row whose fields are all empty is not an error and never
/// surfaces here.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A data row that cannot be turned into a record: wrong field count,
    /// or an identifier, date, or value that does not parse.
    #[error("malformed row at line {row}: {reason}")]
    MalformedRow { row: u64, reason: String },

    /// The delimited reader itself failed mid-file.
    #[error("failed to read input: {0}")]
    Read(#[from] csv::Error),

    /// A statement or commit failed inside the file's transaction.
    #[error("store write failed: {0}")]
    StoreWrite(#[source] rusqlite::Error),

    /// The store could not be opened or its table created.
    #[error("cannot open store: {0}")]
    StoreConnection(#[source] rusqlite::Error),

    /// The filter worker pool could not be built.
    #[error("failed to start filter workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl IngestError {
    pub(crate) fn malformed(row: u64, reason: impl Into<String>) -> Self {
        IngestError::MalformedRow {
            row,
            reason: reason.into(),
        }
    }
}
