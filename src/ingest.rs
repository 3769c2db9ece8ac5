use std::io::Read;

use log::{debug, info};

use crate::config::IngestConfig;
use crate::dedup::dedup_records;
use crate::error::IngestError;
use crate::filter::BusinessFilter;
use crate::pipeline::FilterPipeline;
use crate::record::{parse_row, RowOutcome, FIELD_COUNT};
use crate::store::IngestTransaction;

/// Per-file ingestion counts, reported after each file resolves.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSummary {
    /// Data rows read (header excluded).
    pub rows: usize,
    /// Blank rows skipped.
    pub blanks: usize,
    /// Records dropped because their id occurred more than once.
    pub duplicates: usize,
    /// Records written to the store.
    pub written: usize,
}

/// Drives one file at a time through parse → dedup → filter → upsert inside
/// the transaction handed to it. Built once per run from the effective
/// configuration; the filter worker pool is reused across files.
pub struct Ingestor {
    config: IngestConfig,
    filter: Option<BusinessFilter>,
    pipeline: FilterPipeline,
}

impl Ingestor {
    pub fn new(config: &IngestConfig) -> Result<Self, IngestError> {
        let pipeline = FilterPipeline::new(config.effective_workers())?;
        let filter = config.filter.as_ref().map(BusinessFilter::new);
        Ok(Self {
            config: config.clone(),
            filter,
            pipeline,
        })
    }

    /// Processes one input file within `tx`. Any error leaves `tx`
    /// uncommitted; the caller decides between commit and rollback. The
    /// first line is a header and is skipped unconditionally.
    pub fn ingest_file<R: Read>(
        &self,
        input: R,
        tx: &mut IngestTransaction<'_>,
    ) -> Result<FileSummary, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let mut summary = FileSummary::default();
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            summary.rows += 1;
            let line = row.position().map_or(0, |pos| pos.line());
            match parse_row(&row, line, FIELD_COUNT, self.config.value_mode)? {
                RowOutcome::Blank => summary.blanks += 1,
                RowOutcome::Row(rec) => records.push(rec),
            }
        }

        let parsed = records.len();
        let records = dedup_records(records);
        summary.duplicates = parsed - records.len();

        summary.written = match &self.filter {
            Some(filter) => self.pipeline.run(&records, filter, |rec| tx.upsert(rec))?,
            None => {
                for rec in &records {
                    tx.upsert(rec)?;
                }
                records.len()
            }
        };

        debug!(
            "file done: {} rows, {} blanks, {} parsed, {} duplicates dropped, {} written",
            summary.rows, summary.blanks, parsed, summary.duplicates, summary.written
        );
        Ok(summary)
    }

    pub fn workers(&self) -> usize {
        self.pipeline.workers()
    }
}

impl FileSummary {
    pub fn log(&self, name: &str) {
        info!(
            "{name}: {} rows read, {} blank, {} duplicate-dropped, {} written",
            self.rows, self.blanks, self.duplicates, self.written
        );
    }
}
