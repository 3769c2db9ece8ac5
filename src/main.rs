use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use time::macros::format_description;

use sales_ingest::config::{IngestConfig, UpsertMode};
use sales_ingest::ingest::Ingestor;
use sales_ingest::store::SalesStore;

#[derive(Parser)]
#[command(name = "sales-ingest")]
#[command(about = "Ingests delimited sales-record files into a SQLite store. \
Records are deduplicated and filtered before being upserted inside per-file transactions.")]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "./output.db", help = "Output SQLite file")]
    output: PathBuf,
    #[arg(
        short,
        long,
        help = "Number of filter workers (0 for auto, minimum 1; default 4)"
    )]
    workers: Option<usize>,
    #[arg(long, help = "Path to a YAML run configuration file")]
    config: Option<PathBuf>,
    #[arg(long, value_enum, help = "Upsert mode, overriding the configuration file")]
    mode: Option<UpsertMode>,
    #[arg(
        short,
        long,
        default_value = "INFO",
        help = "Logging level (DEBUG, INFO, WARN, ERROR)"
    )]
    log_level: String,
    #[arg(long, help = "Print the sales table after ingestion")]
    print: bool,
    #[arg(required = true, help = "Input files (plain or .gz)")]
    files: Vec<PathBuf>,
}

fn open_input(path: &PathBuf) -> Result<Box<dyn Read>> {
    let file = File::open(path)
        .with_context(|| format!("failed to open input file: {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}.{millis:03}s")
    }
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", cli.log_level);
            LevelFilter::Info
        }
    };
    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .init()?;

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading run configuration from: {}", path.display());
            IngestConfig::load(path)?
        }
        None => IngestConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(mode) = cli.mode {
        config.upsert_mode = mode;
    }

    let ingestor = Ingestor::new(&config)?;
    info!(
        "Ingesting {} file(s) into {} with {} filter worker(s), {:?} mode",
        cli.files.len(),
        cli.output.display(),
        ingestor.workers(),
        config.upsert_mode
    );

    let mut store = SalesStore::open(&cli.output, config.value_mode)?;

    let progress_bar = ProgressBar::new(cli.files.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Failed to create progress bar template")
            .progress_chars("=> "),
    );

    let mut total_written = 0usize;
    let mut total_rows = 0usize;
    for path in &cli.files {
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |n| n.to_string_lossy().to_string(),
        );
        progress_bar.set_message(name.clone());

        let input = open_input(path)?;
        let mut tx = store.begin(config.upsert_mode)?;
        match ingestor.ingest_file(input, &mut tx) {
            Ok(summary) => {
                tx.commit()?;
                summary.log(&name);
                total_written += summary.written;
                total_rows += summary.rows;
            }
            Err(e) => {
                // dropping the transaction rolls this file back; files
                // committed before it stay committed
                drop(tx);
                error!("Error ingesting {}: {e}", path.display());
                progress_bar.abandon_with_message(format!("ERR: {name}"));
                return Err(e).with_context(|| format!("failed to ingest {}", path.display()));
            }
        }
        progress_bar.inc(1);
    }
    progress_bar.finish_with_message("done");

    info!(
        "Ingested {} file(s): {} rows read, {} records written in {}",
        cli.files.len(),
        total_rows,
        total_written,
        format_elapsed(start_time.elapsed())
    );

    if cli.print {
        println!("Content of sales table:");
        for sale in store.sales()? {
            println!("{sale}");
        }
    }

    Ok(())
}
