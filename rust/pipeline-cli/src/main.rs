//! Dataset Input Pipeline Inspector
//!
//! Counts the records of a dataset or prints the first batches the input
//! pipeline produces for it.
//!
//! # Usage
//!
//! ```bash
//! # Count the records matched by a pattern
//! pipeline-inspect --pattern "data/train-*.txt" count
//!
//! # Preview three shuffled batches of 4, using a configuration file
//! pipeline-inspect --config pipeline.toml head --batch-size 4 --batches 3 --shuffle
//!
//! # Preview the shard of worker 1 out of 4
//! pipeline-inspect --pattern "data/*.txt" head --num-workers 4 --worker-index 1
//! ```

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeline_core::dataset::{ColumnsParser, RawParser};
use pipeline_core::{InputDataset, PipelineConfig, ReadOptions, TaskSpec};

/// Dataset input pipeline inspector
#[derive(Parser, Debug)]
#[command(name = "pipeline-inspect")]
#[command(about = "Count records and preview batches of a dataset input pipeline")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Glob pattern of the data files (overrides the configuration)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Record reader: text-line, fixed:N or length-prefixed
    #[arg(short, long)]
    reader: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the number of records in one pass over the data
    Count,

    /// Print the first batches produced by the pipeline
    Head {
        /// Examples per batch
        #[arg(long, default_value = "8")]
        batch_size: usize,

        /// Number of batches to print
        #[arg(long, default_value = "1")]
        batches: usize,

        /// Passes over the data; 0 repeats forever
        #[arg(long, default_value = "1")]
        epochs: u32,

        /// Interleave files and shuffle records
        #[arg(long)]
        shuffle: bool,

        /// Shuffle buffer size (overrides the configuration)
        #[arg(long)]
        shuffle_size: Option<usize>,

        /// Total number of workers reading the dataset
        #[arg(long, default_value = "1")]
        num_workers: u32,

        /// Index of this worker
        #[arg(long, default_value = "0")]
        worker_index: u32,

        /// Number of leading columns used as inputs
        #[arg(long, default_value = "1")]
        inputs: usize,
    },
}

fn load_config(args: &Args) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    }
    .with_env_overrides();

    if let Some(pattern) = &args.pattern {
        config.dataset.data_files_pattern = pattern.clone();
    }
    if let Some(reader) = &args.reader {
        config.dataset.reader = reader.clone();
    }
    if let Command::Head {
        shuffle_size: Some(size),
        ..
    } = &args.command
    {
        config.dataset.shuffle_size = Some(*size);
    }

    Ok(config)
}

fn format_values(values: &[f32]) -> String {
    let fields: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", fields.join(", "))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&args)?;
    tracing::info!(
        dataset = %config.dataset.name,
        pattern = %config.dataset.data_files_pattern,
        reader = %config.dataset.reader,
        "Inspecting dataset"
    );

    match args.command {
        Command::Count => {
            let dataset = InputDataset::from_config(&config, RawParser)?;
            println!("{}", dataset.size()?);
        }
        Command::Head {
            batch_size,
            batches,
            epochs,
            shuffle,
            num_workers,
            worker_index,
            inputs,
            ..
        } => {
            let dataset = InputDataset::from_config(&config, ColumnsParser::new(inputs))?;

            let mut options = ReadOptions::default()
                .with_epochs(epochs)
                .with_task_spec(TaskSpec::new(num_workers, worker_index));
            if epochs == 0 {
                options = options.endless();
            }
            if shuffle {
                options = options.shuffled();
            }

            let mut cursor = dataset.read(batch_size, options)?;
            for _ in 0..batches {
                let Some(batch) = cursor.next_batch()? else {
                    break;
                };

                println!("batch {} ({} examples)", batch.index, batch.len());
                for (inputs, outputs) in &batch.examples {
                    println!("  {} -> {}", format_values(inputs), format_values(outputs));
                }
            }
        }
    }

    Ok(())
}
