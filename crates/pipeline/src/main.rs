//! Batch-construction CLI.
//!
//! Exit codes: 0 success, 1 input error, 2 packing or quota invariant
//! violation, 3 unexpected failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mteval_core::error::CoreError;
use mteval_pipeline::{compose, extract, stats};

#[derive(Parser)]
#[command(name = "mteval", about = "Batch construction tools for MT human evaluation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose annotation batches from parallel corpora.
    ComposeBatches {
        /// Segments per batch.
        batch_size: usize,
        /// Source language code (e.g. `eng`).
        source_language: String,
        /// Target language code (e.g. `deu`).
        target_language: String,
        /// Source corpus file.
        source_file: PathBuf,
        /// Reference corpus file.
        reference_file: PathBuf,
        /// System output file, or a directory of one file per system.
        system_path: PathBuf,
        /// Repeated (CHK) items per batch.
        #[arg(long, default_value_t = 0)]
        redundant: usize,
        /// Hidden reference items per batch.
        #[arg(long, default_value_t = 0)]
        refs: usize,
        /// Hidden corrupted-reference items per batch.
        #[arg(long = "bad-refs", default_value_t = 0)]
        bad_refs: usize,
        /// Annotations required per item.
        #[arg(long = "required-annotations", default_value_t = 1)]
        required_annotations: i32,
        /// PRNG seed; identical inputs and seed reproduce the output.
        #[arg(long = "random-seed", default_value_t = 123456)]
        random_seed: u64,
        /// Shuffle document order within batches.
        #[arg(long)]
        randomize: bool,
        /// Count corruption lengths in characters instead of tokens.
        #[arg(long = "character-based")]
        character_based: bool,
        /// Input corpora are UTF-16 encoded.
        #[arg(long)]
        unicode: bool,
    },
    /// Write the evaluated source segments per system.
    ExtractSubset {
        /// Source corpus file.
        source_file: PathBuf,
        /// Batch JSON produced by `compose-batches`.
        batch_json: PathBuf,
        /// Directory receiving one subdirectory per system.
        target_dir: PathBuf,
        /// Write UTF-16 LE output with BOM.
        #[arg(long)]
        unicode: bool,
        /// Item ids to skip, comma separated.
        #[arg(long = "ignore-ids", value_delimiter = ',')]
        ignore_ids: Vec<i32>,
    },
    /// Print aggregate statistics for a batch JSON file.
    BatchStats {
        /// Batch JSON produced by `compose-batches`.
        batch_json: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mteval_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "job failed");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<(), CoreError> {
    match cli.command {
        Command::ComposeBatches {
            batch_size,
            source_language,
            target_language,
            source_file,
            reference_file,
            system_path,
            redundant,
            refs,
            bad_refs,
            required_annotations,
            random_seed,
            randomize,
            character_based,
            unicode,
        } => {
            let opts = compose::ComposeOptions {
                batch_size,
                source_language,
                target_language,
                source_file,
                reference_file,
                system_path,
                refs,
                bad_refs,
                redundant,
                required_annotations,
                random_seed,
                randomize,
                character_based,
                unicode,
            };
            let json = compose::run(&opts)?;
            println!("{json}");
            Ok(())
        }
        Command::ExtractSubset {
            source_file,
            batch_json,
            target_dir,
            unicode,
            ignore_ids,
        } => extract::run(&extract::ExtractOptions {
            source_file,
            batch_json,
            target_dir,
            unicode,
            ignore_ids,
        }),
        Command::BatchStats { batch_json } => {
            let stats = stats::run(&batch_json)?;
            print!("{}", stats.render());
            Ok(())
        }
    }
}

/// Map a failure to the documented exit codes.
fn exit_code(err: &CoreError) -> u8 {
    match err {
        CoreError::MalformedCorpus(_)
        | CoreError::Encoding(_)
        | CoreError::Validation(_)
        | CoreError::NotFound { .. } => 1,
        CoreError::UnpackableDocument { .. }
        | CoreError::QuotaUnsatisfiable(_)
        | CoreError::DonorTooShort { .. } => 2,
        _ => 3,
    }
}
