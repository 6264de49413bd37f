use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use mkabook::{
    BatchProcessor, Codec, DisplayOptions, ItemOverrides, ItemPipeline, MkabookError,
    ProcessRunner, RunOptions, ToolPaths,
};

#[derive(Parser, Debug)]
#[command(
    name = "mkabook",
    version,
    author = "TigreRoll",
    about = "Build chaptered Matroska audiobooks from a directory of audio files"
)]
struct Cli {
    /// Item directory or single audio file; the batch root with --batch
    input: PathBuf,

    /// Audio codec for the final track
    #[arg(long, value_enum)]
    codec: Option<Codec>,

    /// Ignore config.toml / config.json in the item directory
    #[arg(short = 'i', long = "ignore-cfg")]
    ignore_cfg: bool,

    /// Cover image, relative to the item directory
    #[arg(long, value_name = "FILE")]
    cover: Option<PathBuf>,

    /// Chapter file (text or XML), relative to the item directory
    #[arg(long, value_name = "FILE")]
    chapters: Option<PathBuf>,

    /// Emit nested sub-chapters instead of tab-indented titles
    #[arg(long)]
    use_sub_chapters: bool,

    /// Output file, or directory receiving <item>.mka
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    output: PathBuf,

    /// Show external tool output and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Only rewrite chapters of an existing output
    #[arg(short, long)]
    update_metadata: bool,

    /// Skip items whose output already exists
    #[arg(short, long)]
    diff: bool,

    /// Treat every sub-directory of the input as one audiobook
    #[arg(long)]
    batch: bool,

    /// Number of batch items processed at once
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    jobs: u64,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            output: self.output.clone(),
            ignore_config: self.ignore_cfg,
            update_metadata: self.update_metadata,
            diff_only: self.diff,
            overrides: ItemOverrides {
                codec: self.codec,
                cover_file: self.cover.clone(),
                chapter_file: self.chapters.clone(),
                use_sub_chapters: self.use_sub_chapters.then_some(true),
            },
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "mkabook=debug" } else { "mkabook=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let tools = ToolPaths::from_env();
    debug!("🔧 Tools: {:?}", tools);

    let pipeline = Arc::new(ItemPipeline::new(Arc::new(ProcessRunner::new()), &tools));
    let options = cli.run_options();

    if cli.batch {
        let jobs = usize::try_from(cli.jobs).context("job count out of range")?;
        let processor = BatchProcessor::new(pipeline, jobs);

        let summary = match processor.process_directory(&cli.input, &options).await {
            Ok(summary) => summary,
            Err(e @ MkabookError::NotADirectory { .. }) => {
                error!("[✗] {}", e);
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e).context("batch processing failed"),
        };

        println!("{}", summary.render());
        return Ok(if summary.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    info!("🚀 mkabook starting: {}", cli.input.display());
    let display = DisplayOptions::interactive(cli.verbose);
    match pipeline.run(&cli.input, &options, &display).await {
        Ok(outcome) => {
            println!("{}", outcome);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            display.fail(&e.to_string());
            Ok(ExitCode::FAILURE)
        }
    }
}
