use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing::{error, info, warn};

use mergebench::cancel::Cancellation;
use mergebench::checkpoint::{merge_paths, CheckpointStore, RunInfo};
use mergebench::config::{AppConfig, ConfigError, LlmSettings};
use mergebench::dataset::{extract_matching, load_work_items, DatasetLocator};
use mergebench::eval::{write_reports, Evaluator};
use mergebench::llm::{ChatClient, LlmConfig};
use mergebench::observer::TracingObserver;
use mergebench::runner::{BatchRunner, RunReport, RunRequest, RunnerConfig};
use mergebench::triage::{DatasetSource, OutputMode, Triage, TriageOutcome};
use mergebench::{logging, Error, Result};

#[derive(Parser)]
#[command(
    name = "mergebench",
    version,
    about = "Generate, triage and evaluate LLM merge-conflict resolutions"
)]
struct Cli {
    /// Settings file (defaults to ./mergebench.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate resolutions for a conflict dataset
    Generate(GenerateArgs),
    /// Regenerate failed resolutions in result files
    Triage(TriageArgs),
    /// Merge two result files produced by the same model
    Merge(MergeArgs),
    /// Score a result file against the dataset ground truth
    Evaluate(EvaluateArgs),
    /// Extract dataset records whose field contains a keyword
    Extract(ExtractArgs),
}

#[derive(Args, Debug, Default)]
struct LlmArgs {
    /// LLM provider (google, groq, maritaca)
    #[arg(long)]
    provider: Option<String>,

    /// Model name (e.g. gemini-2.0-flash, qwen-2.5-coder-32b, sabia-3)
    #[arg(long)]
    model: Option<String>,
}

impl LlmArgs {
    fn apply(self, mut settings: LlmSettings) -> LlmSettings {
        if let Some(provider) = self.provider {
            settings.provider = provider;
        }
        if let Some(model) = self.model {
            settings.model = model;
        }
        settings
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    llm: LlmArgs,

    /// JSON-Lines dataset of conflicts
    #[arg(long)]
    input: PathBuf,

    /// Index of the first item to process
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    /// Maximum number of items to process
    #[arg(long)]
    max_requests: Option<usize>,

    /// Items per batch; results are checkpointed after every batch
    #[arg(long)]
    checkpoint_interval: Option<NonZeroUsize>,

    /// Seconds to wait between requests
    #[arg(long)]
    wait_time: Option<u64>,

    /// Directory for result files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Repository name recorded in the result metadata
    #[arg(long)]
    repository: Option<String>,

    /// Continue from a checkpoint file
    #[arg(long, conflicts_with = "start_index")]
    resume: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TriageArgs {
    #[command(flatten)]
    llm: LlmArgs,

    /// Result file, or a glob pattern with --glob
    #[arg(long)]
    input: String,

    /// Treat --input as a glob pattern
    #[arg(long)]
    glob: bool,

    /// Output file (a directory when the glob matches several files)
    #[arg(long, conflicts_with = "overwrite")]
    output: Option<PathBuf>,

    /// Replace the input file instead of writing <name>_fixed.json
    #[arg(long)]
    overwrite: bool,

    /// Seconds to wait between requests
    #[arg(long)]
    wait_time: Option<u64>,

    /// Dataset file to take conflicts from (default: located by repository)
    #[arg(long)]
    dataset: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MergeArgs {
    first: PathBuf,
    second: PathBuf,

    /// Merged file (default: <output_dir>/merged_dataset.json)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// JSON-Lines dataset with ground-truth resolutions
    #[arg(long)]
    dataset: PathBuf,

    /// Result file to score
    #[arg(long)]
    results: PathBuf,

    #[arg(long, default_value = "data/evaluation")]
    output_dir: PathBuf,

    /// Prefix of the report files (default: repository or model name)
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// JSON-Lines files to read
    #[arg(long, required = true, num_args = 1..)]
    input: Vec<PathBuf>,

    #[arg(long)]
    output: PathBuf,

    /// Field to match against
    #[arg(long, default_value = "repository_name")]
    field: String,

    /// Case-insensitive substring to look for
    #[arg(long)]
    keyword: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    match cli.command {
        Command::Generate(args) => generate(config, args).await,
        Command::Triage(args) => triage(config, args).await,
        Command::Merge(args) => merge(config, args),
        Command::Evaluate(args) => evaluate(args),
        Command::Extract(args) => extract(args),
    }
}

async fn generate(config: AppConfig, args: GenerateArgs) -> Result<()> {
    let llm = LlmConfig::from_settings(&args.llm.apply(config.llm))?;

    let mut settings = config.run;
    if let Some(interval) = args.checkpoint_interval {
        settings.checkpoint_interval = interval.get();
    }
    if let Some(wait) = args.wait_time {
        settings.wait_time_secs = wait;
    }
    if let Some(dir) = args.output_dir {
        settings.output_dir = dir;
    }

    let items = load_work_items(&args.input)?;
    info!(path = %args.input.display(), items = items.len(), "dataset loaded");

    let mut request = match &args.resume {
        Some(path) => {
            let file = CheckpointStore::load(path)?;
            if file.metadata.model != llm.model {
                return Err(ConfigError::Invalid {
                    key: "llm.model",
                    reason: format!(
                        "checkpoint was generated by {}, not {}",
                        file.metadata.model, llm.model
                    ),
                }
                .into());
            }
            info!(path = %path.display(), records = file.results.len(), "resuming from checkpoint");
            RunRequest::resume(file)
        }
        None => RunRequest::new(args.start_index),
    };
    request.max_requests = args.max_requests;

    let mut info = RunInfo::new(llm.provider.as_str(), llm.model.clone());
    let repository = args
        .repository
        .or_else(|| items.first().and_then(|item| item.repository_name.clone()));
    if let Some(repository) = repository {
        info = info.with_repository(repository);
    }

    let client = ChatClient::new(llm)?;
    let cancellation = Cancellation::new();
    cancellation.install_ctrlc_handler()?;

    let runner = BatchRunner::new(
        RunnerConfig::from(&settings),
        info,
        Arc::new(client),
        Arc::new(TracingObserver),
    )
    .with_store(CheckpointStore::new(&settings.output_dir))
    .with_cancellation(cancellation);

    let report = runner.run(&items, request).await;
    print_run_summary(&report);

    if report.interrupted {
        let resume_from = report
            .final_path
            .as_ref()
            .or(report.checkpoints.last())
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "the last saved checkpoint".to_string());
        return Err(Error::Interrupted(resume_from));
    }
    Ok(())
}

async fn triage(config: AppConfig, args: TriageArgs) -> Result<()> {
    let llm = LlmConfig::from_settings(&args.llm.apply(config.llm))?;
    let client = ChatClient::new(llm)?;

    let dataset = match args.dataset {
        Some(path) => DatasetSource::File(path),
        None => DatasetSource::Directory(DatasetLocator::new(&config.triage.dataset_dir)),
    };
    let output = match (args.output, args.overwrite) {
        (Some(path), _) => OutputMode::Path(path),
        (None, true) => OutputMode::Overwrite,
        (None, false) => OutputMode::Sibling,
    };
    let wait = args.wait_time.unwrap_or(config.triage.wait_time_secs);

    let cancellation = Cancellation::new();
    cancellation.install_ctrlc_handler()?;

    let triage = Triage::new(Arc::new(client), dataset, Arc::new(TracingObserver))
        .with_default_repository(config.triage.default_repository)
        .with_output(output)
        .with_wait_time(Duration::from_secs(wait))
        .with_cancellation(cancellation.clone());

    let outcomes = if args.glob {
        let outcomes = triage.process_glob(&args.input).await?;
        if outcomes.is_empty() {
            warn!(pattern = %args.input, "no files matched");
        }
        outcomes
    } else {
        vec![triage.process_file(Path::new(&args.input)).await?]
    };

    let mut interrupted = cancellation.is_cancelled();
    for outcome in &outcomes {
        print_triage_outcome(outcome);
        if let TriageOutcome::Written { interrupted: true, .. } = outcome {
            interrupted = true;
        }
    }

    if interrupted {
        return Err(Error::Interrupted(args.input));
    }
    Ok(())
}

fn merge(config: AppConfig, args: MergeArgs) -> Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| config.run.output_dir.join("merged_dataset.json"));
    let merged = merge_paths(&args.first, &args.second, &output)?;

    println!(
        "{} {} ({} records)",
        "Merged into".green().bold(),
        output.display(),
        merged.metadata.total_records
    );
    Ok(())
}

fn evaluate(args: EvaluateArgs) -> Result<()> {
    let items = load_work_items(&args.dataset)?;
    let results = CheckpointStore::load(&args.results)?;
    let name = args.name.unwrap_or_else(|| {
        results
            .metadata
            .repository_name
            .clone()
            .unwrap_or_else(|| results.metadata.model.clone())
    });

    let evaluation = Evaluator::new()?.evaluate(&items, &results.results);
    let summary = evaluation.summary();
    let (records_path, summary_path) = write_reports(&evaluation, &args.output_dir, &name)?;

    println!("{}", "=== Evaluation Summary ===".bold());
    println!("Total conflicts evaluated: {}", summary.total_evaluated);
    println!(
        "Exact matches: {} ({:.2}%)",
        summary.exact_matches.green(),
        summary.exact_match_rate
    );
    println!("Average similarity: {:.2}%", summary.average_similarity);
    if summary.failed_generations > 0 {
        println!("Failed generations: {}", summary.failed_generations.red());
    }
    println!(
        "Results saved to {} and {}",
        records_path.display(),
        summary_path.display()
    );
    Ok(())
}

fn extract(args: ExtractArgs) -> Result<()> {
    let written = extract_matching(&args.input, &args.output, &args.field, &args.keyword)?;
    println!(
        "{} {} records to {}",
        "Extracted".green().bold(),
        written,
        args.output.display()
    );
    Ok(())
}

fn print_run_summary(report: &RunReport) {
    let status = if report.interrupted {
        "Interrupted".yellow().bold().to_string()
    } else {
        "Completed".green().bold().to_string()
    };
    println!(
        "{} {} attempted, {} failed, last processed index: {}",
        status,
        report.attempted,
        report.failed.red(),
        report
            .last_processed_index
            .map_or_else(|| "none".to_string(), |index| index.to_string())
    );
    match &report.final_path {
        Some(path) => println!("Results saved to {}", path.display()),
        None => println!("{}", "Final results could not be saved".red()),
    }
}

fn print_triage_outcome(outcome: &TriageOutcome) {
    match outcome {
        TriageOutcome::Unchanged(path) => {
            println!("{} {}", "Nothing to do".dimmed(), path.display())
        }
        TriageOutcome::DatasetMissing { input, repository } => println!(
            "{} {} (no dataset for {})",
            "Skipped".yellow().bold(),
            input.display(),
            repository
        ),
        TriageOutcome::Written {
            output,
            failing,
            regenerated,
            ..
        } => println!(
            "{} {}/{} failed resolutions, saved to {}",
            "Regenerated".green().bold(),
            regenerated,
            failing,
            output.display()
        ),
    }
}
