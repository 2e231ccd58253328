//! Command-line entry point.
//!
//! ```bash
//! # OpenAI (key from OPENAI_API_KEY)
//! sopflow procedures/receiving.pdf -o out/
//!
//! # Local Ollama model, two participants at a time, keep every reply
//! sopflow sop.txt --backend ollama --model qwen3:8b --concurrency 2 --dump-raw
//! ```
//!
//! Exit codes: 0 completed, 2 run aborted (no text / no participants),
//! 1 fatal error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use sopflow_lib::config::{self, Backend, ConfigError, PipelineConfig};
use sopflow_lib::pipeline::extraction::text_only::FileTextSource;
use sopflow_lib::pipeline::processor::{ProcessModelExtractor, ProcessingError, RunReport};
use sopflow_lib::pipeline::storage::CsvRecordSink;
use sopflow_lib::pipeline::structuring::{client_from_config, OllamaClient, StructuringError};
use sopflow_lib::pipeline::structuring::parser::TablePolicy;

/// Turn a standard operating procedure into BPMN-style process tables
#[derive(Parser, Debug)]
#[command(name = "sopflow")]
#[command(version, about, long_about = None)]
struct Args {
    /// SOP document (.pdf, or any UTF-8 text file)
    document: PathBuf,

    /// Directory receiving the CSV artifacts
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// JSON config file (default: ~/Sopflow/config.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chat backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Model name sent with every request
    #[arg(long)]
    model: Option<String>,

    /// Override the backend endpoint
    #[arg(long)]
    base_url: Option<String>,

    /// Reject ragged tables and tables missing schema columns
    #[arg(long)]
    strict: bool,

    /// Participants processed at once in the table stage
    #[arg(long)]
    concurrency: Option<usize>,

    /// Retries for transient model errors
    #[arg(long)]
    max_retries: Option<u32>,

    /// Write prompts, replies and the run report under <output_dir>/raw/
    #[arg(long)]
    dump_raw: bool,

    /// Print the run report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Openai,
    Ollama,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Openai => Backend::OpenAi,
            BackendArg::Ollama => Backend::Ollama,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] StructuringError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Cannot render report: {0}")]
    Report(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    sopflow_lib::init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(report) if report.status.is_aborted() => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<RunReport, CliError> {
    let config = resolve_config(args)?;
    tracing::info!(
        version = config::APP_VERSION,
        backend = ?config.backend,
        model = %config.model,
        output_dir = %config.output_dir.display(),
        "{} starting",
        config::APP_NAME
    );

    if config.backend == Backend::Ollama {
        OllamaClient::new(config.base_url(), &config.model, config.timeout_secs)?
            .ensure_model_available()?;
    }

    let llm = client_from_config(&config)?;
    let extractor = ProcessModelExtractor::new(llm, Box::new(CsvRecordSink), config);
    let report = extractor.run(&FileTextSource::default(), &args.document)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(report)
}

/// Config file first, then command-line overrides.
fn resolve_config(args: &Args) -> Result<PipelineConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => match config::default_config_path().filter(|p| p.is_file()) {
            Some(path) => PipelineConfig::load(&path)?,
            None => PipelineConfig::default(),
        },
    };

    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(backend) = args.backend {
        config.backend = backend.into();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(url) = &args.base_url {
        config.api_base_url = Some(url.clone());
    }
    if args.strict {
        config.table_policy = TablePolicy::Strict;
    }
    if let Some(n) = args.concurrency {
        config.max_concurrency = n;
    }
    if let Some(n) = args.max_retries {
        config.retry.max_retries = n;
    }
    if args.dump_raw {
        config.dump_raw_replies = true;
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(report: &RunReport) {
    println!("Run {} ({})", report.run_id, report.status.as_str());
    println!("  document:      {}", report.document.display());
    println!("  participants:  {}", report.participants.join(", "));
    println!(
        "  tables parsed: {}/{}",
        report.tables_parsed,
        report.participants.len()
    );
    println!("  message flows: {}", report.message_flows);

    if !report.artifacts.is_empty() {
        println!("Artifacts:");
        for path in &report.artifacts {
            println!("  {}", path.display());
        }
    }

    if !report.failures.is_empty() {
        println!("Failures:");
        for failure in &report.failures {
            let who = failure.participant.as_deref().unwrap_or("-");
            println!(
                "  [{}] {} {:?}: {}",
                failure.stage, who, failure.kind, failure.message
            );
        }
    }
}
