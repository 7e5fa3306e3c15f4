//! arXiv Annotator - Entry Point
//!
//! Each subcommand runs one stage (or all of them) against a batch persisted in
//! the metadata directory.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use arxiv_annotator::config::{Config, InferenceBackendKind};
use arxiv_annotator::error::{PipelineError, PipelineResult};
use arxiv_annotator::formatters::{
    batch_status_json, format_batch_markdown, format_report_markdown, report_json,
};
use arxiv_annotator::models::{PipelineReport, ReprocessPolicy};
use arxiv_annotator::pipeline::Pipeline;
use arxiv_annotator::sources::{ArxivSource, SearchQuery};
use arxiv_annotator::store::batch_id_for_today;

#[derive(Parser, Debug)]
#[command(name = "arxiv-annotator")]
#[command(about = "Ingest arXiv papers and annotate them with LLM keywords and definitions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Batch label (defaults to today's date, YYYY-MM-DD)
    #[arg(long, global = true)]
    label: Option<String>,

    /// Which records a stage revisits
    #[arg(long, global = true, value_enum, default_value = "missing")]
    reprocess: ReprocessPolicy,

    /// Inference endpoint URL
    #[arg(long, global = true, env = "OLLAMA_API")]
    inference_url: Option<String>,

    /// Inference protocol
    #[arg(long, global = true, value_enum, env = "LLM_BACKEND")]
    backend: Option<InferenceBackendKind>,

    /// Model name
    #[arg(long, global = true, env = "LLM_MODEL")]
    model: Option<String>,

    /// Seconds to wait between downloads
    #[arg(long, global = true)]
    download_delay: Option<u64>,

    /// Output format for reports
    #[arg(long, global = true, value_enum, default_value = "markdown")]
    format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query arXiv and store a new batch
    Scrape(QueryArgs),
    /// Download the PDFs of a stored batch
    Fetch,
    /// Extract text from downloaded PDFs
    Extract,
    /// Annotate papers with keywords and definitions
    Annotate,
    /// Run every stage for a new batch
    Run(QueryArgs),
    /// Show the progress of a stored batch
    Status,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// arXiv category (e.g. cs.CL) or fielded query (e.g. all:transformers)
    query: String,

    /// Sort key: date or relevance
    #[arg(long, default_value = "date")]
    sort_by: String,

    /// Sort order: ascending or descending
    #[arg(long, default_value = "descending")]
    order: String,

    /// Maximum number of papers
    #[arg(long, default_value_t = 10)]
    max_results: usize,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable Markdown
    #[default]
    Markdown,
    /// Machine-readable JSON
    Json,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Reports go to stdout; logs stay on stderr.
    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn build_config(cli: &Cli) -> PipelineResult<Config> {
    let mut config = Config::from_env()?;
    config.reprocess = cli.reprocess;

    if let Some(url) = &cli.inference_url {
        config.inference.url = Some(url.clone());
    }
    if let Some(backend) = cli.backend {
        config.inference.backend = backend;
    }
    if let Some(model) = &cli.model {
        config.inference.model = model.clone();
    }
    if let Some(secs) = cli.download_delay {
        config.download_delay = Duration::from_secs(secs);
    }
    Ok(config)
}

fn print_report(report: &PipelineReport, format: OutputFormat) {
    match format {
        OutputFormat::Markdown => println!("{}", format_report_markdown(report)),
        OutputFormat::Json => println!("{:#}", report_json(report)),
    }
}

async fn run(cli: Cli) -> PipelineResult<()> {
    let config = build_config(&cli)?;
    let batch_id = cli.label.clone().unwrap_or_else(batch_id_for_today);

    tracing::info!(batch_id, reprocess = ?config.reprocess, "Using batch");

    let source =
        || ArxivSource::new(&config).map_err(|e| PipelineError::ClientSetup(e.to_string()));
    let pipeline = Pipeline::new(config.clone());

    match cli.command {
        Command::Scrape(args) => {
            let query =
                SearchQuery::parse(&args.query, &args.sort_by, &args.order, args.max_results)?;
            let report = pipeline.discover(&source()?, &query, &batch_id).await?;
            print_report(&report, cli.format);
        }
        Command::Fetch => print_report(&pipeline.fetch(&batch_id).await?, cli.format),
        Command::Extract => print_report(&pipeline.extract(&batch_id).await?, cli.format),
        Command::Annotate => print_report(&pipeline.annotate(&batch_id).await?, cli.format),
        Command::Run(args) => {
            let query =
                SearchQuery::parse(&args.query, &args.sort_by, &args.order, args.max_results)?;
            let report = pipeline.run(&source()?, &query, &batch_id).await?;
            print_report(&report, cli.format);
        }
        Command::Status => {
            let batch = pipeline.status(&batch_id)?;
            match cli.format {
                OutputFormat::Markdown => println!("{}", format_batch_markdown(&batch_id, &batch)),
                OutputFormat::Json => println!("{:#}", batch_status_json(&batch_id, &batch)),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?cli.command,
        "Starting arxiv-annotator"
    );

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {}", e.to_user_message());
        std::process::exit(1);
    }

    Ok(())
}
