use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use studymate_cli::{
    ActivityEvent, ActivityLog, AnswerOutput, ErrorOutput, display_answer, display_failure, display_stats,
};
use studymate_core::{Error, ErrorKind, PipelineConfig, Stage};
use studymate_rag::{ExtractiveGenerator, HashEmbedder, PdfExtractor, PipelineState, QaOutcome, QaPipeline, QaRequest};
use studymate_watsonx::WatsonxClient;

#[derive(Parser)]
#[command(name = "studymate")]
#[command(about = "Ask questions about a PDF and get answers grounded in its passages", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one question about one PDF
    Ask(AskArgs),
    /// Show usage statistics from the activity log
    Stats {
        #[arg(long, default_value = "activity.jsonl")]
        activity_log: PathBuf,
        /// Render a table instead of JSON
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Args)]
struct AskArgs {
    /// Path to the PDF file
    #[arg(long)]
    pdf: PathBuf,

    /// Question to ask about the PDF
    #[arg(long)]
    question: String,

    /// Generation model id
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    top_k: Option<usize>,

    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    overlap: Option<usize>,

    /// Whole-request deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = Backend::Watsonx)]
    backend: Backend,

    /// Render a coloured answer box instead of JSON
    #[arg(long)]
    pretty: bool,

    /// Identifies the caller in the activity log (random if omitted)
    #[arg(long)]
    user_id: Option<String>,

    #[arg(long, default_value = "activity.jsonl")]
    activity_log: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// watsonx.ai embeddings and Granite generation
    Watsonx,
    /// Local hashing embedder and extractive answers, no network
    Offline,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask(args) => ask(args).await,
        Commands::Stats { activity_log, pretty } => stats(&activity_log, pretty).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn ask(args: AskArgs) -> Result<ExitCode> {
    let config = match pipeline_config(&args) {
        Ok(config) => config,
        Err(e) => return Ok(fail(&setup_failure(&e), args.pretty)),
    };

    let pdf = match tokio::fs::read(&args.pdf).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let error = ErrorOutput::new(
                ErrorKind::UnreadablePdf,
                format!("PDF file not found or unreadable: {} ({})", args.pdf.display(), e),
                Some(Stage::Extracting),
            );
            return Ok(fail(&error, args.pretty));
        }
    };

    let user_id = args
        .user_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let activity = ActivityLog::new(args.activity_log.clone());
    let pdf_name = args
        .pdf
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    record(
        &activity,
        ActivityEvent::ask_question(&user_id, &pdf_name, args.question.chars().count(), args.model.as_deref()),
    )
    .await;

    let mut request = QaRequest::new(pdf, args.question.clone());
    if let Some(model) = &args.model {
        request = request.with_model(model.clone());
    }

    let outcome = match run_pipeline(args.backend, config, &request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let error = setup_failure(&e);
            record(&activity, ActivityEvent::answer_failed(&user_id, error.kind)).await;
            return Ok(fail(&error, args.pretty));
        }
    };

    match outcome.state {
        PipelineState::Done(result) => {
            record(
                &activity,
                ActivityEvent::answer_received(&user_id, result.answer.chars().count(), result.evidence_count()),
            )
            .await;

            if args.pretty {
                display_answer(&result);
            } else {
                println!("{}", serde_json::to_string(&AnswerOutput::from(&result))?);
            }
            Ok(ExitCode::SUCCESS)
        }
        PipelineState::Failed(failure) => {
            record(&activity, ActivityEvent::answer_failed(&user_id, failure.kind)).await;
            Ok(fail(&ErrorOutput::from(&failure), args.pretty))
        }
    }
}

/// Environment configuration with command-line overrides applied
///
/// Validated once, after the flags, so a flag can repair a bad environment value.
fn pipeline_config(args: &AskArgs) -> studymate_core::Result<PipelineConfig> {
    let config = apply_overrides(PipelineConfig::load_env()?, args);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(mut config: PipelineConfig, args: &AskArgs) -> PipelineConfig {
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(overlap) = args.overlap {
        config.chunk_overlap = overlap;
    }
    if let Some(top_k) = args.top_k {
        config.top_k = top_k;
    }
    if let Some(secs) = args.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    config
}

async fn run_pipeline(backend: Backend, config: PipelineConfig, request: &QaRequest) -> studymate_core::Result<QaOutcome> {
    let extractor = Arc::new(PdfExtractor::new());

    match backend {
        Backend::Offline => {
            info!("using offline backend");
            let pipeline = QaPipeline::new(
                extractor,
                Arc::new(HashEmbedder::new()),
                Arc::new(ExtractiveGenerator::new()),
                config,
            )?;
            Ok(pipeline.run(request).await)
        }
        Backend::Watsonx => {
            let mut client = WatsonxClient::from_env()?;
            client.connect().await?;
            let embedder = Arc::new(client.embedder()?);
            info!(model = %client.config().model_id, embedding_model = %client.config().embedding_model_id, "using watsonx.ai backend");

            let pipeline = QaPipeline::new(extractor, embedder, Arc::new(client), config)?;
            Ok(pipeline.run(request).await)
        }
    }
}

/// Failures raised while wiring up the pipeline rather than inside a stage
fn setup_failure(error: &Error) -> ErrorOutput {
    let kind = error.kind().unwrap_or(ErrorKind::Configuration);
    ErrorOutput::new(kind, error.to_string(), None)
}

fn fail(error: &ErrorOutput, pretty: bool) -> ExitCode {
    if pretty {
        display_failure(error);
    } else {
        match serde_json::to_string(error) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("{}: {} ({})", error.kind, error.message, e),
        }
    }
    ExitCode::FAILURE
}

/// Activity tracking never fails a request
async fn record(activity: &ActivityLog, event: ActivityEvent) {
    if let Err(e) = activity.record(&event).await {
        warn!(path = %activity.path().display(), error = %e, "failed to record activity");
    }
}

async fn stats(activity_log: &Path, pretty: bool) -> Result<ExitCode> {
    let stats = ActivityLog::new(activity_log).stats().await?;
    if pretty {
        display_stats(&stats);
    } else {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ask(args: &[&str]) -> AskArgs {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        match cli.command {
            Commands::Ask(args) => args,
            Commands::Stats { .. } => panic!("expected ask"),
        }
    }

    #[test]
    fn test_ask_defaults() {
        let args = parse_ask(&["studymate", "ask", "--pdf", "notes.pdf", "--question", "What is osmosis?"]);
        assert_eq!(args.pdf, PathBuf::from("notes.pdf"));
        assert_eq!(args.backend, Backend::Watsonx);
        assert_eq!(args.activity_log, PathBuf::from("activity.jsonl"));
        assert!(args.model.is_none());
        assert!(!args.pretty);
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse_ask(&[
            "studymate",
            "ask",
            "--pdf",
            "notes.pdf",
            "--question",
            "q",
            "--chunk-size",
            "400",
            "--overlap",
            "50",
            "--top-k",
            "3",
            "--timeout-secs",
            "30",
            "--backend",
            "offline",
        ]);
        assert_eq!(args.backend, Backend::Offline);

        let config = pipeline_config(&args).unwrap();
        assert_eq!(config.chunk_size, 400);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let args = parse_ask(&[
            "studymate", "ask", "--pdf", "x.pdf", "--question", "q", "--chunk-size", "100", "--overlap", "100",
        ]);
        let error = pipeline_config(&args).unwrap_err();
        assert_eq!(setup_failure(&error).kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_flags_repair_environment_chunking() {
        // As if STUDYMATE_CHUNK_SIZE=100 were set with the default overlap of 200
        let from_env = PipelineConfig {
            chunk_size: 100,
            ..Default::default()
        };
        assert!(from_env.validate().is_err());

        let args = parse_ask(&[
            "studymate", "ask", "--pdf", "x.pdf", "--question", "q", "--chunk-size", "2000", "--overlap", "500",
        ]);
        let config = apply_overrides(from_env, &args);
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 2000);
        assert_eq!(config.chunk_overlap, 500);
    }

    #[test]
    fn test_question_is_required() {
        assert!(Cli::try_parse_from(["studymate", "ask", "--pdf", "x.pdf"]).is_err());
    }
}
