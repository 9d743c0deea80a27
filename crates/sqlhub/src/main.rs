pub(crate) mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use cli::{CliOpts, Command, QuerySource, RunArgs, VerifyArgs};
use core_executor::{
    Config as ExecutionConfig, CoreExecutionService, ExecutionOptions, ExecutionService,
};
use core_verifier::errors::CatalogError;
use core_verifier::{
    ChallengeCatalog, CoreVerificationService, Verdict, VerdictErrorKind, VerificationService,
};
use datafusion::arrow::util::pretty::pretty_format_batches;
use dotenv::dotenv;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

const TARGETS: [&str; 4] = ["sqlhub", "core_executor", "core_verifier", "core_schema"];

const EXIT_INCORRECT: u8 = 1;
const EXIT_CONFIGURATION: u8 = 2;

#[derive(Debug, Snafu)]
enum CliError {
    #[snafu(display("{source}"))]
    Catalog { source: CatalogError },

    #[snafu(display("Failed to read {}: {source}", path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("Invalid executor config {}: {source}", path.display()))]
    ParseConfig {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("Schema {name} not found in catalog"))]
    UnknownSchema { name: String },

    #[snafu(display("Failed to render result: {source}"))]
    Render {
        source: datafusion::arrow::error::ArrowError,
    },

    #[snafu(display("Failed to serialize verdict: {source}"))]
    Serialize { source: serde_json::Error },
}

type CliResult<T> = std::result::Result<T, CliError>;

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() -> ExitCode {
    dotenv().ok();

    let opts = CliOpts::parse();
    setup_tracing(&opts);

    match run(opts).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "sqlhub failed");
            eprintln!("error: {err}");
            ExitCode::from(EXIT_CONFIGURATION)
        }
    }
}

async fn run(opts: CliOpts) -> CliResult<ExitCode> {
    let config = load_executor_config(opts.config.as_deref())?;
    let catalog = ChallengeCatalog::from_path(&opts.catalog).context(CatalogSnafu)?;
    let execution_svc = Arc::new(CoreExecutionService::new(Arc::new(config)));

    match opts.command {
        Command::Verify(args) => verify(&catalog, execution_svc, args).await,
        Command::Check { challenge } => check(&catalog, execution_svc, challenge.as_deref()).await,
        Command::Run(args) => run_query(&catalog, execution_svc.as_ref(), args).await,
    }
}

fn load_executor_config(path: Option<&Path>) -> CliResult<ExecutionConfig> {
    let Some(path) = path else {
        return Ok(ExecutionConfig::default());
    };
    let yaml = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
    serde_yaml::from_str(&yaml).context(ParseConfigSnafu { path })
}

fn query_text(source: &QuerySource) -> CliResult<String> {
    match (&source.query, &source.query_file) {
        (Some(query), _) => Ok(query.clone()),
        (None, Some(path)) => std::fs::read_to_string(path).context(ReadFileSnafu { path }),
        (None, None) => Ok(String::new()),
    }
}

fn verdict_exit_code(verdict: &Verdict) -> u8 {
    match &verdict.error {
        Some(error) if matches!(error.kind, VerdictErrorKind::Configuration) => EXIT_CONFIGURATION,
        _ if verdict.is_correct => 0,
        _ => EXIT_INCORRECT,
    }
}

#[allow(clippy::print_stdout)]
async fn verify(
    catalog: &ChallengeCatalog,
    execution_svc: Arc<CoreExecutionService>,
    args: VerifyArgs,
) -> CliResult<ExitCode> {
    let challenge = catalog.get(&args.challenge).context(CatalogSnafu)?;
    let schema = catalog.schema_for(challenge).context(CatalogSnafu)?;
    let mut options = challenge.options.clone();
    if let Some(mode) = args.mode {
        options.comparison_mode = mode.into();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout_ms = timeout_ms;
    }
    let candidate = query_text(&args.source)?;

    let verification_svc = CoreVerificationService::new(execution_svc);
    let verdict = verification_svc
        .verify(&candidate, schema, &challenge.expected, &options)
        .await;
    println!(
        "{}",
        serde_json::to_string_pretty(&verdict).context(SerializeSnafu)?
    );
    Ok(ExitCode::from(verdict_exit_code(&verdict)))
}

#[allow(clippy::print_stdout)]
async fn check(
    catalog: &ChallengeCatalog,
    execution_svc: Arc<CoreExecutionService>,
    only: Option<&str>,
) -> CliResult<ExitCode> {
    let verification_svc = CoreVerificationService::new(execution_svc);
    let challenges = match only {
        Some(id) => vec![catalog.get(id).context(CatalogSnafu)?],
        None => catalog.iter().collect(),
    };

    let mut broken = 0usize;
    for challenge in challenges {
        let schema = catalog.schema_for(challenge).context(CatalogSnafu)?;
        let Some(reference) = challenge.expected.reference_query() else {
            println!("{:<24} skipped (pre-materialized result)", challenge.id);
            continue;
        };
        let verdict = verification_svc
            .verify(reference, schema, &challenge.expected, &challenge.options)
            .await;
        if verdict.is_correct {
            println!(
                "{:<24} ok ({} rows, {} ms)",
                challenge.id, verdict.rows_returned, verdict.execution_time_ms
            );
            continue;
        }
        broken += 1;
        match &verdict.error {
            Some(error) => println!("{:<24} {}: {}", challenge.id, error.kind, error.message),
            None => {
                println!("{:<24} reference is not self-consistent", challenge.id);
                for mismatch in &verdict.mismatches {
                    println!("{:<24}   {mismatch}", "");
                }
            }
        }
    }

    if broken == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::warn!(broken, "Catalog has broken challenges");
        Ok(ExitCode::from(EXIT_CONFIGURATION))
    }
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
async fn run_query(
    catalog: &ChallengeCatalog,
    execution_svc: &CoreExecutionService,
    args: RunArgs,
) -> CliResult<ExitCode> {
    let schema = catalog
        .schema(&args.schema)
        .context(UnknownSchemaSnafu { name: &args.schema })?;
    let query = query_text(&args.source)?;
    let mut options = ExecutionOptions::read_only().with_writes(args.allow_writes);
    if let Some(timeout_ms) = args.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms));
    }

    match execution_svc.execute(&query, schema, options).await {
        Ok(result) => {
            println!(
                "{}",
                pretty_format_batches(&result.records).context(RenderSnafu)?
            );
            println!("{} row(s)", result.result_set.num_rows());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{} error: {err}", err.kind());
            Ok(ExitCode::from(EXIT_INCORRECT))
        }
    }
}

#[allow(clippy::print_stderr)]
fn setup_tracing(opts: &CliOpts) {
    let targets_with_level = |level: LevelFilter| -> Vec<(&str, LevelFilter)> {
        TARGETS.iter().map(|t| ((*t), level)).collect()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(match std::env::var("RUST_LOG") {
                    Ok(val) => match val.parse::<Targets>() {
                        Ok(log_targets_from_env) => log_targets_from_env,
                        Err(err) => {
                            eprintln!("Failed to parse RUST_LOG: {err:?}");
                            Targets::default()
                                .with_targets(targets_with_level(LevelFilter::DEBUG))
                                .with_default(LevelFilter::WARN)
                        }
                    },
                    // No var set: the --tracing-level flag decides
                    _ => Targets::default()
                        .with_targets(targets_with_level(opts.tracing_level.clone().into()))
                        .with_default(LevelFilter::WARN),
                }),
        )
        .init();
}
