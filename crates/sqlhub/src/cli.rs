use clap::{Args, Parser, Subcommand, ValueEnum};
use core_verifier::ComparisonMode;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(version, about, long_about=None)]
pub struct CliOpts {
    #[arg(
        long,
        global = true,
        env = "SQLHUB_CATALOG",
        default_value = "demos/challenges.yaml",
        help = "YAML catalog holding schemas and challenges"
    )]
    pub catalog: PathBuf,

    #[arg(
        long,
        global = true,
        env = "SQLHUB_EXECUTOR_CONFIG",
        help = "YAML file with executor settings (timeouts, result size cap)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        global = true,
        env = "TRACING_LEVEL",
        default_value = "info",
        help = "Tracing level, it can be overrided by *RUST_LOG* env var"
    )]
    pub tracing_level: TracingLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Grade a query against a challenge and print the verdict as JSON
    Verify(VerifyArgs),
    /// Run every reference query against itself to catch broken challenges
    Check {
        #[arg(long, help = "Only check this challenge")]
        challenge: Option<String>,
    },
    /// Execute a query against one of the catalog schemas and print the rows
    Run(RunArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false, id = "source")]
pub struct QuerySource {
    #[arg(short, long, help = "SQL text")]
    pub query: Option<String>,

    #[arg(long, help = "Read the SQL text from a file")]
    pub query_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct VerifyArgs {
    #[arg(short, long)]
    pub challenge: String,

    #[command(flatten)]
    pub source: QuerySource,

    #[arg(long, value_enum, help = "Override the challenge's comparison mode")]
    pub mode: Option<Mode>,

    #[arg(long, help = "Override the challenge's timeout")]
    pub timeout_ms: Option<u64>,
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(short, long)]
    pub schema: String,

    #[command(flatten)]
    pub source: QuerySource,

    #[arg(long, default_value_t = false, help = "Allow DDL/DML statements")]
    pub allow_writes: bool,

    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Mode {
    Exact,
    UnorderedRows,
    UnorderedColumnsAndRows,
}

impl From<Mode> for ComparisonMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Exact => Self::Exact,
            Mode::UnorderedRows => Self::UnorderedRows,
            Mode::UnorderedColumnsAndRows => Self::UnorderedColumnsAndRows,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum TracingLevel {
    Off,
    Info,
    Debug,
    Trace,
}

#[allow(clippy::from_over_into)]
impl Into<LevelFilter> for TracingLevel {
    fn into(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_requires_a_query_source() {
        assert!(CliOpts::try_parse_from(["sqlhub", "verify", "--challenge", "top-paid"]).is_err());
        assert!(
            CliOpts::try_parse_from([
                "sqlhub",
                "verify",
                "--challenge",
                "top-paid",
                "--query",
                "SELECT 1",
                "--query-file",
                "answer.sql",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse_run_command() {
        let opts = CliOpts::try_parse_from([
            "sqlhub",
            "run",
            "--schema",
            "company",
            "-q",
            "SELECT * FROM employees",
            "--allow-writes",
            "--catalog",
            "catalog.yaml",
        ]);
        let Ok(opts) = opts else {
            panic!("run arguments should parse");
        };
        assert_eq!(opts.catalog, PathBuf::from("catalog.yaml"));
        assert!(matches!(
            opts.command,
            Command::Run(RunArgs {
                allow_writes: true,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_mode_override() {
        let opts = CliOpts::try_parse_from([
            "sqlhub",
            "verify",
            "-c",
            "engineers",
            "-q",
            "SELECT name FROM employees",
            "--mode",
            "unordered-columns-and-rows",
        ]);
        let Ok(CliOpts {
            command: Command::Verify(args),
            ..
        }) = opts
        else {
            panic!("verify arguments should parse");
        };
        assert!(matches!(
            args.mode.map(ComparisonMode::from),
            Some(ComparisonMode::UnorderedColumnsAndRows)
        ));
    }
}
