use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rdslocate::hcso::{self, Config};
use rdslocate::resource::{evaluate, verify, AttrCheck, LocateError};
use serde_json::Value;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Locate RDS SQL Server databases by <instance_id>/<name>
#[derive(Parser, Debug)]
#[command(name = "rdslocate", version, about)]
struct Args {
    /// Profile section of the config file
    #[arg(long, global = true, env = "HCSO_PROFILE", default_value = "default")]
    profile: String,

    /// Region used to derive the RDS endpoint
    #[arg(long, global = true)]
    region: Option<String>,

    /// Project the instance belongs to
    #[arg(long, global = true)]
    project_id: Option<String>,

    /// RDS endpoint URL (overrides region)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Databases requested per page
    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Give up after this many pages
    #[arg(long, global = true)]
    max_pages: Option<u32>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a database record, failing if it does not exist
    Exists {
        /// <instance_id>/<name>
        id: String,

        /// Attribute expectation, `key=value` or `key` (must be set)
        #[arg(long = "check", value_name = "KEY[=VALUE]")]
        checks: Vec<AttrCheck>,
    },
    /// Succeed only if a database no longer exists
    Destroyed {
        /// <instance_id>/<name>
        id: String,
    },
    /// Evaluate a path query over a JSON document
    Query {
        expression: String,

        /// JSON document to query (defaults to stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let message = match err.downcast_ref::<LocateError>() {
                Some(locate_err) => hcso::format_locate_error(locate_err),
                None => format!("{:#}", err),
            };
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<()> {
    match &args.command {
        Command::Exists { id, checks } => {
            let locator = hcso::database_locator(&resolve_config(&args)?)?;
            let record = locator.locate(id)?;
            verify(&record, checks)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Destroyed { id } => {
            let locator = hcso::database_locator(&resolve_config(&args)?)?;
            locator.locate_absent(id)?;
            println!("{} does not exist", id);
        }
        Command::Query { expression, file } => {
            let document = read_document(file.as_ref())?;
            let result = evaluate(expression, &document, Value::Null)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }
    Ok(())
}

/// Config file and environment, then command-line overrides
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = hcso::load_config(&args.profile)?;

    if let Some(region) = &args.region {
        config.region = Some(region.clone());
    }
    if let Some(project_id) = &args.project_id {
        config.project_id = Some(project_id.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if let Some(max_pages) = args.max_pages {
        config.max_pages = max_pages;
    }

    debug!(
        "Using profile '{}': region={:?}, project_id={:?}, endpoint={:?}",
        args.profile, config.region, config.project_id, config.endpoint
    );
    Ok(config)
}

fn read_document(file: Option<&PathBuf>) -> Result<Value> {
    let content = match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Could not read {:?}", path))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Could not read stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("Input is not valid JSON")
}
