use clap::{Parser, Subcommand};
use parahost_core::{
    CapabilitySet, Error, ExitStatus, HostConfig, Launcher, analyzer::parsers::program::parse_source,
    build_registry, config,
};
use serde_json::json;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Bad arguments, an unreadable config or input file. Kept apart from
/// every job exit status.
const USAGE_ERROR: i32 = 64;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long, default_value = "parahost.json", global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a driver module on every rank
    Run(RunArgs),

    /// List the native operations of this build
    Ops(OpsArgs),

    /// Tokenize and parse a driver file without running it
    Check(CheckArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Number of ranks
    #[arg(short = 'n', long, env = "PARAHOST_RANKS")]
    ranks: Option<usize>,

    /// Driver module to import
    #[arg(short, long)]
    module: Option<String>,

    /// Entry function of the driver module
    #[arg(short, long)]
    entry: Option<String>,

    /// Extra module search path, searched before the configured ones
    #[arg(short = 'I', long = "path")]
    paths: Vec<PathBuf>,

    /// Arguments passed to the driver
    #[arg(last = true)]
    args: Vec<OsString>,
}

#[derive(Parser)]
struct OpsArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct CheckArgs {
    /// Driver source file
    file: PathBuf,
}

fn load_config(path: &PathBuf) -> Result<HostConfig, Error> {
    let config = if path.exists() {
        config::from_file(path)?
    } else {
        HostConfig::default()
    };
    debug!("config: {:?}", config);
    Ok(config)
}

async fn run_driver(args: &RunArgs, config_path: &PathBuf) -> Result<i32, Error> {
    let mut config = load_config(config_path)?;
    if let Some(ranks) = args.ranks {
        config.fabric.world_size = ranks;
    }
    if let Some(module) = &args.module {
        config.driver.module = module.clone();
    }
    if let Some(entry) = &args.entry {
        config.driver.entry = entry.clone();
    }
    if !args.paths.is_empty() {
        let mut paths = args.paths.clone();
        paths.append(&mut config.driver.search_paths);
        config.driver.search_paths = paths;
    }

    info!(
        module = %config.driver.module,
        ranks = config.fabric.world_size,
        "launching"
    );
    let status = Launcher::new(config).run(args.args.clone()).await;
    Ok(status.code())
}

fn list_ops(args: &OpsArgs) -> Result<i32, Error> {
    let registry = build_registry(CapabilitySet::compiled());
    if args.json {
        let ops: Vec<_> = registry
            .iter()
            .map(|op| {
                json!({
                    "name": op.name,
                    "convention": op.convention.to_string(),
                    "requires": op
                        .requires
                        .capabilities()
                        .iter()
                        .map(|cap| cap.to_string())
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let out = serde_json::to_string_pretty(&ops)
            .map_err(|e| Error::Internal(format!("Failed to serialize: {}", e)))?;
        println!("{}", out);
    } else {
        for op in registry.iter() {
            println!("{:<40} {}", op.name, op.convention);
        }
        println!("{} operations", registry.len());
    }
    Ok(0)
}

fn check_file(args: &CheckArgs) -> Result<i32, Error> {
    let source = std::fs::read_to_string(&args.file)
        .map_err(|e| Error::Internal(format!("Failed to read {}: {}", args.file.display(), e)))?;
    match parse_source(&source) {
        Ok(program) => {
            let functions = program.functions().count();
            println!(
                "{}: ok ({} items, {} functions)",
                args.file.display(),
                program.items.len(),
                functions
            );
            Ok(0)
        }
        Err(e) => {
            eprintln!("{}: {}", args.file.display(), e);
            Ok(ExitStatus::ImportFailure.code())
        }
    }
}

async fn run(cli: &Cli) -> Result<i32, Error> {
    match &cli.command {
        Commands::Run(args) => run_driver(args, &cli.config).await,
        Commands::Ops(args) => list_ops(args),
        Commands::Check(args) => check_file(args),
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { USAGE_ERROR } else { 0 });
        }
    };

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(USAGE_ERROR);
        }
    }
}
