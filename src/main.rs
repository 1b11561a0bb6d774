use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde_json::Value;

use retcon::env::{generate_env_docs, general, EnvVar};
use retcon::parsers::html::decode_html;
use retcon::{ErrorCategory, FilterOp, Retcon, RetconError, RetconResult, RetconSettings};

const ASCII: &str = r"
           _
 _ __ ___ | |_  ___  ___  _ __
| '__/ _ \| __|/ __|/ _ \| '_ \
| | |  __/| |_| (__| (_) | | | |
|_|  \___| \__|\___|\___/|_| |_|
";

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = format!("{}\n{}", ASCII, env!("CARGO_PKG_DESCRIPTION")),
)]
struct Cli {
    /// Settings file (TOML or JSON)
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// Input HTML file, `-` or omitted for stdin
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,

    /// Write the result to a file instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Filter operation as JSON, e.g. '["remove", "script"]'; repeatable, applied in order
    #[arg(short = 'f', long = "filter", value_name = "JSON")]
    filters: Vec<String>,

    /// JSON file holding a list of operations, applied before any --filter
    #[arg(short = 'p', long)]
    pipeline: Option<PathBuf>,

    /// Charset of the input
    #[arg(short = 'e', long, default_value = "utf-8")]
    encoding: String,

    /// Print the supported environment variables and exit
    #[arg(long)]
    env_docs: bool,

    /// Write an example settings file to the given path and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<String>,
}

fn init_logging() {
    let level = general::LogLevel::get()
        .ok()
        .and_then(|level| level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::WARN);

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn parse_json(source: &str, what: &str) -> RetconResult<Value> {
    serde_json::from_str(source)
        .map_err(|e| RetconError::invalid_argument("retcon", format!("{} is not valid JSON: {}", what, e)))
}

fn collect_ops(cli: &Cli) -> RetconResult<Vec<FilterOp>> {
    let mut ops = Vec::new();

    if let Some(pipeline) = &cli.pipeline {
        let content = fs::read_to_string(pipeline)?;
        let value = parse_json(&content, &pipeline.display().to_string())?;
        ops.extend(FilterOp::parse_ops(&value)?);
    }

    for filter in &cli.filters {
        // 允许直接写过滤器名，如 `--filter lazy`
        let value = match parse_json(filter, "--filter") {
            Ok(value) => value,
            Err(_) if !filter.trim_start().starts_with(['[', '{', '"']) => Value::String(filter.trim().to_string()),
            Err(e) => return Err(e),
        };
        ops.extend(FilterOp::parse_ops(&value)?);
    }

    Ok(ops)
}

fn read_input(cli: &Cli) -> RetconResult<String> {
    let mut data: Vec<u8> = Vec::new();
    match &cli.input {
        Some(path) if path.as_os_str() != "-" => data = fs::read(path)?,
        _ => {
            io::stdin().read_to_end(&mut data)?;
        }
    }
    Ok(decode_html(&data, &cli.encoding))
}

fn run(cli: &Cli) -> RetconResult<()> {
    if cli.env_docs {
        print!("{}", generate_env_docs());
        return Ok(());
    }

    if let Some(path) = &cli.init_config {
        RetconSettings::generate_example_config(path)?;
        eprintln!("Wrote example settings to {}", path);
        return Ok(());
    }

    let settings = RetconSettings::load(cli.config.as_deref())?;
    let ops = collect_ops(cli)?;
    let html = read_input(cli)?;

    let retcon = Retcon::new(settings);
    let result = retcon.run(&html, &ops)?;

    match &cli.output {
        Some(path) => fs::write(path, result.as_str())?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(result.as_str().as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(match e.category() {
            ErrorCategory::InvalidPipeline => 2,
            ErrorCategory::Configuration => 3,
            ErrorCategory::Internal => 1,
        });
    }
}
