use clap::{command, Parser};
use hyperlang::{
    config::EvaluatorConfig, marshal, symbols::Value, Error, InternalResult, Program, SymbolTable,
};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Program as a JSON syntax tree
    #[arg(short, long)]
    program: PathBuf,

    /// Function to invoke
    #[arg(short, long, default_value = "main")]
    entry: String,

    /// Arguments as a JSON array
    #[arg(short, long, default_value = "[]")]
    args: String,

    /// Enable debug mode
    #[arg(short, long)]
    verbose: bool,
}

fn arguments(args: &str) -> InternalResult<Vec<Value>> {
    match marshal::from_bytes(args.as_bytes())? {
        Value::Array(items) => Ok(items.items()),
        other => Err(Error::Internal(format!(
            "arguments must be a JSON array, got {}",
            other.class()
        ))),
    }
}

fn run(cli: &Cli) -> InternalResult<()> {
    let config = if cli.config.exists() {
        EvaluatorConfig::from_file(&cli.config)?
    } else {
        EvaluatorConfig::default()
    };
    info!("config loaded.");
    debug!("config: {:?}", config);

    let source = std::fs::read_to_string(&cli.program)
        .map_err(|e| Error::Internal(format!("Failed to read program file: {}", e)))?;
    let program = Program::from_json(&source)?;

    debug!("Checking program: {:?}", cli.program);
    let compiled = program.check(&SymbolTable::with_builtins(&config))?;

    let result = compiled.invoke(&cli.entry, arguments(&cli.args)?)?;
    let output = match result {
        Some(value) => value.to_primitive(),
        None => serde_json::Value::Null,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
