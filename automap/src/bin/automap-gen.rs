//! `automap-gen` - generates mapping code from an automap schema.
//!
//! ```text
//! automap-gen schemas/mapping.xml
//! automap-gen schemas/mapping.xml --validate-only
//! automap-gen schemas/mapping.xml --config automap.json --output src/mappers.rs -v
//! ```

use anyhow::{Context, bail};
use automap::codegen::{CONFIG_FILE_NAME, Generator, GeneratorConfig};
use automap::schema::{Validator, parse_schema_file};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Generate field mapping procedures from a mapping schema
#[derive(Parser, Debug)]
#[command(name = "automap-gen")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the mapping schema (XML)
    schema: PathBuf,

    /// Path to the configuration file [default: automap.json next to the schema]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output path, overriding the configuration (relative to the working
    /// directory)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Validate the schema and print the report without generating code
    #[arg(long)]
    validate_only: bool,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let schema_dir = cli.schema.parent().unwrap_or(Path::new("."));
    let config = load_config(cli, schema_dir)?;

    let schema = parse_schema_file(&cli.schema)
        .with_context(|| format!("parsing {}", cli.schema.display()))?;

    let report = Validator::with_policy(&schema, config.naming_policy(&schema)).validate();
    eprint!("{}", report.render());

    if !report.is_valid() {
        return Ok(ExitCode::FAILURE);
    }
    if cli.validate_only {
        return Ok(ExitCode::SUCCESS);
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| config.output_path(schema_dir));
    // The report was already checked above.
    let generated = Generator::with_config(&schema, config.validate(false)).run()?;
    std::fs::write(&output, &generated.code)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        output = %output.display(),
        procedures = generated.procedures,
        "wrote mapping code"
    );
    Ok(ExitCode::SUCCESS)
}

fn load_config(cli: &Cli, schema_dir: &Path) -> anyhow::Result<GeneratorConfig> {
    match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} not found", path.display());
            }
            GeneratorConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(GeneratorConfig::load_or_default(
            schema_dir.join(CONFIG_FILE_NAME),
        )?),
    }
}
