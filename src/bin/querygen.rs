//! querygen: compile declarative query trees to SQL
//!
//! # Usage
//!
//! ```bash
//! # Render a query tree for the configured provider
//! querygen compile query.json
//!
//! # Pick the SQL Server version, or the generic dialect
//! querygen compile query.json --version 2005
//! querygen compile query.json --dialect generic
//!
//! # Inspect the SQL tree before rendering
//! querygen ast query.json
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use querygen::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "querygen")]
#[command(version)]
#[command(about = "Compile declarative query trees into dialect-correct SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    querygen compile query.json
    querygen compile query.json --version 2000 --config ./querygen.toml
    querygen compile query.json --dialect generic --format json
    querygen ast query.json")]
struct Cli {
    /// Log compilation steps
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query tree and print the SQL
    Compile {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "sql")]
        format: OutputFormat,
    },
    /// Print the SQL tree of a compiled query
    Ast {
        #[command(flatten)]
        input: InputArgs,
    },
    /// List the available providers
    Providers,
}

#[derive(Args)]
struct InputArgs {
    /// JSON query tree, or `-` for stdin
    file: PathBuf,

    /// Config file (default: ./querygen.toml, then the user config directory)
    #[arg(short, long, env = "QUERYGEN_CONFIG")]
    config: Option<PathBuf>,

    /// SQL Server version: 2000, 2005, 2008, 2012, 2014 or default
    #[arg(long = "version")]
    server_version: Option<String>,

    /// Target dialect, overriding the configured provider
    #[arg(short, long, value_enum)]
    dialect: Option<DialectArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Generic,
    SqlServer,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Sql,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Compile { input, format } => compile_command(input, *format),
        Commands::Ast { input } => ast_command(input),
        Commands::Providers => {
            list_providers();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "querygen=debug" } else { "querygen=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Provider and schema for a command, with command-line overrides applied.
fn setup(input: &InputArgs) -> Result<(DataProvider, MappingSchema)> {
    let mut config = CompilerConfig::load(input.config.as_deref())?;
    match input.dialect {
        Some(DialectArg::Generic) => {
            config.provider.name = "Generic".to_string();
            config.provider.version = None;
        }
        Some(DialectArg::SqlServer) => config.provider.name = "SqlServer".to_string(),
        None => {}
    }
    if let Some(version) = &input.server_version {
        config.provider.version = Some(version.clone());
    }

    let provider = config.provider()?;
    info!(provider = %provider.name(), entities = config.entities.len(), "configured");
    Ok((provider, config.schema()))
}

fn read_query(path: &Path) -> Result<Expr> {
    let content = if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        content
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading query tree from {}", path.display()))?
    };
    serde_json::from_str(&content).context("query tree is not valid JSON")
}

fn compile_command(input: &InputArgs, format: OutputFormat) -> Result<()> {
    let (provider, schema) = setup(input)?;
    let expr = read_query(&input.file)?;
    let plan = compile(&provider, &schema, &expr)?;
    let statement = plan.sql(&provider)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statement)?),
        OutputFormat::Sql => {
            println!("{}", statement.sql);
            if !statement.parameters.is_empty() {
                println!();
                println!("{}", "Parameters:".cyan());
                for p in &statement.parameters {
                    println!("  {} = {}", p.name.yellow(), p.value);
                }
            }
            let kind = match plan.kind() {
                QueryKind::NonQuery => "non-query",
                QueryKind::Rows(_) => "rows",
                QueryKind::Scalar(_) => "scalar",
            };
            eprintln!("{} {} ({})", "Result:".dimmed(), kind, provider.name().dimmed());
        }
    }
    Ok(())
}

fn ast_command(input: &InputArgs) -> Result<()> {
    let (provider, schema) = setup(input)?;
    let expr = read_query(&input.file)?;
    let plan = compile(&provider, &schema, &expr)?;

    println!("{}", "SQL tree:".green().bold());
    println!("{}", plan.text());
    if let QueryKind::Rows(projection) | QueryKind::Scalar(projection) = plan.kind() {
        println!();
        println!("{}", "Projection:".green().bold());
        println!("{:#?}", projection);
    }
    Ok(())
}

fn list_providers() {
    println!("{}", "Providers:".cyan().bold());
    for name in PROVIDER_NAMES {
        let flags = DataProvider::from_name(name).map(|p| p.flags());
        match flags {
            Ok(flags) => println!(
                "  {:<16} skip={} take-parameter={} insert-or-update={}",
                name.white(),
                flags.is_skip_supported,
                flags.accepts_take_as_parameter,
                flags.is_insert_or_update_supported
            ),
            Err(_) => println!("  {}", name.white()),
        }
    }
}
