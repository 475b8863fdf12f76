//! DLIR CLI - Command-line interface for DLIR

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use dlir_core::{
    parse_program, Answer, Diagnostic, Engine, EngineConfig, EvaluationStats, Model, RebacPolicy,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dlir")]
#[command(about = "DLIR - Datalog checker and evaluator for relationship-based access policies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a program for syntax, arity, safety and stratification errors
    Check {
        /// Program file path
        file: PathBuf,

        /// Treat the file as a JSON policy document
        #[arg(long)]
        policy: bool,

        /// Print every parsed clause and query
        #[arg(short, long)]
        list: bool,
    },

    /// Evaluate a program and print every fact
    Eval {
        /// Program file path
        file: PathBuf,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,

        /// Treat the file as a JSON policy document
        #[arg(long)]
        policy: bool,
    },

    /// Evaluate a program and answer one query
    Query {
        /// Program file path
        file: PathBuf,

        /// Query atom, e.g. "access(alice, X)"
        atom: String,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,

        /// Treat the file as a JSON policy document
        #[arg(long)]
        policy: bool,
    },
}

#[derive(Serialize)]
struct QueryOutput {
    query: String,
    answer: Answer,
}

#[derive(Serialize)]
struct EvalOutput<'a> {
    facts: Vec<String>,
    queries: Vec<QueryOutput>,
    stats: &'a EvaluationStats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Check { file, policy, list } => check_command(&file, policy, list),
        Commands::Eval {
            file,
            config,
            format,
            policy,
        } => eval_command(&file, config.as_deref(), format, policy),
        Commands::Query {
            file,
            atom,
            config,
            format,
            policy,
        } => query_command(&file, &atom, config.as_deref(), format, policy),
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "dlir=debug,dlir_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Read a program file, or a policy document joined into one program
fn load_source(file: &Path, policy: bool) -> Result<String> {
    let contents = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    debug!(file = %file.display(), bytes = contents.len(), policy, "loaded input");

    if !policy {
        return Ok(contents);
    }
    let document = RebacPolicy::from_json(&contents)
        .with_context(|| format!("Invalid policy document: {}", file.display()))?;
    Ok(document.source())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Unwrap an engine result, or print its diagnostic and exit with status 1
fn or_exit<T>(result: dlir_core::Result<T>, source: &str) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            eprint!("{}", Diagnostic::from_error(&e).format(Some(source)));
            std::process::exit(1);
        }
    }
}

fn build_model(file: &Path, config: Option<&Path>, policy: bool) -> Result<(Model, f64)> {
    let source = load_source(file, policy)?;
    let config = load_config(config)?;

    let start = Instant::now();
    let engine = or_exit(Engine::from_source(&source, config), &source);
    let model = or_exit(engine.evaluate(), &source);
    Ok((model, start.elapsed().as_secs_f64() * 1000.0))
}

fn check_command(file: &Path, policy: bool, list: bool) -> Result<()> {
    let source = load_source(file, policy)?;

    let program = or_exit(parse_program(&source), &source);
    let engine = or_exit(Engine::new(program), &source);
    let program = engine.program();

    println!("{} {} is valid", "✓".green(), file.display());
    println!("  Clauses: {}", program.clauses.len());
    println!("  Queries: {}", program.queries.len());
    println!("  Strata: {}", engine.stratification().len());

    if list {
        println!();
        for clause in &program.clauses {
            println!("  {}", clause);
        }
        for query in &program.queries {
            println!("  {}", query);
        }
    }

    Ok(())
}

fn eval_command(file: &Path, config: Option<&Path>, format: Format, policy: bool) -> Result<()> {
    let (model, elapsed_ms) = build_model(file, config, policy)?;
    let answers = model.answer_queries();

    match format {
        Format::Json => {
            let output = EvalOutput {
                facts: model.facts().facts().iter().map(|f| format!("{}.", f)).collect(),
                queries: answers
                    .into_iter()
                    .map(|(query, answer)| QueryOutput {
                        query: query.to_string(),
                        answer,
                    })
                    .collect(),
                stats: model.stats(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Format::Text => {
            print!("{}", model.facts());
            for (query, answer) in &answers {
                println!("\n{} {}", "?".blue(), query);
                print_answer(answer);
            }

            let stats = model.stats();
            println!(
                "\n{} {} facts ({} derived), {} strata, {} passes in {:.3}ms",
                "✓".green(),
                stats.total_facts,
                stats.derived_facts,
                stats.strata,
                stats.passes,
                elapsed_ms
            );
        }
    }

    Ok(())
}

fn query_command(
    file: &Path,
    atom: &str,
    config: Option<&Path>,
    format: Format,
    policy: bool,
) -> Result<()> {
    let (model, _) = build_model(file, config, policy)?;
    let answer = or_exit(model.query(atom), atom);

    match format {
        Format::Json => {
            let output = QueryOutput {
                query: atom.to_string(),
                answer,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Format::Text => print_answer(&answer),
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    match answer {
        Answer::Holds(true) => println!("  {}", "yes".green()),
        Answer::Holds(false) => println!("  {}", "no".red()),
        Answer::Bindings(bindings) if bindings.is_empty() => println!("  {}", "no".red()),
        Answer::Bindings(bindings) => {
            for substitution in bindings {
                println!("  {}", substitution);
            }
        }
    }
}
