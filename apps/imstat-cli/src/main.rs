//! imstat - run analyses from the command line
//!
//! Reads a JSON analysis request, runs it on the background runner and
//! prints the JSON response. Also evaluates single formulas for checking
//! simulation expressions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use imstat_core::{
    AnalysisOutput, AnalysisRequest, AnalysisResponse, AnalysisRunner, CompiledExpression,
    EngineConfig, EvalStats,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imstat", version, about = "Statistical analysis engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an analysis request and print the response
    Run {
        /// Request file, or `-` for stdin
        request: PathBuf,

        /// Engine configuration (TOML, or JSON with a .json extension)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the response
        #[arg(long)]
        pretty: bool,
    },

    /// Evaluate a formula with fixed variable values
    Eval {
        /// The formula, e.g. "revenue - cost"
        expression: String,

        /// Variable binding, repeatable
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
        vars: Vec<(String, f64)>,
    },
}

/// Parse a `NAME=VALUE` binding
fn parse_binding(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("variable name is empty".to_string());
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok((name.to_string(), value))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)?;
    let config = if path.extension().is_some_and(|ext| ext == "json") {
        EngineConfig::from_json(&text)?
    } else {
        EngineConfig::from_toml(&text)?
    };
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn read_request(path: &Path) -> Result<AnalysisRequest, Box<dyn std::error::Error>> {
    let text = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(AnalysisRequest::from_json(&text)?)
}

async fn run(
    request: &Path,
    config: Option<&Path>,
    pretty: bool,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let alpha = config.significance.alpha;
    let request = read_request(request)?;
    let runner = AnalysisRunner::new(config)?;

    let response = runner.run(request).await;
    if let AnalysisResponse::Ok {
        result: AnalysisOutput::Test(test),
    } = &response
    {
        tracing::info!(
            "{}: p = {:.4} ({} at alpha = {})",
            test.test,
            test.p_value,
            if test.is_significant(alpha) {
                "significant"
            } else {
                "not significant"
            },
            alpha
        );
    }

    let json = if pretty {
        response.to_json_pretty()?
    } else {
        response.to_json()?
    };
    println!("{}", json);

    Ok(if response.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Compile `expression` against the bound names and evaluate it once
fn evaluate_formula(
    expression: &str,
    vars: &[(String, f64)],
) -> (CompiledExpression, f64, EvalStats) {
    let names: Vec<&str> = vars.iter().map(|(name, _)| name.as_str()).collect();
    let env: HashMap<String, f64> = vars.iter().cloned().collect();

    let compiled = CompiledExpression::compile_with_variables(expression, &names);
    let mut stats = EvalStats::default();
    let value = compiled.evaluate_tracked(&env, &mut stats);
    (compiled, value, stats)
}

fn eval(expression: &str, vars: &[(String, f64)]) -> ExitCode {
    let (compiled, value, stats) = evaluate_formula(expression, vars);

    println!("{}", value);
    for diagnostic in compiled.diagnostics() {
        eprintln!("warning: {:?}", diagnostic);
    }
    if stats.divisions_by_zero > 0 {
        eprintln!("warning: division by zero evaluated as 0");
    }
    if stats.non_finite_results > 0 {
        eprintln!("warning: non-finite result coerced to 0");
    }

    if compiled.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            request,
            config,
            pretty,
        } => match run(&request, config.as_deref(), pretty).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Eval { expression, vars } => eval(&expression, &vars),
    }
}
