use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use sea_query::Value;
use segment_compiler::describe::describe_filters;
use segment_compiler::dictionary::{self, FieldEntry};
use segment_compiler::{CompilerConfig, FilterInput, SqlCompiler, UnresolvedFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "segment-compiler")]
#[command(about = "Compile customer segment filters into Firebird SQL")]
struct Args {
    /// JSON file holding a filter list or `{ "filters": [...] }`.
    /// Starts an interactive session when omitted.
    input: Option<PathBuf>,

    /// Compiler configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write numeric values into the SQL instead of binding them
    #[arg(long)]
    inline_literals: bool,
}

/// The preview endpoint posts `{ "filters": [...] }`; saved segments are bare lists.
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Bare(Vec<FilterInput>),
    Wrapped { filters: Vec<FilterInput> },
}

impl Payload {
    fn into_filters(self) -> Vec<FilterInput> {
        match self {
            Payload::Bare(filters) | Payload::Wrapped { filters } => filters,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    sql: &'a str,
    params: Vec<serde_json::Value>,
    from_view: &'a str,
    warnings: &'a [UnresolvedFilter],
    description: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CompilerConfig::from_json_file(path)
            .with_context(|| format!("loading compiler config {}", path.display()))?,
        None => CompilerConfig::default(),
    };
    if args.inline_literals {
        config.inline_literals = true;
    }
    let compiler = SqlCompiler::from_config(config);

    match &args.input {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading filters from {}", path.display()))?;
            let report = compile_payload(&compiler, &content)
                .with_context(|| format!("compiling filters from {}", path.display()))?;
            println!("{}", report);
            Ok(())
        }
        None => run_interactive(&compiler),
    }
}

fn compile_payload(compiler: &SqlCompiler, content: &str) -> Result<String> {
    let filters = serde_json::from_str::<Payload>(content)
        .context("expected a filter list or { \"filters\": [...] }")?
        .into_filters();

    let result = compiler.compile(&filters);
    let report = Report {
        sql: &result.sql,
        params: result.params.0.iter().map(param_to_json).collect(),
        from_view: &result.from_view,
        warnings: &result.warnings,
        description: describe_filters(&filters),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn param_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(Some(b)) => serde_json::Value::from(*b),
        Value::Int(Some(n)) => serde_json::Value::from(*n),
        Value::BigInt(Some(n)) => serde_json::Value::from(*n),
        Value::Double(Some(n)) => serde_json::Value::from(*n),
        Value::String(Some(s)) => serde_json::Value::from(s.as_str()),
        _ => serde_json::Value::Null,
    }
}

const HELP: &str = "\
Enter a JSON filter list on one line, e.g.
  [{\"property\": \"Total visits\", \"operator\": \"is greater than\", \"value\": 5}]
Commands:
  .properties   list filterable properties
  .help         show this message
  .quit         leave";

fn run_interactive(compiler: &SqlCompiler) -> Result<()> {
    println!("segment-compiler: filters to SQL. Type .help for usage.");
    let mut editor = DefaultEditor::new()?;

    loop {
        match editor.readline("segment> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;

                match line {
                    ".quit" | ".exit" => break,
                    ".help" => println!("{}", HELP),
                    ".properties" => print_properties(dictionary::entries()),
                    _ => match compile_payload(compiler, line) {
                        Ok(report) => println!("{}", report),
                        Err(e) => println!("error: {:#}", e),
                    },
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn print_properties(entries: &[FieldEntry]) {
    for entry in entries {
        let operators: Vec<_> = entry.operators.iter().map(|op| op.as_str()).collect();
        println!(
            "[{:?}] {} ({:?}): {}",
            entry.section,
            entry.label,
            entry.field_type,
            operators.join(" | ")
        );
        let choices = entry.choices.to_vec();
        if !choices.is_empty() {
            println!("    options: {}", choices.join(", "));
        }
    }
}
