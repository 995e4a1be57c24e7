//! Unite CLI - demo harness driving the module engine

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use unite::{EngineOptions, ModuleEngine, ReloadEvent, ScriptCompiler, Value};

#[derive(Parser)]
#[command(name = "unite", version, about = "Hot-reloading dynamic module engine")]
struct Cli {
    /// Root of the module source tree
    #[arg(long, default_value = ".")]
    source: PathBuf,

    /// Directory searched for external reference binaries
    #[arg(long)]
    binaries: Option<PathBuf>,

    /// Verbose per-event debug logging
    #[arg(long)]
    debug: bool,

    /// Allow unsafe constructs in module sources
    #[arg(long)]
    allow_unsafe: bool,

    /// Disable persisted compilation (always recompile)
    #[arg(long)]
    no_persist: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile all modules and watch the source tree for changes
    Run,
    /// Compile all modules and invoke one function
    Call {
        /// Module identifier (source path relative to the root, no extension)
        module: String,
        /// Type name, optionally namespace-qualified (NS.C or C)
        type_name: String,
        /// Function name
        function: String,
        /// Arguments: int, float, true/false, anything else is a string
        args: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let mut options = EngineOptions::new(&cli.source);
    options.binaries_dir = cli.binaries.clone();
    options.debug = cli.debug;
    options.allow_unsafe = cli.allow_unsafe;
    options.persist_units = !cli.no_persist;

    let engine = ModuleEngine::new(options, Arc::new(ScriptCompiler::new()))
        .with_context(|| format!("could not initialize engine at {}", cli.source.display()))?;

    let report = engine.initial_report();
    println!(
        "{} module(s) loaded ({} reused, {} compiled, {} failed)",
        report.handled(),
        report.reused.len(),
        report.compiled.len(),
        report.failed.len()
    );
    for (module, diagnostics) in &report.failed {
        for diagnostic in diagnostics {
            eprintln!("{module}: {diagnostic}");
        }
    }

    match cli.command {
        Command::Run => run_watch(&engine),
        Command::Call {
            module,
            type_name,
            function,
            args,
        } => run_call(&engine, &module, &type_name, &function, &args),
    }
}

fn run_watch(engine: &ModuleEngine) -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
        .context("could not install Ctrl-C handler")?;

    engine.watch(running, |event| match event {
        ReloadEvent::Started { root } => println!("watching {root}"),
        ReloadEvent::Changed { path } => println!("changed: {path}"),
        ReloadEvent::Reloaded { module } => println!("reloaded: {module}"),
        ReloadEvent::StillStale { module } => println!("still stale: {module}"),
        ReloadEvent::BatchComplete { .. } => {}
        ReloadEvent::Shutdown => println!("shutting down"),
    })?;
    Ok(())
}

fn run_call(
    engine: &ModuleEngine,
    module: &str,
    type_name: &str,
    function: &str,
    raw_args: &[String],
) -> anyhow::Result<()> {
    let (namespace, type_name) = match type_name.rsplit_once('.') {
        Some((namespace, name)) => (namespace, name),
        None => ("", type_name),
    };
    let args: Vec<Value> = raw_args.iter().map(|raw| parse_arg(raw)).collect();

    let value = engine.invoke::<Value>(module, namespace, type_name, function, &args)?;
    println!("{value}");
    Ok(())
}

/// Best-effort literal parsing for CLI arguments.
fn parse_arg(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(x) = raw.parse::<f64>() {
        return Value::Float(x);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Str(raw.to_string()),
    }
}
