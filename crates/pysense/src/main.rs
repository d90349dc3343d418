//! # Pysense CLI
//!
//! Thin front end over `pysense-core`: build one Python file and ask the
//! inference engine about a module-level name.
//!
//! ```bash
//! pysense infer app.py handler
//! pysense type-of app.py CONFIG
//! pysense len app.py ITEMS
//! pysense subtype app.py Child Base
//! ```
//!
//! Exit code 0 on an answer (including "Uninferable"), 1 when the file
//! cannot be built, the name is unknown, or a question has no definite answer.

mod cli;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use colored::Colorize;
use pysense_core::inference::igetattr;
use pysense_core::{
    is_subtype, object_len, safe_infer, type_of, AstManager, InferenceContext, ManagerConfig, Module, NodeRef, Value,
};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<ManagerConfig> {
    let mut config = match &cli.config {
        Some(path) => ManagerConfig::from_file(path)?,
        None => ManagerConfig::default(),
    };
    config.search_paths.extend(cli.search_paths.iter().cloned());
    if let Some(max) = cli.max_inferred {
        config.max_inferred = max;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    debug!("Configuration: {:?}", config);
    let mgr = AstManager::new(config);

    match &cli.command {
        Command::Infer { file, name } => {
            let module = build(&mgr, file)?;
            let values = igetattr(&mgr, &Value::Module(NodeRef::root(&module)), name, mgr.new_context());
            let mut count = 0;
            for value in values {
                match value {
                    Ok(value) => println!("{}", render(&value)),
                    Err(err) => println!("{} {}", "error:".yellow(), err),
                }
                count += 1;
            }
            if count == 0 {
                println!("{}", "no values".dimmed());
            }
        }
        Command::TypeOf { file, name } => {
            let module = build(&mgr, file)?;
            let def = definition(&module, name)?;
            println!("{}", render(&type_of(&mgr, &def, Some(lookup(&mgr, name)))));
        }
        Command::Len { file, name } => {
            let module = build(&mgr, file)?;
            let def = definition(&module, name)?;
            let len = object_len(&mgr, &def, Some(lookup(&mgr, name)))
                .with_context(|| format!("len({}) failed", name))?;
            println!("{}", len.to_string().green());
        }
        Command::Subtype { file, sub, sup } => {
            let module = build(&mgr, file)?;
            let sub_class = class_named(&mgr, &module, sub)?;
            let sup_class = class_named(&mgr, &module, sup)?;
            let answer = is_subtype(&mgr, &sub_class, &sup_class)
                .map_err(|err| anyhow!("cannot decide whether {} is a subtype of {}: {}", sub, sup, err))?;
            let answer = if answer { "true".green() } else { "false".red() };
            println!("{}", answer);
        }
    }
    Ok(())
}

fn build(mgr: &Arc<AstManager>, file: &Path) -> Result<Arc<Module>> {
    if !file.is_file() {
        bail!("no such file: {}", file.display());
    }
    mgr.build_from_file(file, None)
        .with_context(|| format!("failed to build {}", file.display()))
}

/// Last definition of `name` at module level
fn definition(module: &Arc<Module>, name: &str) -> Result<NodeRef> {
    NodeRef::root(module)
        .local_defs(name)
        .pop()
        .ok_or_else(|| anyhow!("`{}` is not defined in module `{}`", name, module.name()))
}

fn lookup(mgr: &Arc<AstManager>, name: &str) -> InferenceContext {
    mgr.new_context().with_lookup_name(Some(name.to_string()))
}

/// The one class `name` is bound to at module level
fn class_named(mgr: &Arc<AstManager>, module: &Arc<Module>, name: &str) -> Result<NodeRef> {
    let def = definition(module, name)?;
    match safe_infer(mgr, &def, Some(lookup(mgr, name))) {
        Some(Value::Class(class)) => Ok(class),
        Some(other) => bail!("`{}` is {}, not a class", name, other),
        None => bail!("cannot infer a single class for `{}`", name),
    }
}

fn render(value: &Value) -> colored::ColoredString {
    match value {
        Value::Uninferable => value.to_string().dimmed(),
        Value::Const(_) => value.to_string().green(),
        Value::Class(_) | Value::Proxy(_) => value.to_string().cyan(),
        _ => value.to_string().normal(),
    }
}
