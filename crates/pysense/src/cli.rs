//! Command line definition for the `pysense` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Query the inference engine about names defined in a Python module.
///
/// Every subcommand builds `<FILE>` (and whatever it imports, on demand)
/// and answers a question about a module-level name.
#[derive(Parser, Debug)]
#[command(name = "pysense", author, version, about = "Static inference for Python source")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,

    /// JSON file with manager settings
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Extra directory searched for absolute imports (repeatable)
    #[arg(long = "search-path", global = true)]
    pub(crate) search_paths: Vec<PathBuf>,

    /// Cap on values inferred per query
    #[arg(long, global = true)]
    pub(crate) max_inferred: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub(crate) verbose: u8,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Print every value NAME may take
    Infer { file: PathBuf, name: String },

    /// Print the runtime type of NAME
    #[command(name = "type-of")]
    TypeOf { file: PathBuf, name: String },

    /// Print `len(NAME)`
    Len { file: PathBuf, name: String },

    /// Decide whether class SUB is a subclass of class SUP
    Subtype { file: PathBuf, sub: String, sup: String },
}
