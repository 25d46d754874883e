//! Cidx CLI - query an incremental C source index from the command line.
//!
//! Cidx indexes the translation units listed in `compile_commands.json` and
//! answers questions about functions, types, macros, the call graph and the
//! include graph.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// Cidx: incremental source index for C codebases.
#[derive(Parser)]
#[command(name = "cidx")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default `.cidx/config.yaml`
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Rebuild the index from compile_commands.json
    Build,

    /// Re-index files (defaults to every stale file)
    Update {
        /// Files to re-index
        files: Vec<PathBuf>,
    },

    /// List files that need re-indexing
    Stale,

    /// Show index statistics
    Stats,

    /// Show a function's signature, parameters, locals and documentation
    Function {
        /// Function name
        name: String,
    },

    /// Show the call sites naming a function
    Callers {
        /// Function name
        name: String,
    },

    /// Show the calls made by a function
    Callees {
        /// Function name
        name: String,
    },

    /// Find call paths between two functions
    Path {
        /// Calling function
        from: String,

        /// Called function
        to: String,

        /// Maximum number of hops
        #[arg(short, long, default_value = "5")]
        max_depth: usize,
    },

    /// Show the nested callees of a function
    Tree {
        /// Root function
        name: String,

        /// Levels to expand
        #[arg(short, long, default_value = "3")]
        depth: usize,
    },

    /// Resolve a typedef to its terminal type
    Typedef {
        /// Typedef name
        name: String,
    },

    /// Show the members of a struct or union with their offsets
    Fields {
        /// Struct/union tag or typedef name
        name: String,
    },

    /// Show the values of an enum
    Enum {
        /// Enum tag or typedef name
        name: String,
    },

    /// Show a macro, expanded with arguments when given
    Macro {
        /// Macro name
        name: String,

        /// Arguments for a function-like macro
        args: Vec<String>,
    },

    /// Find references to a symbol
    Refs {
        /// Symbol name
        name: String,

        /// Only references of this kind (read, write, addr, call, type_ref)
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Show the headers a file includes
    Includes {
        /// Indexed file
        file: PathBuf,

        /// Follow includes of indexed headers
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show the files including a header
    Includers {
        /// Header as written in the include, or a suffix of its resolved path
        header: String,
    },

    /// Print the source text of a function definition
    Source {
        /// Function name
        name: String,
    },

    /// Search function (or macro) names with SQL LIKE wildcards
    Search {
        /// Pattern, e.g. `%alloc%`
        pattern: String,

        /// Search macros instead of functions
        #[arg(long)]
        macros: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let workspace = match cli.workspace {
        Some(w) => w,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!(
                    "{}: failed to get current directory: {e}",
                    "error".red().bold()
                );
                return ExitCode::FAILURE;
            }
        },
    };

    let result = match cli.command {
        Commands::Init { force } => cli::init::run(&workspace, force),
        Commands::Build => cli::build::run(&workspace),
        Commands::Update { files } => cli::build::update(&workspace, &files),
        Commands::Stale => cli::build::stale(&workspace),
        Commands::Stats => cli::stats::run(&workspace),
        Commands::Function { name } => cli::function::run(&workspace, &name),
        Commands::Callers { name } => cli::calls::callers(&workspace, &name),
        Commands::Callees { name } => cli::calls::callees(&workspace, &name),
        Commands::Path {
            from,
            to,
            max_depth,
        } => cli::calls::path(&workspace, &from, &to, max_depth),
        Commands::Tree { name, depth } => cli::calls::tree(&workspace, &name, depth),
        Commands::Typedef { name } => cli::types::typedef(&workspace, &name),
        Commands::Fields { name } => cli::types::fields(&workspace, &name),
        Commands::Enum { name } => cli::types::enum_values(&workspace, &name),
        Commands::Macro { name, args } => cli::macros::run(&workspace, &name, &args),
        Commands::Refs { name, kind } => cli::refs::run(&workspace, &name, kind.as_deref()),
        Commands::Includes { file, recursive } => {
            cli::includes::includes(&workspace, &file, recursive)
        }
        Commands::Includers { header } => cli::includes::includers(&workspace, &header),
        Commands::Source { name } => cli::function::source(&workspace, &name),
        Commands::Search { pattern, macros } => cli::search::run(&workspace, &pattern, macros),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            // Show cause chain for nested errors
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {}: {cause}", "caused by".dimmed());
                source = std::error::Error::source(cause);
            }
            ExitCode::FAILURE
        }
    }
}
