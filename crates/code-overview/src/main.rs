//! # Code Overview CLI (`ovw`)
//!
//! ```bash
//! ovw --config ./config/overview.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ovw init` | Create the SQLite database and schema |
//! | `ovw index <dir> --project <name>` | Extract overviews from a source tree and store them |
//! | `ovw search "<query>" --project <name>` | Filtered semantic search over stored overviews |
//! | `ovw summarize <file>` | Chunk/map/reduce summary of one file |
//! | `ovw overview <dir>` | Regenerate a project document (overview, code rules, guidelines) |
//! | `ovw clear --project <name>` | Delete every stored overview of a project |
//!
//! Logs go to stderr and honor `RUST_LOG`; command output goes to stdout.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use code_overview::config;
use code_overview::search::SearchArgs;
use code_overview::{index, migrate, overview, search, summarize};
use code_overview_core::overview::ContentType;
use code_overview_core::summarize::SummaryKind;

/// Code Overview: documentation overviews and semantic search for source trees.
#[derive(Parser)]
#[command(
    name = "ovw",
    about = "Turn source files into searchable documentation overviews",
    version,
    long_about = "Code Overview asks a language model for documentation overviews of the classes, \
    interfaces and functions in a source tree, stores them with stable identities in an embedded \
    vector store, and answers filtered semantic queries over them. It can also keep a project \
    overview, coding rules or developer guide markdown document up to date."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/overview.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Extract overviews from every matching file under a directory.
    ///
    /// Records are keyed by file, type and name, so re-indexing overwrites
    /// instead of duplicating.
    Index {
        /// Directory to scan.
        dir: PathBuf,

        /// Project name; also the store collection.
        #[arg(long)]
        project: String,
    },

    /// Search stored overviews.
    Search {
        /// The search query string.
        query: String,

        /// Project to search.
        #[arg(long)]
        project: String,

        /// Only `class`, `interface` or `function` overviews.
        #[arg(long = "type")]
        content_type: Option<ContentType>,

        /// Name substring.
        #[arg(long)]
        name: Option<String>,

        /// Namespace substring.
        #[arg(long)]
        namespace: Option<String>,

        /// Referenced file or symbol; repeat to match any of several.
        #[arg(long = "reference")]
        references: Vec<String>,

        /// Maximum number of results (default from `[retrieval]`).
        #[arg(long)]
        limit: Option<usize>,

        /// Print only the document contents, separated by blank lines.
        #[arg(long)]
        raw: bool,
    },

    /// Summarize a single file.
    Summarize {
        file: PathBuf,

        /// `overview`, `code_rules` or `guidelines`.
        #[arg(long, default_value = "overview")]
        kind: SummaryKind,
    },

    /// Regenerate a project document from a source tree.
    Overview {
        /// Directory to scan.
        dir: PathBuf,

        /// Document to update (default: `<kind>.md` in the working directory).
        #[arg(long)]
        output: Option<PathBuf>,

        /// `overview`, `code_rules` or `guidelines`.
        #[arg(long, default_value = "overview")]
        kind: SummaryKind,
    },

    /// Delete every stored overview of a project.
    Clear {
        #[arg(long)]
        project: String,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { dir, project } => {
            index::run_index(&cfg, &dir, &project).await?;
        }
        Commands::Search {
            query,
            project,
            content_type,
            name,
            namespace,
            references,
            limit,
            raw,
        } => {
            let args = SearchArgs {
                query,
                project,
                content_type,
                name,
                namespace,
                references,
                limit,
                raw,
            };
            search::run_search(&cfg, &args).await?;
        }
        Commands::Summarize { file, kind } => {
            summarize::run_summarize(&cfg, &file, kind).await?;
        }
        Commands::Overview { dir, output, kind } => {
            overview::run_overview(&cfg, &dir, output, kind).await?;
        }
        Commands::Clear { project } => {
            index::run_clear(&cfg, &project).await?;
        }
    }

    Ok(())
}
