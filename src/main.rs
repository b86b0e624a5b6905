//! Arbor CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Semantic code graph store, pattern matcher, and view projector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a bundle and print the load report
    Load {
        /// Bundle file path, or `-` for stdin
        bundle: PathBuf,

        /// Skip structural validation before loading
        #[arg(long)]
        skip_validation: bool,
    },
    /// Load a bundle and print store statistics
    Stats {
        /// Bundle file path, or `-` for stdin
        bundle: PathBuf,
    },
    /// Project a view over a loaded bundle
    View {
        /// Bundle file path, or `-` for stdin
        bundle: PathBuf,

        /// View class: call_graph, inheritance, module_deps, full
        #[arg(long, default_value = "full")]
        view: String,

        /// Root node id for a bounded subgraph view
        #[arg(long)]
        root: Option<String>,

        /// Hop budget around the root
        #[arg(long, default_value = "3")]
        depth: usize,

        /// Drop edges below this confidence
        #[arg(long, default_value = "0")]
        min_confidence: f64,

        /// Collapse children of nodes with this kind (repeatable)
        #[arg(long = "collapse")]
        collapse_kinds: Vec<String>,

        /// Exclusion glob matched against file paths (repeatable)
        #[arg(long = "exclude")]
        exclude_paths: Vec<String>,

        /// Run the pattern catalog over the projected scope
        #[arg(long)]
        patterns: bool,
    },
    /// Match patterns against a loaded bundle
    Match {
        /// Bundle file path, or `-` for stdin
        bundle: PathBuf,

        /// Pattern id; all registered patterns when omitted
        #[arg(long)]
        pattern: Option<String>,

        /// Restrict candidates to these node ids (repeatable)
        #[arg(long = "scope")]
        scope: Vec<String>,
    },
    /// Start the HTTP server
    Serve {
        /// Bundle to preload, or start empty
        bundle: Option<PathBuf>,

        /// Port to listen on
        #[arg(short, long, default_value = "7424")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("arbor={log_level}")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Load {
            bundle,
            skip_validation,
        } => commands::load(bundle, !skip_validation),
        Commands::Stats { bundle } => commands::stats(bundle),
        Commands::View {
            bundle,
            view,
            root,
            depth,
            min_confidence,
            collapse_kinds,
            exclude_paths,
            patterns,
        } => commands::view(
            bundle,
            view,
            root,
            depth,
            min_confidence,
            collapse_kinds,
            exclude_paths,
            patterns,
        ),
        Commands::Match {
            bundle,
            pattern,
            scope,
        } => commands::match_patterns(bundle, pattern, scope),
        Commands::Serve { bundle, port, host } => commands::serve(bundle, host, port).await,
        Commands::Version => {
            println!("arbor v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
