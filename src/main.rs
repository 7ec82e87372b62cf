//! # repo-chat CLI
//!
//! ## Usage
//!
//! ```bash
//! repo-chat --config ./config/repo-chat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repo-chat init` | Create the SQLite index database |
//! | `repo-chat estimate <dir>` | Print the token and price estimate for `<dir>` |
//! | `repo-chat ingest <dir>` | Estimate, confirm, index `<dir>`, then chat |
//! | `repo-chat chat` | Chat against an existing index |
//!
//! Diagnostics go to stderr and are filtered with `RUST_LOG`
//! (default `warn`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use repo_chat::chat::{confirm, ChatLoop, InteractiveIo, StdIo};
use repo_chat::config::{self, Config};
use repo_chat::cost::TiktokenSource;
use repo_chat::embedding::create_embedder;
use repo_chat::generation::create_generator;
use repo_chat::pipeline;
use repo_chat::progress::ProgressMode;
use repo_chat::store::create_store;
use repo_chat::{db, migrate};

/// repo-chat: index a source tree and ask questions about it.
#[derive(Parser)]
#[command(name = "repo-chat", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/repo-chat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite index database and schema. Idempotent.
    Init,

    /// Collect, chunk, and price a directory without indexing it.
    Estimate {
        /// Directory to ingest; relative paths resolve against the
        /// current directory.
        dir: PathBuf,
    },

    /// Estimate, confirm, and index a directory, then start chatting.
    Ingest {
        dir: PathBuf,

        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,

        /// Exit after indexing instead of entering chat.
        #[arg(long)]
        no_chat: bool,

        /// Progress output on stderr: off, human, or json.
        /// Defaults to human when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Chat against an existing index.
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_minimal(&cli.config)?;

    match cli.command {
        Commands::Init => {
            if cfg.store.backend != "sqlite" {
                println!(
                    "Store backend '{}' manages its own schema; nothing to initialize.",
                    cfg.store.backend
                );
                return Ok(());
            }
            let pool = db::connect(&cfg.store.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized at {}", cfg.store.path.display());
        }
        Commands::Estimate { dir } => {
            let root = resolve_dir(&dir)?;
            let reporter = ProgressMode::default_for_tty().reporter();
            let plan = pipeline::prepare(&cfg, &root, &TiktokenSource, reporter.as_ref())?;
            pipeline::print_estimate(plan.estimate());
        }
        Commands::Ingest {
            dir,
            yes,
            no_chat,
            progress,
        } => {
            let mode = match progress.as_deref() {
                Some(s) => ProgressMode::parse(s).with_context(|| {
                    format!("Invalid --progress '{}'. Must be off, human, or json.", s)
                })?,
                None => ProgressMode::default_for_tty(),
            };
            let reporter = mode.reporter();

            let root = resolve_dir(&dir)?;
            let plan = pipeline::prepare(&cfg, &root, &TiktokenSource, reporter.as_ref())?;
            pipeline::print_estimate(plan.estimate());

            let mut io = StdIo::new()?;
            if !yes && !confirm(&mut io, "Are you sure you want continue?")? {
                println!("Bye!");
                return Ok(());
            }

            let embedder = create_embedder(&cfg.embedding)?;
            let store = create_store(&cfg, embedder.clone()).await?;
            plan.commit(
                embedder.as_ref(),
                store.as_ref(),
                cfg.embedding.batch_size,
                reporter.as_ref(),
            )
            .await?;
            println!("> Done.");

            if !no_chat {
                run_chat(&cfg, store, &mut io).await?;
            }
        }
        Commands::Chat => {
            let embedder = create_embedder(&cfg.embedding)?;
            let store = create_store(&cfg, embedder).await?;
            run_chat(&cfg, store, &mut StdIo::new()?).await?;
        }
    }

    Ok(())
}

async fn run_chat(
    cfg: &Config,
    store: std::sync::Arc<dyn repo_chat::store::VectorStore>,
    io: &mut dyn InteractiveIo,
) -> Result<()> {
    let generator = create_generator(cfg)?;
    let mut chat = ChatLoop::new(store, generator, cfg.retrieval.k);
    chat.run(io).await
}

fn resolve_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(dir))
}
