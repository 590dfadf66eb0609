//! # DSMate CLI (`dsmate`)
//!
//! Indexes the course corpus once at startup, then answers questions
//! against one selected document.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dsmate docs` | List indexed and skipped documents |
//! | `dsmate ask --doc <sel> "<question>"` | Answer a single question |
//! | `dsmate chat --doc <sel>` | Interactive session on stdin |
//!
//! `<sel>` is a document path or its display name (file stem).
//!
//! ## Examples
//!
//! ```bash
//! dsmate --config ./config/dsmate.toml docs
//! dsmate ask --doc lecture03 "What is a remote procedure call?"
//! dsmate --log-file user_activity.log chat --doc lab1 --user alice
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use dsmate::answer::Synthesizer;
use dsmate::config::{self, Config};
use dsmate::embedding::create_embedder;
use dsmate::generation::create_generator;
use dsmate::index::DocumentIndex;
use dsmate::logging::init_logging;
use dsmate::registry::{DiscoverOptions, Registry, RegistryCache};
use dsmate::session::Conversation;

const DEFAULT_CONFIG: &str = "./config/dsmate.toml";

/// DSMate: answers questions about one course document at a time.
#[derive(Parser)]
#[command(name = "dsmate", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dsmate.toml`; built-in defaults are used when
    /// that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append log events to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List indexed documents and any that were skipped.
    Docs,

    /// Answer one question about a document.
    Ask {
        /// Document path or display name.
        #[arg(long)]
        doc: String,

        /// The question.
        question: String,
    },

    /// Ask questions interactively. `/history`, `/clear` and `/quit` are commands.
    Chat {
        /// Document path or display name.
        #[arg(long)]
        doc: String,

        /// Name recorded in activity log events.
        #[arg(long, default_value = "anonymous")]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let cfg = resolve_config(cli.config.as_deref())?;
    let embedder = create_embedder(&cfg.embedding)?;
    let generator = create_generator(&cfg.generation)?;

    let cache = RegistryCache::new(DiscoverOptions::from_config(&cfg), embedder);
    let registry = cache
        .get_or_discover(&cfg.corpus.root)
        .await
        .with_context(|| "No documents are available. Add files to the corpus root and restart")?;

    match cli.command {
        Commands::Docs => print_documents(&registry),
        Commands::Ask { doc, question } => {
            let index = select(&registry, &doc)?;
            let synth = Synthesizer::from_config(&cfg, generator);
            tracing::info!(user = "cli", document = %index.document().display_name, "question asked");
            let answer = synth
                .answer(index, &question)
                .await
                .with_context(|| "Failed to answer the question")?;
            println!("{}", answer);
        }
        Commands::Chat { doc, user } => {
            let index = select(&registry, &doc)?;
            let synth = Synthesizer::from_config(&cfg, generator);
            chat(&synth, index, &user).await?;
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None if Path::new(DEFAULT_CONFIG).exists() => config::load_config(Path::new(DEFAULT_CONFIG)),
        None => Ok(Config::default()),
    }
}

fn select<'a>(registry: &'a Registry, selector: &str) -> Result<&'a DocumentIndex> {
    match registry.find(selector) {
        Some(index) => Ok(index),
        None => bail!(
            "Unknown document '{}'. Run `dsmate docs` to list available documents.",
            selector
        ),
    }
}

fn print_documents(registry: &Registry) {
    for (_, index) in registry.iter() {
        let doc = index.document();
        println!(
            "{:<32} {:<4} {:>4} segments  {}",
            doc.display_name,
            doc.extension(),
            index.len(),
            doc.path.display()
        );
    }
    if !registry.skipped().is_empty() {
        println!();
        println!("Skipped:");
        for skipped in registry.skipped() {
            println!("  {}  ({})", skipped.path.display(), skipped.reason);
        }
    }
}

async fn chat(synth: &Synthesizer, index: &DocumentIndex, user: &str) -> Result<()> {
    let document = &index.document().display_name;
    tracing::info!(user, document = %document, "session started");
    println!("Asking about '{}'. /history, /clear, /quit", document);

    let mut conversation = Conversation::new();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let line = line?;
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                conversation.clear();
                continue;
            }
            "/history" => {
                for turn in conversation.turns() {
                    println!("[{}] {}", turn.role, turn.text);
                }
                continue;
            }
            _ => {}
        }

        tracing::info!(user, document = %document, "question asked");
        conversation.push_user(input);
        match synth.answer(index, input).await {
            Ok(answer) => {
                println!("{}", answer);
                conversation.push_assistant(answer);
            }
            Err(e) => {
                tracing::warn!(user, error = %e, "answer failed");
                eprintln!("Error: {}", e);
            }
        }
    }

    conversation.clear();
    tracing::info!(user, document = %document, "session ended");
    Ok(())
}
