//! # PDF RAG CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ingest` | Parse, chunk, embed and index every PDF in `ingest.pdf_dir` |
//! | `rag ask "<question>"` | Answer one question and print its sources |
//! | `rag chat` | Interactive multi-turn session with conversation memory |
//! | `rag serve` | Start the HTTP query server |
//!
//! Logs go to stderr; set `RUST_LOG` (e.g. `RUST_LOG=pdf_rag=debug`) to
//! change verbosity.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use pdf_rag::config;
use pdf_rag::ingest;
use pdf_rag::models::AnswerResult;
use pdf_rag::pipeline::{normalize_question, RagPipeline};
use pdf_rag::server;
use pdf_rag::session::DEFAULT_SESSION;

/// Ask questions about a folder of PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "Retrieval-augmented question answering over a PDF corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the PDFs in the configured directory.
    ///
    /// Each page is extracted, split into overlapping chunks, embedded and
    /// upserted into the vector store. Re-running appends.
    Ingest {
        /// Read PDFs from this directory instead of `ingest.pdf_dir`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Answer a single question, with no conversation history.
    ///
    /// Memory lives in the process, so follow-ups need `chat` or `serve`.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Interactive chat. `/clear` forgets the conversation, `/quit` exits.
    Chat,

    /// Start the HTTP query server on `server.bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Reject a blank question before any config or network work.
    if let Commands::Ask { question } = &cli.command {
        normalize_question(question)?;
    }

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { dir } => {
            if let Some(dir) = dir {
                cfg.ingest.pdf_dir = dir;
            }
            ingest::run_ingest(&cfg).await?;
        }
        Commands::Ask { question } => {
            let pipeline = RagPipeline::from_config(&cfg).await?;
            let result = pipeline.answer_question(DEFAULT_SESSION, &question).await?;
            print_answer(&result);
        }
        Commands::Chat => {
            let pipeline = RagPipeline::from_config(&cfg).await?;
            run_chat(&pipeline).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_chat(pipeline: &RagPipeline) -> anyhow::Result<()> {
    println!("Ask about your PDFs. /clear resets the conversation, /quit exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                pipeline.sessions().clear(DEFAULT_SESSION);
                println!("Conversation cleared.");
            }
            question => match pipeline.answer_question(DEFAULT_SESSION, question).await {
                Ok(result) => print_answer(&result),
                // Keep the loop alive; the turn was not recorded.
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }
    Ok(())
}

fn print_answer(result: &AnswerResult) {
    println!("{}", result.answer.trim_end());
    if let Some(sources) = result.sources.as_deref().filter(|s| !s.is_empty()) {
        println!();
        println!("Sources:");
        for (i, meta) in sources.iter().enumerate() {
            match meta.page {
                Some(page) => println!("  [{}] {} (page {})", i + 1, meta.source, page),
                None => println!("  [{}] {}", i + 1, meta.source),
            }
        }
    }
}
