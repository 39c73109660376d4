//! # ragdesk CLI
//!
//! ## Usage
//!
//! ```bash
//! ragdesk --config ./config/ragdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragdesk summarize <text>` | Summarize text (or `--file`) |
//! | `ragdesk sentiment <text>` | Classify as positive, negative or neutral |
//! | `ragdesk entities <text>` | Named entities grouped by type |
//! | `ragdesk code <request>` | Generate Python code |
//! | `ragdesk ask <question>` | Answer a general question |
//! | `ragdesk chat [document]` | Chat about a document, or with `--code` about code |
//! | `ragdesk segments <document>` | Show how a document is chunked |
//! | `ragdesk backends` | List backends and whether their keys are set |
//!
//! Text arguments may be `-` to read from stdin. Results go to stdout; logs
//! go to stderr and are controlled by `RUST_LOG` (default `warn`).
//!
//! ## Examples
//!
//! ```bash
//! export TOGETHER_AI_API_KEY=...
//! ragdesk sentiment "I love this product"
//! ragdesk --backend gemini --persona technical summarize --file notes.pdf
//! ragdesk chat ./report.docx
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragdesk::assistant::Assistant;
use ragdesk::chat::run_chat;
use ragdesk::config::{self, Config};
use ragdesk::core::backend::BackendId;
use ragdesk::core::chunk::chunk_text;
use ragdesk::core::conversation::ChatMode;
use ragdesk::core::models::Document;
use ragdesk::core::prompt::Persona;
use ragdesk::core::session::Session;
use ragdesk::extract::extract_text;

/// ragdesk: summarization, sentiment, entities, code and document Q&A over
/// hosted LLMs.
#[derive(Parser)]
#[command(
    name = "ragdesk",
    about = "Document Q&A and text tasks over hosted LLMs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "./config/ragdesk.toml")]
    config: PathBuf,

    /// Backend to use: llama, gemini, or deepseek. Overrides `backends.default`.
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Response tone: professional, technical, casual, or none. Overrides `backends.persona`.
    #[arg(long, global = true)]
    persona: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize text.
    Summarize {
        /// Text to summarize, or `-` for stdin.
        text: Option<String>,

        /// Summarize a PDF, DOCX or text file instead.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Classify the sentiment of text.
    Sentiment {
        /// Text to classify, or `-` for stdin.
        text: String,
    },

    /// Extract named entities grouped by type.
    Entities {
        /// Text to analyze, or `-` for stdin.
        text: String,

        /// Print groups as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate Python code for a request.
    Code {
        /// What the code should do, or `-` for stdin.
        request: String,
    },

    /// Answer a general question.
    Ask {
        /// The question, or `-` for stdin.
        question: String,
    },

    /// Interactive chat. With a document, questions are answered from it.
    Chat {
        /// PDF, DOCX or text file to chat about.
        document: Option<PathBuf>,

        /// Chat about Python code instead of a document.
        #[arg(long, conflicts_with = "document")]
        code: bool,
    },

    /// Print the segments a document is split into. Needs no model.
    Segments {
        /// PDF, DOCX or text file.
        document: PathBuf,
    },

    /// List backends and whether their credentials are present.
    Backends,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Resolve `-` to the whole of stdin.
fn resolve_text(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        Ok(arg.to_string())
    }
}

fn load_document(path: &Path) -> Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::from_upload(name, bytes)?)
}

fn new_session(cli: &Cli, cfg: &Config, mode: ChatMode) -> Result<Session> {
    let backend = match &cli.backend {
        Some(name) => name
            .parse::<BackendId>()
            .map_err(|e| anyhow::anyhow!("--backend: {}", e))?,
        None => cfg.backends.default_backend()?,
    };
    let persona: Option<Persona> = match &cli.persona {
        Some(name) => config::parse_persona(name).context("--persona")?,
        None => cfg.backends.default_persona()?,
    };
    Ok(Session::new(mode, backend, persona))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    // Commands that need no model
    match &cli.command {
        Commands::Segments { document } => {
            let document = load_document(document)?;
            let text = extract_text(&document)?;
            let segments = chunk_text(&text, &cfg.chunking.options());
            println!(
                "{} ({}): {} chars, {} segments",
                document.name,
                document.kind.as_str(),
                text.chars().count(),
                segments.len()
            );
            for segment in &segments {
                let preview: String = segment.text.chars().take(60).collect();
                println!(
                    "  [{}] {} chars, overlap {}, {}  {:?}",
                    segment.index,
                    segment.text.chars().count(),
                    segment.overlap,
                    &segment.hash[..12],
                    preview
                );
            }
            return Ok(());
        }
        Commands::Backends => {
            let default = cfg.backends.default_backend()?;
            for id in BackendId::ALL {
                let settings = cfg.backends.get(id);
                let key = if settings.api_key().is_some() {
                    "key set"
                } else {
                    "key missing"
                };
                let marker = if id == default { "*" } else { " " };
                println!(
                    "{} {:<9} {:<50} {} ({})",
                    marker,
                    id.as_str(),
                    settings.model,
                    settings.api_key_env,
                    key
                );
            }
            return Ok(());
        }
        _ => {}
    }

    let mut assistant = Assistant::from_config(&cfg)?;

    match &cli.command {
        Commands::Summarize { text, file } => {
            let text = match (text, file) {
                (_, Some(path)) => extract_text(&load_document(path)?)?,
                (Some(text), None) => resolve_text(text)?,
                (None, None) => bail!("Provide text to summarize or --file <path>"),
            };
            let session = new_session(&cli, &cfg, ChatMode::General)?;
            let summary = assistant.summarize(&session, &text).await?;
            println!("{}", summary);
        }
        Commands::Sentiment { text } => {
            let text = resolve_text(text)?;
            let session = new_session(&cli, &cfg, ChatMode::General)?;
            let sentiment = assistant.classify_sentiment(&session, &text).await?;
            println!("{}", sentiment);
        }
        Commands::Entities { text, json } => {
            let text = resolve_text(text)?;
            let session = new_session(&cli, &cfg, ChatMode::General)?;
            let groups = assistant.extract_entities(&session, &text).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else if groups.is_empty() {
                println!("No entities found.");
            } else {
                for group in &groups {
                    println!("{}: {}", group.label, group.entities.join(", "));
                }
            }
        }
        Commands::Code { request } => {
            let request = resolve_text(request)?;
            let mut session = new_session(&cli, &cfg, ChatMode::Code)?;
            let code = assistant.generate_code(&mut session, &request).await?;
            println!("{}", code);
        }
        Commands::Ask { question } => {
            let question = resolve_text(question)?;
            let mut session = new_session(&cli, &cfg, ChatMode::General)?;
            let answer = assistant.answer_question(&mut session, &question).await?;
            println!("{}", answer);
        }
        Commands::Chat { document, code } => {
            let mode = match (document, code) {
                (Some(_), _) => ChatMode::Document,
                (None, true) => ChatMode::Code,
                (None, false) => ChatMode::General,
            };
            let mut session = new_session(&cli, &cfg, mode)?;
            if let Some(path) = document {
                let report = assistant.ingest(&mut session, load_document(path)?).await?;
                eprintln!(
                    "Indexed {} ({} segments, {} dims, {})",
                    report.document, report.segments, report.dims, report.model
                );
            }
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            run_chat(&mut assistant, &mut session, stdin, &mut stdout).await?;
        }
        Commands::Segments { .. } | Commands::Backends => {}
    }

    Ok(())
}
