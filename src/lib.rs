//! # ragdesk
//!
//! A terminal assistant over hosted LLMs: summarization, sentiment, named
//! entities, Python code generation, open questions, and retrieval-augmented
//! Q&A over an uploaded PDF, DOCX or text document.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌────────────────┐   ┌──────────────┐
//! │ Document  │──▶│ Extract+Chunk  │──▶│ VectorIndex  │
//! │ PDF/DOCX  │   │    +Embed      │   │ (in memory)  │
//! └───────────┘   └────────────────┘   └──────┬───────┘
//!                                             │ top-k
//!                                             ▼
//!  query ──────────────────────────▶ ModelRequest ──▶ Llama / Gemini / DeepSeek
//! ```
//!
//! The pure pieces (chunking, index, prompts, dispatcher, transcript) live in
//! the `ragdesk-core` crate; this crate adds file extraction, network
//! embedders and backends, configuration, and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF / DOCX / text extraction |
//! | [`embedding`] | Embedder implementations and selection |
//! | [`backends`] | Together and Gemini model backends |
//! | [`assistant`] | Task operations over a session |
//! | [`chat`] | Interactive chat loop and dispatch deadline |

pub mod assistant;
pub mod backends;
pub mod chat;
pub mod config;
pub mod embedding;
pub mod extract;

pub use ragdesk_core as core;
