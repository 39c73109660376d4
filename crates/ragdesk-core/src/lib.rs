//! # ragdesk core
//!
//! Runtime-free logic for ragdesk: data models, chunking, the embedder
//! trait, the exact k-NN vector index, prompt composition, the model
//! backend trait and dispatcher, and per-session conversation state.
//!
//! This crate performs no network or filesystem I/O. Concrete embedders,
//! hosted model backends, and document extraction live in the `ragdesk`
//! app crate.

pub mod backend;
pub mod chunk;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod prompt;
pub mod session;
pub mod tasks;

pub use error::{AssistantError, Result};
