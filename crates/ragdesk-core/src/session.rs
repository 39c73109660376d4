//! Per-user session context.
//!
//! Everything that lives for the duration of one interactive session (the
//! selected backend and persona, the transcript, the document index) is held
//! in a [`Session`] owned by the caller and passed into each operation.
//! Nothing is global and nothing outlives the session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::backend::BackendId;
use crate::conversation::{ChatMode, Transcript};
use crate::index::VectorIndex;
use crate::prompt::Persona;

#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub mode: ChatMode,
    pub backend: BackendId,
    pub persona: Option<Persona>,
    pub transcript: Transcript,
    index: Option<Arc<VectorIndex>>,
    document_name: Option<String>,
}

impl Session {
    pub fn new(mode: ChatMode, backend: BackendId, persona: Option<Persona>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            mode,
            backend,
            persona,
            transcript: Transcript::for_mode(mode),
            index: None,
            document_name: None,
        }
    }

    /// Index of the most recently ingested document, if any.
    pub fn index(&self) -> Option<Arc<VectorIndex>> {
        self.index.clone()
    }

    pub fn document_name(&self) -> Option<&str> {
        self.document_name.as_deref()
    }

    /// Install a freshly built index, dropping the session's reference to the old one.
    pub fn replace_index(&mut self, name: impl Into<String>, index: VectorIndex) {
        self.index = Some(Arc::new(index));
        self.document_name = Some(name.into());
    }

    /// Clear the transcript; the index survives.
    pub fn reset(&mut self) {
        self.transcript.clear();
    }
}
