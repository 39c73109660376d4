//! Append-only chat transcript.
//!
//! Turns are stored oldest first, which is also display order. The only
//! way to shrink a transcript is [`Transcript::clear`], which resets it to
//! the seeded greeting turn. There is no size cap.

use serde::Serialize;

use crate::models::ChatTurn;

/// Which chat surface a transcript belongs to; picks the greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Document,
    Code,
    General,
}

impl ChatMode {
    pub fn greeting(&self) -> ChatTurn {
        let response = match self {
            ChatMode::Document => "Hello! Ask me anything about your document 🤗",
            ChatMode::Code => "Hello! Ask me anything about Python code 🤖",
            ChatMode::General => "Hello! Ask me anything 🤖",
        };
        ChatTurn::new("Hello!!", response)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    greeting: ChatTurn,
    turns: Vec<ChatTurn>,
}

impl Transcript {
    /// A transcript holding only `greeting`.
    pub fn new(greeting: ChatTurn) -> Self {
        Self {
            turns: vec![greeting.clone()],
            greeting,
        }
    }

    pub fn for_mode(mode: ChatMode) -> Self {
        Self::new(mode.greeting())
    }

    pub fn append(&mut self, query: impl Into<String>, response: impl Into<String>) {
        self.turns.push(ChatTurn::new(query, response));
    }

    /// Reset to exactly the seeded greeting turn.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.turns.push(self.greeting.clone());
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ChatTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false: a transcript keeps at least its greeting.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
