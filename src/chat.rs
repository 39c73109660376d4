//! Interactive chat loop.
//!
//! Reads one query per line and answers it according to the session's
//! [`ChatMode`]: document Q&A, code generation, or open questions. A failed
//! dispatch is reported and the loop continues; the transcript only grows
//! on success.
//!
//! | Input | Effect |
//! |-------|--------|
//! | `/clear` | reset the transcript to the greeting |
//! | `/history` | print every turn |
//! | `/quit` | leave the loop (so does end of input) |

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use ragdesk_core::conversation::ChatMode;
use ragdesk_core::models::ChatTurn;
use ragdesk_core::session::Session;

use crate::assistant::Assistant;

fn print_turn<W: Write>(out: &mut W, turn: &ChatTurn) -> Result<()> {
    writeln!(out, "you> {}", turn.query)?;
    writeln!(out, "{}\n", turn.response)?;
    Ok(())
}

/// Run the loop until `/quit` or end of input.
pub async fn run_chat<R, W>(
    assistant: &mut Assistant,
    session: &mut Session,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if let Some(greeting) = session.transcript.last() {
        writeln!(out, "{}", greeting.response)?;
    }

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        match query {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.reset();
                writeln!(out, "(transcript cleared)")?;
                continue;
            }
            "/history" => {
                for turn in session.transcript.turns() {
                    print_turn(out, turn)?;
                }
                continue;
            }
            _ => {}
        }

        let result = match session.mode {
            ChatMode::Document => assistant.ask_document(session, query).await,
            ChatMode::Code => assistant.generate_code(session, query).await,
            ChatMode::General => assistant.answer_question(session, query).await,
        };

        match result {
            Ok(answer) => writeln!(out, "{}\n", answer)?,
            Err(e) if e.is_dispatch_error() => {
                tracing::debug!(error = %e, "chat turn failed");
                writeln!(out, "error: {}\n", e)?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        session = %session.id,
        turns = session.transcript.len(),
        "chat ended"
    );
    Ok(())
}
