//! Character-by-character replay of a response that has already arrived.

use std::time::Duration;

use ratatui::text::Line;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::session::SessionEvent;
use crate::transcript::MessageId;

/// Replay state for one bubble. The full answer and its rendered form are
/// known up front; only the reveal position moves.
#[derive(Debug)]
pub struct Typewriter {
    pub bubble: MessageId,
    chars: Vec<char>,
    revealed: usize,
    rendered: Vec<Line<'static>>,
    source: String,
}

impl Typewriter {
    pub fn new(bubble: MessageId, source: String, rendered: Vec<Line<'static>>) -> Self {
        Self {
            bubble,
            chars: source.chars().collect(),
            revealed: 0,
            rendered,
            source,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.revealed >= self.chars.len()
    }

    /// Next character to append, or `None` once everything is shown
    pub fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.revealed).copied()?;
        self.revealed += 1;
        Some(c)
    }

    /// Consume the typewriter, yielding the raw source and pre-rendered lines
    pub fn finish(self) -> (String, Vec<Line<'static>>) {
        (self.source, self.rendered)
    }
}

/// Send one `TypeTick` per character at `interval`, stopping early when the
/// token is cancelled or the receiver is gone.
pub fn spawn_ticker(
    bubble: MessageId,
    ticks: usize,
    interval: Duration,
    token: CancellationToken,
    tx: UnboundedSender<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        for _ in 0..ticks {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    if tx.send(SessionEvent::TypeTick { bubble }).is_err() {
                        break;
                    }
                }
            }
        }
    })
}
