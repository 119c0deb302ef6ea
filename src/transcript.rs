//! Message records and the ordered transcript.
//!
//! The transcript is the source of truth for the chat view: the UI only
//! projects it into lines, it never holds state of its own.

use ratatui::text::Line;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Who a bubble belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Normal,
    Loading,
    Error,
}

/// Content of a bubble.
///
/// `Text` is shown verbatim (user prompts, errors, a response that is still
/// being typed out). `Formatted` keeps the raw source next to the rendered
/// markdown so the text stays available for copying.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Formatted {
        source: String,
        lines: Vec<Line<'static>>,
    },
}

impl Body {
    pub fn text(&self) -> &str {
        match self {
            Body::Text(text) => text,
            Body::Formatted { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub direction: Direction,
    pub body: Body,
    pub status: Status,
}

impl Message {
    pub fn text(&self) -> &str {
        self.body.text()
    }

    pub fn is_formatted(&self) -> bool {
        matches!(self.body, Body::Formatted { .. })
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bubble and return its id. Ids are never reused, not even
    /// after a clear, so late events for removed bubbles can't land on new ones.
    pub fn push(&mut self, direction: Direction, body: Body, status: Status) -> MessageId {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(Message {
            id,
            direction,
            body,
            status,
        });
        id
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
