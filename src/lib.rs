pub mod app;
pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod highlight;
pub mod logging;
pub mod markdown;
pub mod session;
pub mod toast;
pub mod transcript;
pub mod tui;
pub mod typing;
pub mod ui;

// Re-export main types for convenience
pub use backend::{Backend, HttpBackend};
pub use config::Config;
pub use error::ChatError;
pub use session::{ChatSession, SessionEvent, Submission, Timings};
pub use transcript::{Body, Direction, Message, MessageId, Status, Transcript};
