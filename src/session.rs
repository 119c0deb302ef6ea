//! The chat session: submission gate, request dispatch, typing replay and
//! transcript clearing.
//!
//! All state is owned here and only changes inside `submit`, `clear` and
//! `apply`. Timers and the HTTP call run as spawned tasks that report back
//! through [`SessionEvent`]s, so nothing ever touches the transcript from
//! another task. One cycle (an accepted prompt through to its final bubble)
//! is active at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::ChatError;
use crate::markdown;
use crate::toast::{ToastId, ToastKind, ToastStack};
use crate::transcript::{Body, Direction, MessageId, Status, Transcript};
use crate::typing::{self, Typewriter};

pub const EMPTY_PROMPT: &str = "⚠️ Enter a prompt.";
pub const STILL_ANSWERING: &str = "⏳ Still answering the previous prompt.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub typing_interval: Duration,
    pub dispatch_delay: Duration,
    pub toast_visible: Duration,
    pub toast_fade: Duration,
    pub scroll_settle: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            typing_interval: Duration::from_millis(10),
            dispatch_delay: Duration::from_millis(400),
            toast_visible: Duration::from_millis(3000),
            toast_fade: Duration::from_millis(400),
            scroll_settle: Duration::from_millis(100),
        }
    }
}

#[derive(Debug)]
pub enum SessionEvent {
    /// The outgoing bubble has settled; show the loading bubble and send
    DispatchReady { outgoing: MessageId },
    Response {
        bubble: MessageId,
        result: Result<String, ChatError>,
    },
    TypeTick { bubble: MessageId },
    ScrollToBottom,
    ToastHide(ToastId),
    ToastRemove(ToastId),
    BackendStatus(Result<String, ChatError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted(MessageId),
    Empty,
    Busy,
}

struct Cycle {
    outgoing: MessageId,
    prompt: String,
    incoming: Option<MessageId>,
    typing: Option<Typewriter>,
    token: CancellationToken,
}

pub struct ChatSession {
    backend: Arc<dyn Backend>,
    timings: Timings,
    tx: UnboundedSender<SessionEvent>,
    transcript: Transcript,
    toasts: ToastStack,
    cycle: Option<Cycle>,
    scroll_scheduled: bool,
    scroll_requested: bool,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn Backend>,
        timings: Timings,
        tx: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            backend,
            timings,
            tx,
            transcript: Transcript::new(),
            toasts: ToastStack::new(),
            cycle: None,
            scroll_scheduled: false,
            scroll_requested: false,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn toasts(&self) -> &ToastStack {
        &self.toasts
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    /// True from the moment a prompt is accepted until its answer is fully
    /// rendered or has failed
    pub fn is_generating(&self) -> bool {
        self.cycle.is_some()
    }

    /// Take a pending scroll-to-bottom request, if one has settled
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_requested)
    }

    pub fn submit(&mut self, input: &str) -> Submission {
        let prompt = input.trim();
        if prompt.is_empty() {
            debug!("empty prompt rejected");
            self.toast(ToastKind::Warning, EMPTY_PROMPT);
            return Submission::Empty;
        }
        if self.is_generating() {
            debug!("prompt rejected while a response is in progress");
            self.toast(ToastKind::Info, STILL_ANSWERING);
            return Submission::Busy;
        }

        let outgoing =
            self.transcript
                .push(Direction::Outgoing, Body::Text(prompt.to_string()), Status::Normal);
        let token = CancellationToken::new();
        self.cycle = Some(Cycle {
            outgoing,
            prompt: prompt.to_string(),
            incoming: None,
            typing: None,
            token: token.clone(),
        });
        info!(bubble = outgoing.get(), chars = prompt.chars().count(), "prompt accepted");
        self.schedule_scroll();

        let tx = self.tx.clone();
        let delay = self.timings.dispatch_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(SessionEvent::DispatchReady { outgoing });
                }
            }
        });

        Submission::Accepted(outgoing)
    }

    /// Remove every bubble and abandon whatever the current cycle is doing
    pub fn clear(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            cycle.token.cancel();
            info!(bubble = cycle.outgoing.get(), "in-flight cycle cancelled by clear");
        }
        self.transcript.clear();
        self.scroll_requested = true;
        info!("transcript cleared");
    }

    pub fn toast(&mut self, kind: ToastKind, message: impl Into<String>) -> ToastId {
        let id = self.toasts.push(kind, message);
        let tx = self.tx.clone();
        let visible = self.timings.toast_visible;
        let fade = self.timings.toast_fade;
        tokio::spawn(async move {
            tokio::time::sleep(visible).await;
            if tx.send(SessionEvent::ToastHide(id)).is_err() {
                return;
            }
            tokio::time::sleep(fade).await;
            let _ = tx.send(SessionEvent::ToastRemove(id));
        });
        id
    }

    /// Ask the backend for its status banner; the answer arrives as a
    /// `BackendStatus` event
    pub fn check_backend(&self) {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.status().await;
            let _ = tx.send(SessionEvent::BackendStatus(result));
        });
    }

    pub fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::DispatchReady { outgoing } => self.dispatch(outgoing),
            SessionEvent::Response { bubble, result } => self.on_response(bubble, result),
            SessionEvent::TypeTick { bubble } => self.on_type_tick(bubble),
            SessionEvent::ScrollToBottom => {
                self.scroll_scheduled = false;
                self.scroll_requested = true;
            }
            SessionEvent::ToastHide(id) => {
                self.toasts.hide(id);
            }
            SessionEvent::ToastRemove(id) => {
                self.toasts.remove(id);
            }
            SessionEvent::BackendStatus(Ok(banner)) => {
                info!(banner = banner.trim(), "backend is up");
                self.toast(ToastKind::Info, banner.trim().to_string());
            }
            SessionEvent::BackendStatus(Err(e)) => {
                warn!(error = %e, "backend status check failed");
                self.toast(ToastKind::Warning, e.to_string());
            }
        }
    }

    fn dispatch(&mut self, outgoing: MessageId) {
        let Some(cycle) = self
            .cycle
            .as_mut()
            .filter(|c| c.outgoing == outgoing && c.incoming.is_none())
        else {
            debug!(bubble = outgoing.get(), "stale dispatch ignored");
            return;
        };

        let bubble =
            self.transcript
                .push(Direction::Incoming, Body::Text(String::new()), Status::Loading);
        cycle.incoming = Some(bubble);
        info!(bubble = bubble.get(), "sending prompt");

        let backend = Arc::clone(&self.backend);
        let prompt = cycle.prompt.clone();
        let token = cycle.token.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = backend.ask(&prompt) => {
                    let _ = tx.send(SessionEvent::Response { bubble, result });
                }
            }
        });

        self.schedule_scroll();
    }

    fn on_response(&mut self, bubble: MessageId, result: Result<String, ChatError>) {
        let Some(cycle) = self
            .cycle
            .as_mut()
            .filter(|c| c.incoming == Some(bubble) && c.typing.is_none())
        else {
            debug!(bubble = bubble.get(), "response for an inactive bubble ignored");
            return;
        };
        let Some(message) = self.transcript.get_mut(bubble) else {
            return;
        };

        match result {
            Ok(text) => {
                info!(bubble = bubble.get(), chars = text.chars().count(), "response received");
                message.status = Status::Normal;
                message.body = Body::Text(String::new());

                let rendered = markdown::render(&text);
                let writer = Typewriter::new(bubble, text, rendered);
                if !writer.is_done() {
                    typing::spawn_ticker(
                        bubble,
                        writer.len(),
                        self.timings.typing_interval,
                        cycle.token.clone(),
                        self.tx.clone(),
                    );
                }
                cycle.typing = Some(writer);
                if cycle.typing.as_ref().is_some_and(Typewriter::is_done) {
                    self.finish_typing();
                }
            }
            Err(e) => {
                warn!(bubble = bubble.get(), error = %e, "request failed");
                message.status = Status::Error;
                message.body = Body::Text(e.to_string());
                self.cycle = None;
            }
        }

        self.schedule_scroll();
    }

    fn on_type_tick(&mut self, bubble: MessageId) {
        let Some(writer) = self
            .cycle
            .as_mut()
            .and_then(|c| c.typing.as_mut())
            .filter(|w| w.bubble == bubble)
        else {
            return;
        };

        if let Some(c) = writer.advance() {
            if let Some(Body::Text(text)) = self.transcript.get_mut(bubble).map(|m| &mut m.body) {
                text.push(c);
            }
        }
        if writer.is_done() {
            self.finish_typing();
        }
        self.schedule_scroll();
    }

    /// Swap the typed-out text for the pre-rendered markdown and end the cycle
    fn finish_typing(&mut self) {
        let Some(writer) = self.cycle.take().and_then(|c| c.typing) else {
            return;
        };
        let bubble = writer.bubble;
        let (source, lines) = writer.finish();
        if let Some(message) = self.transcript.get_mut(bubble) {
            message.body = Body::Formatted { source, lines };
        }
        info!(bubble = bubble.get(), "response rendered");
    }

    fn schedule_scroll(&mut self) {
        if self.scroll_scheduled {
            return;
        }
        self.scroll_scheduled = true;
        let tx = self.tx.clone();
        let settle = self.timings.scroll_settle;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let _ = tx.send(SessionEvent::ScrollToBottom);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio::sync::Notify;
    use tokio::time::Instant;

    use crate::toast::ToastPhase;

    struct MockBackend {
        reply: Result<String, u16>,
        gate: Option<Arc<Notify>>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockBackend {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                gate: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                gate: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn gated(text: &str, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                gate: Some(gate),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn ask(&self, prompt: &str) -> Result<String, ChatError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.reply.clone().map_err(ChatError::Status)
        }

        async fn status(&self) -> Result<String, ChatError> {
            Ok("✅ Company RAG Assistant is live!\n".to_string())
        }
    }

    fn session(backend: Arc<MockBackend>) -> (ChatSession, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChatSession::new(backend, Timings::default(), tx), rx)
    }

    /// Apply events until `done` holds for the session
    async fn run_until(
        session: &mut ChatSession,
        rx: &mut UnboundedReceiver<SessionEvent>,
        done: impl Fn(&ChatSession) -> bool,
    ) {
        while !done(session) {
            let event = rx.recv().await.expect("session channel closed");
            session.apply(event);
        }
    }

    /// Apply everything that arrives within `window` of virtual time
    async fn run_for(
        session: &mut ChatSession,
        rx: &mut UnboundedReceiver<SessionEvent>,
        window: Duration,
    ) {
        let deadline = Instant::now() + window;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, rx.recv()).await {
            session.apply(event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hello_scenario() {
        let backend = MockBackend::answering("Hi there");
        let (mut session, mut rx) = session(backend.clone());

        assert!(matches!(session.submit("  Hello "), Submission::Accepted(_)));
        assert!(session.is_generating());
        let first = &session.transcript().messages()[0];
        assert_eq!(first.direction, Direction::Outgoing);
        assert_eq!(first.text(), "Hello");

        run_until(&mut session, &mut rx, |s| !s.is_generating()).await;

        assert_eq!(backend.prompts(), vec!["Hello".to_string()]);
        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 2);
        let reply = &messages[1];
        assert_eq!(reply.direction, Direction::Incoming);
        assert_eq!(reply.status, Status::Normal);
        assert_eq!(
            reply.body,
            Body::Formatted {
                source: "Hi there".to_string(),
                lines: markdown::render("Hi there"),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_prompt_shows_one_warning() {
        let (mut session, _rx) = session(MockBackend::answering("unused"));

        assert_eq!(session.submit(""), Submission::Empty);
        assert_eq!(session.submit(" \t\n "), Submission::Empty);

        assert!(session.transcript().is_empty());
        assert!(!session.is_generating());
        let toasts: Vec<_> = session.toasts().iter().collect();
        assert_eq!(toasts.len(), 2);
        assert!(toasts
            .iter()
            .all(|t| t.kind == ToastKind::Warning && t.message == EMPTY_PROMPT));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_bubble_follows_outgoing_after_delay() {
        let gate = Arc::new(Notify::new());
        let (mut session, mut rx) = session(MockBackend::gated("done", gate.clone()));
        let start = Instant::now();

        session.submit("question");
        assert_eq!(session.transcript().len(), 1);

        run_until(&mut session, &mut rx, |s| s.transcript().len() == 2).await;
        assert!(start.elapsed() >= Duration::from_millis(400));

        let messages = session.transcript().messages();
        assert_eq!(messages[0].direction, Direction::Outgoing);
        assert_eq!(messages[1].direction, Direction::Incoming);
        assert_eq!(messages[1].status, Status::Loading);

        gate.notify_one();
        run_until(&mut session, &mut rx, |s| !s.is_generating()).await;
        assert_eq!(session.transcript().messages()[1].status, Status::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_while_generating() {
        let gate = Arc::new(Notify::new());
        let backend = MockBackend::gated("first answer", gate.clone());
        let (mut session, mut rx) = session(backend.clone());

        session.submit("first");
        assert_eq!(session.submit("second"), Submission::Busy);
        run_until(&mut session, &mut rx, |s| s.transcript().len() == 2).await;
        assert_eq!(session.submit("third"), Submission::Busy);

        gate.notify_one();
        run_until(&mut session, &mut rx, |s| {
            s.transcript().messages()[1].text().len() > 3
        })
        .await;
        // still typing
        assert_eq!(session.submit("fourth"), Submission::Busy);

        run_until(&mut session, &mut rx, |s| !s.is_generating()).await;
        let outgoing = session
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.direction == Direction::Outgoing)
            .count();
        assert_eq!(outgoing, 1);
        assert_eq!(backend.prompts().len(), 1);
        assert!(session
            .toasts()
            .iter()
            .any(|t| t.kind == ToastKind::Info && t.message == STILL_ANSWERING));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_marks_bubble() {
        let (mut session, mut rx) = session(MockBackend::failing(500));

        session.submit("Hello");
        run_until(&mut session, &mut rx, |s| !s.is_generating()).await;

        let reply = &session.transcript().messages()[1];
        assert_eq!(reply.status, Status::Error);
        assert_eq!(reply.text(), "⚠️ Server returned 500");
        assert!(!reply.is_formatted());

        // the session is usable again
        assert!(matches!(session.submit("retry"), Submission::Accepted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_reveals_prefixes_in_order() {
        let answer = "**Sure** — här är 👋";
        let (mut session, mut rx) = session(MockBackend::answering(answer));
        session.submit("go");

        let mut seen: Vec<String> = Vec::new();
        while session.is_generating() {
            let event = rx.recv().await.unwrap();
            let is_tick = matches!(event, SessionEvent::TypeTick { .. });
            session.apply(event);
            if is_tick {
                if let Some(reply) = session.transcript().messages().get(1) {
                    seen.push(reply.text().to_string());
                }
            }
        }

        let expected: Vec<String> = answer
            .char_indices()
            .map(|(i, c)| answer[..i + c.len_utf8()].to_string())
            .collect();
        // the last tick swaps in the formatted body whose source is the full text
        assert_eq!(seen, expected);

        let reply = &session.transcript().messages()[1];
        assert_eq!(
            reply.body,
            Body::Formatted {
                source: answer.to_string(),
                lines: markdown::render(answer),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_response_finishes_without_typing() {
        let (mut session, mut rx) = session(MockBackend::answering(""));
        session.submit("anything");
        run_until(&mut session, &mut rx, |s| !s.is_generating()).await;

        let reply = &session.transcript().messages()[1];
        assert!(reply.is_formatted());
        assert_eq!(reply.text(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_animation_cancels_cycle() {
        let (mut session, mut rx) = session(MockBackend::answering(&"x".repeat(500)));
        session.submit("long one");
        run_until(&mut session, &mut rx, |s| {
            s.transcript()
                .messages()
                .get(1)
                .is_some_and(|m| m.text().len() > 10)
        })
        .await;

        session.clear();
        assert!(session.transcript().is_empty());
        assert!(!session.is_generating());

        run_for(&mut session, &mut rx, Duration::from_secs(10)).await;
        assert!(session.transcript().is_empty());

        assert!(matches!(session.submit("next"), Submission::Accepted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_before_dispatch_drops_request() {
        let backend = MockBackend::answering("never");
        let (mut session, mut rx) = session(backend.clone());
        session.submit("quick");
        session.clear();

        run_for(&mut session, &mut rx, Duration::from_secs(2)).await;
        assert!(session.transcript().is_empty());
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_lifecycle() {
        let (mut session, mut rx) = session(MockBackend::answering("unused"));
        let start = Instant::now();
        session.submit("");

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::ToastHide(_)));
        assert!(start.elapsed() >= Duration::from_millis(3000));
        session.apply(event);
        assert_eq!(
            session.toasts().iter().next().map(|t| t.phase),
            Some(ToastPhase::Hiding)
        );

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::ToastRemove(_)));
        assert!(start.elapsed() >= Duration::from_millis(3400));
        session.apply(event);
        assert!(session.toasts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scroll_requests_are_coalesced() {
        let (mut session, mut rx) = session(MockBackend::answering("ok"));
        session.submit("a");
        assert!(!session.take_scroll_request());

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::ScrollToBottom));
        session.apply(event);
        assert!(session.take_scroll_request());
        assert!(!session.take_scroll_request());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_status_toast() {
        let (mut session, mut rx) = session(MockBackend::answering("unused"));
        session.check_backend();

        let event = rx.recv().await.unwrap();
        session.apply(event);
        let toast = session.toasts().iter().next().unwrap();
        assert_eq!(toast.kind, ToastKind::Info);
        assert_eq!(toast.message, "✅ Company RAG Assistant is live!");
    }
}
