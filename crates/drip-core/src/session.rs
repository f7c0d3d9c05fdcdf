//! One streaming query, from worker spawn to resource release.
//!
//! The session is a single cooperative loop. Each turn waits on three
//! things at once, in priority order: the interrupt flag, the armed flush
//! deadline, and readable worker output (bounded by the poll interval).
//! The display is only ever touched from that loop, so flushes and
//! finalization never overlap.
//!
//! ```text
//! Starting ─▶ Streaming ─┬─▶ Completing ──────┬─▶ Closed
//!    │                   ├─▶ ErrorFinalizing ─┤
//!    │                   └─▶ Interrupting ────┘
//!    └──(spawn failure)──▶ ErrorFinalizing
//! ```

use std::sync::Arc;
use std::time::Duration;

use drip_backend::{extract_error_message, FrameDecoder};
use drip_protocol::ParsedEvent;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::buffer::StreamBuffer;
use crate::compose::{compose_answer, error_notice, strip_heartbeats, with_header, EMPTY_RESULT};
use crate::config::StreamConfig;
use crate::display::{CompletionStyle, Display};
use crate::scheduler::FlushScheduler;
use crate::subprocess::{ByteSource, Readable, Spawner, Worker, Workload};

/// Largest single read from the worker.
const READ_LIMIT: usize = 64 * 1024;

/// A viewer at or past this scroll ratio is following the output.
const FOLLOW_THRESHOLD: f32 = 0.98;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    /// Render interim text while streaming. Off means one final render.
    pub stream_enabled: bool,
    pub render_interval: Duration,
    pub auto_scroll: bool,
    pub poll_interval: Duration,
    pub reaper_interval: Duration,
    /// Stable preamble shown above the answer.
    pub header: String,
}

impl SessionSettings {
    pub fn from_config(config: &StreamConfig, header: impl Into<String>) -> Self {
        Self {
            stream_enabled: config.enabled,
            render_interval: config.render_interval(),
            auto_scroll: config.auto_scroll,
            poll_interval: config.poll_interval(),
            reaper_interval: config.reaper_interval(),
            header: header.into(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default(), String::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Streaming,
    Completing,
    Interrupting,
    ErrorFinalizing,
    Closed,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The answer text is every content delta, in arrival order.
    Completed {
        answer: String,
        reasoning: Option<String>,
    },
    /// Spawn failure, a provider error object, or a non-200 response.
    Failed { message: String },
    /// The user interrupted. Nothing further was shown.
    Cancelled,
    /// The stream ended without any text.
    Empty,
}

impl SessionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionOutcome::Completed { .. } => 0,
            SessionOutcome::Failed { .. } | SessionOutcome::Empty => 1,
            SessionOutcome::Cancelled => 130,
        }
    }
}

/// Sets a session's interrupt flag. Clones share the flag.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Why the streaming loop stopped.
enum Exit {
    /// Stream end, worker EOF, or worker exit with nothing left to read.
    Finished,
    Interrupted,
}

/// Result of routing one event.
#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

pub struct StreamSession {
    settings: SessionSettings,
    state: SessionState,
    decoder: FrameDecoder,
    buffer: StreamBuffer,
    reasoning: Vec<String>,
    scheduler: FlushScheduler,
    interrupt: watch::Receiver<bool>,
    interrupted: bool,
    /// A non-200 marker was seen; these are the raw body lines.
    protocol_error: Option<Vec<String>>,
    error_payloads: Vec<String>,
    reaper: Option<JoinHandle<()>>,
}

impl StreamSession {
    pub fn new(settings: SessionSettings) -> (Self, InterruptHandle) {
        let (tx, rx) = watch::channel(false);
        let session = Self {
            scheduler: FlushScheduler::new(settings.render_interval),
            settings,
            state: SessionState::Starting,
            decoder: FrameDecoder::new(),
            buffer: StreamBuffer::new(),
            reasoning: Vec::new(),
            interrupt: rx,
            interrupted: false,
            protocol_error: None,
            error_payloads: Vec::new(),
            reaper: None,
        };
        (session, InterruptHandle { tx: Arc::new(tx) })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The background reaper, if the worker outlived the session.
    pub fn take_reaper(&mut self) -> Option<JoinHandle<()>> {
        self.reaper.take()
    }

    /// Run the query to completion.
    pub async fn run<D>(
        &mut self,
        spawner: &dyn Spawner,
        workload: &Workload,
        display: &mut D,
    ) -> SessionOutcome
    where
        D: Display + ?Sized,
    {
        display.show_placeholder(&self.settings.header);

        let (mut worker, mut source) = match spawner.spawn(workload) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!(error = %e, "worker spawn failed");
                self.transition(SessionState::ErrorFinalizing);
                let outcome = self.finalize_error(
                    display,
                    "",
                    format!("Could not start the worker: {e}"),
                );
                self.transition(SessionState::Closed);
                return outcome;
            }
        };
        info!(pid = ?worker.id(), "streaming");
        self.transition(SessionState::Streaming);

        let exit = self.stream(worker.as_mut(), &mut source, display).await;

        let outcome = match exit {
            Exit::Interrupted => {
                self.transition(SessionState::Interrupting);
                self.abandon(worker.as_mut());
                SessionOutcome::Cancelled
            }
            Exit::Finished => self.finalize(display),
        };

        self.transition(SessionState::Closed);
        self.reaper = spawn_reaper(worker, source, self.settings.reaper_interval);
        outcome
    }

    async fn stream<D>(
        &mut self,
        worker: &mut dyn Worker,
        source: &mut ByteSource,
        display: &mut D,
    ) -> Exit
    where
        D: Display + ?Sized,
    {
        let poll_interval = self.settings.poll_interval;
        loop {
            let deadline = self.scheduler.deadline();
            tokio::select! {
                biased;

                _ = interrupt_requested(&mut self.interrupt) => {
                    self.interrupted = true;
                    return Exit::Interrupted;
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_flush(display);
                }

                waited = timeout(poll_interval, source.wait_readable()) => {
                    if self.drain_source(source) == Flow::Done {
                        return Exit::Finished;
                    }
                    // A worker that has exited and stayed silent for a whole
                    // poll interval has nothing more to say.
                    if waited.is_err() && worker.is_finished() {
                        debug!("worker exited without closing its output");
                        return Exit::Finished;
                    }
                }
            }
        }
    }

    /// Read and route everything the worker has written so far.
    fn drain_source(&mut self, source: &mut ByteSource) -> Flow {
        loop {
            match source.poll_readable() {
                Readable::Available(n) => {
                    let bytes = source.read_available(n.min(READ_LIMIT));
                    for event in self.decoder.push(&bytes) {
                        if self.route(event) == Flow::Done {
                            return Flow::Done;
                        }
                    }
                }
                Readable::Empty => return Flow::Continue,
                Readable::Closed => {
                    if let Some(event) = self.decoder.finish() {
                        self.route(event);
                    }
                    return Flow::Done;
                }
                Readable::Failed(e) => {
                    warn!(error = %e, "worker read failed");
                }
            }
        }
    }

    fn route(&mut self, event: ParsedEvent) -> Flow {
        match event {
            ParsedEvent::ContentDelta(text) => self.append(text),
            ParsedEvent::ReasoningDelta(text) => self.reasoning.push(text),
            ParsedEvent::ErrorPayload(message) => {
                warn!(%message, "provider error");
                self.error_payloads.push(message);
            }
            ParsedEvent::ProtocolError(line) => {
                self.protocol_error.get_or_insert_with(Vec::new).push(line);
            }
            ParsedEvent::StreamDone => return Flow::Done,
            ParsedEvent::Unrecognized(line) => {
                debug!(%line, "passing through unrecognized line");
                self.append(format!("{line}\n"));
            }
        }
        Flow::Continue
    }

    fn append(&mut self, text: String) {
        let first_pending = self.buffer.append(text);
        if first_pending && self.settings.stream_enabled && !self.interrupted {
            self.scheduler.arm(Instant::now());
        }
    }

    fn fire_flush<D>(&mut self, display: &mut D)
    where
        D: Display + ?Sized,
    {
        let now = Instant::now();
        self.scheduler.fire(now);
        if !display.is_active() {
            debug!("display gone, flush skipped");
            return;
        }

        let had_pending = self.buffer.has_pending();
        let committed = self.buffer.flush();
        if had_pending {
            let text = with_header(&self.settings.header, committed);
            render(display, self.settings.auto_scroll, &text);
        }
        if self.buffer.has_pending() {
            self.scheduler.arm(now);
        }
    }

    /// Interrupt: drop everything unflushed and kill the worker. The display
    /// is left exactly as it was.
    fn abandon(&mut self, worker: &mut dyn Worker) {
        self.scheduler.revoke();
        worker.terminate();
        self.buffer.clear();
        self.reasoning.clear();
        info!("interrupted");
    }

    fn finalize<D>(&mut self, display: &mut D) -> SessionOutcome
    where
        D: Display + ?Sized,
    {
        self.scheduler.revoke();
        let answer = self.buffer.flush().to_string();

        if let Some(body) = self.protocol_error.take() {
            self.transition(SessionState::ErrorFinalizing);
            let message = extract_error_message(&body.join("\n"));
            return self.finalize_error(display, &answer, message);
        }
        if !self.error_payloads.is_empty() {
            self.transition(SessionState::ErrorFinalizing);
            let message = self.error_payloads.join("\n");
            return self.finalize_error(display, &answer, message);
        }

        self.transition(SessionState::Completing);
        let reasoning = self.reasoning.concat();
        let text = compose_answer(&reasoning, &answer);

        let (text, style, outcome) = if text.trim().is_empty() {
            (
                EMPTY_RESULT.to_string(),
                CompletionStyle::Notice,
                SessionOutcome::Empty,
            )
        } else {
            let reasoning = strip_heartbeats(&reasoning).trim();
            let outcome = SessionOutcome::Completed {
                answer,
                reasoning: (!reasoning.is_empty()).then(|| reasoning.to_string()),
            };
            (text, CompletionStyle::Normal, outcome)
        };

        self.present(display, &text, style);
        self.reasoning.clear();
        outcome
    }

    fn finalize_error<D>(
        &mut self,
        display: &mut D,
        committed: &str,
        message: String,
    ) -> SessionOutcome
    where
        D: Display + ?Sized,
    {
        self.scheduler.revoke();
        let text = error_notice(committed, &message);
        self.present(display, &text, CompletionStyle::Error);
        self.buffer.clear();
        SessionOutcome::Failed { message }
    }

    fn present<D>(&self, display: &mut D, body: &str, style: CompletionStyle)
    where
        D: Display + ?Sized,
    {
        if !display.is_active() {
            debug!("display gone, final render skipped");
            return;
        }
        render(display, self.settings.auto_scroll, &with_header(&self.settings.header, body));
        display.signal_stream_complete(style);
    }

    fn transition(&mut self, to: SessionState) {
        debug!(from = ?self.state, ?to, "session");
        self.state = to;
    }
}

/// Push `text` and keep a viewer that was following the output at the bottom.
fn render<D>(display: &mut D, auto_scroll: bool, text: &str)
where
    D: Display + ?Sized,
{
    let ratio = display.scroll_ratio();
    display.update_streaming_content(text);
    if auto_scroll && ratio >= FOLLOW_THRESHOLD {
        display.set_scroll_ratio(1.0);
    } else {
        display.set_scroll_ratio(ratio);
    }
}

async fn interrupt_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|interrupted| *interrupted).await.is_err() {
        // Every handle is gone; nobody can interrupt any more.
        std::future::pending::<()>().await;
    }
}

/// Keep draining a worker that outlived its session until it exits, so a
/// full pipe cannot block it. Returns `None` if it has already exited.
pub fn spawn_reaper(
    mut worker: Box<dyn Worker>,
    mut source: ByteSource,
    every: Duration,
) -> Option<JoinHandle<()>> {
    if worker.is_finished() {
        return None;
    }
    debug!(pid = ?worker.id(), "worker outlived session, reaping");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let dropped = source.drain();
            if dropped > 0 {
                debug!(dropped, "discarded late worker output");
            }
            if worker.is_finished() {
                debug!("worker reaped");
                return;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::testing::{DisplayCall, RecordingDisplay};
    use crate::subprocess::mock::MockSpawner;
    use drip_backend::mock::fixtures;
    use drip_backend::{MockConfig, MockResponse};

    const HEADER: &str = "openai · gpt-4o-mini";

    fn settings() -> SessionSettings {
        SessionSettings {
            header: HEADER.to_string(),
            ..SessionSettings::default()
        }
    }

    fn shown(body: &str) -> String {
        with_header(HEADER, body)
    }

    fn content(text: &str) -> MockResponse {
        MockResponse::Content {
            content: text.to_string(),
        }
    }

    async fn run_with(
        spawner: &MockSpawner,
        settings: SessionSettings,
        display: &mut RecordingDisplay,
    ) -> SessionOutcome {
        let (mut session, _handle) = StreamSession::new(settings);
        let outcome = session.run(spawner, &Workload::new("mock"), display).await;
        assert_eq!(session.state(), SessionState::Closed);
        outcome
    }

    #[tokio::test(start_paused = true)]
    async fn hello_is_assembled() {
        let spawner = MockSpawner::chunks(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
        ]);
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                answer: "Hello".to_string(),
                reasoning: None,
            }
        );
        assert_eq!(display.placeholder(), Some(HEADER));
        assert_eq!(display.text(), Some(shown("Hello").as_str()));
        assert_eq!(display.completion(), Some(CompletionStyle::Normal));
    }

    #[tokio::test(start_paused = true)]
    async fn non_success_response_is_an_error() {
        let spawner =
            MockSpawner::chunks(vec!["@@non-200@@HTTP/1.1 500\nInternal error body\n"]);
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        let SessionOutcome::Failed { message } = &outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.contains("Internal error body"));
        assert!(display.text().unwrap().contains("```error\n"));
        assert_eq!(display.completion(), Some(CompletionStyle::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn json_body_after_marker_gives_clean_message() {
        let spawner = MockSpawner::new(fixtures::http_failure(
            429,
            r#"{"error":{"message":"Rate limit exceeded","type":"requests"}}"#,
        ));
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        assert_eq!(
            outcome,
            SessionOutcome::Failed {
                message: "Rate limit exceeded".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn burst_renders_once_per_interval() {
        let mut responses: Vec<MockResponse> = (0..1000).map(|_| content("x")).collect();
        responses.push(MockResponse::Delay { ms: 2000 });
        let spawner = MockSpawner::new(MockConfig::new().with_responses(responses));
        let mut display = RecordingDisplay::new();

        let start = Instant::now();
        let outcome = run_with(&spawner, settings(), &mut display).await;

        // One interim render for the burst, one final.
        assert_eq!(display.update_count(), 2);
        assert_eq!(display.updates()[0], shown(&"x".repeat(1000)));
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                answer: "x".repeat(1000),
                reasoning: None,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_stream_renders_each_interval() {
        let responses = vec![
            content("a"),
            MockResponse::Delay { ms: 1000 },
            content("b"),
            MockResponse::Delay { ms: 1000 },
            content("c"),
        ];
        let spawner = MockSpawner::new(MockConfig::new().with_responses(responses));
        let mut display = RecordingDisplay::new();

        run_with(&spawner, settings(), &mut display).await;

        assert_eq!(
            display.updates(),
            vec![shown("a"), shown("ab"), shown("abc")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_discards_unflushed_text() {
        let responses = vec![
            content("Hello"),
            MockResponse::Delay { ms: 1000 },
            content(" a"),
            content(" b"),
            content(" c"),
            MockResponse::Delay { ms: 60_000 },
        ];
        let spawner = MockSpawner::new(MockConfig::new().with_responses(responses).without_done());
        let mut display = RecordingDisplay::new();
        let (mut session, handle) = StreamSession::new(settings());

        let interrupter = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            interrupter.interrupt();
        });

        let outcome = session
            .run(&spawner, &Workload::new("mock"), &mut display)
            .await;

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(handle.is_interrupted());
        assert_eq!(display.updates(), vec![shown("Hello")]);
        assert_eq!(display.completion(), None);
        assert!(spawner.probe().was_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_before_any_bytes() {
        let spawner = MockSpawner::silent();
        let mut display = RecordingDisplay::new();
        let (mut session, handle) = StreamSession::new(settings());
        handle.interrupt();

        let outcome = session
            .run(&spawner, &Workload::new("mock"), &mut display)
            .await;

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(outcome.exit_code(), 130);
        assert_eq!(display.update_count(), 0);
        assert_eq!(spawner.probe().terminations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_failure_never_streams() {
        let spawner = MockSpawner::failing("No such file or directory");
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        let SessionOutcome::Failed { message } = &outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.starts_with("Could not start the worker: failed to start mock"));
        assert_eq!(display.update_count(), 1);
        assert_eq!(display.completion(), Some(CompletionStyle::Error));
        assert!(!spawner.probe().was_spawned());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_stream_is_distinct() {
        let spawner = MockSpawner::new(MockConfig::new().with_responses(vec![
            MockResponse::Heartbeat,
            MockResponse::Finish,
        ]));
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        assert_eq!(outcome, SessionOutcome::Empty);
        assert_eq!(display.text(), Some(shown(EMPTY_RESULT).as_str()));
        assert_eq!(display.completion(), Some(CompletionStyle::Notice));
    }

    #[tokio::test(start_paused = true)]
    async fn reasoning_is_shown_at_the_end_only() {
        let responses = vec![
            MockResponse::Heartbeat,
            MockResponse::Reasoning {
                content: "weighing it".to_string(),
            },
            MockResponse::Delay { ms: 1000 },
            content("42"),
        ];
        let spawner = MockSpawner::new(MockConfig::new().with_responses(responses));
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                answer: "42".to_string(),
                reasoning: Some("weighing it".to_string()),
            }
        );
        // Reasoning alone never armed a flush.
        assert_eq!(display.update_count(), 1);
        assert_eq!(
            display.text(),
            Some(shown("> **Thinking**\n>\n> weighing it\n\n42").as_str())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reasoning_without_answer_still_completes() {
        let spawner = MockSpawner::new(MockConfig::new().with_responses(vec![
            MockResponse::Reasoning {
                content: "nothing to add".to_string(),
            },
            MockResponse::Finish,
        ]));
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        let SessionOutcome::Completed { answer, reasoning } = &outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert!(answer.trim().is_empty());
        assert_eq!(reasoning.as_deref(), Some("nothing to add"));
        assert!(display.text().unwrap().contains("> nothing to add"));
        assert_eq!(display.completion(), Some(CompletionStyle::Normal));
    }

    #[tokio::test(start_paused = true)]
    async fn error_payload_keeps_partial_text() {
        let spawner = MockSpawner::new(fixtures::error_mid_stream("partial", "Rate limited"));
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        assert_eq!(
            outcome,
            SessionOutcome::Failed {
                message: "Rate limited".to_string()
            }
        );
        assert_eq!(
            display.text(),
            Some(shown("partial\n\n```error\nRate limited\n```").as_str())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_lines_pass_through() {
        let spawner = MockSpawner::chunks(vec!["plain text from a proxy\ndata: [DONE]\n"]);
        let mut display = RecordingDisplay::new();

        let outcome = run_with(&spawner, settings(), &mut display).await;

        assert_eq!(
            outcome,
            SessionOutcome::Completed {
                answer: "plain text from a proxy\n".to_string(),
                reasoning: None,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn final_text_is_concatenation_for_any_interval() {
        let pieces: Vec<String> = (0..40).map(|i| format!("{i},")).collect();
        let expected: String = pieces.concat();

        for interval_ms in [300, 750, 2000] {
            let mut responses = Vec::new();
            for (i, piece) in pieces.iter().enumerate() {
                responses.push(content(piece));
                if i % 7 == 0 {
                    responses.push(MockResponse::Delay { ms: 450 });
                }
            }
            let spawner = MockSpawner::new(MockConfig::new().with_responses(responses));
            let mut display = RecordingDisplay::new();
            let settings = SessionSettings {
                render_interval: Duration::from_millis(interval_ms),
                ..settings()
            };

            let outcome = run_with(&spawner, settings, &mut display).await;

            assert_eq!(
                outcome,
                SessionOutcome::Completed {
                    answer: expected.clone(),
                    reasoning: None,
                }
            );
            // Every interim render is a prefix of the final text.
            let last = shown(&expected);
            for update in display.updates() {
                assert!(last.starts_with(update));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_streaming_renders_once() {
        let responses = vec![
            content("a"),
            MockResponse::Delay { ms: 1000 },
            content("b"),
            MockResponse::Delay { ms: 1000 },
            content("c"),
        ];
        let spawner = MockSpawner::new(MockConfig::new().with_responses(responses));
        let mut display = RecordingDisplay::new();
        let settings = SessionSettings {
            stream_enabled: false,
            ..settings()
        };

        run_with(&spawner, settings, &mut display).await;

        assert_eq!(display.updates(), vec![shown("abc")]);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_display_stops_rendering() {
        let responses = vec![
            content("a"),
            MockResponse::Delay { ms: 1000 },
            content("b"),
            MockResponse::Delay { ms: 1000 },
            content("c"),
        ];
        let spawner = MockSpawner::new(MockConfig::new().with_responses(responses));
        let mut display = RecordingDisplay::new().close_after(1);

        let outcome = run_with(&spawner, settings(), &mut display).await;

        assert_eq!(display.updates(), vec![shown("a")]);
        assert_eq!(display.completions(), 0);
        assert!(matches!(outcome, SessionOutcome::Completed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn auto_scroll_follows_only_at_bottom() {
        let spawner = MockSpawner::new(fixtures::streaming_text(&["hi"]));
        let mut following = RecordingDisplay::new().scrolled_to(0.99);
        run_with(&spawner, settings(), &mut following).await;
        assert!(following.calls.contains(&DisplayCall::SetScroll(1.0)));

        let spawner = MockSpawner::new(fixtures::streaming_text(&["hi"]));
        let mut reading = RecordingDisplay::new().scrolled_to(0.4);
        run_with(&spawner, settings(), &mut reading).await;
        assert!(reading.calls.contains(&DisplayCall::SetScroll(0.4)));
        assert!(!reading.calls.contains(&DisplayCall::SetScroll(1.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_outliving_session_is_reaped() {
        let responses = vec![
            MockResponse::Raw {
                line: "data: [DONE]".to_string(),
            },
            MockResponse::Delay { ms: 7000 },
            MockResponse::Raw {
                line: "late output".to_string(),
            },
        ];
        let spawner = MockSpawner::new(MockConfig::new().with_responses(responses).without_done());
        let mut display = RecordingDisplay::new();
        let (mut session, _handle) = StreamSession::new(settings());

        let outcome = session
            .run(&spawner, &Workload::new("mock"), &mut display)
            .await;
        assert_eq!(outcome, SessionOutcome::Empty);

        let reaper = session.take_reaper().expect("worker still running");
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(reaper.is_finished());
        assert!(spawner.probe().finished());
        assert!(!spawner.probe().was_terminated());
    }

    #[tokio::test(start_paused = true)]
    async fn exited_worker_needs_no_reaper() {
        let spawner = MockSpawner::new(fixtures::streaming_text(&["done"]));
        let mut display = RecordingDisplay::new();
        let (mut session, _handle) = StreamSession::new(settings());

        session
            .run(&spawner, &Workload::new("mock"), &mut display)
            .await;
        // The script had already finished when the stream end was routed.
        assert!(session.take_reaper().is_none());
    }

    #[test]
    fn settings_from_config_clamps() {
        let config = StreamConfig {
            render_interval_ms: 50,
            enabled: false,
            ..StreamConfig::default()
        };
        let settings = SessionSettings::from_config(&config, "h");
        assert_eq!(settings.render_interval, Duration::from_millis(300));
        assert!(!settings.stream_enabled);
        assert_eq!(settings.header, "h");
    }

    #[test]
    fn exit_codes() {
        assert_eq!(
            SessionOutcome::Completed {
                answer: String::new(),
                reasoning: None
            }
            .exit_code(),
            0
        );
        assert_eq!(SessionOutcome::Empty.exit_code(), 1);
        assert_eq!(
            SessionOutcome::Failed {
                message: String::new()
            }
            .exit_code(),
            1
        );
        assert_eq!(SessionOutcome::Cancelled.exit_code(), 130);
    }
}
