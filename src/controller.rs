//! Session lifecycle: start, render loop, teardown.
//!
//! ```text
//! Idle → Initializing → Running → Stopping → Terminated
//!              └──────── (failure) ──┘
//! ```
//!
//! Startup order is engine and queue, then audio stream, then terminal, so
//! audio and transform failures surface before the screen is touched. Both
//! the stream and the terminal are held by scoped guards; on every exit path
//! the stream is stopped before the terminal is released.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ringbuf::traits::Consumer;

use crate::event::{event_channel, EventConsumer};
use crate::pipeline::{frame_queue, BarRenderer, BridgeCounters, CaptureBridge, FrameConsumer, SpectrumEngine};
use crate::source::AudioFrameSource;
use crate::terminal::{InputEvent, TerminalBackend};
use crate::{CancellationToken, PipelineConfig, SessionStats, StreamEvent, VisError};

/// Lifecycle state of a [`Controller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Constructed, nothing acquired.
    Idle,
    /// Building buffers, starting the stream, acquiring the terminal.
    Initializing,
    /// Consuming frames and drawing.
    Running,
    /// Stream being stopped, terminal being released.
    Stopping,
    /// Everything released.
    Terminated,
}

/// Drives one visualizer session from startup to teardown.
///
/// # Example
///
/// ```no_run
/// use cli_vis::source::{MockSource, Signal};
/// use cli_vis::terminal::CrosstermTerminal;
/// use cli_vis::{Controller, PipelineConfig};
///
/// let config = PipelineConfig::default();
/// let source = MockSource::new(Signal::Sine { frequency: 440.0, amplitude: 0.5 }, 44100, 2);
/// let terminal = CrosstermTerminal::new(config.quit_key);
///
/// let mut controller = Controller::new(config, source, terminal);
/// let stats = controller.run()?;
/// println!("{} frames rendered", stats.frames_rendered);
/// # Ok::<(), cli_vis::VisError>(())
/// ```
pub struct Controller<S, T> {
    config: PipelineConfig,
    source: S,
    terminal: T,
    cancel: CancellationToken,
    lifecycle: Lifecycle,
    stats: SessionStats,
}

impl<S: AudioFrameSource, T: TerminalBackend> Controller<S, T> {
    /// Creates an idle controller. Nothing is started until [`run()`](Self::run).
    pub fn new(config: PipelineConfig, source: S, terminal: T) -> Self {
        Self {
            config,
            source,
            terminal,
            cancel: CancellationToken::new(),
            lifecycle: Lifecycle::new(),
            stats: SessionStats::default(),
        }
    }

    /// Token that ends the session when cancelled, e.g. from a signal handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.lifecycle.state
    }

    /// Every state entered so far, starting with [`ControllerState::Idle`].
    pub fn history(&self) -> &[ControllerState] {
        &self.lifecycle.history
    }

    /// Statistics from the last run, including a failed one.
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// The audio source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The terminal backend.
    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    /// Runs the session until the user quits, the token is cancelled or the stream fails.
    ///
    /// A controller runs once; later calls fail with [`VisError::InvalidConfig`].
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended or prevented the session. All
    /// acquired resources are released before this returns.
    pub fn run(&mut self) -> Result<SessionStats, VisError> {
        if self.lifecycle.state != ControllerState::Idle {
            return Err(VisError::invalid_config("controller has already run"));
        }

        self.lifecycle.transition(ControllerState::Initializing);
        let result = self.run_session();
        if self.lifecycle.state != ControllerState::Stopping {
            self.lifecycle.transition(ControllerState::Stopping);
        }
        self.lifecycle.transition(ControllerState::Terminated);

        match &result {
            Ok(stats) => tracing::info!(
                "Session finished: {} rendered, {} dropped, {} skipped",
                stats.frames_rendered,
                stats.frames_dropped,
                stats.frames_skipped
            ),
            Err(e) => tracing::error!("Session failed: {}", e),
        }
        result
    }

    fn run_session(&mut self) -> Result<SessionStats, VisError> {
        let Self {
            config,
            source,
            terminal,
            cancel,
            lifecycle,
            stats,
        } = self;

        let engine = SpectrumEngine::new(config)?;
        let renderer = BarRenderer::new(config);
        let (producer, frames) = frame_queue(config.window_size, config.queue_capacity);
        let (event_tx, event_rx) = event_channel();
        let bridge = CaptureBridge::new(producer, config, cancel.clone());
        let mut session = RenderSession::new(config, engine, renderer, frames, event_rx, bridge.counters());

        // Declared before the stream guard so it is dropped after it
        let mut screen: Option<TerminalGuard<'_, T>> = None;

        tracing::info!("Starting audio source: {}", source.name());
        source.start(bridge, event_tx)?;
        let stream = StreamGuard::new(source, cancel.clone());

        if let Err(e) = terminal.acquire() {
            lifecycle.transition(ControllerState::Stopping);
            return Err(VisError::Terminal(e));
        }
        let display = screen.insert(TerminalGuard::new(terminal));

        lifecycle.transition(ControllerState::Running);
        let outcome = session.run(display.terminal(), cancel);
        *stats = session.snapshot();

        lifecycle.transition(ControllerState::Stopping);
        drop(stream);
        drop(screen);

        outcome.map(|()| *stats)
    }
}

/// State history with logged transitions.
#[derive(Debug)]
struct Lifecycle {
    state: ControllerState,
    history: Vec<ControllerState>,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: ControllerState::Idle,
            history: vec![ControllerState::Idle],
        }
    }

    fn transition(&mut self, next: ControllerState) {
        tracing::info!("Controller: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.history.push(next);
    }
}

/// Stops the audio stream when dropped. Cancels first so the callback goes idle.
struct StreamGuard<'a, S: AudioFrameSource> {
    source: &'a mut S,
    cancel: CancellationToken,
}

impl<'a, S: AudioFrameSource> StreamGuard<'a, S> {
    fn new(source: &'a mut S, cancel: CancellationToken) -> Self {
        Self { source, cancel }
    }
}

impl<S: AudioFrameSource> Drop for StreamGuard<'_, S> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.source.stop();
        tracing::debug!("Audio source {} stopped", self.source.name());
    }
}

/// Releases the terminal when dropped.
struct TerminalGuard<'a, T: TerminalBackend> {
    terminal: &'a mut T,
}

impl<'a, T: TerminalBackend> TerminalGuard<'a, T> {
    fn new(terminal: &'a mut T) -> Self {
        Self { terminal }
    }

    fn terminal(&mut self) -> &mut T {
        self.terminal
    }
}

impl<T: TerminalBackend> Drop for TerminalGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.terminal.release() {
            tracing::error!("Failed to release terminal: {}", e);
        }
    }
}

/// Consumer-side state of a running session.
struct RenderSession {
    frame_interval: Duration,
    max_consecutive_failures: u64,
    engine: SpectrumEngine,
    renderer: BarRenderer,
    frames: FrameConsumer,
    events: EventConsumer,
    counters: Arc<BridgeCounters>,
    stats: SessionStats,
    last_dropped: u64,
}

impl RenderSession {
    fn new(
        config: &PipelineConfig,
        engine: SpectrumEngine,
        renderer: BarRenderer,
        frames: FrameConsumer,
        events: EventConsumer,
        counters: Arc<BridgeCounters>,
    ) -> Self {
        Self {
            frame_interval: config.frame_interval(),
            max_consecutive_failures: u64::from(config.max_consecutive_failures),
            engine,
            renderer,
            frames,
            events,
            counters,
            stats: SessionStats::default(),
            last_dropped: 0,
        }
    }

    /// Consume, transform, render and poll input until cancelled or failed.
    fn run<T: TerminalBackend>(&mut self, terminal: &mut T, cancel: &CancellationToken) -> Result<(), VisError> {
        let mut next_refresh = Instant::now();

        loop {
            if cancel.is_cancelled() {
                tracing::debug!("Cancellation observed, leaving render loop");
                return Ok(());
            }

            self.drain_events()?;
            self.check_callbacks()?;
            self.check_drops();

            let now = Instant::now();
            if now >= next_refresh {
                self.refresh(terminal);
                next_refresh = now + self.frame_interval;
            }

            let timeout = next_refresh.saturating_duration_since(Instant::now());
            match terminal.poll_input(timeout) {
                Ok(Some(InputEvent::Quit)) => {
                    tracing::info!("Quit requested");
                    cancel.cancel();
                }
                Ok(Some(InputEvent::Resize(geometry))) => {
                    tracing::debug!("Terminal resized to {}x{}", geometry.columns, geometry.rows);
                    self.redraw(terminal);
                }
                Ok(Some(InputEvent::Other) | None) => {}
                Err(e) => {
                    tracing::warn!("Input poll failed: {}", e);
                    thread::sleep(timeout);
                }
            }
        }
    }

    /// Analyzes and draws the newest frame, if a new one arrived.
    fn refresh<T: TerminalBackend>(&mut self, terminal: &mut T) {
        let Some(frame) = self.frames.pop_latest() else {
            return;
        };
        let result = match self.engine.analyze(frame) {
            Ok(spectrum) => self.renderer.render(spectrum, terminal).map(|_| ()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.stats.frames_rendered += 1;
                if self.stats.frames_rendered % 100 == 0 {
                    tracing::debug!(
                        "Rendered frame #{}: produced={}, dropped={}, skipped={}",
                        self.stats.frames_rendered,
                        self.frames.produced(),
                        self.frames.dropped(),
                        self.frames.skipped()
                    );
                }
            }
            Err(e) => {
                self.stats.render_errors += 1;
                tracing::warn!("Frame skipped: {}", e);
            }
        }
    }

    /// Draws the last spectrum again at the current terminal size.
    fn redraw<T: TerminalBackend>(&mut self, terminal: &mut T) {
        if let Err(e) = self.renderer.render(self.engine.spectrum(), terminal) {
            self.stats.render_errors += 1;
            tracing::warn!("Redraw failed: {}", e);
        }
    }

    fn drain_events(&mut self) -> Result<(), VisError> {
        while let Some(event) = self.events.try_pop() {
            if event.is_fatal() {
                tracing::error!(?event, "fatal stream event");
                return Err(VisError::stream_failed(describe_fatal(&event)));
            }
            self.stats.stream_errors += 1;
            tracing::warn!(?event, "stream event");
        }
        Ok(())
    }

    fn check_callbacks(&self) -> Result<(), VisError> {
        let consecutive = self.counters.consecutive_failures();
        if consecutive > self.max_consecutive_failures {
            tracing::error!("{} consecutive audio callbacks rejected", consecutive);
            return Err(VisError::stream_failed(format!(
                "{consecutive} consecutive audio callbacks were rejected"
            )));
        }
        Ok(())
    }

    fn check_drops(&mut self) {
        let total = self.frames.dropped();
        if total > self.last_dropped {
            self.last_dropped = total;
            let event = StreamEvent::FramesDropped { total };
            tracing::debug!(?event, "stream event");
        }
    }

    fn snapshot(&self) -> SessionStats {
        SessionStats {
            frames_produced: self.frames.produced(),
            frames_dropped: self.frames.dropped(),
            frames_skipped: self.frames.skipped(),
            callback_failures: self.counters.callback_failures(),
            ..self.stats
        }
    }
}

/// Reason reported when a fatal event ends the session.
fn describe_fatal(event: &StreamEvent) -> String {
    match event {
        StreamEvent::DeviceLost { reason } => format!("device lost: {reason}"),
        StreamEvent::StreamInterrupted { reason } => format!("stream interrupted: {reason}"),
        StreamEvent::FramesDropped { total } => format!("{total} frames dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::Producer;

    #[test]
    fn test_lifecycle_records_history() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.transition(ControllerState::Initializing);
        lifecycle.transition(ControllerState::Running);

        assert_eq!(lifecycle.state, ControllerState::Running);
        assert_eq!(
            lifecycle.history,
            vec![
                ControllerState::Idle,
                ControllerState::Initializing,
                ControllerState::Running
            ]
        );
    }

    #[test]
    fn test_only_fatal_events_end_the_session() {
        let config = PipelineConfig::default();
        let (_producer, frames) = frame_queue(config.window_size, config.queue_capacity);
        let (mut tx, rx) = event_channel();
        let mut session = RenderSession::new(
            &config,
            SpectrumEngine::new(&config).unwrap(),
            BarRenderer::new(&config),
            frames,
            rx,
            Arc::new(BridgeCounters::default()),
        );

        tx.try_push(StreamEvent::StreamInterrupted {
            reason: "xrun".to_string(),
        })
        .unwrap();
        assert!(session.drain_events().is_ok());
        assert_eq!(session.stats.stream_errors, 1);

        tx.try_push(StreamEvent::DeviceLost {
            reason: "unplugged".to_string(),
        })
        .unwrap();
        match session.drain_events() {
            Err(VisError::StreamFailed { reason }) => assert_eq!(reason, "device lost: unplugged"),
            other => panic!("expected StreamFailed, got {other:?}"),
        }
    }
}
