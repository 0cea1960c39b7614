//! Camera session lifecycle management.
//!
//! Owns at most one [`ScanSession`] per scanning surface and guarantees that
//! every way a session can end (decode, stop, dispose, failure) releases the
//! camera before anything else happens.
//!
//! ```text
//!   Idle ──start──▶ Requesting ──ok──▶ Active ──decode/stop/dispose/error──▶ Stopping ──▶ Idle
//!                       │
//!                       └──failure──▶ Idle
//! ```

use super::decoder::{CancelToken, DecoderConfig, DecoderEvent, DecoderFactory, DecoderSink, SinkMessage};
use super::selection::{enumerate_cameras, select_camera};
use super::session::ScanSession;
use super::ScanError;
use crate::capture::{CameraDevice, CameraPlatform, ConstraintTable, DeviceClass, MediaConstraints};
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::time::Duration;

/// Lifecycle state of the scanning surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session.
    Idle,
    /// Acquiring the camera and starting the decoder.
    Requesting,
    /// Camera and decoder running.
    Active,
    /// Releasing the session.
    Stopping,
}

/// Status for rendering. `Error` holds the last failure until the next start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// Ready to scan.
    Idle,
    /// Starting the camera.
    Requesting,
    /// Scanning.
    Active,
    /// The last session failed.
    Error(ScanError),
}

/// A recognized barcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedResult {
    /// The decoded text, trimmed.
    pub code: String,
    /// Session that produced it.
    pub session_id: u64,
    /// When it was delivered.
    pub timestamp: DateTime<Utc>,
}

/// Events delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// The manager moved to a new state.
    StateChanged(SessionState),
    /// A barcode was decoded; the session has already been released.
    Decoded(DecodedResult),
    /// A start or a running session failed.
    Failed(ScanError),
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Decoded,
    UserStop,
    Disposed,
    RuntimeError,
}

/// Counters describing manager activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Start requests accepted (not rejected as re-entrant).
    pub starts: u64,
    /// Streams acquired for sessions (probes excluded).
    pub acquisitions: u64,
    /// Sessions whose stream was released.
    pub teardowns: u64,
    /// Barcodes delivered.
    pub decodes: u64,
    /// Failures published.
    pub failures: u64,
    /// Decoder events that arrived for a finished session.
    pub discarded_events: u64,
}

/// Tuning for a [`CameraSessionManager`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Selects the constraint profile.
    pub device_class: DeviceClass,
    /// Constraint profiles by device class.
    pub constraints: ConstraintTable,
    /// Delay between acquiring the stream and binding the decoder, so the
    /// video sink exists before the decoder attaches to it.
    pub mount_delay: Duration,
    /// Time the sink stays paused during a focus nudge.
    pub focus_pause: Duration,
    /// Camera chosen by the user, if any.
    pub preferred_device: Option<String>,
    /// Decoder worker threads.
    pub workers: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_class: DeviceClass::Desktop,
            constraints: ConstraintTable::default(),
            mount_delay: Duration::from_millis(200),
            focus_pause: Duration::from_millis(100),
            preferred_device: None,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

impl SessionConfig {
    /// Configuration with no artificial delays, for tests and headless use.
    pub fn immediate() -> Self {
        Self {
            mount_delay: Duration::ZERO,
            focus_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Manages the camera + decoder lifecycle for one scanning surface.
pub struct CameraSessionManager<P: CameraPlatform, F: DecoderFactory> {
    platform: P,
    decoders: F,
    config: SessionConfig,
    state: SessionState,
    session: Option<ScanSession>,
    last_error: Option<ScanError>,
    cameras: Vec<CameraDevice>,
    next_session_id: u64,
    events_tx: Sender<SinkMessage>,
    events_rx: Receiver<SinkMessage>,
    subscribers: Vec<Sender<ScanEvent>>,
    stats: SessionStats,
}

impl<P: CameraPlatform, F: DecoderFactory> CameraSessionManager<P, F> {
    /// Creates an idle manager.
    pub fn new(platform: P, decoders: F, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            platform,
            decoders,
            config,
            state: SessionState::Idle,
            session: None,
            last_error: None,
            cameras: Vec::new(),
            next_session_id: 1,
            events_tx,
            events_rx,
            subscribers: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    /// Returns a receiver for lifecycle, result and failure events.
    pub fn subscribe(&mut self) -> Receiver<ScanEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Status for display, including the last error.
    pub fn status(&self) -> ScanStatus {
        match (self.state, &self.last_error) {
            (SessionState::Requesting, _) => ScanStatus::Requesting,
            (SessionState::Active, _) => ScanStatus::Active,
            (_, Some(err)) => ScanStatus::Error(err.clone()),
            _ => ScanStatus::Idle,
        }
    }

    /// Activity counters.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// The manager's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cameras seen during the last enumeration.
    pub fn available_cameras(&self) -> &[CameraDevice] {
        &self.cameras
    }

    /// Device of the active session.
    pub fn active_device(&self) -> Option<&CameraDevice> {
        self.session.as_ref().map(ScanSession::device)
    }

    /// Constraints the active session was opened with.
    pub fn active_constraints(&self) -> Option<&MediaConstraints> {
        self.session.as_ref().map(ScanSession::constraints)
    }

    /// Pre-selects a camera for the next start. `None` restores automatic choice.
    pub fn select_device(&mut self, device_id: Option<String>) {
        tracing::debug!(device = ?device_id, "Camera pre-selected");
        self.config.preferred_device = device_id;
    }

    /// The camera platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The decoder factory.
    pub fn decoders(&self) -> &F {
        &self.decoders
    }

    /// Starts scanning. Returns the new session id.
    ///
    /// Rejected with [`ScanError::AlreadyScanning`] unless idle. On any other
    /// failure the manager is back to idle, nothing is left open, and the
    /// failure is also published as [`ScanEvent::Failed`].
    pub fn start_scanning(&mut self) -> Result<u64, ScanError> {
        if self.state != SessionState::Idle {
            tracing::debug!(state = ?self.state, "Start rejected: session in progress");
            return Err(ScanError::AlreadyScanning);
        }

        self.stats.starts += 1;
        self.last_error = None;
        self.transition(SessionState::Requesting);

        match self.open_session() {
            Ok(session) => {
                let id = session.id();
                tracing::info!(
                    session = id,
                    device = %session.device().id,
                    label = %session.device().label,
                    class = %self.config.device_class,
                    "Scan session active"
                );
                self.session = Some(session);
                self.transition(SessionState::Active);
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Scan session failed to start");
                self.transition(SessionState::Idle);
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Stops scanning. A no-op when idle.
    pub fn stop_scanning(&mut self) {
        if self.state == SessionState::Idle {
            tracing::debug!("Stop ignored: already idle");
            return;
        }
        self.end_session(StopReason::UserStop);
    }

    /// Releases everything unconditionally, as when the owning surface goes away.
    pub fn dispose(&mut self) {
        if self.session.is_some() || self.state != SessionState::Idle {
            self.end_session(StopReason::Disposed);
        }
        let dropped = self.events_rx.try_iter().count() as u64;
        self.stats.discarded_events += dropped;
        tracing::debug!(dropped, "Scanner disposed");
    }

    /// Best-effort refocus of the active camera.
    pub fn nudge_focus(&mut self) -> bool {
        let pause = self.config.focus_pause;
        match self.session.as_mut() {
            Some(session) if self.state == SessionState::Active => session.nudge_focus(pause),
            _ => false,
        }
    }

    /// Handles every pending decoder event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.events_rx.try_recv() {
            self.dispatch(message);
            handled += 1;
        }
        handled
    }

    /// Waits up to `timeout` for a decoder event, then handles all pending ones.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.events_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.dispatch(message);
                1 + self.pump()
            }
            Err(_) => 0,
        }
    }

    fn open_session(&mut self) -> Result<ScanSession, ScanError> {
        let devices = enumerate_cameras(&mut self.platform)?;
        self.cameras = devices;

        let device = select_camera(&self.cameras, self.config.preferred_device.as_deref())
            .cloned()
            .ok_or(ScanError::NoCameraAvailable)?;

        let profile = self.config.constraints.profile(self.config.device_class).clone();
        let constraints = MediaConstraints::for_device(&device.id, &profile);
        tracing::debug!(
            device = %device.id,
            width = constraints.width.ideal,
            height = constraints.height.ideal,
            fps = constraints.frame_rate,
            "Requesting camera stream"
        );

        let stream = self.platform.request_stream(&constraints)?;
        self.stats.acquisitions += 1;

        let id = self.next_session_id;
        self.next_session_id += 1;

        let token = CancelToken::new();
        let mut session = ScanSession::new(id, device, constraints.clone(), stream, token.clone());

        if !self.config.mount_delay.is_zero() {
            std::thread::sleep(self.config.mount_delay);
        }

        let decoder_config = DecoderConfig::for_stream(constraints, &profile, self.config.workers);
        let sink = DecoderSink::new(id, self.events_tx.clone(), token);
        let mut decoder = self.decoders.create();
        let started = decoder
            .init(&decoder_config, sink)
            .and_then(|()| decoder.start());
        session.attach_decoder(decoder);

        if let Err(e) = started {
            if session.teardown() {
                self.stats.teardowns += 1;
            }
            return Err(ScanError::DecoderInitFailed(e.to_string()));
        }

        tracing::debug!(
            session = id,
            readers = decoder_config.symbologies.len(),
            frequency = decoder_config.frequency,
            workers = decoder_config.workers,
            "Decoder started"
        );
        Ok(session)
    }

    fn dispatch(&mut self, message: SinkMessage) {
        let live = self.state == SessionState::Active
            && self
                .session
                .as_ref()
                .is_some_and(|s| s.id() == message.session_id && !s.is_cancelled());

        if !live {
            self.stats.discarded_events += 1;
            tracing::trace!(session = message.session_id, "Discarding late decoder event");
            return;
        }

        match message.event {
            DecoderEvent::Detected(code) => {
                let code = code.trim();
                if code.is_empty() {
                    tracing::trace!(session = message.session_id, "Empty detection ignored");
                    return;
                }
                let result = DecodedResult {
                    code: code.to_string(),
                    session_id: message.session_id,
                    timestamp: Utc::now(),
                };
                tracing::info!(session = result.session_id, code = %result.code, "Barcode decoded");

                self.end_session(StopReason::Decoded);
                self.stats.decodes += 1;
                self.publish(ScanEvent::Decoded(result));
            }
            DecoderEvent::Processed(code) => {
                tracing::trace!(session = message.session_id, ?code, "Frame processed");
            }
            DecoderEvent::Error(reason) => {
                tracing::warn!(session = message.session_id, %reason, "Decoder runtime error");
                self.end_session(StopReason::RuntimeError);
                self.fail(ScanError::DecoderRuntimeError(reason));
            }
        }
    }

    fn end_session(&mut self, reason: StopReason) {
        self.transition(SessionState::Stopping);

        if let Some(mut session) = self.session.take() {
            session.cancel();
            if session.teardown() {
                self.stats.teardowns += 1;
            }
            let duration_ms = (Utc::now() - session.started_at()).num_milliseconds();
            tracing::info!(session = session.id(), ?reason, duration_ms, "Scan session ended");
        }

        self.transition(SessionState::Idle);
    }

    fn fail(&mut self, err: ScanError) {
        self.stats.failures += 1;
        self.last_error = Some(err.clone());
        self.publish(ScanEvent::Failed(err));
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        tracing::debug!(from = ?self.state, to = ?next, "Session state change");
        self.state = next;
        self.publish(ScanEvent::StateChanged(next));
    }

    fn publish(&mut self, event: ScanEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<P: CameraPlatform, F: DecoderFactory> Drop for CameraSessionManager<P, F> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<P: CameraPlatform, F: DecoderFactory> std::fmt::Debug for CameraSessionManager<P, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSessionManager")
            .field("state", &self.state)
            .field("session", &self.session)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCameraPlatform;
    use crate::scanner::mock::MockDecoderFactory;

    type Manager = CameraSessionManager<MockCameraPlatform, MockDecoderFactory>;

    fn manager(devices: Vec<CameraDevice>) -> Manager {
        CameraSessionManager::new(
            MockCameraPlatform::with_devices(devices),
            MockDecoderFactory::new(),
            SessionConfig::immediate(),
        )
    }

    fn back_camera() -> Vec<CameraDevice> {
        vec![
            CameraDevice::new("front", "Front Camera"),
            CameraDevice::new("back", "Back Camera"),
        ]
    }

    #[test]
    fn test_start_activates_session() {
        let mut m = manager(back_camera());
        let id = m.start_scanning().unwrap();
        assert_eq!(id, 1);
        assert_eq!(m.state(), SessionState::Active);
        assert_eq!(m.status(), ScanStatus::Active);
        assert_eq!(m.active_device().unwrap().id, "back");
        assert_eq!(m.available_cameras().len(), 2);

        let config = m.decoders().last().unwrap().config().unwrap();
        assert_eq!(config.symbologies.len(), 11);
        assert_eq!(config.constraints.device_id.as_deref(), Some("back"));
    }

    #[test]
    fn test_second_start_rejected() {
        let mut m = manager(back_camera());
        let ledger = m.platform().ledger();
        m.start_scanning().unwrap();
        assert_eq!(m.start_scanning(), Err(ScanError::AlreadyScanning));
        assert_eq!(ledger.live_streams(), 1);
        assert_eq!(m.decoders().created(), 1);
        assert_eq!(m.stats().starts, 1);
    }

    #[test]
    fn test_stop_returns_to_idle() {
        let mut m = manager(back_camera());
        let ledger = m.platform().ledger();
        m.start_scanning().unwrap();
        m.stop_scanning();
        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(m.status(), ScanStatus::Idle);
        assert_eq!(ledger.live_tracks(), 0);

        // Stopping again is harmless
        m.stop_scanning();
        assert_eq!(m.stats().teardowns, 1);
    }

    #[test]
    fn test_decode_tears_down_before_event() {
        let mut m = manager(back_camera());
        let ledger = m.platform().ledger();
        let events = m.subscribe();
        m.start_scanning().unwrap();
        events.try_iter().for_each(drop);

        let decoder = m.decoders().last().unwrap();
        assert!(decoder.detect("6901234567892"));
        assert!(decoder.detect("6901234567892"));
        m.pump();

        let received: Vec<_> = events.try_iter().collect();
        assert_eq!(received.len(), 3);
        assert_eq!(received[0], ScanEvent::StateChanged(SessionState::Stopping));
        assert_eq!(received[1], ScanEvent::StateChanged(SessionState::Idle));
        match &received[2] {
            ScanEvent::Decoded(result) => {
                assert_eq!(result.code, "6901234567892");
                assert_eq!(result.session_id, 1);
            }
            other => panic!("expected decoded event, got {:?}", other),
        }

        assert_eq!(ledger.live_tracks(), 0);
        assert!(!decoder.is_running());
        assert_eq!(m.stats().decodes, 1);
        assert_eq!(m.stats().discarded_events, 1);

        // Reset correctly: a new session starts
        assert_eq!(m.start_scanning(), Ok(2));
    }

    #[test]
    fn test_frame_misses_are_not_errors() {
        let mut m = manager(back_camera());
        let events = m.subscribe();
        m.start_scanning().unwrap();
        events.try_iter().for_each(drop);

        let decoder = m.decoders().last().unwrap();
        decoder.process(None);
        decoder.process(None);
        decoder.detect("   ");
        assert_eq!(m.pump(), 3);

        assert_eq!(m.state(), SessionState::Active);
        assert!(events.try_recv().is_err());
        assert_eq!(m.stats().failures, 0);
    }

    #[test]
    fn test_no_camera() {
        let mut m = manager(Vec::new());
        let events = m.subscribe();
        assert_eq!(m.start_scanning(), Err(ScanError::NoCameraAvailable));
        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(m.status(), ScanStatus::Error(ScanError::NoCameraAvailable));
        assert!(events
            .try_iter()
            .any(|e| e == ScanEvent::Failed(ScanError::NoCameraAvailable)));
    }

    #[test]
    fn test_permission_denied() {
        let mut m = CameraSessionManager::new(
            MockCameraPlatform::with_devices(back_camera()).deny_permission(),
            MockDecoderFactory::new(),
            SessionConfig::immediate(),
        );
        assert_eq!(m.start_scanning(), Err(ScanError::PermissionDenied));
        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(m.stats().acquisitions, 0);
    }

    #[test]
    fn test_decoder_init_failure_releases_stream() {
        let mut m = CameraSessionManager::new(
            MockCameraPlatform::with_devices(back_camera()),
            MockDecoderFactory::new().failing_init(),
            SessionConfig::immediate(),
        );
        let ledger = m.platform().ledger();
        assert!(matches!(
            m.start_scanning(),
            Err(ScanError::DecoderInitFailed(_))
        ));
        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(ledger.acquisitions().len(), 1);
        assert_eq!(ledger.live_tracks(), 0);
        assert_eq!(m.stats().acquisitions, m.stats().teardowns);
    }

    #[test]
    fn test_decoder_start_failure_releases_stream() {
        let mut m = CameraSessionManager::new(
            MockCameraPlatform::with_devices(back_camera()),
            MockDecoderFactory::new().failing_start(),
            SessionConfig::immediate(),
        );
        let ledger = m.platform().ledger();
        assert!(matches!(
            m.start_scanning(),
            Err(ScanError::DecoderInitFailed(_))
        ));
        assert_eq!(ledger.live_tracks(), 0);
    }

    #[test]
    fn test_runtime_error_stops_session() {
        let mut m = manager(back_camera());
        let ledger = m.platform().ledger();
        m.start_scanning().unwrap();

        m.decoders().last().unwrap().fail("worker crashed");
        m.pump();

        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(
            m.status(),
            ScanStatus::Error(ScanError::DecoderRuntimeError("worker crashed".into()))
        );
        assert_eq!(ledger.live_tracks(), 0);

        // Next start clears the error
        m.start_scanning().unwrap();
        assert_eq!(m.status(), ScanStatus::Active);
    }

    #[test]
    fn test_late_events_after_stop_are_discarded() {
        let mut m = manager(back_camera());
        let events = m.subscribe();
        m.start_scanning().unwrap();
        let decoder = m.decoders().last().unwrap();

        // Event already queued before stop, one attempted after
        assert!(decoder.detect("111"));
        m.stop_scanning();
        assert!(!decoder.detect("222"));
        m.pump();

        assert!(!events
            .try_iter()
            .any(|e| matches!(e, ScanEvent::Decoded(_))));
        assert_eq!(m.stats().discarded_events, 1);
    }

    #[test]
    fn test_events_from_previous_session_ignored() {
        let mut m = manager(back_camera());
        m.start_scanning().unwrap();
        let first = m.decoders().last().unwrap();
        m.stop_scanning();
        m.start_scanning().unwrap();

        // Stale handle from session 1 cannot emit: its token is cancelled
        assert!(!first.detect("999"));
        assert_eq!(m.pump(), 0);
        assert_eq!(m.state(), SessionState::Active);
    }

    #[test]
    fn test_preselected_device() {
        let mut m = manager(back_camera());
        m.select_device(Some("front".into()));
        m.start_scanning().unwrap();
        assert_eq!(m.active_device().unwrap().id, "front");
        m.stop_scanning();

        m.select_device(Some("unplugged".into()));
        m.start_scanning().unwrap();
        assert_eq!(m.active_device().unwrap().id, "back");
    }

    #[test]
    fn test_device_class_picks_profile() {
        let mut config = SessionConfig::immediate();
        config.device_class = DeviceClass::HighFrequencyMobile;
        let mut m = CameraSessionManager::new(
            MockCameraPlatform::with_devices(back_camera()),
            MockDecoderFactory::new(),
            config,
        );
        m.start_scanning().unwrap();
        let constraints = m.active_constraints().unwrap();
        assert_eq!(constraints.frame_rate, 15);
        assert_eq!(m.decoders().last().unwrap().config().unwrap().frequency, 5);
    }

    #[test]
    fn test_focus_nudge() {
        let mut m = CameraSessionManager::new(
            MockCameraPlatform::with_devices(back_camera()).with_focus_capability(),
            MockDecoderFactory::new(),
            SessionConfig::immediate(),
        );
        assert!(!m.nudge_focus());
        m.start_scanning().unwrap();
        assert!(m.nudge_focus());
    }

    #[test]
    fn test_dispose_while_active() {
        let mut m = manager(back_camera());
        let ledger = m.platform().ledger();
        m.start_scanning().unwrap();
        let decoder = m.decoders().last().unwrap();
        decoder.detect("123");

        m.dispose();
        assert_eq!(m.state(), SessionState::Idle);
        assert_eq!(ledger.live_tracks(), 0);
        assert!(!decoder.detect("456"));
        assert_eq!(m.pump(), 0);
    }

    #[test]
    fn test_drop_releases_camera() {
        let mut m = manager(back_camera());
        let ledger = m.platform().ledger();
        m.start_scanning().unwrap();
        drop(m);
        assert_eq!(ledger.live_tracks(), 0);
        assert_eq!(ledger.acquisitions()[0].stop_calls(), 1);
    }
}
