//! One camera + decoder binding.

use super::decoder::{CancelToken, Decoder, DecoderError};
use crate::capture::{CameraDevice, MediaConstraints, MediaStream, PlatformError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A live binding of one stream to one decoder.
///
/// The session owns both exclusively. [`ScanSession::teardown`] releases
/// them exactly once; dropping an unreleased session tears it down too.
pub struct ScanSession {
    id: u64,
    device: CameraDevice,
    constraints: MediaConstraints,
    stream: Option<Box<dyn MediaStream>>,
    decoder: Option<Box<dyn Decoder>>,
    token: CancelToken,
    started_at: DateTime<Utc>,
}

impl ScanSession {
    /// Wraps a freshly acquired stream. The decoder is attached later.
    pub fn new(
        id: u64,
        device: CameraDevice,
        constraints: MediaConstraints,
        stream: Box<dyn MediaStream>,
        token: CancelToken,
    ) -> Self {
        Self {
            id,
            device,
            constraints,
            stream: Some(stream),
            decoder: None,
            token,
            started_at: Utc::now(),
        }
    }

    /// Session id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Camera the stream was opened on.
    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    /// Constraints the stream was opened with.
    pub fn constraints(&self) -> &MediaConstraints {
        &self.constraints
    }

    /// When the stream was acquired.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The session's cancellation token.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Binds the decoder. The session now owns it.
    pub fn attach_decoder(&mut self, decoder: Box<dyn Decoder>) {
        self.decoder = Some(decoder);
    }

    /// Marks the session as ending; later decoder events are dropped.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true once the session has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Live tracks on the held stream, 0 once released.
    pub fn live_tracks(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.live_tracks())
    }

    /// Pauses and resumes the video sink to prompt a refocus.
    ///
    /// Best effort: returns false, and logs, on any failure.
    pub fn nudge_focus(&mut self, pause: Duration) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        if !stream.capabilities().supports_continuous_focus() {
            tracing::debug!(session = self.id, "Continuous focus not supported");
            return false;
        }

        if let Err(e) = stream.pause_sink() {
            tracing::warn!(session = self.id, error = %e, "Focus nudge: pause failed");
            return false;
        }
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
        if let Err(e) = stream.resume_sink() {
            tracing::warn!(session = self.id, error = %e, "Focus nudge: resume failed");
            return false;
        }

        tracing::debug!(session = self.id, "Focus nudged");
        true
    }

    /// Releases the decoder and stream.
    ///
    /// Safe to call repeatedly. Returns true only on the call that actually
    /// released the stream.
    pub fn teardown(&mut self) -> bool {
        self.token.cancel();

        if let Some(mut decoder) = self.decoder.take() {
            match decoder.stop() {
                Ok(()) | Err(DecoderError::AlreadyStopped) => {}
                Err(e) => {
                    tracing::warn!(session = self.id, error = %e, "Decoder stop failed")
                }
            }
        }

        let Some(mut stream) = self.stream.take() else {
            return false;
        };

        match stream.stop_tracks() {
            Ok(tracks) => {
                tracing::debug!(session = self.id, stream = stream.id(), tracks, "Stream released")
            }
            Err(PlatformError::TrackAlreadyStopped) => {}
            Err(e) => {
                tracing::warn!(session = self.id, error = %e, "Stopping stream tracks failed")
            }
        }
        true
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if self.teardown() {
            tracing::debug!(session = self.id, "Session released on drop");
        }
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("id", &self.id)
            .field("device", &self.device.id)
            .field("holds_stream", &self.stream.is_some())
            .field("has_decoder", &self.decoder.is_some())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CameraPlatform, ConstraintProfile, MockCameraPlatform};
    use crate::scanner::decoder::{DecoderConfig, DecoderFactory, DecoderSink};
    use crate::scanner::mock::MockDecoderFactory;
    use crossbeam_channel::unbounded;

    fn open(platform: &mut MockCameraPlatform) -> ScanSession {
        let device = CameraDevice::new("back", "Back Camera");
        let constraints = MediaConstraints::for_device("back", &ConstraintProfile::desktop());
        let stream = platform.request_stream(&constraints).unwrap();
        ScanSession::new(1, device, constraints, stream, CancelToken::new())
    }

    #[test]
    fn test_teardown_releases_once() {
        let mut platform =
            MockCameraPlatform::with_devices(vec![CameraDevice::new("back", "Back Camera")]);
        let ledger = platform.ledger();
        let mut factory = MockDecoderFactory::new();

        let mut session = open(&mut platform);
        let mut decoder = factory.create();
        let (tx, _rx) = unbounded();
        let config = DecoderConfig::for_stream(
            session.constraints().clone(),
            &ConstraintProfile::desktop(),
            1,
        );
        decoder
            .init(&config, DecoderSink::new(1, tx, session.token().clone()))
            .unwrap();
        decoder.start().unwrap();
        session.attach_decoder(decoder);

        assert_eq!(session.live_tracks(), 1);
        assert!(session.teardown());
        assert!(!session.teardown());
        assert!(session.is_cancelled());
        assert_eq!(session.live_tracks(), 0);

        assert_eq!(ledger.live_tracks(), 0);
        assert_eq!(ledger.records()[0].stop_calls(), 1);
        assert_eq!(factory.last().unwrap().stop_calls(), 1);
    }

    #[test]
    fn test_drop_releases_stream() {
        let mut platform =
            MockCameraPlatform::with_devices(vec![CameraDevice::new("back", "Back Camera")]);
        let ledger = platform.ledger();

        drop(open(&mut platform));
        assert_eq!(ledger.live_tracks(), 0);
        assert_eq!(ledger.records()[0].stop_calls(), 1);
    }

    #[test]
    fn test_focus_nudge_requires_capability() {
        let mut plain =
            MockCameraPlatform::with_devices(vec![CameraDevice::new("back", "Back Camera")]);
        assert!(!open(&mut plain).nudge_focus(Duration::ZERO));

        let mut focusing =
            MockCameraPlatform::with_devices(vec![CameraDevice::new("back", "Back Camera")])
                .with_focus_capability();
        assert!(open(&mut focusing).nudge_focus(Duration::ZERO));
    }

    #[test]
    fn test_focus_nudge_failure_is_not_fatal() {
        let mut platform =
            MockCameraPlatform::with_devices(vec![CameraDevice::new("back", "Back Camera")])
                .with_focus_capability()
                .with_failing_sink();
        let mut session = open(&mut platform);
        assert!(!session.nudge_focus(Duration::ZERO));
        assert_eq!(session.live_tracks(), 1);
        assert!(session.teardown());
    }
}
