//! Camera platform abstraction.
//!
//! This module provides a trait-based abstraction over the platform camera
//! API (device enumeration and stream acquisition), allowing both a real
//! backend and a mock implementation for testing.

use super::{CameraDevice, MediaConstraints};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors reported by the camera platform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The user or platform refused camera access.
    #[error("camera permission denied")]
    PermissionDenied,
    /// The requested device id is not present.
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    /// The platform has no video input at all.
    #[error("no video input devices")]
    NoVideoInput,
    /// The platform could not open the stream.
    #[error("failed to acquire stream: {0}")]
    AcquisitionFailed(String),
    /// `stop_tracks` was called on a stream with no live tracks.
    #[error("tracks already stopped")]
    TrackAlreadyStopped,
    /// Pausing or resuming the video sink failed.
    #[error("video sink error: {0}")]
    SinkFailed(String),
}

/// Capabilities reported by a live video track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackCapabilities {
    /// Supported focus modes, e.g. `continuous`, `single-shot`.
    pub focus_modes: Vec<String>,
    /// Largest supported width.
    pub max_width: u32,
    /// Largest supported height.
    pub max_height: u32,
    /// Highest supported frame rate.
    pub max_frame_rate: u32,
}

impl TrackCapabilities {
    /// Returns true if the track can focus continuously.
    pub fn supports_continuous_focus(&self) -> bool {
        self.focus_modes.iter().any(|mode| mode == "continuous")
    }
}

/// Settings a live video track actually runs with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSettings {
    /// Device the track belongs to.
    pub device_id: String,
    /// Active width.
    pub width: u32,
    /// Active height.
    pub height: u32,
    /// Active frame rate.
    pub frame_rate: u32,
}

/// A media stream holding one or more hardware tracks.
///
/// Dropping a stream does not release the hardware; callers must call
/// [`MediaStream::stop_tracks`].
pub trait MediaStream {
    /// Platform stream identifier.
    fn id(&self) -> &str;

    /// Number of tracks still live.
    fn live_tracks(&self) -> usize;

    /// Stops every track. Returns the number of tracks that were live.
    ///
    /// Fails with [`PlatformError::TrackAlreadyStopped`] if nothing was live.
    fn stop_tracks(&mut self) -> Result<usize, PlatformError>;

    /// Reads the capabilities of the video track.
    fn capabilities(&self) -> TrackCapabilities;

    /// Reads the current settings of the video track.
    fn settings(&self) -> TrackSettings;

    /// Pauses the video sink bound to this stream.
    fn pause_sink(&mut self) -> Result<(), PlatformError>;

    /// Resumes the video sink bound to this stream.
    fn resume_sink(&mut self) -> Result<(), PlatformError>;
}

/// Trait for camera platform implementations.
pub trait CameraPlatform {
    /// Lists available video input devices.
    fn enumerate_devices(&mut self) -> Result<Vec<CameraDevice>, PlatformError>;

    /// Returns true if device labels are readable without a permission grant.
    fn labels_exposed(&self) -> bool;

    /// Opens a stream under the given constraints.
    fn request_stream(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError>;

    /// Opens and immediately stops a throwaway stream to obtain permission.
    fn probe_permission(&mut self) -> Result<(), PlatformError> {
        let mut stream = self.request_stream(&MediaConstraints::probe())?;
        stream.stop_tracks()?;
        tracing::debug!(stream = stream.id(), "Permission probe completed");
        Ok(())
    }
}

/// Record of one stream handed out by [`MockCameraPlatform`].
#[derive(Debug, Clone)]
pub struct StreamRecord {
    /// Platform stream id.
    pub stream_id: String,
    /// Device the stream was opened on.
    pub device_id: String,
    /// True for permission probes (no explicit device requested).
    pub probe: bool,
    tracks: Vec<Arc<AtomicBool>>,
    stop_calls: Arc<AtomicUsize>,
}

impl StreamRecord {
    /// Number of tracks still live.
    pub fn live_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.load(Ordering::SeqCst))
            .count()
    }

    /// Number of times `stop_tracks` was called on the stream.
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

/// Shared view of every stream a mock platform has opened.
#[derive(Debug, Clone, Default)]
pub struct StreamLedger {
    records: Arc<Mutex<Vec<StreamRecord>>>,
}

impl StreamLedger {
    fn lock(&self) -> MutexGuard<'_, Vec<StreamRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, record: StreamRecord) {
        self.lock().push(record);
    }

    /// Snapshot of all records.
    pub fn records(&self) -> Vec<StreamRecord> {
        self.lock().clone()
    }

    /// Streams opened for a specific device (probes excluded).
    pub fn acquisitions(&self) -> Vec<StreamRecord> {
        self.lock().iter().filter(|r| !r.probe).cloned().collect()
    }

    /// Total live tracks across every stream ever opened.
    pub fn live_tracks(&self) -> usize {
        self.lock().iter().map(StreamRecord::live_tracks).sum()
    }

    /// Number of streams with at least one live track.
    pub fn live_streams(&self) -> usize {
        self.lock().iter().filter(|r| r.live_tracks() > 0).count()
    }
}

/// Mock stream backed by shared track flags.
#[derive(Debug)]
pub struct MockStream {
    id: String,
    settings: TrackSettings,
    capabilities: TrackCapabilities,
    tracks: Vec<Arc<AtomicBool>>,
    stop_calls: Arc<AtomicUsize>,
    fail_sink: bool,
    paused: bool,
}

impl MediaStream for MockStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn live_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|t| t.load(Ordering::SeqCst))
            .count()
    }

    fn stop_tracks(&mut self) -> Result<usize, PlatformError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let stopped = self
            .tracks
            .iter()
            .filter(|t| t.swap(false, Ordering::SeqCst))
            .count();
        if stopped == 0 {
            return Err(PlatformError::TrackAlreadyStopped);
        }
        tracing::debug!(stream = %self.id, tracks = stopped, "MockStream tracks stopped");
        Ok(stopped)
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities.clone()
    }

    fn settings(&self) -> TrackSettings {
        self.settings.clone()
    }

    fn pause_sink(&mut self) -> Result<(), PlatformError> {
        if self.fail_sink {
            return Err(PlatformError::SinkFailed("pause rejected".into()));
        }
        self.paused = true;
        Ok(())
    }

    fn resume_sink(&mut self) -> Result<(), PlatformError> {
        if self.fail_sink {
            return Err(PlatformError::SinkFailed("resume rejected".into()));
        }
        if !self.paused {
            return Err(PlatformError::SinkFailed("sink is not paused".into()));
        }
        self.paused = false;
        Ok(())
    }
}

/// Mock camera platform for testing and demos.
///
/// Mimics browser behavior: labels can be withheld until a stream has been
/// granted, and permission can be denied outright.
#[derive(Debug, Default)]
pub struct MockCameraPlatform {
    devices: Vec<CameraDevice>,
    hide_labels: bool,
    deny_permission: bool,
    permission_granted: bool,
    focus_capable: bool,
    fail_sink: bool,
    ledger: StreamLedger,
    next_stream: u64,
}

impl MockCameraPlatform {
    /// A platform with no devices.
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform exposing the given devices.
    pub fn with_devices(devices: Vec<CameraDevice>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// Withhold labels until a stream has been granted.
    pub fn hide_labels_until_granted(mut self) -> Self {
        self.hide_labels = true;
        self
    }

    /// Reject every stream request.
    pub fn deny_permission(mut self) -> Self {
        self.deny_permission = true;
        self
    }

    /// Report continuous focus on opened tracks.
    pub fn with_focus_capability(mut self) -> Self {
        self.focus_capable = true;
        self
    }

    /// Make video sink pause/resume fail.
    pub fn with_failing_sink(mut self) -> Self {
        self.fail_sink = true;
        self
    }

    /// Handle for inspecting opened streams.
    pub fn ledger(&self) -> StreamLedger {
        self.ledger.clone()
    }
}

impl CameraPlatform for MockCameraPlatform {
    fn enumerate_devices(&mut self) -> Result<Vec<CameraDevice>, PlatformError> {
        if self.labels_exposed() {
            return Ok(self.devices.clone());
        }
        Ok(self
            .devices
            .iter()
            .map(|d| CameraDevice::new(d.id.clone(), ""))
            .collect())
    }

    fn labels_exposed(&self) -> bool {
        !self.hide_labels || self.permission_granted
    }

    fn request_stream(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        if self.deny_permission {
            return Err(PlatformError::PermissionDenied);
        }

        let device = match &constraints.device_id {
            Some(id) => self
                .devices
                .iter()
                .find(|d| &d.id == id)
                .ok_or_else(|| PlatformError::DeviceNotFound(id.clone()))?,
            None => self.devices.first().ok_or(PlatformError::NoVideoInput)?,
        };

        self.next_stream += 1;
        self.permission_granted = true;

        let id = format!("mock-stream-{}", self.next_stream);
        let track = Arc::new(AtomicBool::new(true));
        let stop_calls = Arc::new(AtomicUsize::new(0));

        self.ledger.push(StreamRecord {
            stream_id: id.clone(),
            device_id: device.id.clone(),
            probe: constraints.device_id.is_none(),
            tracks: vec![Arc::clone(&track)],
            stop_calls: Arc::clone(&stop_calls),
        });

        let focus_modes = if self.focus_capable {
            vec!["continuous".to_string(), "single-shot".to_string()]
        } else {
            Vec::new()
        };

        tracing::info!(stream = %id, device = %device.id, "MockCameraPlatform opened stream");

        Ok(Box::new(MockStream {
            id,
            settings: TrackSettings {
                device_id: device.id.clone(),
                width: constraints.width.ideal,
                height: constraints.height.ideal,
                frame_rate: constraints.frame_rate,
            },
            capabilities: TrackCapabilities {
                focus_modes,
                max_width: constraints.width.max,
                max_height: constraints.height.max,
                max_frame_rate: constraints.frame_rate,
            },
            tracks: vec![track],
            stop_calls,
            fail_sink: self.fail_sink,
            paused: false,
        }))
    }
}
