//! Native camera backend built on nokhwa.

use super::{
    CameraDevice, CameraPlatform, MediaConstraints, MediaStream, PlatformError, TrackCapabilities,
    TrackSettings,
};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;

fn backend_error(e: nokhwa::NokhwaError) -> PlatformError {
    PlatformError::AcquisitionFailed(e.to_string())
}

fn parse_index(id: &str) -> CameraIndex {
    match id.parse::<u32>() {
        Ok(i) => CameraIndex::Index(i),
        Err(_) => CameraIndex::String(id.to_string()),
    }
}

/// Camera platform backed by the operating system's native capture API.
///
/// Native APIs expose labels without a permission prompt, so no probe is
/// needed before enumeration.
#[derive(Debug, Default)]
pub struct NokhwaPlatform {
    opened: u64,
}

impl NokhwaPlatform {
    /// Creates a platform using the default native backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CameraPlatform for NokhwaPlatform {
    fn enumerate_devices(&mut self) -> Result<Vec<CameraDevice>, PlatformError> {
        let cameras = nokhwa::query(ApiBackend::Auto).map_err(backend_error)?;
        Ok(cameras
            .iter()
            .map(|info| CameraDevice::new(info.index().as_string(), info.human_name()))
            .collect())
    }

    fn labels_exposed(&self) -> bool {
        true
    }

    fn request_stream(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, PlatformError> {
        let device_id = constraints.device_id.clone().unwrap_or_else(|| "0".to_string());
        let format = CameraFormat::new(
            Resolution::new(constraints.width.ideal, constraints.height.ideal),
            FrameFormat::MJPEG,
            constraints.frame_rate,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(parse_index(&device_id), requested).map_err(backend_error)?;
        camera.open_stream().map_err(backend_error)?;

        self.opened += 1;
        let id = format!("native-{}-{}", device_id, self.opened);
        tracing::info!(stream = %id, device = %device_id, "Opened native camera stream");

        Ok(Box::new(NokhwaStream {
            id,
            device_id,
            camera,
            live: true,
        }))
    }
}

/// A single native capture stream. Owns one video track.
pub struct NokhwaStream {
    id: String,
    device_id: String,
    camera: Camera,
    live: bool,
}

impl MediaStream for NokhwaStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.live)
    }

    fn stop_tracks(&mut self) -> Result<usize, PlatformError> {
        if !self.live {
            return Err(PlatformError::TrackAlreadyStopped);
        }
        self.live = false;
        self.camera.stop_stream().map_err(backend_error)?;
        Ok(1)
    }

    fn capabilities(&self) -> TrackCapabilities {
        let resolution = self.camera.resolution();
        TrackCapabilities {
            // Focus modes are not reported by the native backends.
            focus_modes: Vec::new(),
            max_width: resolution.width(),
            max_height: resolution.height(),
            max_frame_rate: self.camera.frame_rate(),
        }
    }

    fn settings(&self) -> TrackSettings {
        let resolution = self.camera.resolution();
        TrackSettings {
            device_id: self.device_id.clone(),
            width: resolution.width(),
            height: resolution.height(),
            frame_rate: self.camera.frame_rate(),
        }
    }

    fn pause_sink(&mut self) -> Result<(), PlatformError> {
        self.camera
            .stop_stream()
            .map_err(|e| PlatformError::SinkFailed(e.to_string()))
    }

    fn resume_sink(&mut self) -> Result<(), PlatformError> {
        self.camera
            .open_stream()
            .map_err(|e| PlatformError::SinkFailed(e.to_string()))
    }
}
