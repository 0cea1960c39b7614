//! Per-device capability probing.

use super::{CameraDevice, CameraPlatform, ConstraintProfile, MediaConstraints, PlatformError};
use super::{TrackCapabilities, TrackSettings};

/// A device with whatever the platform reported when briefly opened.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// The enumerated device.
    pub device: CameraDevice,
    /// Track capabilities, if the device could be opened.
    pub capabilities: Option<TrackCapabilities>,
    /// Settings the track actually ran with.
    pub settings: Option<TrackSettings>,
}

/// Enumerates cameras and opens each one briefly to read its capabilities.
///
/// Every probe stream is stopped before moving to the next device. A device
/// that cannot be opened is still listed, without capabilities.
pub fn probe_cameras<P: CameraPlatform + ?Sized>(
    platform: &mut P,
) -> Result<Vec<CameraInfo>, PlatformError> {
    if !platform.labels_exposed() {
        platform.probe_permission()?;
    }

    let devices = platform.enumerate_devices()?;
    let profile = ConstraintProfile::desktop();
    let mut infos = Vec::with_capacity(devices.len());

    for device in devices {
        let constraints = MediaConstraints {
            facing: Default::default(),
            ..MediaConstraints::for_device(&device.id, &profile)
        };

        let (capabilities, settings) = match platform.request_stream(&constraints) {
            Ok(mut stream) => {
                let caps = stream.capabilities();
                let settings = stream.settings();
                if let Err(e) = stream.stop_tracks() {
                    tracing::warn!(device = %device.id, error = %e, "Failed to stop probe stream");
                }
                (Some(caps), Some(settings))
            }
            Err(e) => {
                tracing::info!(device = %device.id, error = %e, "Could not probe camera");
                (None, None)
            }
        };

        infos.push(CameraInfo {
            device,
            capabilities,
            settings,
        });
    }

    tracing::debug!(count = infos.len(), "Probed cameras");
    Ok(infos)
}
