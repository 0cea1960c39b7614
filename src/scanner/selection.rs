//! Camera selection.

use super::ScanError;
use crate::capture::{CameraDevice, CameraPlatform};

/// Picks the camera for a session.
///
/// Order of preference: the caller's pre-selected device if it is still
/// present, then the first device whose label hints at a rear camera, then
/// the first device. Returns `None` only for an empty list.
pub fn select_camera<'a>(
    devices: &'a [CameraDevice],
    preferred: Option<&str>,
) -> Option<&'a CameraDevice> {
    if let Some(id) = preferred {
        if let Some(device) = devices.iter().find(|d| d.id == id) {
            return Some(device);
        }
        tracing::debug!(preferred = id, "Pre-selected camera no longer present");
    }

    devices
        .iter()
        .find(|d| d.is_rear())
        .or_else(|| devices.first())
}

/// Enumerates cameras, probing for permission first when labels are hidden.
pub fn enumerate_cameras<P: CameraPlatform + ?Sized>(
    platform: &mut P,
) -> Result<Vec<CameraDevice>, ScanError> {
    if !platform.labels_exposed() {
        tracing::debug!("Device labels hidden, probing for permission");
        platform.probe_permission()?;
    }

    let devices = platform.enumerate_devices()?;
    if devices.is_empty() {
        return Err(ScanError::NoCameraAvailable);
    }

    tracing::debug!(count = devices.len(), "Enumerated cameras");
    Ok(devices)
}
