//! Errors surfaced to the host by the session manager.

use crate::capture::PlatformError;
use thiserror::Error;

/// Scanning failures. None of these is fatal; the manager is always left idle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// Camera access was refused.
    #[error("camera permission denied")]
    PermissionDenied,
    /// No usable camera was found or it could not be opened.
    #[error("no camera available")]
    NoCameraAvailable,
    /// The decoder could not be initialized or started.
    #[error("decoder initialization failed: {0}")]
    DecoderInitFailed(String),
    /// The decoder failed while running.
    #[error("decoder runtime error: {0}")]
    DecoderRuntimeError(String),
    /// A start was requested while a session is in progress.
    #[error("a scan is already in progress")]
    AlreadyScanning,
}

impl ScanError {
    /// Status line shown to the user.
    pub fn status_message(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied => {
                "Camera access was denied. Allow camera permission and try again."
            }
            ScanError::NoCameraAvailable => "No camera available.",
            ScanError::DecoderInitFailed(_) => {
                "Scanner failed to start. Check camera permission and try again."
            }
            ScanError::DecoderRuntimeError(_) => "Scanner stopped unexpectedly. Try again.",
            ScanError::AlreadyScanning => "Scanning is already running.",
        }
    }

    /// Short machine-readable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied => "permission_denied",
            ScanError::NoCameraAvailable => "no_camera",
            ScanError::DecoderInitFailed(_) => "decoder_init",
            ScanError::DecoderRuntimeError(_) => "decoder_runtime",
            ScanError::AlreadyScanning => "already_scanning",
        }
    }
}

impl From<PlatformError> for ScanError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::PermissionDenied => ScanError::PermissionDenied,
            other => {
                tracing::debug!(error = %other, "Camera unavailable");
                ScanError::NoCameraAvailable
            }
        }
    }
}
