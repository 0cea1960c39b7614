//! Capture constraints and the per-class constraint table.
//!
//! The table is a static lookup keyed by [`DeviceClass`]. The numbers are
//! tuning values, not negotiated with the hardware; they can be overridden
//! from the configuration file.

use super::device::DeviceClass;
use serde::{Deserialize, Deserializer, Serialize};

/// A `min`/`ideal`/`max` range for one capture dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Lowest acceptable value.
    pub min: u32,
    /// Preferred value.
    pub ideal: u32,
    /// Highest acceptable value.
    pub max: u32,
}

impl Range {
    /// Creates a range. Not validated; see [`Range::is_valid`].
    pub const fn new(min: u32, ideal: u32, max: u32) -> Self {
        Self { min, ideal, max }
    }

    /// Returns true if the range is non-empty and ordered.
    pub fn is_valid(&self) -> bool {
        self.min > 0 && self.min <= self.ideal && self.ideal <= self.max
    }
}

/// Facing-mode request passed to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// No preference.
    #[default]
    Any,
    /// Rear camera.
    Environment,
    /// Front camera.
    User,
}

/// Decoder locator patch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchSize {
    /// Smallest patches, for distant or tiny codes.
    XSmall,
    /// Small patches.
    Small,
    /// Balanced default.
    #[default]
    Medium,
    /// Large patches, for close-up codes.
    Large,
    /// Largest patches.
    XLarge,
}

/// Constraints for a single stream request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Exact device to open. `None` lets the platform choose.
    pub device_id: Option<String>,
    /// Preferred camera facing.
    pub facing: FacingMode,
    /// Requested width range.
    pub width: Range,
    /// Requested height range.
    pub height: Range,
    /// Requested frame rate.
    pub frame_rate: u32,
    /// Ask the platform for continuous autofocus.
    pub continuous_focus: bool,
}

impl MediaConstraints {
    /// Constraints for a throwaway permission probe ("any video").
    pub fn probe() -> Self {
        Self {
            device_id: None,
            facing: FacingMode::Any,
            width: Range::new(1, 640, 4096),
            height: Range::new(1, 480, 4096),
            frame_rate: 30,
            continuous_focus: false,
        }
    }

    /// Constraints for a specific device using a class profile.
    pub fn for_device(device_id: &str, profile: &ConstraintProfile) -> Self {
        Self {
            device_id: Some(device_id.to_string()),
            facing: FacingMode::Environment,
            width: profile.width,
            height: profile.height,
            frame_rate: profile.frame_rate,
            continuous_focus: profile.continuous_focus,
        }
    }
}

/// Capture and decode tuning for one device class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintProfile {
    /// Width range to request.
    pub width: Range,
    /// Height range to request.
    pub height: Range,
    /// Requested camera frame rate.
    pub frame_rate: u32,
    /// Decoder analyses per second.
    pub frequency: u32,
    /// Locator patch size handed to the decoder.
    pub patch_size: PatchSize,
    /// Request continuous autofocus.
    #[serde(default)]
    pub continuous_focus: bool,
}

impl ConstraintProfile {
    /// Profile for desktop browsers and native hosts.
    pub fn desktop() -> Self {
        Self {
            width: Range::new(480, 720, 1280),
            height: Range::new(360, 540, 720),
            frame_rate: 30,
            frequency: 15,
            patch_size: PatchSize::Medium,
            continuous_focus: false,
        }
    }

    /// Profile for phones and tablets.
    pub fn mobile() -> Self {
        Self {
            frame_rate: 20,
            frequency: 10,
            patch_size: PatchSize::Large,
            ..Self::desktop()
        }
    }

    /// Lighter profile for phones that struggle at full rate.
    pub fn high_frequency_mobile() -> Self {
        Self {
            width: Range::new(320, 480, 720),
            height: Range::new(240, 360, 540),
            frame_rate: 15,
            frequency: 5,
            patch_size: PatchSize::Large,
            continuous_focus: true,
        }
    }

    /// Validates the profile values.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        if !self.width.is_valid() || !self.height.is_valid() {
            return Err(ConstraintError::InvalidRange);
        }
        if self.frame_rate == 0 || self.frame_rate > 120 {
            return Err(ConstraintError::InvalidFrameRate);
        }
        if self.frequency == 0 {
            return Err(ConstraintError::InvalidFrequency);
        }
        Ok(())
    }
}

/// Constraint profiles keyed by device class.
///
/// When deserialized, each profile starts from its built-in values and only
/// the keys present in the input replace them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintTable {
    /// Desktop browsers and native hosts.
    pub desktop: ConstraintProfile,
    /// Phones and tablets.
    pub mobile: ConstraintProfile,
    /// Phones that need a lighter decode load.
    pub high_frequency_mobile: ConstraintProfile,
}

/// Partial profile as written in a config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ProfileOverride {
    width: Option<Range>,
    height: Option<Range>,
    frame_rate: Option<u32>,
    frequency: Option<u32>,
    patch_size: Option<PatchSize>,
    continuous_focus: Option<bool>,
}

impl ProfileOverride {
    fn apply(self, base: ConstraintProfile) -> ConstraintProfile {
        ConstraintProfile {
            width: self.width.unwrap_or(base.width),
            height: self.height.unwrap_or(base.height),
            frame_rate: self.frame_rate.unwrap_or(base.frame_rate),
            frequency: self.frequency.unwrap_or(base.frequency),
            patch_size: self.patch_size.unwrap_or(base.patch_size),
            continuous_focus: self.continuous_focus.unwrap_or(base.continuous_focus),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TableOverride {
    desktop: ProfileOverride,
    mobile: ProfileOverride,
    high_frequency_mobile: ProfileOverride,
}

impl<'de> Deserialize<'de> for ConstraintTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let table = TableOverride::deserialize(deserializer)?;
        Ok(Self {
            desktop: table.desktop.apply(ConstraintProfile::desktop()),
            mobile: table.mobile.apply(ConstraintProfile::mobile()),
            high_frequency_mobile: table
                .high_frequency_mobile
                .apply(ConstraintProfile::high_frequency_mobile()),
        })
    }
}

impl Default for ConstraintTable {
    fn default() -> Self {
        Self {
            desktop: ConstraintProfile::desktop(),
            mobile: ConstraintProfile::mobile(),
            high_frequency_mobile: ConstraintProfile::high_frequency_mobile(),
        }
    }
}

impl ConstraintTable {
    /// Looks up the profile for a device class.
    pub fn profile(&self, class: DeviceClass) -> &ConstraintProfile {
        match class {
            DeviceClass::Desktop => &self.desktop,
            DeviceClass::Mobile => &self.mobile,
            DeviceClass::HighFrequencyMobile => &self.high_frequency_mobile,
        }
    }

    /// Validates every profile in the table.
    pub fn validate(&self) -> Result<(), ConstraintError> {
        self.desktop.validate()?;
        self.mobile.validate()?;
        self.high_frequency_mobile.validate()
    }
}

/// Constraint validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
    /// A width or height range is empty or out of order.
    #[error("invalid resolution range (need 0 < min <= ideal <= max)")]
    InvalidRange,
    /// Frame rate is zero or above 120.
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    /// Decode frequency is zero.
    #[error("invalid decode frequency (must be at least 1)")]
    InvalidFrequency,
}
