//! Camera devices and coarse device classification.

use serde::{Deserialize, Serialize};

/// Label fragments that identify a rear-facing camera.
const REAR_HINTS: [&str; 3] = ["back", "rear", "environment"];

/// Label fragments that identify a front-facing camera.
const FRONT_HINTS: [&str; 2] = ["front", "user"];

/// User-agent fragments that identify a phone or tablet.
const MOBILE_AGENTS: [&str; 8] = [
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "iemobile",
    "opera mini",
];

/// Heuristic facing direction derived from a device label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingHint {
    /// Environment-facing camera.
    Rear,
    /// User-facing camera.
    Front,
    /// Label gives no hint.
    Unknown,
}

impl FacingHint {
    /// Classifies a platform-reported label.
    ///
    /// Matching is case-insensitive; rear hints win over front hints.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if REAR_HINTS.iter().any(|hint| label.contains(hint)) {
            FacingHint::Rear
        } else if FRONT_HINTS.iter().any(|hint| label.contains(hint)) {
            FacingHint::Front
        } else {
            FacingHint::Unknown
        }
    }
}

/// A camera as enumerated by the platform.
///
/// Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDevice {
    /// Platform device identifier.
    pub id: String,
    /// Human-readable label. Empty when the platform withholds labels.
    pub label: String,
    /// Facing direction guessed from the label.
    pub facing: FacingHint,
}

impl CameraDevice {
    /// Creates a device, deriving the facing hint from the label.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: id.into(),
            facing: FacingHint::from_label(&label),
            label,
        }
    }

    /// Returns true if the label suggests a rear-facing camera.
    pub fn is_rear(&self) -> bool {
        self.facing == FacingHint::Rear
    }

    /// Label suitable for display, with a fallback for unlabeled devices.
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            let prefix: String = self.id.chars().take(8).collect();
            format!("Camera {}...", prefix)
        } else {
            self.label.clone()
        }
    }
}

/// Coarse device class used to pick capture constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Desktop or laptop.
    #[default]
    Desktop,
    /// Phone or tablet.
    Mobile,
    /// Phones that need a lower frame rate and decode frequency to stay stable.
    HighFrequencyMobile,
}

impl DeviceClass {
    /// Classifies a host from its user-agent string.
    pub fn classify(user_agent: &str) -> Self {
        let agent = user_agent.to_lowercase();
        if agent.contains("iphone") {
            DeviceClass::HighFrequencyMobile
        } else if MOBILE_AGENTS.iter().any(|hint| agent.contains(hint)) {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

impl std::str::FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "desktop" => Ok(DeviceClass::Desktop),
            "mobile" => Ok(DeviceClass::Mobile),
            "high-frequency-mobile" => Ok(DeviceClass::HighFrequencyMobile),
            other => Err(format!("unknown device class: {}", other)),
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DeviceClass::Desktop => "desktop",
            DeviceClass::Mobile => "mobile",
            DeviceClass::HighFrequencyMobile => "high-frequency-mobile",
        };
        f.write_str(name)
    }
}
