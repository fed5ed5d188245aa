//! Name and placement helpers
//!
//! The hub app only lets users pick a placement icon for open/close sensors
//! (door, window, other...). Users who want something more specific encode it
//! in the device name as a bracketed tag, e.g. `"[garage_door] Workshop"`.

use std::fmt;

/// Split a custom name into the display name and an optional bracketed tag
///
/// `"[door] Front"` becomes `("Front", Some("door"))`; a name without a
/// complete bracket pair is returned unchanged with no tag.
pub fn split_name_location(full_name: &str) -> (String, Option<String>) {
    match (full_name.find('['), full_name.find(']')) {
        (Some(open), Some(close)) if open < close => {
            let tag = full_name[open + 1..close].to_string();
            let name = full_name[close + 1..].trim().to_string();
            (name, Some(tag))
        }
        _ => (full_name.to_string(), None),
    }
}

/// What kind of opening an open/close sensor is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpeningKind {
    Door,
    Window,
    GarageDoor,
    Opening,
}

impl OpeningKind {
    /// Classify a sensor from its placement icon and optional name tag
    pub fn from_placement(location: Option<&str>, custom_location: Option<&str>) -> Self {
        match location {
            Some("placement_door") => OpeningKind::Door,
            Some("placement_window") => OpeningKind::Window,
            Some("placement_other") => custom_location
                .and_then(OpeningKind::from_tag)
                .unwrap_or(OpeningKind::Opening),
            Some("placement_cabinet") | Some("placement_wardrobe") => OpeningKind::Opening,
            other => {
                tracing::debug!(
                    "unknown placement: {:?} ({:?})",
                    other,
                    custom_location
                );
                OpeningKind::Opening
            }
        }
    }

    /// Parse a user-supplied tag, case-insensitively
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "door" => Some(OpeningKind::Door),
            "window" => Some(OpeningKind::Window),
            "garage_door" => Some(OpeningKind::GarageDoor),
            "opening" => Some(OpeningKind::Opening),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpeningKind::Door => "door",
            OpeningKind::Window => "window",
            OpeningKind::GarageDoor => "garage_door",
            OpeningKind::Opening => "opening",
        }
    }
}

impl fmt::Display for OpeningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
