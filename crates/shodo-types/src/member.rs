//! Member identity and display properties.
//!
//! A `Member` records a collaborating editor: the wire-visible id plus the
//! display properties other replicas render (name, color, avatar). Members
//! are created by `AddMember` operations and looked up through the member
//! registry keyed by [`MemberId`].

use serde::{Deserialize, Serialize};

use crate::ids::MemberId;

/// Display properties for a member.
///
/// Carried inside `AddMember` / `UpdateMember` opspecs with camelCase field
/// names on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProperties {
    /// Human-readable display name.
    #[serde(default)]
    pub full_name: String,
    /// Cursor / caret color (CSS color string).
    #[serde(default)]
    pub color: String,
    /// Avatar image URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl MemberProperties {
    /// Merge another property set into this one. Present fields win;
    /// absent/empty fields leave the current value alone.
    pub fn merge(&mut self, other: &MemberProperties) {
        if !other.full_name.is_empty() {
            self.full_name = other.full_name.clone();
        }
        if !other.color.is_empty() {
            self.color = other.color.clone();
        }
        if other.image_url.is_some() {
            self.image_url = other.image_url.clone();
        }
    }
}

/// A collaborating editor identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Wire-visible member id (`"alice_1"`).
    pub id: MemberId,
    /// Display properties.
    pub properties: MemberProperties,
}

impl Member {
    /// Create a member record.
    pub fn new(id: MemberId, properties: MemberProperties) -> Self {
        Self { id, properties }
    }

    /// Display string: full name when set, otherwise the member id.
    pub fn display_name(&self) -> &str {
        if self.properties.full_name.is_empty() {
            self.id.as_str()
        } else {
            &self.properties.full_name
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
