//! Identifier types for templates, capabilities, listeners, and endpoints.

use serde::{Deserialize, Serialize};

/// Unique identifier for a stock-unit template.
///
/// Template ids are free-form strings supplied by the content catalog.
/// Comparison is exact; the catalog normalizes (trims and lowercases)
/// before storing or resolving, so ids created through [`TemplateId::new`]
/// should already be in normalized form when used as catalog keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(String);

impl TemplateId {
    /// Creates a template id from a raw string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a normalized template id (trimmed, ASCII-lowercased).
    #[must_use]
    pub fn normalized(id: &str) -> Self {
        Self(id.trim().to_ascii_lowercase())
    }

    /// Returns the raw id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Stable type tag for a capability module.
///
/// Doubles as the save-data key for the capability's payload, so the tag
/// string must never change once save data exists for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CapabilityTag(pub &'static str);

impl CapabilityTag {
    /// Returns the tag string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for CapabilityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Handle to a subscribed listener, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Creates a listener id from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Identifier for a storage endpoint registered with the transfer system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(u32);

impl EndpointId {
    /// Creates an endpoint id from a raw value.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}
