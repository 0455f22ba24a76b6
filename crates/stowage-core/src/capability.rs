//! Composable capability modules carried by stock units.
//!
//! A template declares a set of capability prototypes; every stock unit
//! created from it receives its own private clones. Capabilities are
//! identified by a stable [`CapabilityTag`], which doubles as the
//! save-data key for the capability's payload.

use std::any::Any;

use serde_json::{json, Value};
use stowage_common::{CapabilityTag, Footprint};

/// A typed, polymorphic unit of per-instance stock-unit state.
///
/// Implementations must be plain data: capability instances are cloned
/// from template prototypes, merged when stacks combine, and serialized
/// through [`Capability::save_data`].
pub trait Capability: std::fmt::Debug + Send + Sync {
    /// Stable type tag; also the save-data key for this capability.
    fn tag(&self) -> CapabilityTag;

    /// Called once after the instance is cloned from its prototype.
    /// `created_new` is false when the unit is being restored from save
    /// data or split off an existing unit.
    fn initialize(&mut self, created_new: bool) {
        let _ = created_new;
    }

    /// Called after every capability of the unit has been initialized.
    fn post_initialize(&mut self) {}

    /// Called while the owning unit is being destroyed.
    fn on_destroy(&mut self) {}

    /// Folds this instance's state into `target` when `merging_amount`
    /// units join a stack of `base_amount` units carried by `target`'s
    /// owner. The default implementation carries no mergeable state.
    fn merge_into(&self, target: &mut dyn Capability, base_amount: u32, merging_amount: u32) {
        let _ = (target, base_amount, merging_amount);
    }

    /// Clones this instance behind a box.
    fn boxed_clone(&self) -> Box<dyn Capability>;

    /// Produces the save payload, or `None` if the capability carries no
    /// savable state.
    fn save_data(&self) -> Option<Value> {
        None
    }

    /// Restores state from a save payload previously produced by
    /// [`Capability::save_data`].
    fn load_saved(&mut self, data: &Value) {
        let _ = data;
    }

    /// Upcast for typed lookup.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed lookup.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Wear state that merges by amount-weighted average, conserving the
/// aggregate durability of the combined stack.
#[derive(Debug, Clone)]
pub struct Durability {
    start: f32,
    max: f32,
    value: f32,
}

impl Durability {
    /// Stable tag / save key.
    pub const TAG: CapabilityTag = CapabilityTag("durability");

    /// Creates a durability capability with the given starting and
    /// maximum values.
    #[must_use]
    pub fn new(start: f32, max: f32) -> Self {
        let max = max.max(0.0);
        Self {
            start: start.clamp(0.0, max),
            max,
            value: 0.0,
        }
    }

    /// Current durability.
    #[must_use]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Maximum durability.
    #[must_use]
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Sets the current durability, clamped to `[0, max]`.
    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(0.0, self.max);
    }

    /// Subtracts wear from the current durability.
    pub fn apply_wear(&mut self, wear: f32) {
        self.set_value(self.value - wear);
    }

    /// Checks whether durability has reached zero.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.value <= 0.0
    }
}

impl Capability for Durability {
    fn tag(&self) -> CapabilityTag {
        Self::TAG
    }

    fn initialize(&mut self, created_new: bool) {
        if created_new {
            self.value = self.start;
        }
    }

    fn merge_into(&self, target: &mut dyn Capability, base_amount: u32, merging_amount: u32) {
        let Some(target) = target.as_any_mut().downcast_mut::<Durability>() else {
            tracing::error!(tag = %Self::TAG, "durability merge target has a different capability type");
            return;
        };
        let total = base_amount + merging_amount;
        if total == 0 {
            return;
        }
        let aggregate =
            base_amount as f32 * target.value + merging_amount as f32 * self.value;
        target.set_value(aggregate / total as f32);
    }

    fn boxed_clone(&self) -> Box<dyn Capability> {
        Box::new(self.clone())
    }

    fn save_data(&self) -> Option<Value> {
        Some(json!(self.value))
    }

    fn load_saved(&mut self, data: &Value) {
        match data.as_f64() {
            Some(value) => self.set_value(value as f32),
            None => self.value = 0.0,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-instance 2D cell extent for grid inventories.
#[derive(Debug, Clone)]
pub struct FootprintSize {
    start: Footprint,
    size: Footprint,
}

impl FootprintSize {
    /// Stable tag / save key.
    pub const TAG: CapabilityTag = CapabilityTag("footprint");

    /// Creates a footprint capability with the given starting extent.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        let start = Footprint::new(width, height);
        Self { start, size: start }
    }

    /// The template-declared starting extent.
    #[must_use]
    pub fn start(&self) -> Footprint {
        self.start
    }

    /// Current extent of this instance.
    #[must_use]
    pub fn size(&self) -> Footprint {
        self.size
    }

    /// Sets the current extent (both axes clamped to at least one cell).
    pub fn set_size(&mut self, size: Footprint) {
        self.size = Footprint::new(size.width, size.height);
    }
}

impl Capability for FootprintSize {
    fn tag(&self) -> CapabilityTag {
        Self::TAG
    }

    fn initialize(&mut self, created_new: bool) {
        if created_new {
            self.size = self.start;
        }
    }

    fn boxed_clone(&self) -> Box<dyn Capability> {
        Box::new(self.clone())
    }

    fn save_data(&self) -> Option<Value> {
        Some(json!([self.size.width, self.size.height]))
    }

    fn load_saved(&mut self, data: &Value) {
        let extent = data.as_array().and_then(|parts| {
            let width = parts.first()?.as_u64()?;
            let height = parts.get(1)?.as_u64()?;
            Some(Footprint::new(width as u32, height as u32))
        });
        self.size = extent.unwrap_or(self.start);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// One key/value entry of a [`StaticValues`] capability.
#[derive(Debug, Clone)]
pub struct StaticEntry {
    /// Entry key
    pub key: String,
    /// Raw string value
    pub value: String,
}

/// Immutable string key/value metadata with typed parsed getters.
#[derive(Debug, Clone, Default)]
pub struct StaticValues {
    entries: Vec<StaticEntry>,
}

impl StaticValues {
    /// Stable tag / save key.
    pub const TAG: CapabilityTag = CapabilityTag("static_values");

    /// Creates an empty static-value set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry (builder style).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push(StaticEntry {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Looks up the raw string value for a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Looks up and parses an integer value.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.parse().ok()
    }

    /// Looks up and parses a floating-point value.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.parse().ok()
    }

    /// Looks up and parses a boolean value.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.parse().ok()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the set has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Capability for StaticValues {
    fn tag(&self) -> CapabilityTag {
        Self::TAG
    }

    fn boxed_clone(&self) -> Box<dyn Capability> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Static fuel value for templates usable as burner input.
#[derive(Debug, Clone)]
pub struct Fuel {
    value: u32,
}

impl Fuel {
    /// Stable tag / save key.
    pub const TAG: CapabilityTag = CapabilityTag("fuel");

    /// Creates a fuel capability with the given energy value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self { value }
    }

    /// Energy value of one unit.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }
}

impl Capability for Fuel {
    fn tag(&self) -> CapabilityTag {
        Self::TAG
    }

    fn boxed_clone(&self) -> Box<dyn Capability> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Marker capability for templates that can be actively used.
#[derive(Debug, Clone, Default)]
pub struct Usable;

impl Usable {
    /// Stable tag / save key.
    pub const TAG: CapabilityTag = CapabilityTag("usable");

    /// Creates the marker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Capability for Usable {
    fn tag(&self) -> CapabilityTag {
        Self::TAG
    }

    fn boxed_clone(&self) -> Box<dyn Capability> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
