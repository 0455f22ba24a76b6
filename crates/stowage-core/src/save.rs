//! Save-data structures for stock units and inventories.
//!
//! The on-disk encoding is an ordered sequence of per-container records;
//! grid inventories additionally carry their dimensions. Capability
//! payloads are free-form JSON values keyed by the capability tag, so
//! each capability owns its own payload schema. Records whose template
//! id is no longer in the catalog are skipped on restore, which keeps
//! old saves loadable after content removals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stowage_common::SchemaVersion;
use thiserror::Error;

/// Errors that can occur while restoring save data.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The data was written by an incompatible format version.
    #[error("incompatible save version: expected {expected}, found {found}")]
    IncompatibleVersion {
        /// Version this build writes
        expected: SchemaVersion,
        /// Version found in the data
        found: SchemaVersion,
    },

    /// Encoding or decoding the opaque representation failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for save operations.
pub type SaveResult<T> = Result<T, SaveError>;

/// Saved state of one stock unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedUnit {
    /// Template id the unit was created from
    pub template_id: String,
    /// Capability payloads keyed by capability tag
    pub capabilities: HashMap<String, Value>,
}

/// Saved state of one occupied container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedStack {
    /// The held unit
    pub unit: SavedUnit,
    /// Quantity in the container
    pub amount: u32,
}

/// Saved state of a slot inventory: one record per slot, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSlotInventory {
    /// Format version of this record
    pub version: SchemaVersion,
    /// Per-slot contents; `None` for empty slots
    pub slots: Vec<Option<SavedStack>>,
}

/// Saved state of one grid container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedGridStack {
    /// The held unit
    pub unit: SavedUnit,
    /// Quantity in the container
    pub amount: u32,
    /// Origin column
    pub x: i32,
    /// Origin row
    pub y: i32,
}

/// Saved state of a grid inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedGridInventory {
    /// Format version of this record
    pub version: SchemaVersion,
    /// Grid width in cells
    pub width: u32,
    /// Grid height in cells
    pub height: u32,
    /// Occupied containers with their origins
    pub stacks: Vec<SavedGridStack>,
}

/// Saved state of an unbounded inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedUnboundedInventory {
    /// Format version of this record
    pub version: SchemaVersion,
    /// Occupied containers, in order
    pub stacks: Vec<SavedStack>,
}

/// Gate helper: checks a record's version against the current format.
pub(crate) fn check_version(found: SchemaVersion) -> SaveResult<()> {
    let expected = SchemaVersion::INVENTORY_SAVE;
    if expected.can_read(&found) {
        Ok(())
    } else {
        Err(SaveError::IncompatibleVersion { expected, found })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_gate() {
        assert!(check_version(SchemaVersion::new(1, 0, 0)).is_ok());
        let err = check_version(SchemaVersion::new(9, 0, 0));
        assert!(matches!(
            err,
            Err(SaveError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_saved_slot_inventory_json_round_trip() {
        let saved = SavedSlotInventory {
            version: SchemaVersion::INVENTORY_SAVE,
            slots: vec![
                Some(SavedStack {
                    unit: SavedUnit {
                        template_id: "thing1".into(),
                        capabilities: HashMap::new(),
                    },
                    amount: 12,
                }),
                None,
            ],
        };

        let text = serde_json::to_string(&saved).expect("encodes");
        let back: SavedSlotInventory = serde_json::from_str(&text).expect("decodes");
        assert_eq!(back.slots.len(), 2);
        assert_eq!(back.slots[0].as_ref().map(|s| s.amount), Some(12));
        assert!(back.slots[1].is_none());
    }
}
