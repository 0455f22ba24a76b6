//! Event payload types broadcast by containers, inventories, and the
//! transfer system.
//!
//! Payloads are self-contained snapshots: they carry ids, amounts, and
//! positions rather than references back into the storage that emitted
//! them, so listeners never need to re-enter the emitter to interpret an
//! event.

use serde::{Deserialize, Serialize};
use stowage_common::{CellPos, Footprint, TemplateId};

/// A container's contents changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerChanged {
    /// Template now held, or `None` if the container emptied
    pub template: Option<TemplateId>,
    /// Quantity now held
    pub amount: u32,
}

/// An inventory's aggregate contents changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ContentChanged;

/// A slot was appended to or removed from a slot inventory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlotCountChanged {
    /// Index of the affected slot
    pub index: usize,
}

/// A grid inventory was resized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridSizeChanged {
    /// New width in cells
    pub width: u32,
    /// New height in cells
    pub height: u32,
}

/// A grid stack was added, removed, or repositioned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridStackEvent {
    /// Template of the stack
    pub template: TemplateId,
    /// Quantity of the stack
    pub amount: u32,
    /// Origin cell of the footprint
    pub origin: CellPos,
    /// Extent of the footprint
    pub footprint: Footprint,
}

/// A stock unit finished or is about to finish its destroy lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitDestroyed {
    /// Template of the destroyed unit
    pub template: TemplateId,
}

/// A transfer finished, successfully or not.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// True when the transfer committed
    pub committed: bool,
}
