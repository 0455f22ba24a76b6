//! # Stowage Core
//!
//! In-memory stock-unit storage engine.
//!
//! This crate provides the full storage model and the transfer
//! protocol:
//! - Templates and composable per-unit capability modules
//! - The process-wide template catalog
//! - Stock units with a destroy lifecycle and merge arithmetic
//! - Containers, plus slot, grid, and unbounded inventories
//! - Feasibility overlays for check-before-commit batch queries
//! - The drag-and-drop transfer state machine and endpoint adapters
//! - Reentrancy-safe listener registries and save-data structures

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod capability;
pub mod catalog;
pub mod container;
pub mod events;
pub mod feasibility;
pub mod grid_inventory;
pub mod listener;
pub mod save;
pub mod slot_inventory;
pub mod template;
pub mod transfer;
pub mod unbounded;
pub mod unit;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::capability::*;
    pub use crate::container::*;
    pub use crate::events::*;
    pub use crate::feasibility::*;
    pub use crate::grid_inventory::*;
    pub use crate::listener::*;
    pub use crate::save::*;
    pub use crate::slot_inventory::*;
    pub use crate::template::*;
    pub use crate::transfer::*;
    pub use crate::unbounded::*;
    pub use crate::unit::*;
}

pub use prelude::*;
