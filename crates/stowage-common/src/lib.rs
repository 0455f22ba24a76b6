//! # Stowage Common
//!
//! Common types and shared abstractions for the Stowage storage engine.
//!
//! This crate provides the foundational value types used across the
//! engine crates:
//! - Identifier types (template ids, capability tags, listener/endpoint ids)
//! - Grid cell coordinates and footprints
//! - Schema version information for save data

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_pos_offset() {
        let pos = CellPos::new(2, 1).offset(1, 2);
        assert_eq!(pos, CellPos::new(3, 3));
    }

    #[test]
    fn test_template_id_display() {
        let id = TemplateId::new("copper_wire");
        assert_eq!(id.to_string(), "copper_wire");
    }
}
