//! Disposable simulated-occupancy overlays for check-before-commit
//! queries.
//!
//! An overlay is cloned from an inventory's real occupancy, then the
//! add algorithm is replayed against it, mutating only simulated
//! amounts. This is what makes multi-template "can all of these fit
//! together" queries sound: each request in a batch sees the space the
//! previous requests already claimed.

use std::sync::Arc;

use stowage_common::CellPos;

use crate::template::Template;

/// A simulated stack: template plus simulated quantity.
#[derive(Debug, Clone)]
pub struct SimulatedStack {
    /// Template of the simulated stack
    pub template: Arc<Template>,
    /// Simulated quantity
    pub amount: u32,
}

/// Simulated occupancy of a grid inventory.
///
/// Cells index into a shared stack list, so every cell of a multi-cell
/// footprint observes the same simulated amount, exactly like the real
/// occupancy map.
#[derive(Debug)]
pub struct GridOverlay {
    width: u32,
    height: u32,
    cells: Vec<Option<usize>>,
    stacks: Vec<SimulatedStack>,
}

impl GridOverlay {
    /// Creates an empty overlay of the given dimensions.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; (width * height) as usize],
            stacks: Vec::new(),
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, pos: CellPos) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    /// Checks whether a cell lies inside the overlay.
    #[must_use]
    pub const fn in_bounds(&self, pos: CellPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Checks whether a cell is unoccupied. Out-of-bounds cells count as
    /// occupied.
    #[must_use]
    pub fn is_empty(&self, pos: CellPos) -> bool {
        self.in_bounds(pos) && self.cells[self.index(pos)].is_none()
    }

    /// The simulated stack covering a cell, if any.
    #[must_use]
    pub fn stack_at(&self, pos: CellPos) -> Option<&SimulatedStack> {
        if !self.in_bounds(pos) {
            return None;
        }
        self.cells[self.index(pos)].map(|i| &self.stacks[i])
    }

    fn stack_at_mut(&mut self, pos: CellPos) -> Option<&mut SimulatedStack> {
        if !self.in_bounds(pos) {
            return None;
        }
        let index = self.index(pos);
        self.cells[index].map(|i| &mut self.stacks[i])
    }

    /// Marks a footprint as occupied by a new simulated stack. Every
    /// covered cell shares the stack. Used both when seeding the overlay
    /// from real occupancy and when the simulation places a stack.
    pub fn place(&mut self, template: &Arc<Template>, amount: u32, origin: CellPos) {
        let footprint = template.default_footprint();
        self.place_with_footprint(template, amount, origin, footprint.width, footprint.height);
    }

    /// Marks an explicit extent as occupied by a new simulated stack.
    pub fn place_with_footprint(
        &mut self,
        template: &Arc<Template>,
        amount: u32,
        origin: CellPos,
        width: u32,
        height: u32,
    ) {
        let stack_index = self.stacks.len();
        self.stacks.push(SimulatedStack {
            template: Arc::clone(template),
            amount,
        });
        for dy in 0..height as i32 {
            for dx in 0..width as i32 {
                let pos = origin.offset(dx, dy);
                if self.in_bounds(pos) {
                    let index = self.index(pos);
                    self.cells[index] = Some(stack_index);
                }
            }
        }
    }
}

/// Replays the grid add algorithm against an overlay.
///
/// Scans anchors row-major, merging into same-template stacks up to the
/// stack cap and placing new stacks into free footprints. Returns true
/// when the full amount is absorbed; the overlay keeps the mutations
/// either way.
pub fn simulate_grid_add(
    overlay: &mut GridOverlay,
    template: &Arc<Template>,
    amount: u32,
) -> bool {
    let footprint = template.default_footprint();
    let max_stack = template.max_stack();
    let mut remaining = amount;

    'rows: for y in 0..overlay.height() as i32 {
        if overlay.height() as i32 - y < footprint.height as i32 {
            break;
        }
        for x in 0..overlay.width() as i32 {
            if overlay.width() as i32 - x < footprint.width as i32 {
                break;
            }
            if remaining == 0 {
                break 'rows;
            }
            let anchor = CellPos::new(x, y);
            if overlay.is_empty(anchor) {
                let free = footprint.cells(anchor).all(|cell| overlay.is_empty(cell));
                if free {
                    let placing = remaining.min(max_stack);
                    overlay.place(template, placing, anchor);
                    remaining -= placing;
                }
            } else if let Some(stack) = overlay.stack_at_mut(anchor) {
                if stack.template.id() == template.id() {
                    let space = max_stack.saturating_sub(stack.amount);
                    let absorbed = space.min(remaining);
                    stack.amount += absorbed;
                    remaining -= absorbed;
                }
            }
        }
    }

    remaining == 0
}

/// Simulated occupancy of a slot inventory.
#[derive(Debug)]
pub struct SlotOverlay {
    slots: Vec<Option<SimulatedStack>>,
}

impl SlotOverlay {
    /// Creates an overlay with the given number of empty slots.
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: vec![None; slot_count],
        }
    }

    /// Seeds a slot with a simulated stack.
    pub fn seed(&mut self, index: usize, template: &Arc<Template>, amount: u32) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(SimulatedStack {
                template: Arc::clone(template),
                amount,
            });
        }
    }

    /// The simulated stack in a slot, if any.
    #[must_use]
    pub fn stack_at(&self, index: usize) -> Option<&SimulatedStack> {
        self.slots.get(index)?.as_ref()
    }
}

/// Replays the linear add algorithm against an overlay: merge pass over
/// same-template stacks, then fill empty slots in order. Returns true
/// when the full amount is absorbed.
pub fn simulate_slot_add(
    overlay: &mut SlotOverlay,
    template: &Arc<Template>,
    amount: u32,
) -> bool {
    let max_stack = template.max_stack();
    let mut remaining = amount;

    for slot in overlay.slots.iter_mut().flatten() {
        if remaining == 0 {
            return true;
        }
        if slot.template.id() == template.id() {
            let space = max_stack.saturating_sub(slot.amount);
            let absorbed = space.min(remaining);
            slot.amount += absorbed;
            remaining -= absorbed;
        }
    }

    for slot in &mut overlay.slots {
        if remaining == 0 {
            return true;
        }
        if slot.is_none() {
            let placing = remaining.min(max_stack);
            *slot = Some(SimulatedStack {
                template: Arc::clone(template),
                amount: placing,
            });
            remaining -= placing;
        }
    }

    remaining == 0
}
