//! Two-dimensional grid storage with multi-cell footprints.
//!
//! The inventory owns a sparse list of grid containers plus a dense
//! cell → container map. The map is a cache: it is always derivable
//! from the list and is rebuilt wholesale on resize, restore, and
//! container removal. No two containers' footprints ever overlap.

use std::sync::Arc;

use stowage_common::{CellPos, Footprint, SchemaVersion, TemplateId};
use thiserror::Error;

use crate::container::{AddResult, GridContainer, GridStackInfo};
use crate::events::{ContentChanged, GridSizeChanged, GridStackEvent};
use crate::feasibility::{simulate_grid_add, GridOverlay};
use crate::listener::ListenerSet;
use crate::save::{check_version, SavedGridInventory, SavedGridStack, SaveResult};
use crate::template::{AcceptRule, Template};
use crate::unit::StockUnit;

/// Errors for grid operations that must fail loudly.
#[derive(Debug, Error)]
pub enum GridError {
    /// A shrink would remove more rows/columns than exist.
    #[error("cannot remove {requested} of {available} rows/columns")]
    ShrinkExceedsSize {
        /// Rows/columns requested for removal
        requested: u32,
        /// Rows/columns present
        available: u32,
    },

    /// A shrink would bisect existing stack footprints.
    #[error("shrink would split {affected} stack(s); resize rejected")]
    ShrinkWouldSplit {
        /// Number of stacks intersecting the removed band
        affected: usize,
    },
}

/// Result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;

/// A width × height cell grid of multi-cell stacks.
#[derive(Debug)]
pub struct GridInventory {
    width: u32,
    height: u32,
    entries: Vec<GridContainer>,
    cells: Vec<Option<usize>>,
    accept: AcceptRule,
    content_changed: ListenerSet<ContentChanged>,
    size_changed: ListenerSet<GridSizeChanged>,
    stack_added: ListenerSet<GridStackEvent>,
    stack_removed: ListenerSet<GridStackEvent>,
    stack_moved: ListenerSet<GridStackEvent>,
}

impl GridInventory {
    /// Creates a grid accepting every template. Zero dimensions are a
    /// reported misuse and are clamped to one cell.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_accept_rule(width, height, AcceptRule::Any)
    }

    /// Creates a grid with an accept rule.
    #[must_use]
    pub fn with_accept_rule(width: u32, height: u32, accept: AcceptRule) -> Self {
        if width == 0 || height == 0 {
            tracing::error!(width, height, "grid dimensions must be positive; clamping to 1");
        }
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            entries: Vec::new(),
            cells: vec![None; (width * height) as usize],
            accept,
            content_changed: ListenerSet::new(),
            size_changed: ListenerSet::new(),
            stack_added: ListenerSet::new(),
            stack_removed: ListenerSet::new(),
            stack_moved: ListenerSet::new(),
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

    /// Number of cells.
    #[must_use]
    pub const fn cell_count(&self) -> u32 {
        self.width * self.height
    }

    /// Number of stacks.
    #[must_use]
    pub fn stack_count(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether a cell lies inside the grid.
    #[must_use]
    pub const fn is_pos_valid(&self, pos: CellPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Checks whether a cell is unoccupied. Out-of-bounds cells count
    /// as occupied.
    #[must_use]
    pub fn is_empty(&self, pos: CellPos) -> bool {
        self.is_pos_valid(pos) && self.cells[self.cell_index(pos)].is_none()
    }

    /// Checks whether the accept rule admits a template.
    #[must_use]
    pub fn accepts(&self, template: &Template) -> bool {
        self.accept.admits(template)
    }

    fn cell_index(&self, pos: CellPos) -> usize {
        pos.y as usize * self.width as usize + pos.x as usize
    }

    fn entry_index_at(&self, pos: CellPos) -> Option<usize> {
        if !self.is_pos_valid(pos) {
            return None;
        }
        self.cells[self.cell_index(pos)]
    }

    /// View of the stack covering a cell, if any.
    #[must_use]
    pub fn stack_at(&self, pos: CellPos) -> Option<GridStackInfo> {
        self.entry_index_at(pos)
            .and_then(|i| self.entries[i].stack_info())
    }

    /// The unit held by the stack covering a cell, if any.
    #[must_use]
    pub fn unit_at(&self, pos: CellPos) -> Option<&StockUnit> {
        self.entry_index_at(pos)
            .and_then(|i| self.entries[i].container().unit())
    }

    /// View of the nth stack. An out-of-range index is a reported
    /// misuse.
    #[must_use]
    pub fn stack_info_at(&self, index: usize) -> Option<GridStackInfo> {
        let info = self.entries.get(index).and_then(GridContainer::stack_info);
        if info.is_none() {
            tracing::error!(index, stacks = self.entries.len(), "stack index out of range");
        }
        info
    }

    /// First unoccupied cell in row-major order, if any.
    #[must_use]
    pub fn first_empty_pos(&self) -> Option<CellPos> {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let pos = CellPos::new(x, y);
                if self.is_empty(pos) {
                    return Some(pos);
                }
            }
        }
        None
    }

    fn occupy(&mut self, index: usize) {
        let origin = self.entries[index].origin();
        let footprint = self.entries[index].footprint();
        for cell in footprint.cells(origin) {
            if !self.is_pos_valid(cell) {
                tracing::error!(%cell, "footprint cell out of bounds while occupying");
                continue;
            }
            let slot = self.cell_index(cell);
            if self.cells[slot].is_some() {
                tracing::error!(%cell, "footprint overlap while occupying");
                continue;
            }
            self.cells[slot] = Some(index);
        }
    }

    fn vacate(&mut self, index: usize) {
        let origin = self.entries[index].origin();
        let footprint = self.entries[index].footprint();
        for cell in footprint.cells(origin) {
            if self.is_pos_valid(cell) {
                let slot = self.cell_index(cell);
                if self.cells[slot] == Some(index) {
                    self.cells[slot] = None;
                }
            }
        }
    }

    fn rebuild_cells(&mut self) {
        self.cells = vec![None; (self.width * self.height) as usize];
        for index in 0..self.entries.len() {
            self.occupy(index);
        }
    }

    fn footprint_free(&self, origin: CellPos, footprint: Footprint) -> bool {
        footprint.cells(origin).all(|cell| self.is_empty(cell))
    }

    fn push_entry(&mut self, origin: CellPos, unit: StockUnit, amount: u32) {
        let entry = GridContainer::new(origin, unit, amount);
        let event = entry.stack_info().map(|info| GridStackEvent {
            template: info.template.id().clone(),
            amount: info.amount,
            origin: info.origin,
            footprint: info.footprint,
        });
        let index = self.entries.len();
        self.entries.push(entry);
        self.occupy(index);
        if let Some(event) = event {
            self.stack_added.emit(&event);
        }
    }

    fn remove_entry(&mut self, index: usize, destroy: bool) -> Option<(StockUnit, u32)> {
        let mut entry = self.entries.remove(index);
        let event = entry.stack_info().map(|info| GridStackEvent {
            template: info.template.id().clone(),
            amount: info.amount,
            origin: info.origin,
            footprint: info.footprint,
        });
        let taken = if destroy {
            entry.container_mut().destroy_contents();
            None
        } else {
            entry.container_mut().take()
        };
        self.rebuild_cells();
        if let Some(event) = event {
            self.stack_removed.emit(&event);
        }
        taken
    }

    fn two_entries_mut(
        &mut self,
        a: usize,
        b: usize,
    ) -> (&mut GridContainer, &mut GridContainer) {
        debug_assert_ne!(a, b);
        if a < b {
            let (left, right) = self.entries.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.entries.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    /// Simulated overlay of current occupancy.
    #[must_use]
    pub fn overlay(&self) -> GridOverlay {
        let mut overlay = GridOverlay::new(self.width, self.height);
        for entry in &self.entries {
            if let Some(info) = entry.stack_info() {
                overlay.place_with_footprint(
                    &info.template,
                    info.amount,
                    info.origin,
                    info.footprint.width,
                    info.footprint.height,
                );
            }
        }
        overlay
    }

    /// Checks whether `amount` units of a template would fit somewhere.
    #[must_use]
    pub fn can_add(&self, template: &Arc<Template>, amount: u32) -> bool {
        self.accepts(template) && simulate_grid_add(&mut self.overlay(), template, amount)
    }

    /// Checks whether a batch of template/amount requests fits
    /// *together*: every request is replayed against one shared overlay
    /// and the whole batch is rejected as soon as one request cannot be
    /// fully absorbed.
    #[must_use]
    pub fn can_add_all(&self, requests: &[(Arc<Template>, u32)]) -> bool {
        let mut overlay = self.overlay();
        requests.iter().all(|(template, amount)| {
            self.accepts(template) && simulate_grid_add(&mut overlay, template, *amount)
        })
    }

    /// Checks whether `amount` units of a template fit at one origin:
    /// a free footprint taking the whole request as one stack, or a
    /// same-template merge within the stack cap.
    #[must_use]
    pub fn can_add_to_pos(&self, pos: CellPos, template: &Template, amount: u32) -> bool {
        if amount == 0 || !self.accepts(template) {
            return false;
        }
        let footprint = template.default_footprint();
        let far = pos.offset(footprint.width as i32 - 1, footprint.height as i32 - 1);
        if !self.is_pos_valid(pos) || !self.is_pos_valid(far) {
            return false;
        }
        match self.entry_index_at(pos) {
            None => self.footprint_free(pos, footprint) && amount <= template.max_stack(),
            Some(index) => {
                let container = self.entries[index].container();
                container.template_id() == Some(template.id())
                    && container.amount() + amount <= template.max_stack()
            }
        }
    }

    fn add_at_anchor(&mut self, anchor: CellPos, unit: StockUnit, amount: u32) -> AddResult {
        match self.entry_index_at(anchor) {
            None => {
                let footprint = unit.footprint();
                if !self.footprint_free(anchor, footprint) {
                    return AddResult::rejected(unit, amount);
                }
                let placing = amount.min(unit.template().max_stack());
                if placing == amount {
                    self.push_entry(anchor, unit, placing);
                    return AddResult::complete();
                }
                let Some(split) = unit.clone_unit() else {
                    return AddResult::rejected(unit, amount);
                };
                self.push_entry(anchor, split, placing);
                AddResult {
                    leftover: amount - placing,
                    remainder: Some(unit),
                }
            }
            Some(index) => {
                let entry = &mut self.entries[index];
                if entry.container().template_id() != Some(unit.template_id()) {
                    return AddResult::rejected(unit, amount);
                }
                let max_stack = unit.template().max_stack();
                let space = max_stack.saturating_sub(entry.container().amount());
                if space == 0 {
                    return AddResult::rejected(unit, amount);
                }
                let merging = space.min(amount);
                let base = entry.container().amount();
                if let Some(resident) = entry.container_mut().unit_mut() {
                    unit.merge_into(resident, base, merging);
                }
                entry.container_mut().set_amount(base + merging);
                if merging == amount {
                    let mut unit = unit;
                    unit.destroy();
                    return AddResult::complete();
                }
                AddResult {
                    leftover: amount - merging,
                    remainder: Some(unit),
                }
            }
        }
    }

    /// Adds units at the first fitting anchors, scanning row-major.
    /// Merges into same-template stacks and places new stacks into free
    /// footprints, splitting the unit per stack cap.
    pub fn add(&mut self, unit: StockUnit, amount: u32) -> AddResult {
        if amount == 0 {
            return AddResult {
                leftover: 0,
                remainder: Some(unit),
            };
        }
        if !self.accepts(unit.template()) {
            return AddResult::rejected(unit, amount);
        }

        let footprint = unit.footprint();
        let mut current = unit;
        let mut remaining = amount;
        let mut changed = false;

        for y in 0..self.height as i32 {
            if self.height as i32 - y < footprint.height as i32 {
                break;
            }
            for x in 0..self.width as i32 {
                if self.width as i32 - x < footprint.width as i32 {
                    break;
                }
                let result = self.add_at_anchor(CellPos::new(x, y), current, remaining);
                if result.leftover < remaining {
                    changed = true;
                }
                remaining = result.leftover;
                match result.remainder {
                    None => {
                        self.content_changed.emit(&ContentChanged);
                        return AddResult::complete();
                    }
                    Some(unit) => current = unit,
                }
            }
        }

        if changed {
            self.content_changed.emit(&ContentChanged);
        }
        AddResult {
            leftover: remaining,
            remainder: Some(current),
        }
    }

    /// Adds units at one explicit origin only.
    pub fn add_to_pos(&mut self, pos: CellPos, unit: StockUnit, amount: u32) -> AddResult {
        if amount == 0 {
            return AddResult {
                leftover: 0,
                remainder: Some(unit),
            };
        }
        if !self.accepts(unit.template()) {
            return AddResult::rejected(unit, amount);
        }
        let footprint = unit.footprint();
        let far = pos.offset(footprint.width as i32 - 1, footprint.height as i32 - 1);
        if !self.is_pos_valid(pos) || !self.is_pos_valid(far) {
            return AddResult::rejected(unit, amount);
        }
        let result = self.add_at_anchor(pos, unit, amount);
        if result.leftover < amount {
            self.content_changed.emit(&ContentChanged);
        }
        result
    }

    /// Checks whether the stack covering `from` can move (or merge) to
    /// `to`. With `from_as_pivot`, `to` names the cell under the cursor
    /// and the destination origin is offset-corrected by the grab point.
    #[must_use]
    pub fn can_move_item(&self, from: CellPos, to: CellPos, from_as_pivot: bool) -> bool {
        if from == to {
            return true;
        }
        let Some(index) = self.entry_index_at(from) else {
            return false;
        };
        let origin = self.entries[index].origin();
        let footprint = self.entries[index].footprint();
        let new_origin = if from_as_pivot {
            to.offset(origin.x - from.x, origin.y - from.y)
        } else {
            to
        };
        let far = new_origin.offset(footprint.width as i32 - 1, footprint.height as i32 - 1);
        if !self.is_pos_valid(new_origin) || !self.is_pos_valid(far) {
            return false;
        }

        let covering = self.entry_index_at(new_origin);
        if covering.is_none() || covering == Some(index) {
            return footprint.cells(new_origin).all(|cell| {
                self.entry_index_at(cell).is_none() || self.entry_index_at(cell) == Some(index)
            });
        }

        let destination = self.entries[covering.expect("occupied")].container();
        let same_template = destination.template_id() == self.entries[index].container().template_id();
        let has_space = destination
            .template()
            .is_some_and(|t| destination.amount() < t.max_stack());
        same_template && has_space
    }

    /// Moves the stack covering `from` to `to`: a relocation when the
    /// destination footprint is free (or overlaps only itself), else a
    /// merge into the covering stack, leaving any unmerged remainder at
    /// the source. Infeasible moves are reported and leave state
    /// untouched.
    pub fn move_item(&mut self, from: CellPos, to: CellPos, from_as_pivot: bool) {
        if from == to {
            return;
        }
        let Some(index) = self.entry_index_at(from) else {
            tracing::error!(%from, "no stack at move source");
            return;
        };
        let origin = self.entries[index].origin();
        let footprint = self.entries[index].footprint();
        let new_origin = if from_as_pivot {
            to.offset(origin.x - from.x, origin.y - from.y)
        } else {
            to
        };
        let far = new_origin.offset(footprint.width as i32 - 1, footprint.height as i32 - 1);
        if !self.is_pos_valid(new_origin) || !self.is_pos_valid(far) {
            tracing::warn!(%from, %to, "move destination out of bounds");
            return;
        }

        let covering = self.entry_index_at(new_origin);
        if covering.is_none() || covering == Some(index) {
            let free = footprint.cells(new_origin).all(|cell| {
                self.entry_index_at(cell).is_none() || self.entry_index_at(cell) == Some(index)
            });
            if !free {
                tracing::warn!(%from, %to, "move destination footprint is blocked");
                return;
            }
            self.vacate(index);
            self.entries[index].set_origin(new_origin);
            self.occupy(index);
            if let Some(info) = self.entries[index].stack_info() {
                self.stack_moved.emit(&GridStackEvent {
                    template: info.template.id().clone(),
                    amount: info.amount,
                    origin: info.origin,
                    footprint: info.footprint,
                });
            }
            self.content_changed.emit(&ContentChanged);
            return;
        }

        // Destination covered by another stack: merge, remainder stays
        // at the source.
        let dest_index = covering.expect("occupied");
        let (source, destination) = self.two_entries_mut(index, dest_index);
        if source.container().template_id() != destination.container().template_id() {
            return;
        }
        let Some(max_stack) = destination.container().template().map(|t| t.max_stack()) else {
            return;
        };
        let space = max_stack.saturating_sub(destination.container().amount());
        if space == 0 {
            return;
        }
        let source_amount = source.container().amount();
        let merging = space.min(source_amount);
        let base = destination.container().amount();
        {
            let (source_container, destination_container) =
                (source.container(), destination.container_mut());
            if let (Some(donor), Some(resident)) =
                (source_container.unit(), destination_container.unit_mut())
            {
                donor.merge_into(resident, base, merging);
            }
        }
        destination.container_mut().set_amount(base + merging);
        if merging == source_amount {
            self.remove_entry(index, true);
        } else {
            self.entries[index]
                .container_mut()
                .set_amount(source_amount - merging);
        }
        self.content_changed.emit(&ContentChanged);
    }

    /// Removes units of a template across stacks. Returns the shortfall.
    pub fn remove(&mut self, template: &TemplateId, amount: u32, destroy: bool) -> u32 {
        let mut remaining = amount;
        let mut changed = false;
        let mut index = 0;
        while index < self.entries.len() && remaining > 0 {
            if self.entries[index].container().template_id() == Some(template) {
                let held = self.entries[index].container().amount();
                if held > remaining {
                    self.entries[index]
                        .container_mut()
                        .set_amount(held - remaining);
                    remaining = 0;
                } else {
                    remaining -= held;
                    self.remove_entry(index, destroy);
                    changed = true;
                    continue;
                }
                changed = true;
            }
            index += 1;
        }
        if changed {
            self.content_changed.emit(&ContentChanged);
        }
        remaining
    }

    /// Removes units from the stack covering one cell. Returns the
    /// shortfall.
    pub fn remove_from_pos(&mut self, pos: CellPos, amount: u32, destroy: bool) -> u32 {
        let Some(index) = self.entry_index_at(pos) else {
            return amount;
        };
        let held = self.entries[index].container().amount();
        if held > amount {
            self.entries[index].container_mut().set_amount(held - amount);
            self.content_changed.emit(&ContentChanged);
            return 0;
        }
        self.remove_entry(index, destroy);
        self.content_changed.emit(&ContentChanged);
        amount - held
    }

    /// Detaches the whole stack covering a cell without destroying it.
    pub fn take_stack_at(&mut self, pos: CellPos) -> Option<(StockUnit, u32)> {
        let index = self.entry_index_at(pos)?;
        let taken = self.remove_entry(index, false);
        self.content_changed.emit(&ContentChanged);
        taken
    }

    /// Checks whether the grid holds at least `amount` of a template.
    #[must_use]
    pub fn contains(&self, template: &TemplateId, amount: u32) -> bool {
        self.amount_of(template) >= amount
    }

    /// Total quantity of a template across all stacks.
    #[must_use]
    pub fn amount_of(&self, template: &TemplateId) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.container().template_id() == Some(template))
            .map(|e| e.container().amount())
            .sum()
    }

    /// Empties the grid, destroying or detaching per `destroy`.
    pub fn clear_all(&mut self, destroy: bool) {
        for entry in &mut self.entries {
            if destroy {
                entry.container_mut().destroy_contents();
            } else {
                entry.container_mut().take();
            }
        }
        self.entries.clear();
        self.rebuild_cells();
        self.content_changed.emit(&ContentChanged);
    }

    /// Appends empty rows at the bottom.
    pub fn add_rows(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        self.height += count;
        self.rebuild_cells();
        self.size_changed.emit(&GridSizeChanged {
            width: self.width,
            height: self.height,
        });
    }

    /// Appends empty columns at the right.
    pub fn add_columns(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        self.width += count;
        self.rebuild_cells();
        self.size_changed.emit(&GridSizeChanged {
            width: self.width,
            height: self.height,
        });
    }

    /// Removes rows from the bottom. Rejected when any stack footprint
    /// intersects the removed band, so occupancy is never truncated.
    pub fn remove_rows(&mut self, count: u32) -> GridResult<()> {
        if count == 0 {
            return Ok(());
        }
        if count >= self.height {
            return Err(GridError::ShrinkExceedsSize {
                requested: count,
                available: self.height,
            });
        }
        let new_height = (self.height - count) as i32;
        let affected = self
            .entries
            .iter()
            .filter(|e| e.origin().y + e.footprint().height as i32 > new_height)
            .count();
        if affected > 0 {
            return Err(GridError::ShrinkWouldSplit { affected });
        }
        self.height -= count;
        self.rebuild_cells();
        self.size_changed.emit(&GridSizeChanged {
            width: self.width,
            height: self.height,
        });
        Ok(())
    }

    /// Removes columns from the right. Rejected when any stack footprint
    /// intersects the removed band.
    pub fn remove_columns(&mut self, count: u32) -> GridResult<()> {
        if count == 0 {
            return Ok(());
        }
        if count >= self.width {
            return Err(GridError::ShrinkExceedsSize {
                requested: count,
                available: self.width,
            });
        }
        let new_width = (self.width - count) as i32;
        let affected = self
            .entries
            .iter()
            .filter(|e| e.origin().x + e.footprint().width as i32 > new_width)
            .count();
        if affected > 0 {
            return Err(GridError::ShrinkWouldSplit { affected });
        }
        self.width -= count;
        self.rebuild_cells();
        self.size_changed.emit(&GridSizeChanged {
            width: self.width,
            height: self.height,
        });
        Ok(())
    }

    /// Channel fired when aggregate contents change.
    #[must_use]
    pub fn on_content_changed(&self) -> &ListenerSet<ContentChanged> {
        &self.content_changed
    }

    /// Channel fired when the grid is resized.
    #[must_use]
    pub fn on_size_changed(&self) -> &ListenerSet<GridSizeChanged> {
        &self.size_changed
    }

    /// Channel fired when a stack is added.
    #[must_use]
    pub fn on_stack_added(&self) -> &ListenerSet<GridStackEvent> {
        &self.stack_added
    }

    /// Channel fired when a stack is removed.
    #[must_use]
    pub fn on_stack_removed(&self) -> &ListenerSet<GridStackEvent> {
        &self.stack_removed
    }

    /// Channel fired when a stack is repositioned.
    #[must_use]
    pub fn on_stack_moved(&self) -> &ListenerSet<GridStackEvent> {
        &self.stack_moved
    }

    /// Produces save data: dimensions plus one positioned record per
    /// stack.
    #[must_use]
    pub fn save_data(&self) -> SavedGridInventory {
        SavedGridInventory {
            version: SchemaVersion::INVENTORY_SAVE,
            width: self.width,
            height: self.height,
            stacks: self
                .entries
                .iter()
                .filter_map(|entry| {
                    let unit = entry.container().unit()?;
                    Some(SavedGridStack {
                        unit: unit.save_data(),
                        amount: entry.container().amount(),
                        x: entry.origin().x,
                        y: entry.origin().y,
                    })
                })
                .collect(),
        }
    }

    /// Restores from save data. Records with unknown templates are
    /// skipped; records that no longer fit the grid (out of bounds or
    /// overlapping) are reported and skipped.
    pub fn restore(&mut self, saved: &SavedGridInventory) -> SaveResult<()> {
        check_version(saved.version)?;
        self.clear_all(true);
        if saved.width == 0 || saved.height == 0 {
            tracing::error!(
                width = saved.width,
                height = saved.height,
                "saved grid dimensions must be positive; clamping to 1"
            );
        }
        self.width = saved.width.max(1);
        self.height = saved.height.max(1);
        self.rebuild_cells();

        for record in &saved.stacks {
            if record.amount == 0 {
                continue;
            }
            let Some(unit) = StockUnit::from_saved(&record.unit) else {
                continue;
            };
            let origin = CellPos::new(record.x, record.y);
            let footprint = unit.footprint();
            let fits = footprint
                .cells(origin)
                .all(|cell| self.is_empty(cell));
            if !fits {
                tracing::error!(
                    %origin,
                    template = %record.unit.template_id,
                    "saved stack does not fit the grid; skipping"
                );
                continue;
            }
            self.push_entry(origin, unit, record.amount);
        }

        self.size_changed.emit(&GridSizeChanged {
            width: self.width,
            height: self.height,
        });
        self.content_changed.emit(&ContentChanged);
        Ok(())
    }
}
