//! Open-ended container-list storage.
//!
//! Accepts every template and never runs out of room: adding merges
//! into existing same-template stacks, then appends new containers one
//! full stack at a time. Useful as an overflow or staging target.

use std::sync::Arc;

use stowage_common::{SchemaVersion, TemplateId};

use crate::container::{AddResult, Container, StackInfo};
use crate::events::ContentChanged;
use crate::listener::ListenerSet;
use crate::save::{check_version, SavedStack, SavedUnboundedInventory, SaveResult};
use crate::template::Template;
use crate::unit::StockUnit;

/// A container list without a fixed capacity.
#[derive(Debug, Default)]
pub struct UnboundedInventory {
    entries: Vec<Container>,
    content_changed: ListenerSet<ContentChanged>,
}

impl UnboundedInventory {
    /// Creates an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stacks.
    #[must_use]
    pub fn stack_count(&self) -> usize {
        self.entries.len()
    }

    /// Every template is accepted.
    #[must_use]
    pub fn accepts(&self, _template: &Template) -> bool {
        true
    }

    /// Capacity is unlimited.
    #[must_use]
    pub fn can_add(&self, _template: &Arc<Template>, _amount: u32) -> bool {
        true
    }

    /// View of the nth stack. An out-of-range index is a reported
    /// misuse.
    #[must_use]
    pub fn stack_info_at(&self, index: usize) -> Option<StackInfo> {
        let info = self.entries.get(index).and_then(Container::stack_info);
        if info.is_none() {
            tracing::error!(index, stacks = self.entries.len(), "stack index out of range");
        }
        info
    }

    /// Adds units: merges into same-template stacks first, then appends
    /// containers one full stack at a time. Always completes.
    pub fn add(&mut self, unit: StockUnit, amount: u32) -> AddResult {
        if amount == 0 {
            return AddResult {
                leftover: 0,
                remainder: Some(unit),
            };
        }

        let max_stack = unit.template().max_stack();
        let mut remaining = amount;

        for entry in &mut self.entries {
            if entry.template_id() != Some(unit.template_id()) {
                continue;
            }
            let space = max_stack.saturating_sub(entry.amount());
            if space == 0 {
                continue;
            }
            let merging = space.min(remaining);
            let base = entry.amount();
            if let Some(resident) = entry.unit_mut() {
                unit.merge_into(resident, base, merging);
            }
            entry.set_amount(base + merging);
            remaining -= merging;
            if remaining == 0 {
                let mut unit = unit;
                unit.destroy();
                self.content_changed.emit(&ContentChanged);
                return AddResult::complete();
            }
        }

        let mut unit = unit;
        while remaining > max_stack {
            let Some(split) = unit.clone_unit() else {
                break;
            };
            let mut container = Container::new();
            container.place(split, max_stack);
            self.entries.push(container);
            remaining -= max_stack;
        }
        let mut container = Container::new();
        container.place(unit, remaining);
        self.entries.push(container);

        self.content_changed.emit(&ContentChanged);
        AddResult::complete()
    }

    /// Removes units of a template, scanning front to back. Returns the
    /// shortfall.
    pub fn remove(&mut self, template: &TemplateId, amount: u32, destroy: bool) -> u32 {
        let mut remaining = amount;
        let mut changed = false;
        let mut index = 0;
        while index < self.entries.len() && remaining > 0 {
            if self.entries[index].template_id() == Some(template) {
                remaining = self.entries[index].remove(remaining, destroy);
                changed = true;
                if self.entries[index].is_empty() {
                    self.entries.remove(index);
                    continue;
                }
            }
            index += 1;
        }
        if changed {
            self.content_changed.emit(&ContentChanged);
        }
        remaining
    }

    /// Checks whether the inventory holds at least `amount` of a
    /// template.
    #[must_use]
    pub fn contains(&self, template: &TemplateId, amount: u32) -> bool {
        self.amount_of(template) >= amount
    }

    /// Total quantity of a template.
    #[must_use]
    pub fn amount_of(&self, template: &TemplateId) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.template_id() == Some(template))
            .map(Container::amount)
            .sum()
    }

    /// Empties the inventory, destroying or detaching per `destroy`.
    pub fn clear_all(&mut self, destroy: bool) {
        for entry in &mut self.entries {
            if destroy {
                entry.destroy_contents();
            } else {
                entry.take();
            }
        }
        self.entries.clear();
        self.content_changed.emit(&ContentChanged);
    }

    /// Channel fired when aggregate contents change.
    #[must_use]
    pub fn on_content_changed(&self) -> &ListenerSet<ContentChanged> {
        &self.content_changed
    }

    /// Produces save data: one record per stack, in order.
    #[must_use]
    pub fn save_data(&self) -> SavedUnboundedInventory {
        SavedUnboundedInventory {
            version: SchemaVersion::INVENTORY_SAVE,
            stacks: self
                .entries
                .iter()
                .filter_map(|entry| {
                    let unit = entry.unit()?;
                    Some(SavedStack {
                        unit: unit.save_data(),
                        amount: entry.amount(),
                    })
                })
                .collect(),
        }
    }

    /// Restores from save data. Records with unknown templates are
    /// skipped.
    pub fn restore(&mut self, saved: &SavedUnboundedInventory) -> SaveResult<()> {
        check_version(saved.version)?;
        self.clear_all(true);
        for record in &saved.stacks {
            if record.amount == 0 {
                continue;
            }
            if let Some(unit) = StockUnit::from_saved(&record.unit) {
                let mut container = Container::new();
                container.place(unit, record.amount);
                self.entries.push(container);
            }
        }
        self.content_changed.emit(&ContentChanged);
        Ok(())
    }
}
