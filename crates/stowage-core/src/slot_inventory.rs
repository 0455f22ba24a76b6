//! Ordered slot storage with one-dimensional stacking and merge logic.

use std::sync::Arc;

use stowage_common::{SchemaVersion, TemplateId};

use crate::container::{AddResult, Container, StackInfo};
use crate::events::{ContentChanged, SlotCountChanged};
use crate::feasibility::{simulate_slot_add, SlotOverlay};
use crate::listener::ListenerSet;
use crate::save::{check_version, SavedSlotInventory, SavedStack, SaveResult};
use crate::template::{AcceptRule, Template};
use crate::unit::StockUnit;

/// An ordered list of containers with merge-then-fill stacking.
///
/// Adding scans containers in order, first topping up same-template
/// stacks (conserving capability state through the merge arithmetic),
/// then filling empty slots recorded during the scan, splitting the
/// incoming unit whenever the residual exceeds one stack cap.
#[derive(Debug)]
pub struct SlotInventory {
    slots: Vec<Container>,
    accept: AcceptRule,
    content_changed: ListenerSet<ContentChanged>,
    slot_added: ListenerSet<SlotCountChanged>,
    slot_removed: ListenerSet<SlotCountChanged>,
}

impl SlotInventory {
    /// Creates an inventory with the given slot count, accepting every
    /// template.
    #[must_use]
    pub fn new(slot_count: usize) -> Self {
        Self::with_accept_rule(slot_count, AcceptRule::Any)
    }

    /// Creates an inventory with the given slot count and accept rule.
    #[must_use]
    pub fn with_accept_rule(slot_count: usize, accept: AcceptRule) -> Self {
        let mut inventory = Self {
            slots: Vec::new(),
            accept,
            content_changed: ListenerSet::new(),
            slot_added: ListenerSet::new(),
            slot_removed: ListenerSet::new(),
        };
        inventory.add_slots(slot_count);
        inventory
    }

    /// Number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// The container at a slot index. An out-of-range index is a
    /// reported misuse.
    #[must_use]
    pub fn slot_at(&self, index: usize) -> Option<&Container> {
        let slot = self.slots.get(index);
        if slot.is_none() {
            tracing::error!(
                index,
                slot_count = self.slots.len(),
                "slot index out of range"
            );
        }
        slot
    }

    /// View of the nth occupied slot's stack. An out-of-range index is a
    /// reported misuse.
    #[must_use]
    pub fn stack_info_at(&self, occupied_index: usize) -> Option<StackInfo> {
        let info = self
            .slots
            .iter()
            .filter(|s| !s.is_empty())
            .nth(occupied_index)
            .and_then(Container::stack_info);
        if info.is_none() {
            tracing::error!(
                occupied_index,
                occupied = self.occupied_count(),
                "occupied-stack index out of range"
            );
        }
        info
    }

    /// Checks whether the accept rule admits a template.
    #[must_use]
    pub fn accepts(&self, template: &Template) -> bool {
        self.accept.admits(template)
    }

    /// Index of the first empty slot, if any.
    #[must_use]
    pub fn first_empty_slot(&self) -> Option<usize> {
        self.slots.iter().position(Container::is_empty)
    }

    /// Checks whether `amount` units of a template would fit.
    #[must_use]
    pub fn can_add(&self, template: &Arc<Template>, amount: u32) -> bool {
        self.can_add_all(&[(Arc::clone(template), amount)])
    }

    /// Checks whether a batch of template/amount requests fits
    /// *together*, simulating the requests against one shared overlay of
    /// current occupancy.
    #[must_use]
    pub fn can_add_all(&self, requests: &[(Arc<Template>, u32)]) -> bool {
        let mut overlay = SlotOverlay::new(self.slots.len());
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(info) = slot.stack_info() {
                overlay.seed(index, &info.template, info.amount);
            }
        }
        requests.iter().all(|(template, amount)| {
            self.accepts(template) && simulate_slot_add(&mut overlay, template, *amount)
        })
    }

    /// Adds units, merging into same-template stacks first and then
    /// filling empty slots in order. Returns the leftover and, when not
    /// fully consumed, the source unit.
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

        let max_stack = unit.template().max_stack();
        let mut remaining = amount;
        let mut changed = false;
        let mut empty_slots = Vec::new();

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_empty() {
                empty_slots.push(index);
                continue;
            }
            if slot.template_id() != Some(unit.template_id()) {
                continue;
            }
            let space = max_stack.saturating_sub(slot.amount());
            if space == 0 {
                continue;
            }
            let merging = space.min(remaining);
            let base = slot.amount();
            if let Some(resident) = slot.unit_mut() {
                unit.merge_into(resident, base, merging);
            }
            slot.set_amount(base + merging);
            remaining -= merging;
            changed = true;
            if remaining == 0 {
                let mut unit = unit;
                unit.destroy();
                self.content_changed.emit(&ContentChanged);
                return AddResult::complete();
            }
        }

        let mut unit = unit;
        for index in empty_slots {
            if max_stack >= remaining {
                self.slots[index].place(unit, remaining);
                self.content_changed.emit(&ContentChanged);
                return AddResult::complete();
            }
            let Some(split) = unit.clone_unit() else {
                break;
            };
            self.slots[index].place(split, max_stack);
            remaining -= max_stack;
            changed = true;
        }

        if changed {
            self.content_changed.emit(&ContentChanged);
        }
        AddResult {
            leftover: remaining,
            remainder: Some(unit),
        }
    }

    /// Checks whether `amount` units would fit into one designated slot.
    #[must_use]
    pub fn can_add_to_slot(&self, index: usize, template: &Template, amount: u32) -> bool {
        if amount == 0 {
            return false;
        }
        let Some(slot) = self.slot_at(index) else {
            return false;
        };
        if !self.accepts(template) {
            return false;
        }
        if slot.is_empty() {
            return amount <= template.max_stack();
        }
        if slot.template_id() == Some(template.id()) {
            return amount <= template.max_stack().saturating_sub(slot.amount());
        }
        false
    }

    /// Applies the merge-or-place logic to exactly one slot.
    pub fn add_to_slot(&mut self, index: usize, unit: StockUnit, amount: u32) -> AddResult {
        if amount == 0 {
            return AddResult {
                leftover: 0,
                remainder: Some(unit),
            };
        }
        if index >= self.slots.len() {
            tracing::error!(
                index,
                slot_count = self.slots.len(),
                "add_to_slot index out of range"
            );
            return AddResult::rejected(unit, amount);
        }
        if !self.accepts(unit.template()) {
            return AddResult::rejected(unit, amount);
        }

        let max_stack = unit.template().max_stack();
        let slot = &mut self.slots[index];

        if slot.is_empty() {
            if max_stack >= amount {
                slot.place(unit, amount);
                self.content_changed.emit(&ContentChanged);
                return AddResult::complete();
            }
            let Some(split) = unit.clone_unit() else {
                return AddResult::rejected(unit, amount);
            };
            slot.place(split, max_stack);
            self.content_changed.emit(&ContentChanged);
            return AddResult {
                leftover: amount - max_stack,
                remainder: Some(unit),
            };
        }

        if slot.template_id() == Some(unit.template_id()) {
            let space = max_stack.saturating_sub(slot.amount());
            if space == 0 {
                return AddResult::rejected(unit, amount);
            }
            let merging = space.min(amount);
            let base = slot.amount();
            if let Some(resident) = slot.unit_mut() {
                unit.merge_into(resident, base, merging);
            }
            slot.set_amount(base + merging);
            self.content_changed.emit(&ContentChanged);
            if merging == amount {
                let mut unit = unit;
                unit.destroy();
                return AddResult::complete();
            }
            return AddResult {
                leftover: amount - merging,
                remainder: Some(unit),
            };
        }

        AddResult::rejected(unit, amount)
    }

    /// Removes units of a template, scanning front to back. Returns the
    /// shortfall. With `destroy` false, emptied units are detached and
    /// dropped without running the destroy lifecycle.
    pub fn remove(&mut self, template: &TemplateId, amount: u32, destroy: bool) -> u32 {
        let mut remaining = amount;
        let mut changed = false;
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if slot.template_id() != Some(template) {
                continue;
            }
            remaining = slot.remove(remaining, destroy);
            changed = true;
        }
        if changed {
            self.content_changed.emit(&ContentChanged);
        }
        remaining
    }

    /// Removes units from one slot. Returns the shortfall.
    pub fn remove_from_slot(
        &mut self,
        index: usize,
        amount: u32,
        destroy_if_emptied: bool,
    ) -> u32 {
        let Some(slot) = self.slots.get_mut(index) else {
            tracing::error!(
                index,
                slot_count = self.slots.len(),
                "remove_from_slot index out of range"
            );
            return amount;
        };
        if slot.is_empty() {
            return amount;
        }
        let shortfall = slot.remove(amount, destroy_if_emptied);
        self.content_changed.emit(&ContentChanged);
        shortfall
    }

    /// Detaches a slot's whole stack without destroying it.
    pub fn take_stack(&mut self, index: usize) -> Option<(StockUnit, u32)> {
        let slot = self.slots.get_mut(index)?;
        let taken = slot.take();
        if taken.is_some() {
            self.content_changed.emit(&ContentChanged);
        }
        taken
    }

    /// Exchanges the contents of two slots.
    pub fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b || a >= self.slots.len() || b >= self.slots.len() {
            if a >= self.slots.len() || b >= self.slots.len() {
                tracing::error!(a, b, slot_count = self.slots.len(), "swap index out of range");
            }
            return;
        }
        if self.slots[a].is_empty() && self.slots[b].is_empty() {
            return;
        }
        let first = self.slots[a].take();
        let second = self.slots[b].take();
        if let Some((unit, amount)) = second {
            self.slots[a].place(unit, amount);
        }
        if let Some((unit, amount)) = first {
            self.slots[b].place(unit, amount);
        }
        self.content_changed.emit(&ContentChanged);
    }

    /// Checks whether the inventory holds at least `amount` of a
    /// template across all slots.
    #[must_use]
    pub fn contains(&self, template: &TemplateId, amount: u32) -> bool {
        self.amount_of(template) >= amount
    }

    /// Total quantity of a template across all slots.
    #[must_use]
    pub fn amount_of(&self, template: &TemplateId) -> u32 {
        self.slots
            .iter()
            .filter(|s| s.template_id() == Some(template))
            .map(Container::amount)
            .sum()
    }

    /// Empties every slot, destroying or detaching per `destroy`.
    pub fn clear_all(&mut self, destroy: bool) {
        for slot in &mut self.slots {
            if destroy {
                slot.destroy_contents();
            } else {
                slot.take();
            }
        }
        self.content_changed.emit(&ContentChanged);
    }

    /// Appends empty slots.
    pub fn add_slots(&mut self, count: usize) {
        for _ in 0..count {
            self.slots.push(Container::new());
            self.slot_added.emit(&SlotCountChanged {
                index: self.slots.len() - 1,
            });
        }
    }

    /// Removes slots from the tail; their contents are detached and
    /// dropped.
    pub fn remove_slots(&mut self, count: usize) {
        let count = count.min(self.slots.len());
        for _ in 0..count {
            self.slots.pop();
            self.slot_removed.emit(&SlotCountChanged {
                index: self.slots.len(),
            });
        }
    }

    /// Channel fired when aggregate contents change.
    #[must_use]
    pub fn on_content_changed(&self) -> &ListenerSet<ContentChanged> {
        &self.content_changed
    }

    /// Channel fired when a slot is appended.
    #[must_use]
    pub fn on_slot_added(&self) -> &ListenerSet<SlotCountChanged> {
        &self.slot_added
    }

    /// Channel fired when a slot is removed.
    #[must_use]
    pub fn on_slot_removed(&self) -> &ListenerSet<SlotCountChanged> {
        &self.slot_removed
    }

    /// Produces save data: one record per slot, in order.
    #[must_use]
    pub fn save_data(&self) -> SavedSlotInventory {
        SavedSlotInventory {
            version: SchemaVersion::INVENTORY_SAVE,
            slots: self
                .slots
                .iter()
                .map(|slot| {
                    slot.unit().map(|unit| SavedStack {
                        unit: unit.save_data(),
                        amount: slot.amount(),
                    })
                })
                .collect(),
        }
    }

    /// Restores from save data, rebuilding the slot list. Records whose
    /// template is no longer in the catalog are skipped.
    pub fn restore(&mut self, saved: &SavedSlotInventory) -> SaveResult<()> {
        check_version(saved.version)?;
        self.clear_all(true);
        self.slots = Vec::new();
        self.slots.resize_with(saved.slots.len(), Container::new);
        for (index, record) in saved.slots.iter().enumerate() {
            let Some(stack) = record else { continue };
            if stack.amount == 0 {
                continue;
            }
            if let Some(unit) = StockUnit::from_saved(&stack.unit) {
                self.slots[index].place(unit, stack.amount);
            }
        }
        self.content_changed.emit(&ContentChanged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Durability, Usable};
    use crate::catalog;
    use crate::test_support::install_fixtures;
    use std::cell::Cell;
    use std::rc::Rc;

    fn unit_of(id: &str) -> StockUnit {
        let template = catalog::resolve(id).expect("fixture template");
        StockUnit::from_template(&template)
    }

    fn template_of(id: &str) -> Arc<Template> {
        catalog::resolve(id).expect("fixture template")
    }

    #[test]
    fn test_add_fills_and_returns_leftover() {
        install_fixtures();
        // thing1: max stack 60. Two slots hold at most 120.
        let mut inventory = SlotInventory::new(2);

        let result = inventory.add(unit_of("thing1"), 150);
        assert_eq!(result.leftover, 30);
        assert!(result.remainder.is_some());
        assert_eq!(inventory.amount_of(&TemplateId::new("thing1")), 120);
        assert_eq!(inventory.slot_at(0).map(Container::amount), Some(60));
        assert_eq!(inventory.slot_at(1).map(Container::amount), Some(60));
    }

    #[test]
    fn test_add_merges_before_filling_empties() {
        install_fixtures();
        let mut inventory = SlotInventory::new(3);
        assert!(inventory.add(unit_of("thing1"), 40).is_complete());

        // 30 more: 20 tops up slot 0, 10 lands in slot 1.
        assert!(inventory.add(unit_of("thing1"), 30).is_complete());
        assert_eq!(inventory.slot_at(0).map(Container::amount), Some(60));
        assert_eq!(inventory.slot_at(1).map(Container::amount), Some(10));
        assert_eq!(inventory.occupied_count(), 2);
    }

    #[test]
    fn test_add_conserves_durability_through_merge() {
        install_fixtures();
        // thing2 carries durability (start 100, max 100).
        let mut inventory = SlotInventory::new(2);
        let mut worn = unit_of("thing2");
        worn.capability_mut::<Durability>()
            .expect("thing2 has durability")
            .set_value(40.0);
        assert!(inventory.add(worn, 10).is_complete());

        // Merge 30 pristine units into the 10 worn ones:
        // (10*40 + 30*100) / 40 = 85.
        assert!(inventory.add(unit_of("thing2"), 30).is_complete());
        let resident = inventory
            .slot_at(0)
            .and_then(Container::unit)
            .expect("occupied");
        let value = resident
            .capability::<Durability>()
            .expect("present")
            .value();
        assert!((value - 85.0).abs() < 1e-3);
    }

    #[test]
    fn test_accept_rule_rejects() {
        install_fixtures();
        // thing3 has no Usable capability; thing2 does.
        let mut inventory =
            SlotInventory::with_accept_rule(2, AcceptRule::Requires(Usable::TAG));

        assert!(!inventory.can_add(&template_of("thing3"), 1));
        let result = inventory.add(unit_of("thing3"), 5);
        assert_eq!(result.leftover, 5);
        assert_eq!(inventory.occupied_count(), 0);

        assert!(inventory.can_add(&template_of("thing2"), 1));
        assert!(inventory.add(unit_of("thing2"), 5).is_complete());
    }

    #[test]
    fn test_can_add_batch_is_coresident() {
        install_fixtures();
        // One slot only: 60 thing1 and 1 thing2 each fit alone, not
        // together.
        let inventory = SlotInventory::new(1);
        let thing1 = template_of("thing1");
        let thing2 = template_of("thing2");

        assert!(inventory.can_add(&thing1, 60));
        assert!(inventory.can_add(&thing2, 1));
        assert!(!inventory.can_add_all(&[(Arc::clone(&thing1), 60), (Arc::clone(&thing2), 1)]));

        let roomier = SlotInventory::new(2);
        assert!(roomier.can_add_all(&[(thing1, 60), (thing2, 1)]));
    }

    #[test]
    fn test_add_to_slot_merge_and_reject() {
        install_fixtures();
        let mut inventory = SlotInventory::new(2);
        assert!(inventory.add_to_slot(0, unit_of("thing2"), 40).is_complete());

        // Same template merges up to the cap (50).
        let result = inventory.add_to_slot(0, unit_of("thing2"), 20);
        assert_eq!(result.leftover, 10);
        assert_eq!(inventory.slot_at(0).map(Container::amount), Some(50));

        // Different template against an occupied slot is rejected whole.
        let result = inventory.add_to_slot(0, unit_of("thing1"), 5);
        assert_eq!(result.leftover, 5);

        // Out-of-range index is reported and rejected.
        let result = inventory.add_to_slot(9, unit_of("thing1"), 5);
        assert_eq!(result.leftover, 5);
    }

    #[test]
    fn test_remove_scans_front_to_back() {
        install_fixtures();
        let mut inventory = SlotInventory::new(3);
        assert!(inventory.add(unit_of("thing1"), 100).is_complete());
        let id = TemplateId::new("thing1");

        assert_eq!(inventory.remove(&id, 70, true), 0);
        assert_eq!(inventory.amount_of(&id), 30);
        // Slot 0 (60) drained first, slot 1 keeps the rest.
        assert_eq!(inventory.slot_at(0).map(Container::is_empty), Some(true));

        assert_eq!(inventory.remove(&id, 50, true), 20);
        assert_eq!(inventory.amount_of(&id), 0);
    }

    #[test]
    fn test_conservation_across_add_remove() {
        install_fixtures();
        let mut inventory = SlotInventory::new(4);
        let id = TemplateId::new("thing2");

        let mut ledger: i64 = 0;
        let result = inventory.add(unit_of("thing2"), 120);
        ledger += i64::from(120 - result.leftover);
        let result = inventory.add(unit_of("thing2"), 95);
        ledger += i64::from(95 - result.leftover);
        let shortfall = inventory.remove(&id, 130, true);
        ledger -= i64::from(130 - shortfall);

        assert_eq!(i64::from(inventory.amount_of(&id)), ledger);
    }

    #[test]
    fn test_stack_cap_never_exceeded() {
        install_fixtures();
        let mut inventory = SlotInventory::new(5);
        inventory.add(unit_of("thing1"), 37);
        inventory.add(unit_of("thing1"), 123);
        inventory.add(unit_of("thing1"), 61);

        for index in 0..inventory.slot_count() {
            let amount = inventory.slot_at(index).map_or(0, Container::amount);
            assert!(amount <= 60);
        }
    }

    #[test]
    fn test_swap_slots() {
        install_fixtures();
        let mut inventory = SlotInventory::new(2);
        inventory.add_to_slot(0, unit_of("thing1"), 10);
        inventory.add_to_slot(1, unit_of("thing2"), 20);

        inventory.swap_slots(0, 1);
        assert_eq!(
            inventory.slot_at(0).and_then(Container::template_id),
            Some(&TemplateId::new("thing2"))
        );
        assert_eq!(inventory.slot_at(0).map(Container::amount), Some(20));
        assert_eq!(inventory.slot_at(1).map(Container::amount), Some(10));
    }

    #[test]
    fn test_content_changed_fires_once_per_operation() {
        install_fixtures();
        let mut inventory = SlotInventory::new(3);
        let count = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&count);
        inventory
            .on_content_changed()
            .subscribe(move |_| counter.set(counter.get() + 1));

        inventory.add(unit_of("thing1"), 150); // spans three slots
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_slot_count_mutation_events() {
        install_fixtures();
        let mut inventory = SlotInventory::new(1);
        let added = Rc::new(Cell::new(0usize));
        let removed = Rc::new(Cell::new(0usize));

        let a = Rc::clone(&added);
        inventory.on_slot_added().subscribe(move |e| a.set(e.index));
        let r = Rc::clone(&removed);
        inventory
            .on_slot_removed()
            .subscribe(move |e| r.set(e.index));

        inventory.add_slots(2);
        assert_eq!(inventory.slot_count(), 3);
        assert_eq!(added.get(), 2);

        inventory.remove_slots(1);
        assert_eq!(inventory.slot_count(), 2);
        assert_eq!(removed.get(), 2);
    }

    #[test]
    fn test_save_restore_round_trip() {
        install_fixtures();
        let mut inventory = SlotInventory::new(3);
        let mut worn = unit_of("thing2");
        worn.capability_mut::<Durability>()
            .expect("present")
            .set_value(25.0);
        inventory.add_to_slot(0, worn, 30);
        inventory.add_to_slot(2, unit_of("thing1"), 60);

        let saved = inventory.save_data();

        let mut restored = SlotInventory::new(0);
        restored.restore(&saved).expect("compatible version");

        assert_eq!(restored.slot_count(), 3);
        assert_eq!(restored.slot_at(0).map(Container::amount), Some(30));
        assert_eq!(restored.slot_at(1).map(Container::is_empty), Some(true));
        assert_eq!(restored.slot_at(2).map(Container::amount), Some(60));
        let durability = restored
            .slot_at(0)
            .and_then(Container::unit)
            .and_then(StockUnit::capability::<Durability>)
            .expect("restored with durability")
            .value();
        assert!((durability - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_restore_skips_unknown_template() {
        install_fixtures();
        let mut inventory = SlotInventory::new(2);
        inventory.add_to_slot(0, unit_of("thing1"), 10);
        let mut saved = inventory.save_data();
        saved.slots[0]
            .as_mut()
            .expect("occupied record")
            .unit
            .template_id = "removed_content".into();

        let mut restored = SlotInventory::new(0);
        restored.restore(&saved).expect("compatible version");
        assert_eq!(restored.slot_count(), 2);
        assert_eq!(restored.occupied_count(), 0);
    }

    #[test]
    fn test_restore_rejects_future_version() {
        install_fixtures();
        let inventory = SlotInventory::new(1);
        let mut saved = inventory.save_data();
        saved.version = SchemaVersion::new(99, 0, 0);

        let mut target = SlotInventory::new(1);
        assert!(target.restore(&saved).is_err());
    }
}
