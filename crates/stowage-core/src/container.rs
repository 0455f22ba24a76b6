//! Storage containers: one stock unit plus a quantity.

use std::sync::Arc;

use stowage_common::{CellPos, Footprint, TemplateId};

use crate::events::ContainerChanged;
use crate::listener::ListenerSet;
use crate::template::Template;
use crate::unit::StockUnit;

/// Outcome of an add-style operation.
///
/// `leftover` is the quantity that could not be placed. When the source
/// unit was not fully consumed (leftover, rejected input, or a zero
/// request) it is handed back in `remainder` so no stock silently
/// disappears.
#[derive(Debug)]
pub struct AddResult {
    /// Quantity that could not be placed
    pub leftover: u32,
    /// The source unit, when not consumed by the operation
    pub remainder: Option<StockUnit>,
}

impl AddResult {
    /// Everything was placed and the unit was consumed.
    #[must_use]
    pub const fn complete() -> Self {
        Self {
            leftover: 0,
            remainder: None,
        }
    }

    /// Nothing was placed; the caller keeps the unit.
    #[must_use]
    pub fn rejected(unit: StockUnit, amount: u32) -> Self {
        Self {
            leftover: amount,
            remainder: Some(unit),
        }
    }

    /// Checks whether the full requested amount was placed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.leftover == 0
    }
}

/// Immutable view of an occupied container.
#[derive(Debug, Clone)]
pub struct StackInfo {
    /// Template of the held unit
    pub template: Arc<Template>,
    /// Quantity held
    pub amount: u32,
}

/// Immutable view of an occupied grid container.
#[derive(Debug, Clone)]
pub struct GridStackInfo {
    /// Template of the held unit
    pub template: Arc<Template>,
    /// Quantity held
    pub amount: u32,
    /// Origin cell of the footprint
    pub origin: CellPos,
    /// Extent of the footprint
    pub footprint: Footprint,
}

/// A single storage cell: at most one stock unit plus its quantity.
///
/// Invariant: `amount == 0` exactly when no unit is held. Setting the
/// amount to zero destroys the held unit; [`Container::clear`] and
/// [`Container::take`] detach it without running the destroy lifecycle.
#[derive(Debug, Default)]
pub struct Container {
    unit: Option<StockUnit>,
    amount: u32,
    changed: ListenerSet<ContainerChanged>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether the container holds nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.unit.is_none()
    }

    /// The held unit, if any.
    #[must_use]
    pub fn unit(&self) -> Option<&StockUnit> {
        self.unit.as_ref()
    }

    /// Mutable access to the held unit, if any.
    pub fn unit_mut(&mut self) -> Option<&mut StockUnit> {
        self.unit.as_mut()
    }

    /// Template of the held unit, if any.
    #[must_use]
    pub fn template(&self) -> Option<&Arc<Template>> {
        self.unit.as_ref().map(StockUnit::template)
    }

    /// Template id of the held unit, if any.
    #[must_use]
    pub fn template_id(&self) -> Option<&TemplateId> {
        self.unit.as_ref().map(StockUnit::template_id)
    }

    /// Quantity held.
    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// View of the held stack, if any.
    #[must_use]
    pub fn stack_info(&self) -> Option<StackInfo> {
        self.unit.as_ref().map(|unit| StackInfo {
            template: Arc::clone(unit.template()),
            amount: self.amount,
        })
    }

    /// Sets the quantity. Zero destroys the held unit; setting an amount
    /// on an empty container is a reported misuse and a no-op.
    pub fn set_amount(&mut self, amount: u32) {
        if self.unit.is_none() {
            tracing::error!("attempt to set an amount on an empty container");
            return;
        }
        if amount == 0 {
            self.destroy_contents();
            return;
        }
        if self.amount != amount {
            self.amount = amount;
            self.emit_changed();
        }
    }

    /// Places a unit with a quantity, detaching (not destroying) any
    /// previous contents. A zero quantity is a reported misuse that
    /// leaves the container empty.
    pub fn place(&mut self, unit: StockUnit, amount: u32) {
        let had_contents = self.unit.is_some();
        self.unit = None;
        self.amount = 0;
        if amount == 0 {
            tracing::error!(
                template = %unit.template_id(),
                "attempt to place a unit with zero amount"
            );
            if had_contents {
                self.emit_changed();
            }
            return;
        }
        self.unit = Some(unit);
        self.amount = amount;
        self.emit_changed();
    }

    /// Detaches the held unit without destroying it, returning it.
    pub fn clear(&mut self) -> Option<StockUnit> {
        self.take().map(|(unit, _)| unit)
    }

    /// Detaches the held unit and its quantity without destroying it.
    pub fn take(&mut self) -> Option<(StockUnit, u32)> {
        let unit = self.unit.take()?;
        let amount = std::mem::take(&mut self.amount);
        self.emit_changed();
        Some((unit, amount))
    }

    /// Destroys the held unit (running its destroy lifecycle) and
    /// empties the container.
    pub fn destroy_contents(&mut self) {
        let Some(mut unit) = self.unit.take() else {
            return;
        };
        self.amount = 0;
        unit.destroy();
        self.emit_changed();
    }

    /// Removes up to `amount` units. When the container empties, the
    /// unit is destroyed or silently detached per `destroy_if_emptied`.
    /// Returns the shortfall.
    pub fn remove(&mut self, amount: u32, destroy_if_emptied: bool) -> u32 {
        if self.unit.is_none() || amount == 0 {
            return amount;
        }
        if self.amount > amount {
            self.set_amount(self.amount - amount);
            return 0;
        }
        let held = self.amount;
        if destroy_if_emptied {
            self.destroy_contents();
        } else {
            self.take();
        }
        amount - held
    }

    /// Channel fired whenever the contents or quantity change.
    #[must_use]
    pub fn on_changed(&self) -> &ListenerSet<ContainerChanged> {
        &self.changed
    }

    fn emit_changed(&self) {
        self.changed.emit(&ContainerChanged {
            template: self.template_id().cloned(),
            amount: self.amount,
        });
    }
}

/// A container bound to a grid position with a multi-cell footprint.
///
/// The occupancy invariant — no two grid containers' footprints overlap
/// — is maintained by the owning grid inventory, which is the only code
/// that repositions containers.
#[derive(Debug)]
pub struct GridContainer {
    container: Container,
    origin: CellPos,
    moved: ListenerSet<CellPos>,
}

impl GridContainer {
    /// Creates a grid container holding a unit at the given origin.
    #[must_use]
    pub fn new(origin: CellPos, unit: StockUnit, amount: u32) -> Self {
        let mut container = Container::new();
        container.place(unit, amount);
        Self {
            container,
            origin,
            moved: ListenerSet::new(),
        }
    }

    /// The underlying container.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Mutable access to the underlying container.
    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Origin cell of the footprint.
    #[must_use]
    pub const fn origin(&self) -> CellPos {
        self.origin
    }

    /// Moves the origin, notifying position listeners.
    pub(crate) fn set_origin(&mut self, origin: CellPos) {
        if self.origin != origin {
            self.origin = origin;
            self.moved.emit(&origin);
        }
    }

    /// Footprint of the held unit (single cell when the unit carries no
    /// footprint capability, or the container is empty).
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        self.container
            .unit()
            .map_or(Footprint::SINGLE, StockUnit::footprint)
    }

    /// View of the held stack, if any.
    #[must_use]
    pub fn stack_info(&self) -> Option<GridStackInfo> {
        self.container.unit().map(|unit| GridStackInfo {
            template: Arc::clone(unit.template()),
            amount: self.container.amount(),
            origin: self.origin,
            footprint: unit.footprint(),
        })
    }

    /// Channel fired when the origin changes.
    #[must_use]
    pub fn on_moved(&self) -> &ListenerSet<CellPos> {
        &self.moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::test_support::install_fixtures;

    fn unit_of(id: &str) -> StockUnit {
        let template = catalog::resolve(id).expect("fixture template");
        StockUnit::from_template(&template)
    }

    #[test]
    fn test_empty_iff_zero_amount() {
        install_fixtures();
        let mut container = Container::new();
        assert!(container.is_empty());
        assert_eq!(container.amount(), 0);

        container.place(unit_of("thing1"), 5);
        assert!(!container.is_empty());
        assert_eq!(container.amount(), 5);

        container.set_amount(0);
        assert!(container.is_empty());
        assert_eq!(container.amount(), 0);
    }

    #[test]
    fn test_set_amount_zero_destroys() {
        install_fixtures();
        let mut container = Container::new();
        container.place(unit_of("thing1"), 3);

        let destroyed = std::rc::Rc::new(std::cell::Cell::new(false));
        let flag = std::rc::Rc::clone(&destroyed);
        container
            .unit()
            .expect("occupied")
            .on_post_destroy()
            .subscribe(move |_| flag.set(true));

        container.set_amount(0);
        assert!(destroyed.get());
    }

    #[test]
    fn test_clear_detaches_without_destroy() {
        install_fixtures();
        let mut container = Container::new();
        container.place(unit_of("thing1"), 3);

        let unit = container.clear().expect("was occupied");
        assert!(!unit.is_destroyed());
        assert!(container.is_empty());
    }

    #[test]
    fn test_remove_partial_and_shortfall() {
        install_fixtures();
        let mut container = Container::new();
        container.place(unit_of("thing1"), 10);

        assert_eq!(container.remove(4, true), 0);
        assert_eq!(container.amount(), 6);

        assert_eq!(container.remove(9, true), 3);
        assert!(container.is_empty());

        assert_eq!(container.remove(2, true), 2);
    }

    #[test]
    fn test_change_events_fire() {
        install_fixtures();
        let mut container = Container::new();
        let events = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let log = std::rc::Rc::clone(&events);
        container
            .on_changed()
            .subscribe(move |e: &ContainerChanged| log.borrow_mut().push(e.amount));

        container.place(unit_of("thing1"), 5);
        container.set_amount(8);
        container.set_amount(8); // no change, no event
        container.destroy_contents();

        assert_eq!(*events.borrow(), vec![5, 8, 0]);
    }

    #[test]
    fn test_grid_container_footprint() {
        install_fixtures();
        let crate_unit = unit_of("crate4");
        let container = GridContainer::new(CellPos::new(1, 1), crate_unit, 2);
        assert_eq!(container.footprint(), Footprint::new(2, 2));
        assert_eq!(container.origin(), CellPos::new(1, 1));

        let info = container.stack_info().expect("occupied");
        assert_eq!(info.amount, 2);
        assert_eq!(info.origin, CellPos::new(1, 1));
    }
}
