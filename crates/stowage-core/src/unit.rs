//! Stock units: mutable instances of templates.

use std::collections::HashMap;
use std::sync::Arc;

use stowage_common::{CapabilityTag, Footprint, TemplateId};

use crate::capability::{Capability, FootprintSize};
use crate::catalog;
use crate::events::UnitDestroyed;
use crate::listener::ListenerSet;
use crate::save::SavedUnit;
use crate::template::Template;

/// One instance of a template.
///
/// A unit exclusively owns private clones of its template's capability
/// prototypes — exactly one instance per declared capability, never
/// shared with another unit. Containers own units by value, which makes
/// "a unit is held by at most one container" structural rather than a
/// runtime invariant.
#[derive(Debug)]
pub struct StockUnit {
    template: Arc<Template>,
    capabilities: Vec<Box<dyn Capability>>,
    destroyed: bool,
    pre_destroy: ListenerSet<UnitDestroyed>,
    post_destroy: ListenerSet<UnitDestroyed>,
}

impl StockUnit {
    /// Creates a fresh unit from a template.
    #[must_use]
    pub fn from_template(template: &Arc<Template>) -> Self {
        Self::instantiate(template, true, None)
    }

    /// Recreates a unit from save data, resolving the template through
    /// the installed catalog.
    ///
    /// Returns `None` when the template id is no longer known — callers
    /// skip the record, which is the designed schema-drift tolerance.
    #[must_use]
    pub fn from_saved(saved: &SavedUnit) -> Option<Self> {
        let Some(template) = catalog::resolve(&saved.template_id) else {
            tracing::debug!(
                template = %saved.template_id,
                "skipping saved unit with unknown template"
            );
            return None;
        };
        Some(Self::instantiate(
            &template,
            false,
            Some(&saved.capabilities),
        ))
    }

    fn instantiate(
        template: &Arc<Template>,
        created_new: bool,
        saved: Option<&HashMap<String, serde_json::Value>>,
    ) -> Self {
        let mut capabilities: Vec<Box<dyn Capability>> = template
            .capabilities()
            .map(|c| c.boxed_clone())
            .collect();
        for capability in &mut capabilities {
            if let Some(payload) =
                saved.and_then(|data| data.get(capability.tag().as_str()))
            {
                capability.load_saved(payload);
            }
            capability.initialize(created_new);
        }
        for capability in &mut capabilities {
            capability.post_initialize();
        }
        Self {
            template: Arc::clone(template),
            capabilities,
            destroyed: false,
            pre_destroy: ListenerSet::new(),
            post_destroy: ListenerSet::new(),
        }
    }

    /// The template this unit was created from.
    #[must_use]
    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// The template's id.
    #[must_use]
    pub fn template_id(&self) -> &TemplateId {
        self.template.id()
    }

    /// Checks whether the unit carries a capability with the tag.
    #[must_use]
    pub fn has_capability(&self, tag: CapabilityTag) -> bool {
        self.capabilities.iter().any(|c| c.tag() == tag)
    }

    /// Typed access to a capability instance.
    #[must_use]
    pub fn capability<T: Capability + 'static>(&self) -> Option<&T> {
        self.capabilities
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    /// Typed mutable access to a capability instance.
    pub fn capability_mut<T: Capability + 'static>(&mut self) -> Option<&mut T> {
        self.capabilities
            .iter_mut()
            .find_map(|c| c.as_any_mut().downcast_mut::<T>())
    }

    /// The grid footprint of this instance: its footprint capability's
    /// current size, or a single cell.
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        self.capability::<FootprintSize>()
            .map_or(Footprint::SINGLE, FootprintSize::size)
    }

    /// Folds this unit's capability state into `target` as
    /// `merging_amount` of this unit's stack joins `target`'s stack of
    /// `base_amount`. Capabilities pair by tag and each target capability
    /// is consumed by at most one source capability.
    pub fn merge_into(&self, target: &mut StockUnit, base_amount: u32, merging_amount: u32) {
        let mut consumed = vec![false; target.capabilities.len()];
        for capability in &self.capabilities {
            let tag = capability.tag();
            let paired = target
                .capabilities
                .iter_mut()
                .zip(consumed.iter_mut())
                .find(|(other, used)| !**used && other.tag() == tag);
            if let Some((other, used)) = paired {
                capability.merge_into(other.as_mut(), base_amount, merging_amount);
                *used = true;
            }
        }
    }

    /// Clones this unit for a stack split. The clone carries copies of
    /// the capability state and fresh (empty) listener sets.
    ///
    /// Cloning a destroyed unit is a reported misuse and yields `None`.
    #[must_use]
    pub fn clone_unit(&self) -> Option<Self> {
        if self.destroyed {
            tracing::error!(
                template = %self.template_id(),
                "attempt to clone an already destroyed unit"
            );
            return None;
        }
        let mut capabilities: Vec<Box<dyn Capability>> = self
            .capabilities
            .iter()
            .map(|c| c.boxed_clone())
            .collect();
        for capability in &mut capabilities {
            capability.initialize(false);
        }
        for capability in &mut capabilities {
            capability.post_initialize();
        }
        Some(Self {
            template: Arc::clone(&self.template),
            capabilities,
            destroyed: false,
            pre_destroy: ListenerSet::new(),
            post_destroy: ListenerSet::new(),
        })
    }

    /// Runs the destroy lifecycle: pre-destroy notification, per-
    /// capability teardown, post-destroy notification.
    ///
    /// Destroying an already destroyed unit is a reported misuse and a
    /// no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            tracing::error!(
                template = %self.template_id(),
                "attempt to destroy an already destroyed unit"
            );
            return;
        }
        let event = UnitDestroyed {
            template: self.template_id().clone(),
        };
        self.pre_destroy.emit(&event);
        self.destroyed = true;
        for capability in &mut self.capabilities {
            capability.on_destroy();
        }
        self.post_destroy.emit(&event);
    }

    /// Checks whether the destroy lifecycle has run.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Channel fired immediately before the destroy lifecycle runs.
    #[must_use]
    pub fn on_pre_destroy(&self) -> &ListenerSet<UnitDestroyed> {
        &self.pre_destroy
    }

    /// Channel fired after the destroy lifecycle completes.
    #[must_use]
    pub fn on_post_destroy(&self) -> &ListenerSet<UnitDestroyed> {
        &self.post_destroy
    }

    /// Produces save data: the template id plus every savable
    /// capability's payload keyed by tag.
    #[must_use]
    pub fn save_data(&self) -> SavedUnit {
        let mut capabilities = HashMap::new();
        for capability in &self.capabilities {
            if let Some(payload) = capability.save_data() {
                capabilities.insert(capability.tag().as_str().to_owned(), payload);
            }
        }
        SavedUnit {
            template_id: self.template_id().as_str().to_owned(),
            capabilities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Durability;
    use crate::test_support::install_fixtures;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_fresh_unit_has_private_capabilities() {
        install_fixtures();
        let template = catalog::resolve("thing2").expect("fixture");

        let mut a = StockUnit::from_template(&template);
        let b = StockUnit::from_template(&template);

        a.capability_mut::<Durability>()
            .expect("thing2 has durability")
            .apply_wear(50.0);

        let worn = a.capability::<Durability>().expect("present").value();
        let pristine = b.capability::<Durability>().expect("present").value();
        assert!((worn - 50.0).abs() < 1e-4);
        assert!((pristine - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_clone_unit_copies_state() {
        install_fixtures();
        let template = catalog::resolve("thing2").expect("fixture");

        let mut original = StockUnit::from_template(&template);
        original
            .capability_mut::<Durability>()
            .expect("present")
            .set_value(37.0);

        let split = original.clone_unit().expect("not destroyed");
        let value = split.capability::<Durability>().expect("present").value();
        assert!((value - 37.0).abs() < 1e-4);
    }

    #[test]
    fn test_destroy_lifecycle_and_double_destroy() {
        install_fixtures();
        let template = catalog::resolve("thing1").expect("fixture");
        let mut unit = StockUnit::from_template(&template);

        let order = Rc::new(Cell::new(0u32));
        let pre = Rc::clone(&order);
        unit.on_pre_destroy().subscribe(move |_| {
            assert_eq!(pre.get(), 0);
            pre.set(1);
        });
        let post = Rc::clone(&order);
        unit.on_post_destroy().subscribe(move |_| {
            assert_eq!(post.get(), 1);
            post.set(2);
        });

        unit.destroy();
        assert!(unit.is_destroyed());
        assert_eq!(order.get(), 2);

        // Second destroy is reported and changes nothing.
        unit.destroy();
        assert_eq!(order.get(), 2);
        assert!(unit.clone_unit().is_none());
    }

    #[test]
    fn test_save_round_trip_preserves_capability_state() {
        install_fixtures();
        let template = catalog::resolve("thing2").expect("fixture");

        let mut unit = StockUnit::from_template(&template);
        unit.capability_mut::<Durability>()
            .expect("present")
            .set_value(12.5);

        let saved = unit.save_data();
        assert_eq!(saved.template_id, "thing2");

        let restored = StockUnit::from_saved(&saved).expect("template known");
        let value = restored
            .capability::<Durability>()
            .expect("present")
            .value();
        assert!((value - 12.5).abs() < 1e-4);
    }

    #[test]
    fn test_from_saved_unknown_template_skips() {
        install_fixtures();
        let saved = SavedUnit {
            template_id: "deleted_in_patch_2".into(),
            capabilities: HashMap::new(),
        };
        assert!(StockUnit::from_saved(&saved).is_none());
    }
}
