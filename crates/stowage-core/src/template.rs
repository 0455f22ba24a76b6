//! Immutable stock-unit templates.

use std::sync::Arc;

use stowage_common::{CapabilityTag, Footprint, TemplateId};

use crate::capability::{Capability, FootprintSize};

/// Default maximum stack size for templates that do not override it.
pub const DEFAULT_MAX_STACK: u32 = 20;

/// Immutable, shared definition of a kind of stock.
///
/// Templates are built once (normally at catalog load time), shared via
/// [`Arc`], and referenced by every stock unit created from them. The
/// capability instances held here are prototypes: units receive private
/// clones, never the prototypes themselves.
#[derive(Debug)]
pub struct Template {
    id: TemplateId,
    name: String,
    description: String,
    max_stack: u32,
    capabilities: Vec<Box<dyn Capability>>,
}

impl Template {
    /// Starts building a template.
    #[must_use]
    pub fn builder(id: impl Into<TemplateId>, name: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder::new(id.into(), name.into())
    }

    /// Unique template id.
    #[must_use]
    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Maximum quantity one container may hold of this template.
    #[must_use]
    pub const fn max_stack(&self) -> u32 {
        self.max_stack
    }

    /// Checks whether more than one unit fits in a container.
    #[must_use]
    pub const fn is_stackable(&self) -> bool {
        self.max_stack > 1
    }

    /// Checks whether the template declares a capability with the tag.
    #[must_use]
    pub fn has_capability(&self, tag: CapabilityTag) -> bool {
        self.capabilities.iter().any(|c| c.tag() == tag)
    }

    /// Typed access to a capability prototype.
    #[must_use]
    pub fn capability<T: Capability + 'static>(&self) -> Option<&T> {
        self.capabilities
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    /// Iterates the capability prototypes in declaration order.
    pub fn capabilities(&self) -> impl Iterator<Item = &dyn Capability> {
        self.capabilities.iter().map(|c| c.as_ref())
    }

    /// The footprint a fresh unit of this template occupies: the
    /// footprint prototype's start size, or a single cell.
    #[must_use]
    pub fn default_footprint(&self) -> Footprint {
        self.capability::<FootprintSize>()
            .map_or(Footprint::SINGLE, FootprintSize::start)
    }
}

/// Builder for [`Template`].
#[derive(Debug)]
pub struct TemplateBuilder {
    id: TemplateId,
    name: String,
    description: String,
    max_stack: u32,
    capabilities: Vec<Box<dyn Capability>>,
}

impl TemplateBuilder {
    fn new(id: TemplateId, name: String) -> Self {
        Self {
            id,
            name,
            description: String::new(),
            max_stack: DEFAULT_MAX_STACK,
            capabilities: Vec::new(),
        }
    }

    /// Sets the display description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the maximum stack size (clamped to at least 1).
    #[must_use]
    pub fn max_stack(mut self, max_stack: u32) -> Self {
        self.max_stack = max_stack.max(1);
        self
    }

    /// Declares a capability prototype.
    #[must_use]
    pub fn capability(mut self, capability: impl Capability + 'static) -> Self {
        if self
            .capabilities
            .iter()
            .any(|c| c.tag() == capability.tag())
        {
            tracing::warn!(
                template = %self.id,
                tag = %capability.tag(),
                "duplicate capability declaration replaces the earlier one"
            );
            self.capabilities.retain(|c| c.tag() != capability.tag());
        }
        self.capabilities.push(Box::new(capability));
        self
    }

    /// Builds the shared template.
    #[must_use]
    pub fn build(self) -> Arc<Template> {
        Arc::new(Template {
            id: self.id,
            name: self.name,
            description: self.description,
            max_stack: self.max_stack,
            capabilities: self.capabilities,
        })
    }
}

/// Compatibility filter parameterizing an inventory: which templates it
/// stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptRule {
    /// Every template is accepted.
    #[default]
    Any,
    /// Only templates declaring the given capability are accepted.
    Requires(CapabilityTag),
}

impl AcceptRule {
    /// Checks whether the rule admits a template.
    #[must_use]
    pub fn admits(&self, template: &Template) -> bool {
        match self {
            Self::Any => true,
            Self::Requires(tag) => template.has_capability(*tag),
        }
    }
}
