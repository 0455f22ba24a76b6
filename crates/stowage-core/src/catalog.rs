//! Process-wide template catalog.
//!
//! The catalog is populated once at startup from external content and
//! treated as read-only afterwards. Lookup normalizes ids (trim +
//! ASCII-lowercase), so save data and caller-supplied ids tolerate case
//! and whitespace drift. The lifecycle is explicit: [`install`] once,
//! [`reset`] to tear down (tests, content reload) — there is no lazy
//! reinitialization.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use stowage_common::TemplateId;

use crate::template::Template;

static INSTALLED: RwLock<Option<TemplateCatalog>> = RwLock::new(None);

/// A set of templates keyed by normalized id.
#[derive(Debug, Default)]
pub struct TemplateCatalog {
    templates: AHashMap<TemplateId, Arc<Template>>,
}

impl TemplateCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template under its normalized id. A template already
    /// registered under the same id is replaced.
    pub fn register(&mut self, template: Arc<Template>) {
        let key = TemplateId::normalized(template.id().as_str());
        if self.templates.insert(key, template).is_some() {
            tracing::warn!("catalog registration replaced an existing template");
        }
    }

    /// Resolves a template by id (normalized lookup).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Template>> {
        self.templates.get(&TemplateId::normalized(id)).cloned()
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Checks whether the catalog holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Installs the process-wide catalog.
///
/// Returns false (and reports) if a catalog is already installed; the
/// existing catalog is kept.
pub fn install(catalog: TemplateCatalog) -> bool {
    let mut slot = INSTALLED.write();
    if slot.is_some() {
        tracing::error!("template catalog is already installed; call reset() first");
        return false;
    }
    *slot = Some(catalog);
    true
}

/// Tears down the process-wide catalog.
pub fn reset() {
    *INSTALLED.write() = None;
}

/// Checks whether a catalog is installed.
#[must_use]
pub fn is_installed() -> bool {
    INSTALLED.read().is_some()
}

/// Resolves a template by id against the installed catalog.
///
/// Returns `None` (and reports) when no catalog is installed.
#[must_use]
pub fn resolve(id: &str) -> Option<Arc<Template>> {
    let slot = INSTALLED.read();
    match slot.as_ref() {
        Some(catalog) => catalog.get(id),
        None => {
            tracing::error!(id, "template lookup before a catalog was installed");
            None
        }
    }
}
