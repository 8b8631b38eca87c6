//! Plugin entity and hook capability tags.
//!
//! Plugins are modeled as a registered-capability table rather than
//! dynamically loaded code: each plugin declares which hook kinds it
//! provides, and the Plugin Host invokes registered handlers in
//! registration order.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PluginId, Timestamp};

/// The pipeline points a plugin can hook into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    /// Runs before generation; may augment the gathered context.
    PreHook,
    /// Runs after completion; side effects only.
    PostHook,
}

/// An installed plugin.
///
/// Hooks run only when the plugin is both installed and active. The
/// configuration blob is opaque to the core and owned by the plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    id: PluginId,
    name: String,
    category: String,
    installed: bool,
    active: bool,
    capabilities: Vec<HookKind>,
    config: serde_json::Value,
    last_updated: Timestamp,
}

impl Plugin {
    /// Creates an installed plugin with the given capabilities.
    pub fn new(
        id: PluginId,
        name: impl Into<String>,
        category: impl Into<String>,
        capabilities: Vec<HookKind>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            category: category.into(),
            installed: true,
            active: false,
            capabilities,
            config: serde_json::Value::Null,
            last_updated: Timestamp::now(),
        }
    }

    /// Sets the initial active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Sets the opaque configuration blob.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Toggles the active flag.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        self.last_updated = Timestamp::now();
    }

    /// Marks the plugin uninstalled (and therefore inactive).
    pub fn uninstall(&mut self) {
        self.installed = false;
        self.active = false;
        self.last_updated = Timestamp::now();
    }

    /// Returns true if hooks of `kind` should run for this plugin.
    pub fn runs(&self, kind: HookKind) -> bool {
        self.installed && self.active && self.capabilities.contains(&kind)
    }

    /// Returns the plugin ID.
    pub fn id(&self) -> &PluginId {
        &self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the category label.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns true if the plugin is installed.
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Returns true if the plugin is active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the declared hook capabilities.
    pub fn capabilities(&self) -> &[HookKind] {
        &self.capabilities
    }

    /// Returns the opaque configuration blob.
    pub fn config(&self) -> &serde_json::Value {
        &self.config
    }
}
