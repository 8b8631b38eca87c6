//! Plugin Host - tracks installed plugins and runs their hooks.
//!
//! Hooks execute in registration order. A failing hook is logged and
//! skipped; it never aborts the generation pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, DomainId, ErrorCode, PluginId, SessionId};
use crate::domain::knowledge::ContextSnippet;
use crate::domain::plugin::{HookKind, Plugin};
use crate::domain::session::Message;

/// Context handed to pre-hooks, which may augment it.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub session_id: SessionId,
    pub domain_id: DomainId,
    /// The user's message text.
    pub query: String,
    /// Snippets contributed by plugins (merged with retrieval results).
    pub snippets: Vec<ContextSnippet>,
    /// Free-form notes appended to the system prompt.
    pub notes: Vec<String>,
}

impl HookContext {
    /// Creates an empty context for a query.
    pub fn new(session_id: SessionId, domain_id: DomainId, query: impl Into<String>) -> Self {
        Self {
            session_id,
            domain_id,
            query: query.into(),
            snippets: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// A plugin's pre-generation hook.
#[async_trait]
pub trait PreHookHandler: Send + Sync {
    /// Returns an augmented copy of the context.
    async fn run(&self, context: HookContext) -> Result<HookContext, DomainError>;
}

/// A plugin's post-completion hook. Side effects only.
#[async_trait]
pub trait PostHookHandler: Send + Sync {
    async fn run(&self, message: &Message) -> Result<(), DomainError>;
}

struct PluginEntry {
    plugin: Plugin,
    pre: Option<Arc<dyn PreHookHandler>>,
    post: Option<Arc<dyn PostHookHandler>>,
}

/// Tracks installed plugins and invokes their hooks.
///
/// Registration order is fixed and determines hook execution order.
pub struct PluginHost {
    entries: RwLock<Vec<PluginEntry>>,
}

impl PluginHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Registers a plugin with its hook handlers.
    ///
    /// Handlers for hook kinds the plugin does not declare are ignored
    /// at invocation time.
    pub async fn register(
        &self,
        plugin: Plugin,
        pre: Option<Arc<dyn PreHookHandler>>,
        post: Option<Arc<dyn PostHookHandler>>,
    ) {
        let mut entries = self.entries.write().await;
        entries.push(PluginEntry { plugin, pre, post });
    }

    /// Lists all registered plugins.
    pub async fn list_plugins(&self) -> Vec<Plugin> {
        let entries = self.entries.read().await;
        entries.iter().map(|e| e.plugin.clone()).collect()
    }

    /// Toggles a plugin's active flag.
    ///
    /// # Errors
    ///
    /// - `PluginNotInstalled` if the plugin is unknown or uninstalled
    pub async fn set_active(&self, plugin_id: &PluginId, active: bool) -> Result<Plugin, DomainError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.plugin.id() == plugin_id && e.plugin.is_installed())
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PluginNotInstalled,
                    format!("Plugin '{}' is not installed", plugin_id),
                )
            })?;
        entry.plugin.set_active(active);
        Ok(entry.plugin.clone())
    }

    /// Runs active plugins' pre-hooks in registration order.
    ///
    /// A hook failure is logged and skipped; the context from the last
    /// successful hook carries forward.
    pub async fn run_pre_hooks(&self, context: HookContext) -> HookContext {
        let handlers: Vec<(PluginId, Arc<dyn PreHookHandler>)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|e| e.plugin.runs(HookKind::PreHook))
                .filter_map(|e| e.pre.clone().map(|h| (e.plugin.id().clone(), h)))
                .collect()
        };

        let mut current = context;
        for (plugin_id, handler) in handlers {
            match handler.run(current.clone()).await {
                Ok(augmented) => current = augmented,
                Err(err) => {
                    tracing::warn!(plugin = %plugin_id, error = %err, "pre-hook failed, skipping");
                }
            }
        }
        current
    }

    /// Runs active plugins' post-hooks in registration order.
    ///
    /// Fire-and-forget semantics: failures are logged, never propagated.
    pub async fn run_post_hooks(&self, message: &Message) {
        let handlers: Vec<(PluginId, Arc<dyn PostHookHandler>)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .filter(|e| e.plugin.runs(HookKind::PostHook))
                .filter_map(|e| e.post.clone().map(|h| (e.plugin.id().clone(), h)))
                .collect()
        };

        for (plugin_id, handler) in handlers {
            if let Err(err) = handler.run(message).await {
                tracing::warn!(plugin = %plugin_id, error = %err, "post-hook failed");
            }
        }
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}
