//! Handler registry with an explicit activation lifecycle.
//!
//! The registry maps command names to handlers. It is populated once on
//! extension activation and cleared on deactivation — after teardown no
//! handler can run against a torn-down host, because lookups simply
//! fail and the dispatcher answers with a command error.
//!
//! Components receive the registry by explicit injection (an `Arc`
//! handed out by the extension), never through ambient lookup.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::HandlerError;
use crate::host::session::HostSession;

/// Handler implementation signature.
///
/// Handlers receive the host session and the raw parameter map; they
/// validate parameters defensively (the client façade already validated
/// once) and return a result document.
pub type HandlerFn =
    Arc<dyn Fn(&mut dyn HostSession, Map<String, Value>) -> Result<Value, HandlerError> + Send + Sync>;

/// One registered command handler.
#[derive(Clone)]
pub struct Handler {
    /// Command name clients use to invoke this handler.
    pub name: String,
    /// Human-readable description for diagnostics.
    pub description: String,
    /// Whether the handler touches host-scripting state and must run on
    /// the host's main tick. All built-ins set this; embedders may
    /// register thread-safe handlers that clear it.
    pub requires_main_thread: bool,
    /// The handler implementation.
    pub execute: HandlerFn,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("requires_main_thread", &self.requires_main_thread)
            .finish_non_exhaustive()
    }
}

/// Name → handler table for one extension activation.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    /// Register a handler, replacing any previous registration under
    /// the same name.
    pub fn register(&mut self, handler: Handler) {
        if self.handlers.insert(handler.name.clone(), handler).is_some() {
            log::warn!("[Registry] Replaced existing handler registration");
        }
    }

    /// Convenience registration from parts.
    pub fn register_fn<F>(&mut self, name: &str, description: &str, execute: F)
    where
        F: Fn(&mut dyn HostSession, Map<String, Value>) -> Result<Value, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.register(Handler {
            name: name.to_string(),
            description: description.to_string(),
            requires_main_thread: true,
            execute: Arc::new(execute),
        });
    }

    /// Look up a handler by command name.
    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    /// Whether a handler is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered command names, sorted for stable output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handlers are registered (e.g. after deactivation).
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Discard every registration. Called on extension deactivation.
    pub fn clear(&mut self) {
        let count = self.handlers.len();
        self.handlers.clear();
        log::info!("[Registry] Cleared {count} handler registrations");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_handler(name: &str) -> Handler {
        Handler {
            name: name.to_string(),
            description: "test".to_string(),
            requires_main_thread: true,
            execute: Arc::new(|_, _| Ok(json!(null))),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());

        registry.register(noop_handler("get_scene_info"));
        assert!(registry.contains("get_scene_info"));
        assert!(!registry.contains("frobnicate"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_re_registration_replaces() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop_handler("execute_code"));
        let mut replacement = noop_handler("execute_code");
        replacement.description = "newer".to_string();
        registry.register(replacement);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("execute_code").unwrap().description, "newer");
    }

    #[test]
    fn test_names_are_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop_handler("zeta"));
        registry.register(noop_handler("alpha"));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_clear_discards_everything() {
        let mut registry = HandlerRegistry::new();
        registry.register(noop_handler("get_scene_info"));
        registry.register(noop_handler("execute_code"));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get("get_scene_info").is_none());
    }
}
