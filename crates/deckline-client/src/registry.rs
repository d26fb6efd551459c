use std::collections::HashMap;
use std::sync::Arc;

use deckline_core::{Handler, HandlerKind};

/// Static table of the handlers the embedding application registered at
/// startup. Read-only once the client is constructed; lookups are exact
/// entity-id matches within each message family.
#[derive(Default)]
pub struct HandlerRegistry {
    actions: HashMap<String, Arc<dyn Handler>>,
    connectors: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its descriptor's entity id and kind.
    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        let descriptor = handler.descriptor();
        let entity_id = descriptor.entity_id.as_str().to_string();
        match descriptor.kind {
            HandlerKind::Action => self.actions.insert(entity_id, handler),
            HandlerKind::Connector => self.connectors.insert(entity_id, handler),
        };
    }

    pub fn get_action(&self, entity_id: &str) -> Option<Arc<dyn Handler>> {
        self.actions.get(entity_id).map(Arc::clone)
    }

    pub fn get_connector(&self, entity_id: &str) -> Option<Arc<dyn Handler>> {
        self.connectors.get(entity_id).map(Arc::clone)
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.actions.contains_key(entity_id) || self.connectors.contains_key(entity_id)
    }

    /// All registered entity ids, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .actions
            .keys()
            .chain(self.connectors.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.actions.len() + self.connectors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deckline_core::{
        HandlerDescriptor, HandlerError, Invocation, InvocationContext,
    };

    struct DummyHandler {
        descriptor: HandlerDescriptor,
    }

    impl DummyHandler {
        fn action(id: &str) -> Arc<dyn Handler> {
            Arc::new(Self {
                descriptor: HandlerDescriptor::action(id),
            })
        }

        fn connector(id: &str) -> Arc<dyn Handler> {
            Arc::new(Self {
                descriptor: HandlerDescriptor::connector(id),
            })
        }
    }

    #[async_trait]
    impl Handler for DummyHandler {
        fn descriptor(&self) -> &HandlerDescriptor {
            &self.descriptor
        }

        async fn invoke(
            &self,
            _invocation: Invocation,
            _ctx: &InvocationContext,
        ) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn register_and_get_by_kind() {
        let mut registry = HandlerRegistry::new();
        registry.register(DummyHandler::action("p.action.play"));
        registry.register(DummyHandler::connector("p.connector.volume"));

        assert_eq!(registry.count(), 2);
        assert!(registry.get_action("p.action.play").is_some());
        assert!(registry.get_connector("p.connector.volume").is_some());
        // Kinds do not cross-match.
        assert!(registry.get_action("p.connector.volume").is_none());
        assert!(registry.get_connector("p.action.play").is_none());
    }

    #[test]
    fn contains_spans_both_kinds() {
        let mut registry = HandlerRegistry::new();
        registry.register(DummyHandler::action("a"));
        registry.register(DummyHandler::connector("c"));
        assert!(registry.contains("a"));
        assert!(registry.contains("c"));
        assert!(!registry.contains("x"));
    }

    #[test]
    fn names_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register(DummyHandler::action("b"));
        registry.register(DummyHandler::connector("a"));
        registry.register(DummyHandler::action("c"));
        assert_eq!(registry.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn re_registering_replaces() {
        let mut registry = HandlerRegistry::new();
        registry.register(DummyHandler::action("a"));
        registry.register(DummyHandler::action("a"));
        assert_eq!(registry.count(), 1);
    }
}
