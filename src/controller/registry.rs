//! Handler name → controller factory.
//!
//! Populated at startup, read-only afterwards, shared via `Arc`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::controller::descriptor::ControllerDescriptor;
use crate::controller::Controller;
use crate::routing::route::is_identifier;

type Factory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("controller {0:?} is already registered")]
    Duplicate(String),

    #[error("controller {controller:?}: {reason}")]
    InvalidDescriptor { controller: String, reason: String },
}

/// A registered controller type.
#[derive(Clone)]
pub struct ControllerEntry {
    pub descriptor: &'static ControllerDescriptor,
    factory: Factory,
}

impl ControllerEntry {
    pub fn create(&self) -> Box<dyn Controller> {
        (self.factory)()
    }
}

impl fmt::Debug for ControllerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerEntry")
            .field("descriptor", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

/// Closed table of known controller types.
#[derive(Debug, Clone, Default)]
pub struct ControllerRegistry {
    entries: HashMap<String, ControllerEntry>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller type under its descriptor's name.
    pub fn register<F>(
        &mut self,
        descriptor: &'static ControllerDescriptor,
        factory: F,
    ) -> Result<&mut Self, RegistryError>
    where
        F: Fn() -> Box<dyn Controller> + Send + Sync + 'static,
    {
        validate_descriptor(descriptor)?;
        if self.entries.contains_key(descriptor.name) {
            return Err(RegistryError::Duplicate(descriptor.name.to_string()));
        }

        tracing::debug!(
            controller = %descriptor.type_name(),
            actions = descriptor.actions.len(),
            "Controller registered"
        );
        self.entries.insert(
            descriptor.name.to_string(),
            ControllerEntry {
                descriptor,
                factory: Arc::new(factory),
            },
        );
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&ControllerEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_descriptor(descriptor: &ControllerDescriptor) -> Result<(), RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidDescriptor {
        controller: descriptor.name.to_string(),
        reason,
    };

    if !is_identifier(descriptor.name) {
        return Err(invalid("name is not a valid identifier".to_string()));
    }

    let mut seen = BTreeSet::new();
    for action in descriptor.actions {
        if !is_identifier(action.name) {
            return Err(invalid(format!("action {:?} is not a valid identifier", action.name)));
        }
        if !seen.insert(action.name) {
            return Err(invalid(format!("action {:?} is declared twice", action.name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::descriptor::ActionSpec;
    use crate::controller::{ActionContext, ActionError};

    static PAGES: ControllerDescriptor = ControllerDescriptor {
        name: "pages",
        actions: &[ActionSpec::new("index", 0)],
    };

    static BROKEN: ControllerDescriptor = ControllerDescriptor {
        name: "broken",
        actions: &[ActionSpec::new("index", 0), ActionSpec::new("index", 1)],
    };

    static BAD_ACTION: ControllerDescriptor = ControllerDescriptor {
        name: "bad",
        actions: &[ActionSpec::new("do-it", 0)],
    };

    #[derive(Default)]
    struct Pages;

    impl Controller for Pages {
        fn descriptor(&self) -> &'static ControllerDescriptor {
            &PAGES
        }

        fn invoke(
            &mut self,
            _action: &str,
            _params: &[String],
            _ctx: &mut ActionContext<'_>,
        ) -> Result<(), ActionError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = ControllerRegistry::new();
        registry.register(&PAGES, || Box::new(Pages)).unwrap();

        let entry = registry.get("pages").unwrap();
        assert_eq!(entry.create().descriptor().name, "pages");
        assert!(registry.get("Pages").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut registry = ControllerRegistry::new();
        registry.register(&PAGES, || Box::new(Pages)).unwrap();
        let err = registry.register(&PAGES, || Box::new(Pages)).unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("pages".into()));
    }

    #[test]
    fn test_malformed_descriptors_are_rejected() {
        let mut registry = ControllerRegistry::new();
        assert!(matches!(
            registry.register(&BROKEN, || Box::new(Pages)),
            Err(RegistryError::InvalidDescriptor { .. })
        ));
        assert!(matches!(
            registry.register(&BAD_ACTION, || Box::new(Pages)),
            Err(RegistryError::InvalidDescriptor { .. })
        ));
        assert!(registry.is_empty());
    }
}
