//! Session-scoped handler instances.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::controller::{
    ActionContext, ActionError, Controller, ControllerDescriptor, ControllerRegistry, Layout,
    Setup, View,
};
use crate::routing::Route;
use crate::security::access_control::AccessTable;

/// Persisted part of a handler instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerSnapshot {
    #[serde(default)]
    pub state: Value,
    pub access: AccessTable,
    #[serde(default)]
    pub layout: Option<String>,
}

/// A live controller together with its access table, view and layout.
pub struct HandlerInstance {
    controller: Box<dyn Controller>,
    access: AccessTable,
    view: View,
    layout: Option<Layout>,
}

impl HandlerInstance {
    /// Construct a fresh instance and run its startup hook.
    pub fn start(mut controller: Box<dyn Controller>) -> Result<Self, ActionError> {
        let descriptor = controller.descriptor();
        let mut access = AccessTable::for_actions(descriptor.action_names());
        let mut layout = None;

        controller.start(&mut Setup {
            access: &mut access,
            layout: &mut layout,
        })?;

        Ok(Self {
            controller,
            access,
            view: View::default(),
            layout,
        })
    }

    /// Rebuild an instance from a snapshot. The startup hook is not re-run.
    pub fn restore(
        mut controller: Box<dyn Controller>,
        snapshot: HandlerSnapshot,
    ) -> Result<Self, ActionError> {
        controller.restore(snapshot.state)?;

        let mut access = snapshot.access;
        access.reconcile(controller.descriptor().action_names());

        Ok(Self {
            controller,
            access,
            view: View::default(),
            layout: snapshot.layout.map(Layout::new),
        })
    }

    pub fn snapshot(&self) -> Result<HandlerSnapshot, ActionError> {
        Ok(HandlerSnapshot {
            state: self.controller.snapshot()?,
            access: self.access.clone(),
            layout: self.layout.as_ref().map(|l| l.name().to_string()),
        })
    }

    pub fn descriptor(&self) -> &'static ControllerDescriptor {
        self.controller.descriptor()
    }

    pub fn access(&self) -> &AccessTable {
        &self.access
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.layout.as_ref()
    }

    /// Bind the view to `(handler, action)` and run the action. Returns the
    /// internal redirect target, if the action asked for one.
    pub(crate) fn invoke(
        &mut self,
        handler: &str,
        action: &str,
        params: &[String],
    ) -> Result<Option<Route>, ActionError> {
        self.view.bind(handler, action);
        let mut ctx = ActionContext::new(&mut self.view, &mut self.layout);
        self.controller.invoke(action, params, &mut ctx)?;
        Ok(ctx.take_redirect())
    }
}

impl fmt::Debug for HandlerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerInstance")
            .field("controller", &self.descriptor().type_name())
            .field("access", &self.access)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

/// Handler name → instance, for one session.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    instances: HashMap<String, HandlerInstance>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&HandlerInstance> {
        self.instances.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut HandlerInstance> {
        self.instances.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    /// Add an externally created instance. Returns `false` and leaves the
    /// registry untouched if the name is taken.
    pub fn register(&mut self, name: impl Into<String>, instance: HandlerInstance) -> bool {
        let name = name.into();
        if self.instances.contains_key(&name) {
            return false;
        }
        self.instances.insert(name, instance);
        true
    }

    /// The instance registered under `name`, creating it with `create` if
    /// absent. The flag is `true` when the instance was created by this call.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        name: &str,
        create: impl FnOnce() -> Result<HandlerInstance, E>,
    ) -> Result<(&mut HandlerInstance, bool), E> {
        match self.instances.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok((entry.into_mut(), false)),
            Entry::Vacant(entry) => Ok((entry.insert(create()?), true)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<HandlerInstance> {
        self.instances.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn snapshot(&self) -> Result<BTreeMap<String, HandlerSnapshot>, (String, ActionError)> {
        self.instances
            .iter()
            .map(|(name, instance)| {
                instance
                    .snapshot()
                    .map(|snapshot| (name.clone(), snapshot))
                    .map_err(|e| (name.clone(), e))
            })
            .collect()
    }

    /// Rehydrate from snapshots. Entries whose controller type is no longer
    /// registered, or whose state fails to restore, are dropped; the next
    /// request for them starts a fresh instance.
    pub fn restore(
        snapshots: BTreeMap<String, HandlerSnapshot>,
        controllers: &ControllerRegistry,
    ) -> Self {
        let mut registry = Self::new();
        for (name, snapshot) in snapshots {
            let Some(entry) = controllers.get(&name) else {
                tracing::warn!(handler = %name, "Dropping snapshot of unregistered controller");
                continue;
            };
            match HandlerInstance::restore(entry.create(), snapshot) {
                Ok(instance) => {
                    registry.instances.insert(name, instance);
                }
                Err(e) => {
                    tracing::warn!(handler = %name, error = %e, "Dropping unrestorable controller state");
                }
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ActionSpec;

    static COUNTER: ControllerDescriptor = ControllerDescriptor {
        name: "counter",
        actions: &[ActionSpec::new("index", 0), ActionSpec::new("bump", 0), ActionSpec::new("admin", 0)],
    };

    #[derive(Default)]
    struct Counter {
        hits: u64,
        starts: u32,
    }

    impl Controller for Counter {
        fn descriptor(&self) -> &'static ControllerDescriptor {
            &COUNTER
        }

        fn start(&mut self, setup: &mut Setup<'_>) -> Result<(), ActionError> {
            self.starts += 1;
            setup.access.open_action("index")?;
            setup.access.set_level_for_action("admin", 5)?;
            *setup.layout = Some(Layout::new("main"));
            Ok(())
        }

        fn invoke(
            &mut self,
            action: &str,
            _params: &[String],
            ctx: &mut ActionContext<'_>,
        ) -> Result<(), ActionError> {
            if action == "bump" {
                self.hits += 1;
            }
            ctx.view.assign("hits", self.hits);
            Ok(())
        }

        fn snapshot(&self) -> Result<Value, ActionError> {
            Ok(serde_json::json!({ "hits": self.hits }))
        }

        fn restore(&mut self, state: Value) -> Result<(), ActionError> {
            self.hits = state["hits"].as_u64().ok_or_else(|| ActionError::failed("missing hits"))?;
            Ok(())
        }
    }

    fn controllers() -> ControllerRegistry {
        let mut registry = ControllerRegistry::new();
        registry.register(&COUNTER, || Box::new(Counter::default())).unwrap();
        registry
    }

    #[test]
    fn test_start_runs_hook_and_builds_table() {
        let instance = HandlerInstance::start(Box::new(Counter::default())).unwrap();
        assert!(instance.access().is_open("index"));
        assert_eq!(instance.access().required_level("admin").unwrap(), 5);
        assert_eq!(instance.access().required_level("bump").unwrap(), 1);
        assert_eq!(instance.layout().map(Layout::name), Some("main"));
    }

    #[test]
    fn test_invoke_binds_view() {
        let mut instance = HandlerInstance::start(Box::new(Counter::default())).unwrap();
        let redirect = instance.invoke("counter", "bump", &[]).unwrap();
        assert!(redirect.is_none());
        assert_eq!(instance.view().controller(), "counter");
        assert_eq!(instance.view().name(), "bump");
        assert_eq!(instance.view().get("hits"), Some(&Value::from(1)));
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut registry = HandlerRegistry::new();
        let mut instance = HandlerInstance::start(Box::new(Counter::default())).unwrap();
        instance.invoke("counter", "bump", &[]).unwrap();
        instance.invoke("counter", "bump", &[]).unwrap();
        assert!(registry.register("counter", instance));

        let snapshots = registry.snapshot().unwrap();
        let json = serde_json::to_string(&snapshots).unwrap();
        let snapshots = serde_json::from_str(&json).unwrap();

        let mut restored = HandlerRegistry::restore(snapshots, &controllers());
        let instance = restored.get_mut("counter").unwrap();
        assert!(instance.access().is_open("index"));
        assert_eq!(instance.access().required_level("admin").unwrap(), 5);
        assert_eq!(instance.layout().map(Layout::name), Some("main"));

        instance.invoke("counter", "bump", &[]).unwrap();
        assert_eq!(instance.view().get("hits"), Some(&Value::from(3)));
    }

    #[test]
    fn test_register_keeps_existing_instance() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.register("counter", HandlerInstance::start(Box::new(Counter::default())).unwrap()));
        assert!(!registry.register("counter", HandlerInstance::start(Box::new(Counter::default())).unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_or_try_insert_creates_once() {
        let mut registry = HandlerRegistry::new();
        let (_, created) = registry
            .get_or_try_insert_with("counter", || HandlerInstance::start(Box::new(Counter::default())))
            .unwrap();
        assert!(created);

        let (instance, created) = registry
            .get_or_try_insert_with("counter", || -> Result<HandlerInstance, ActionError> {
                panic!("must not construct twice")
            })
            .unwrap();
        assert!(!created);
        assert_eq!(instance.descriptor().name, "counter");
    }

    #[test]
    fn test_restore_drops_unknown_and_broken_entries() {
        let table = AccessTable::for_actions(["index"]);
        let snapshots = BTreeMap::from([
            (
                "ghost".to_string(),
                HandlerSnapshot { state: Value::Null, access: table.clone(), layout: None },
            ),
            (
                "counter".to_string(),
                HandlerSnapshot { state: Value::Null, access: table, layout: None },
            ),
        ]);
        let registry = HandlerRegistry::restore(snapshots, &controllers());
        assert!(registry.is_empty());
    }
}
