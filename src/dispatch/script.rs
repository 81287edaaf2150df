//! Plain scripts addressed by path, bypassing controllers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::controller::{ActionError, Layout};

/// What a script may touch while it runs.
pub struct ScriptContext<'a> {
    /// Layout wrapped around the output afterwards. Clearing its name
    /// disables wrapping.
    pub layout: &'a mut Layout,
    pub body: &'a mut String,
}

pub trait Script: Send + Sync {
    fn run(&self, ctx: &mut ScriptContext<'_>) -> Result<(), ActionError>;
}

impl<F> Script for F
where
    F: Fn(&mut ScriptContext<'_>) -> Result<(), ActionError> + Send + Sync,
{
    fn run(&self, ctx: &mut ScriptContext<'_>) -> Result<(), ActionError> {
        self(ctx)
    }
}

/// Lookup of scripts by normalized path.
pub trait ScriptCatalog: Send + Sync {
    fn find(&self, path: &str) -> Option<Arc<dyn Script>>;
}

/// Paths a script may be addressed by: ASCII alphanumerics plus `/ _ -`.
pub fn is_script_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-'))
}

/// In-memory script catalog.
#[derive(Default, Clone)]
pub struct ScriptTable {
    scripts: HashMap<String, Arc<dyn Script>>,
}

impl ScriptTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `script` under `path`. Replaces any previous entry.
    pub fn insert(&mut self, path: impl Into<String>, script: impl Script + 'static) -> &mut Self {
        self.scripts.insert(path.into(), Arc::new(script));
        self
    }

    /// Register a closure under `path`.
    pub fn insert_fn<F>(&mut self, path: impl Into<String>, script: F) -> &mut Self
    where
        F: Fn(&mut ScriptContext<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.insert(path, script)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl ScriptCatalog for ScriptTable {
    fn find(&self, path: &str) -> Option<Arc<dyn Script>> {
        self.scripts.get(path).cloned()
    }
}

impl fmt::Debug for ScriptTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.scripts.keys()).finish()
    }
}
