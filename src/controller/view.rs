//! View and layout bindings.
//!
//! These only carry what the dispatcher binds and what actions assign. How
//! they turn into output is the [`Renderer`](crate::dispatch::Renderer)'s job.

use std::collections::BTreeMap;

use serde_json::Value;

/// The view bound to the current `(controller, action)`.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    controller: String,
    name: String,
    data: BTreeMap<String, Value>,
    render: bool,
}

impl Default for View {
    fn default() -> Self {
        Self {
            controller: String::new(),
            name: String::new(),
            data: BTreeMap::new(),
            render: true,
        }
    }
}

impl View {
    /// Rebind to a new route target, dropping data from a previous request.
    pub fn bind(&mut self, controller: &str, action: &str) {
        self.controller = controller.to_string();
        self.name = action.to_string();
        self.data.clear();
        self.render = true;
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assign(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Skip rendering for this request.
    pub fn no_render(&mut self) {
        self.render = false;
    }

    pub fn should_render(&self) -> bool {
        self.render
    }
}

/// A named layout wrapping the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    name: String,
}

impl Layout {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}
