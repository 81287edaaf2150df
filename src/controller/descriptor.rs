//! Static controller descriptors.
//!
//! A descriptor is the declared shape of a controller type: its handler name
//! and its actions with their positional arity. Access tables and the
//! dispatcher's existence checks are derived from it.

use crate::routing::casing::capitalize;

/// Suffix appended to handler names to form controller type names.
pub const CONTROLLER_SUFFIX: &str = "Controller";

/// One invokable action and how many positional parameters it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: &'static str,
    pub required: usize,
    pub optional: usize,
}

impl ActionSpec {
    pub const fn new(name: &'static str, required: usize) -> Self {
        Self {
            name,
            required,
            optional: 0,
        }
    }

    /// Allow up to `optional` trailing parameters beyond the required ones.
    pub const fn with_optional(mut self, optional: usize) -> Self {
        self.optional = optional;
        self
    }

    /// Whether `count` positional parameters fit this action.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.required && count <= self.required + self.optional
    }
}

/// Declared shape of a controller type.
#[derive(Debug, PartialEq, Eq)]
pub struct ControllerDescriptor {
    /// Handler name as it appears in routes (`blog`).
    pub name: &'static str,
    pub actions: &'static [ActionSpec],
}

impl ControllerDescriptor {
    pub fn action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.action(name).is_some()
    }

    pub fn action_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actions.iter().map(|a| a.name)
    }

    /// `BlogController` for `blog`.
    pub fn type_name(&self) -> String {
        format!("{}{}", capitalize(self.name), CONTROLLER_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BLOG: ControllerDescriptor = ControllerDescriptor {
        name: "blog",
        actions: &[
            ActionSpec::new("index", 0),
            ActionSpec::new("show", 1),
            ActionSpec::new("list", 0).with_optional(2),
        ],
    };

    #[test]
    fn test_action_lookup() {
        assert!(BLOG.has_action("show"));
        assert!(!BLOG.has_action("Show"));
        assert_eq!(BLOG.action_names().collect::<Vec<_>>(), ["index", "show", "list"]);
        assert_eq!(BLOG.type_name(), "BlogController");
    }

    #[test]
    fn test_arity() {
        let show = BLOG.action("show").unwrap();
        assert!(!show.accepts(0));
        assert!(show.accepts(1));
        assert!(!show.accepts(2));

        let list = BLOG.action("list").unwrap();
        assert!((0..=2).all(|n| list.accepts(n)));
        assert!(!list.accepts(3));
    }
}
