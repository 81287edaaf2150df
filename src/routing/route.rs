//! The normalized route triple.

use std::fmt;

use thiserror::Error;

use crate::routing::casing::NameCasing;

/// Name used when a path omits the handler or the action.
pub const INDEX: &str = "index";

/// Errors produced while turning a path into a [`Route`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// A handler or action segment is not a valid identifier.
    #[error("invalid route {path:?}: {segment:?} is not a valid identifier")]
    Invalid { path: String, segment: String },
}

/// A resolved `(handler, action, params)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    handler: String,
    action: String,
    params: Vec<String>,
}

impl Route {
    /// Build a route from already-normalized parts.
    pub fn new(handler: impl Into<String>, action: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            handler: handler.into(),
            action: action.into(),
            params,
        }
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn set_handler(&mut self, handler: impl Into<String>) -> &mut Self {
        self.handler = handler.into();
        self
    }

    pub fn set_action(&mut self, action: impl Into<String>) -> &mut Self {
        self.action = action.into();
        self
    }

    pub fn set_params(&mut self, params: Vec<String>) -> &mut Self {
        self.params = params;
        self
    }

    /// `handler/action`, without parameters.
    pub fn action_key(&self) -> String {
        format!("{}/{}", self.handler, self.action)
    }

    /// Render the route as a relative link, identifiers in URL case.
    pub fn link(&self, casing: &dyn NameCasing) -> String {
        let mut link = format!(
            "{}/{}",
            casing.to_url_case(&self.handler),
            casing.to_url_case(&self.action)
        );
        if !self.params.is_empty() {
            link.push('/');
            link.push_str(&self.params.join("/"));
        }
        link
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::new(INDEX, INDEX, Vec::new())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.handler, self.action)?;
        for param in &self.params {
            write!(f, "/{}", param)?;
        }
        Ok(())
    }
}

/// `^[A-Za-z][A-Za-z0-9]*$`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// Non-empty ASCII alphanumeric string. Action names in access tables use this
/// weaker check.
pub fn is_alphanumeric(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Integer-looking segment, optionally signed (`42`, `-7`).
pub fn is_numeric(segment: &str) -> bool {
    let digits = segment
        .strip_prefix('-')
        .or_else(|| segment.strip_prefix('+'))
        .unwrap_or(segment);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}
