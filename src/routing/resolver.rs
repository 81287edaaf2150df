//! Raw path → [`Route`] resolution.
//!
//! # Algorithm
//! ```text
//! "\Blog\Edit-Post\5.html"
//!     → separators:  "/Blog/Edit-Post/5.html"
//!     → trim:        "Blog/Edit-Post/5.html"
//!     → extension:   "Blog/Edit-Post/5"
//!     → split:       ["Blog", "Edit-Post", "5"]
//!     → casing:      handler "blog", action "editPost", params ["5"]
//! ```

use std::sync::Arc;

use crate::routing::casing::{DefaultCasing, NameCasing};
use crate::routing::route::{is_identifier, is_numeric, Route, RouteError, INDEX};

/// Clean a raw path: unify separators, drop one leading and one trailing
/// separator, and cut everything from the first `.`.
pub fn normalize_path(raw: &str) -> String {
    let mut path = raw.replace('\\', "/");
    if path.starts_with('/') {
        path.remove(0);
    }
    if path.ends_with('/') {
        path.pop();
    }
    if let Some(end) = path.find('.') {
        path.truncate(end);
    }
    path
}

/// Turns raw paths and pre-split segment lists into routes.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    casing: Arc<dyn NameCasing>,
    default_handler: String,
}

impl Default for RouteResolver {
    fn default() -> Self {
        Self::new(Arc::new(DefaultCasing))
    }
}

impl RouteResolver {
    pub fn new(casing: Arc<dyn NameCasing>) -> Self {
        Self {
            casing,
            default_handler: INDEX.to_string(),
        }
    }

    /// Handler used when the path names none.
    pub fn with_default_handler(mut self, handler: impl Into<String>) -> Self {
        self.default_handler = handler.into();
        self
    }

    pub fn casing(&self) -> &Arc<dyn NameCasing> {
        &self.casing
    }

    pub fn default_handler(&self) -> &str {
        &self.default_handler
    }

    /// Resolve a raw request path.
    pub fn resolve(&self, raw: &str) -> Result<Route, RouteError> {
        let path = normalize_path(raw);
        let mut segments: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };

        let handler_segment = if segments.is_empty() {
            self.default_handler.as_str()
        } else {
            segments.remove(0)
        };

        let action_segment = match segments.first().copied() {
            None => INDEX,
            Some(segment) if is_numeric(segment) => INDEX,
            Some(segment) if segment.is_empty() => {
                segments.remove(0);
                INDEX
            }
            Some(_) => segments.remove(0),
        };

        let handler = self.identifier(raw, handler_segment)?;
        let action = self.identifier(raw, action_segment)?;
        let params = segments.into_iter().map(str::to_string).collect();

        tracing::trace!(path = %raw, handler = %handler, action = %action, "Route resolved");
        Ok(Route::new(handler, action, params))
    }

    /// Build a route from trusted, pre-split segments. No identifier
    /// validation is applied; the numeric action rule still is.
    pub fn resolve_segments<I, S>(&self, segments: I) -> Route
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut segments = segments.into_iter().map(Into::into);
        let handler = segments.next().unwrap_or_else(|| self.default_handler.clone());
        let mut params: Vec<String> = segments.collect();

        let action = if params.first().is_some_and(|segment| !is_numeric(segment)) {
            params.remove(0)
        } else {
            INDEX.to_string()
        };

        Route::new(handler, action, params)
    }

    fn identifier(&self, raw: &str, segment: &str) -> Result<String, RouteError> {
        let invalid = || RouteError::Invalid {
            path: raw.to_string(),
            segment: segment.to_string(),
        };

        let well_formed = segment.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !well_formed {
            return Err(invalid());
        }

        let name = self.casing.to_handler_case(segment);
        if is_identifier(&name) {
            Ok(name)
        } else {
            Err(invalid())
        }
    }
}
