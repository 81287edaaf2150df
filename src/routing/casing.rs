//! Identifier casing policy.
//!
//! Route segments arrive in URL case (`edit-post`) and are matched against
//! controller and action names in handler case (`editPost`). Both the
//! resolver and link generation go through the same [`NameCasing`] so a
//! route always renders back to a link that resolves to itself.

/// Converts between URL segments and handler identifiers.
pub trait NameCasing: Send + Sync + std::fmt::Debug {
    /// Convert a raw path segment into a handler/action identifier.
    fn to_handler_case(&self, segment: &str) -> String;

    /// Convert a handler/action identifier back into a path segment.
    fn to_url_case(&self, name: &str) -> String;
}

/// Lower camel case for identifiers, kebab case for URLs.
///
/// - `Users` → `users`
/// - `edit-post` → `editPost`
/// - `editPost` → `edit-post` (URL direction)
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCasing;

impl NameCasing for DefaultCasing {
    fn to_handler_case(&self, segment: &str) -> String {
        let mut out = String::with_capacity(segment.len());
        for (i, word) in segment.split('-').filter(|w| !w.is_empty()).enumerate() {
            let mut chars = word.chars();
            if let Some(first) = chars.next() {
                if i == 0 {
                    out.extend(first.to_lowercase());
                } else {
                    out.extend(first.to_uppercase());
                }
                out.push_str(chars.as_str());
            }
        }
        out
    }

    fn to_url_case(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 4);
        for (i, c) in name.chars().enumerate() {
            if c.is_uppercase() {
                if i > 0 {
                    out.push('-');
                }
                out.extend(c.to_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Capitalize the first character (`blog` → `Blog`). Used for type names in logs.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
