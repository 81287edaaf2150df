//! Authenticator seam consumed by the dispatcher.

use std::collections::BTreeMap;

/// Who is calling, and what happens when they are turned away.
pub trait Authenticator: Send {
    fn is_authenticated(&self) -> bool;

    fn current_auth_level(&self) -> u32;

    /// Called once when a request is denied.
    fn on_not_authorized(&mut self);
}

/// Resolves a `Bearer` token against a token → level table.
#[derive(Debug, Clone, Default)]
pub struct BearerAuthenticator {
    level: Option<u32>,
    login_route: Option<String>,
    redirect: Option<String>,
    denied: bool,
}

impl BearerAuthenticator {
    /// Build from the raw `Authorization` header value.
    pub fn from_header(
        header: Option<&str>,
        tokens: &BTreeMap<String, u32>,
        login_route: Option<String>,
    ) -> Self {
        let level = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .and_then(|token| tokens.get(token.trim()))
            .copied();

        Self {
            level,
            login_route,
            redirect: None,
            denied: false,
        }
    }

    /// Where the caller should be sent after a denial, if anywhere.
    pub fn redirect(&self) -> Option<&str> {
        self.redirect.as_deref()
    }

    pub fn was_denied(&self) -> bool {
        self.denied
    }
}

impl Authenticator for BearerAuthenticator {
    fn is_authenticated(&self) -> bool {
        self.level.is_some()
    }

    fn current_auth_level(&self) -> u32 {
        self.level.unwrap_or(0)
    }

    fn on_not_authorized(&mut self) {
        self.denied = true;
        self.redirect = self.login_route.clone();
        tracing::debug!(redirect = ?self.redirect, "Caller not authorized");
    }
}

/// Authenticator with a fixed identity. Useful for internal calls.
#[derive(Debug, Clone, Default)]
pub struct FixedAuthenticator {
    level: Option<u32>,
    denials: usize,
}

impl FixedAuthenticator {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_level(level: u32) -> Self {
        Self {
            level: Some(level),
            denials: 0,
        }
    }

    /// Number of times `on_not_authorized` fired.
    pub fn denials(&self) -> usize {
        self.denials
    }
}

impl Authenticator for FixedAuthenticator {
    fn is_authenticated(&self) -> bool {
        self.level.is_some()
    }

    fn current_auth_level(&self) -> u32 {
        self.level.unwrap_or(0)
    }

    fn on_not_authorized(&mut self) {
        self.denials += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> BTreeMap<String, u32> {
        BTreeMap::from([("editor-token".to_string(), 2), ("reader-token".to_string(), 1)])
    }

    #[test]
    fn test_bearer_token_lookup() {
        let auth = BearerAuthenticator::from_header(Some("Bearer editor-token"), &tokens(), None);
        assert!(auth.is_authenticated());
        assert_eq!(auth.current_auth_level(), 2);

        let auth = BearerAuthenticator::from_header(Some("Bearer nope"), &tokens(), None);
        assert!(!auth.is_authenticated());
        assert_eq!(auth.current_auth_level(), 0);

        let auth = BearerAuthenticator::from_header(Some("editor-token"), &tokens(), None);
        assert!(!auth.is_authenticated());

        let auth = BearerAuthenticator::from_header(None, &tokens(), None);
        assert!(!auth.is_authenticated());
    }

    #[test]
    fn test_denial_records_login_redirect() {
        let mut auth =
            BearerAuthenticator::from_header(None, &tokens(), Some("account/login".into()));
        assert!(!auth.was_denied());
        auth.on_not_authorized();
        assert!(auth.was_denied());
        assert_eq!(auth.redirect(), Some("account/login"));
    }

    #[test]
    fn test_fixed_authenticator_counts_denials() {
        let mut auth = FixedAuthenticator::anonymous();
        auth.on_not_authorized();
        auth.on_not_authorized();
        assert_eq!(auth.denials(), 2);
        assert!(FixedAuthenticator::with_level(3).is_authenticated());
    }
}
