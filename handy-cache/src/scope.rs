//! User-Scoped Key Naming
//!
//! Cache keys written on behalf of an authenticated caller are prefixed with
//! `user_{username}_` so one user's entries never collide with another's.
//! Keys containing [`NO_USER_DATA`] opt out and are shared by everyone.

use std::borrow::Cow;

/// Marker that keeps a key out of per-user scoping
pub const NO_USER_DATA: &str = "_noUserData_";

/// Caller identity as supplied by the host's authentication layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Username, if authenticated
    pub username: Option<String>,
}

impl Identity {
    /// No authenticated user; keys stay unscoped
    pub fn anonymous() -> Self {
        Self { username: None }
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
        }
    }

    /// Username if present and non-empty
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|name| !name.is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.username().is_some()
    }
}

/// Key scoping rules
pub struct KeyScope;

impl KeyScope {
    /// Compute the key actually written to the store
    ///
    /// # Example
    /// ```
    /// use handy_cache::{Identity, KeyScope};
    ///
    /// let bob = Identity::user("bob");
    /// assert_eq!(KeyScope::resolve("cart", &bob), "user_bob_cart");
    /// assert_eq!(KeyScope::resolve("menu_noUserData_", &bob), "menu_noUserData_");
    /// assert_eq!(KeyScope::resolve("cart", &Identity::anonymous()), "cart");
    /// ```
    pub fn resolve<'k>(key: &'k str, identity: &Identity) -> Cow<'k, str> {
        if Self::is_shared(key) {
            return Cow::Borrowed(key);
        }

        match Self::user_prefix(identity) {
            Some(prefix) => Cow::Owned(format!("{prefix}{key}")),
            None => Cow::Borrowed(key),
        }
    }

    /// Prefix shared by every scoped key of this identity
    pub fn user_prefix(identity: &Identity) -> Option<String> {
        identity.username().map(|name| format!("user_{name}_"))
    }

    /// Check whether a key opted out of scoping
    pub fn is_shared(key: &str) -> bool {
        key.contains(NO_USER_DATA)
    }
}
