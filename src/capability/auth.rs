//! Informational authorization check
//!
//! Callers ask before issuing a protected operation. Nothing in the
//! pipeline enforces the answer; the source enforces authorization on
//! its side.

use super::{Action, ActionRule, Capability, CapabilitySet, CapabilityValue, CrossUser};

/// An authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    /// Identity URI of the user
    pub uri: String,
    /// Identity providers the user has logged in with
    pub identity_providers: Vec<String>,
}

impl User {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            identity_providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.identity_providers.push(provider.into());
        self
    }
}

/// The question put to [`CapabilitySet::is_authorized`].
#[derive(Debug, Clone)]
pub struct AuthCheck<'a> {
    pub capability: Capability,
    pub action: Action,
    pub user: Option<&'a User>,
    /// The action targets an entry created by someone else
    pub cross_user: bool,
}

impl<'a> AuthCheck<'a> {
    pub fn new(capability: Capability, action: Action) -> Self {
        Self {
            capability,
            action,
            user: None,
            cross_user: false,
        }
    }

    pub fn by(mut self, user: &'a User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn across_users(mut self) -> Self {
        self.cross_user = true;
        self
    }
}

impl CapabilitySet {
    /// Decide whether `check` would be allowed by this source.
    pub fn is_authorized(&self, check: &AuthCheck<'_>) -> bool {
        let permissions = match self.get(check.capability) {
            Some(CapabilityValue::Flag(true)) => return check.action == Action::Read,
            Some(CapabilityValue::Actions(perms)) => perms,
            _ => return false,
        };

        let Some(rule) = permissions.rule(check.action) else {
            return false;
        };
        if rule.auth && !credentials_match(rule, check.user) {
            return false;
        }

        if check.cross_user {
            return match &rule.cross_user {
                CrossUser::Flag(allowed) => *allowed,
                CrossUser::Users(uris) => check.user.is_some_and(|u| uris.contains(&u.uri)),
            };
        }

        true
    }
}

/// An authenticated rule needs a user matching its identity lists, if any.
fn credentials_match(rule: &ActionRule, user: Option<&User>) -> bool {
    let Some(user) = user else {
        return false;
    };
    let by_identity = rule.identities.as_ref().map(|ids| ids.contains(&user.uri));
    let by_provider = rule.identity_providers.as_ref().map(|providers| {
        user.identity_providers
            .iter()
            .any(|p| providers.contains(p))
    });
    match (by_identity, by_provider) {
        (None, None) => true,
        (Some(a), None) | (None, Some(a)) => a,
        (Some(a), Some(b)) => a || b,
    }
}
