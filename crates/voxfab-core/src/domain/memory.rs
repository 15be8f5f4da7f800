//! Cross-agent session memory bag.
//!
//! The bag is small and structured: a handful of well-known optional fields
//! plus an opaque extension map. Agents request updates by message; the
//! gateway is the sole writer to the backing store and injects the bag into
//! the successor agent's `session_init` on handoff.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::session::VerifiedUser;

/// The per-session cross-agent memory bag.
///
/// Merge semantics are per-field last-writer-wins: a `Some` in the patch
/// overwrites, a `None` leaves the stored value untouched. Extension-map
/// keys overwrite individually.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionMemory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_intent: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_user_message: Option<String>,

    /// Id of the agent that last held the session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_agent: Option<String>,

    /// Opaque workflow graph snapshot carried across handoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_state: Option<Value>,

    /// Opaque extension fields (BTreeMap for deterministic encoding).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl SessionMemory {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge `patch` into `self`, last-writer-wins per field.
    pub fn merge(&mut self, patch: Self) {
        merge_field(&mut self.verified, patch.verified);
        merge_field(&mut self.user_name, patch.user_name);
        merge_field(&mut self.account, patch.account);
        merge_field(&mut self.sort_code, patch.sort_code);
        merge_field(&mut self.user_intent, patch.user_intent);
        merge_field(&mut self.last_user_message, patch.last_user_message);
        merge_field(&mut self.last_agent, patch.last_agent);
        merge_field(&mut self.graph_state, patch.graph_state);
        self.extra.extend(patch.extra);
    }

    /// Merged copy, leaving `self` untouched.
    #[must_use]
    pub fn merged(&self, patch: Self) -> Self {
        let mut out = self.clone();
        out.merge(patch);
        out
    }

    /// Extract the verified-user triple, if identity is established.
    ///
    /// All three of name/account/sort code must be present alongside
    /// `verified == true`; a partial record is not an identity.
    #[must_use]
    pub fn verified_user(&self) -> Option<VerifiedUser> {
        if self.verified != Some(true) {
            return None;
        }
        Some(VerifiedUser {
            user_name: self.user_name.clone()?,
            account: self.account.clone()?,
            sort_code: self.sort_code.clone()?,
        })
    }

    /// Record a verified identity.
    pub fn set_verified_user(&mut self, user: &VerifiedUser) {
        self.verified = Some(true);
        self.user_name = Some(user.user_name.clone());
        self.account = Some(user.account.clone());
        self.sort_code = Some(user.sort_code.clone());
    }

    /// Whether this bag carries anything worth priming a successor with.
    #[must_use]
    pub fn has_inherited_context(&self) -> bool {
        self.verified == Some(true) || self.user_intent.is_some()
    }
}

fn merge_field<T>(slot: &mut Option<T>, patch: Option<T>) {
    if patch.is_some() {
        *slot = patch;
    }
}
