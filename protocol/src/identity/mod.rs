//! # Identity Module
//!
//! The invoking principal as the ledger sees it: a unique ID string plus a
//! bag of attributes asserted by whoever issued the identity. How that
//! value was obtained (X.509 certificate, config file, test fixture) is not
//! this module's concern; the contracts only ever see a [`ClientIdentity`].
//!
//! Authorization decisions are pure functions over that value, so they can
//! be unit-tested without a certificate authority in the loop.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::MINTER_ATTRIBUTE;

/// The invoking client's identity and its asserted attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Unique identity string. Doubles as the account key.
    id: String,
    /// Attribute assertions, e.g. `minter = "true"`.
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl ClientIdentity {
    /// Creates an identity with no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute assertion.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Creates an identity carrying the minter attribute.
    pub fn minter(id: impl Into<String>) -> Self {
        Self::new(id).with_attribute(MINTER_ATTRIBUTE, "true")
    }

    /// The unique identity string.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Looks up an attribute. `None` means "not asserted", which is
    /// different from an attribute asserted with an empty value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All asserted attributes in name order.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Returns `true` if the identity may mint and burn.
///
/// The attribute must be present; any value other than `"false"` grants
/// the right.
pub fn is_authorized_minter(identity: &ClientIdentity) -> bool {
    matches!(identity.attribute(MINTER_ATTRIBUTE), Some(value) if value != "false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_identity_is_not_a_minter() {
        let id = ClientIdentity::new("alice");
        assert_eq!(id.id(), "alice");
        assert!(id.attribute(MINTER_ATTRIBUTE).is_none());
        assert!(!is_authorized_minter(&id));
    }

    #[test]
    fn minter_attribute_grants_minting() {
        assert!(is_authorized_minter(&ClientIdentity::minter("central-bank")));
        assert!(is_authorized_minter(
            &ClientIdentity::new("m").with_attribute(MINTER_ATTRIBUTE, "yes")
        ));
    }

    #[test]
    fn minter_attribute_false_denies_minting() {
        let id = ClientIdentity::new("bob").with_attribute(MINTER_ATTRIBUTE, "false");
        assert!(!is_authorized_minter(&id));
    }

    #[test]
    fn identity_roundtrips_through_json() {
        let id = ClientIdentity::minter("m").with_attribute("org", "acme");
        let json = serde_json::to_string(&id).unwrap();
        let back: ClientIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.attributes().len(), 2);
    }

    #[test]
    fn attributes_default_to_empty_when_missing() {
        let id: ClientIdentity = serde_json::from_str(r#"{"id":"carol"}"#).unwrap();
        assert!(id.attributes().is_empty());
    }
}
