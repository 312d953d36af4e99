//! # Key Construction
//!
//! Composite keys follow Fabric's layout so records written here stay
//! readable by tooling built for that platform:
//!
//! ```text
//! U+0000 namespace U+0000 component U+0000 component U+0000 ...
//! ```
//!
//! The leading delimiter puts every composite key in a range no plain key
//! can reach, provided plain keys are validated with
//! [`validate_simple_key`].

use crate::config::COMPOSITE_KEY_DELIMITER;

use super::state::StateError;

/// Builds a composite key from a namespace and ordered components.
///
/// # Errors
///
/// Returns [`StateError::InvalidKey`] if the namespace is empty or any part
/// contains the delimiter.
pub fn create_composite_key(namespace: &str, components: &[&str]) -> Result<String, StateError> {
    if namespace.is_empty() {
        return Err(StateError::InvalidKey(
            "composite key namespace must not be empty".into(),
        ));
    }
    validate_part(namespace)?;

    let capacity = 2 + namespace.len() + components.iter().map(|c| c.len() + 1).sum::<usize>();
    let mut key = String::with_capacity(capacity);
    key.push(COMPOSITE_KEY_DELIMITER);
    key.push_str(namespace);
    key.push(COMPOSITE_KEY_DELIMITER);
    for component in components {
        validate_part(component)?;
        key.push_str(component);
        key.push(COMPOSITE_KEY_DELIMITER);
    }
    Ok(key)
}

/// Splits a composite key back into `(namespace, components)`.
///
/// # Errors
///
/// Returns [`StateError::InvalidKey`] if `key` is not a composite key.
pub fn split_composite_key(key: &str) -> Result<(String, Vec<String>), StateError> {
    let inner = key
        .strip_prefix(COMPOSITE_KEY_DELIMITER)
        .and_then(|k| k.strip_suffix(COMPOSITE_KEY_DELIMITER))
        .ok_or_else(|| StateError::InvalidKey(format!("not a composite key: {}", display_key(key))))?;

    let mut parts = inner.split(COMPOSITE_KEY_DELIMITER).map(str::to_string);
    let namespace = parts
        .next()
        .filter(|ns| !ns.is_empty())
        .ok_or_else(|| StateError::InvalidKey("composite key has no namespace".into()))?;
    Ok((namespace, parts.collect()))
}

/// Returns `true` if `key` was built by [`create_composite_key`].
pub fn is_composite_key(key: &str) -> bool {
    key.starts_with(COMPOSITE_KEY_DELIMITER)
}

/// Validates a plain (non-composite) key such as an account ID.
pub fn validate_simple_key(key: &str) -> Result<(), StateError> {
    if key.is_empty() {
        return Err(StateError::InvalidKey("key must not be empty".into()));
    }
    validate_part(key)
}

/// Renders a key for logs and error messages: composite keys become
/// `NAMESPACE:part:part`, plain keys are returned unchanged.
pub fn display_key(key: &str) -> String {
    if !is_composite_key(key) {
        return key.to_string();
    }
    key.trim_matches(COMPOSITE_KEY_DELIMITER)
        .split(COMPOSITE_KEY_DELIMITER)
        .collect::<Vec<_>>()
        .join(":")
}

fn validate_part(part: &str) -> Result<(), StateError> {
    if part.contains(COMPOSITE_KEY_DELIMITER) {
        return Err(StateError::InvalidKey(format!(
            "key part {:?} contains the U+0000 delimiter",
            part
        )));
    }
    Ok(())
}
