//! Attribute maps for subjects and resources.
//!
//! Both the caller's identity and the things it asks for are described by
//! plain JSON attribute maps, so that policies can be written against any
//! attribute an organization's identity provider chooses to issue.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered map of attribute name to JSON value.
pub type AttributeMap = Map<String, Value>;

/// The verified attribute set of the caller.
///
/// Supplied once per query by the identity collaborator (e.g. the claims of
/// an OpenID Connect userinfo response) and never mutated afterwards.
/// Typical attributes: `sub`, `org`, `role`, `dept`, `affiliations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(AttributeMap);

impl Subject {
    /// Wrap an attribute map.
    pub fn new(attributes: AttributeMap) -> Self {
        Self(attributes)
    }

    /// The stable subject identifier (`sub` claim), if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    /// Borrow the full attribute map.
    pub fn attributes(&self) -> &AttributeMap {
        &self.0
    }

    /// Look up a single top-level attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Set a top-level attribute, consuming and returning `self`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl From<AttributeMap> for Subject {
    fn from(attributes: AttributeMap) -> Self {
        Self(attributes)
    }
}

/// Render an attribute value as the string used for filter matching.
///
/// Strings are used verbatim (no surrounding quotes); every other value uses
/// its compact JSON form.
pub fn value_as_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Build an attribute map from a `json!` object. Non-object values produce
/// an empty map.
pub fn attributes_from(value: Value) -> AttributeMap {
    match value {
        Value::Object(map) => map,
        _ => AttributeMap::new(),
    }
}
