//! Instance variables.
//!
//! Variables are a flat mapping from name to string value. They travel as a
//! JSON object (`{"days": "3", "manager": "u-17"}`) between callers, the
//! engine and the store; the engine only looks inside them when a guard or
//! an assignee template reads a value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::VariableError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<String, String>);

impl Variables {
  pub fn new() -> Self {
    Self::default()
  }

  /// Decode the persisted/exchanged form.
  ///
  /// Blank input is an empty mapping: callers omit the field when they have
  /// nothing to set.
  pub fn from_json(json: &str) -> Result<Self, VariableError> {
    if json.trim().is_empty() {
      return Ok(Self::new());
    }
    serde_json::from_str(json).map_err(VariableError::Malformed)
  }

  pub fn to_json(&self) -> Result<String, VariableError> {
    serde_json::to_string(&self.0).map_err(VariableError::Encode)
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.get(name).map(String::as_str)
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
    self.0.insert(name.into(), value.into())
  }

  /// Overlay `other` onto `self`; keys present in both take `other`'s value.
  pub fn merge(&mut self, other: Variables) {
    self.0.extend(other.0);
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
    self.0.iter()
  }

  pub(crate) fn as_map(&self) -> &BTreeMap<String, String> {
    &self.0
  }
}

impl From<BTreeMap<String, String>> for Variables {
  fn from(map: BTreeMap<String, String>) -> Self {
    Self(map)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(
      iter
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    )
  }
}
