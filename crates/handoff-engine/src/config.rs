use serde::{Deserialize, Serialize};

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// How many times a resolution that lost a race on the instance row is
  /// planned again before giving up with `Conflict`.
  pub max_conflict_retries: usize,
  /// Bound on automatic node entries (start, gateway, end) per operation.
  pub max_traversal_steps: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      max_conflict_retries: 3,
      max_traversal_steps: 256,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_partial_config_keeps_defaults() {
    let config: EngineConfig = serde_json::from_str(r#"{"max_conflict_retries": 0}"#).unwrap();
    assert_eq!(config.max_conflict_retries, 0);
    assert_eq!(config.max_traversal_steps, 256);

    let empty: EngineConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, EngineConfig::default());
  }
}
