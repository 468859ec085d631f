use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The externally loadable policy of a cell.
///
/// With the `serde` feature this can be read from any serde-compatible format
/// and applied with [`CellBuilder::config`](crate::CellBuilder::config).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CellConfig {
  /// How long a freshly produced value stays fresh.
  pub time_to_live: Duration,
  /// Whether factory failures on an initialized cell are absorbed.
  #[cfg_attr(feature = "serde", serde(default))]
  pub suppress_factory_errors: bool,
}

impl CellConfig {
  pub fn new(time_to_live: Duration) -> Self {
    Self {
      time_to_live,
      suppress_factory_errors: false,
    }
  }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
  use super::*;

  #[test]
  fn config_reads_from_json() {
    let config: CellConfig =
      serde_json::from_str(r#"{ "time_to_live": { "secs": 60, "nanos": 0 } }"#).unwrap();
    assert_eq!(config, CellConfig::new(Duration::from_secs(60)));

    let config: CellConfig = serde_json::from_str(
      r#"{ "time_to_live": { "secs": 5, "nanos": 0 }, "suppress_factory_errors": true }"#,
    )
    .unwrap();
    assert!(config.suppress_factory_errors);
    assert_eq!(config.time_to_live, Duration::from_secs(5));
  }
}
