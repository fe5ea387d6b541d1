//! Runtime Configuration
//!
//! Per-thread knobs for the reactive runtime. The configuration is plain
//! data: it can be built in code or loaded from JSON, then installed with
//! [`Runtime::configure`](crate::reactive::Runtime::configure).
//!
//! ```rust
//! use ripple_core::config::{RangePolicy, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_json(r#"{ "range_policy": "reject" }"#).unwrap();
//! assert_eq!(config.range_policy, RangePolicy::Reject);
//! assert_eq!(config.dispatch_warn_threshold, None);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};

/// How `remove_range` treats a request that runs past the end of a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangePolicy {
    /// Shrink the range to fit. `start` is clamped to the length, then
    /// `count` to whatever remains after `start`.
    #[default]
    Clamp,

    /// Fail with [`ReactiveError::RangeOutOfBounds`] and leave the list
    /// untouched.
    Reject,
}

impl RangePolicy {
    /// Resolve a requested `[start, start + count)` range against a list of
    /// length `len`, returning the `(start, count)` actually removed.
    pub fn resolve(self, start: usize, count: usize, len: usize) -> Result<(usize, usize)> {
        match self {
            RangePolicy::Clamp => {
                let start = start.min(len);
                Ok((start, count.min(len - start)))
            }
            RangePolicy::Reject => match start.checked_add(count) {
                Some(end) if end <= len => Ok((start, count)),
                _ => Err(ReactiveError::RangeOutOfBounds { start, count, len }),
            },
        }
    }
}

/// Configuration for the reactive runtime of the current thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Out-of-bounds handling for `remove_range`.
    pub range_policy: RangePolicy,

    /// Emit a warning when a single propagation pass dispatches more than
    /// this many queue items. `None` disables the check.
    pub dispatch_warn_threshold: Option<usize>,
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
