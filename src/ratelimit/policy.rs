//! Rate limit policies and named policy sets.
//!
//! A policy is data, not behavior: window length, ceiling, and key
//! namespace. Deployments can keep endpoint-class policies in a YAML file
//! and load them into a [`PolicySet`], or use the built-in presets.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{BreakwaterError, Result};

/// Configuration for one fixed-window rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Length of the fixed counting window.
    #[serde(rename = "window_ms", with = "duration_ms")]
    pub window: Duration,
    /// Maximum requests admitted within one window. A ceiling of zero
    /// denies every request.
    pub max_requests: u32,
    /// Namespace prepended to the caller-supplied identifier, keeping
    /// unrelated limits from sharing counters.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 100,
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_key_prefix() -> String {
    "ratelimit".to_string()
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// The outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    /// Whether this request is admitted.
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: DateTime<Utc>,
    /// How long the caller should wait before retrying. Only set on denial.
    pub retry_after: Option<Duration>,
}

/// Built-in policies for common endpoint classes.
pub mod presets {
    use super::RateLimitPolicy;
    use std::time::Duration;

    /// General API traffic: 100 requests per minute.
    pub fn api() -> RateLimitPolicy {
        RateLimitPolicy {
            window: Duration::from_secs(60),
            max_requests: 100,
            key_prefix: "api".to_string(),
        }
    }

    /// Authentication endpoints: 5 requests per 15 minutes, deliberately
    /// strict to blunt credential stuffing.
    pub fn auth() -> RateLimitPolicy {
        RateLimitPolicy {
            window: Duration::from_secs(15 * 60),
            max_requests: 5,
            key_prefix: "auth".to_string(),
        }
    }

    /// Expensive compute operations: 50 requests per hour.
    pub fn calculations() -> RateLimitPolicy {
        RateLimitPolicy {
            window: Duration::from_secs(60 * 60),
            max_requests: 50,
            key_prefix: "calc".to_string(),
        }
    }

    /// Uploads: 20 requests per hour.
    pub fn upload() -> RateLimitPolicy {
        RateLimitPolicy {
            window: Duration::from_secs(60 * 60),
            max_requests: 20,
            key_prefix: "upload".to_string(),
        }
    }

    /// Password resets: 3 requests per hour.
    pub fn password_reset() -> RateLimitPolicy {
        RateLimitPolicy {
            window: Duration::from_secs(60 * 60),
            max_requests: 3,
            key_prefix: "pwdreset".to_string(),
        }
    }
}

/// A named collection of policies, typically loaded from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicySet {
    /// Map of policy name to policy.
    #[serde(default)]
    pub policies: HashMap<String, RateLimitPolicy>,
}

impl PolicySet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in presets, keyed by their conventional names.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.insert("api", presets::api());
        set.insert("auth", presets::auth());
        set.insert("calculations", presets::calculations());
        set.insert("upload", presets::upload());
        set.insert("password_reset", presets::password_reset());
        set
    }

    /// Load a policy set from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a policy set from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| BreakwaterError::Config(format!("Failed to parse rate limit policies: {}", e)))
    }

    /// Look up a policy by name.
    pub fn get(&self, name: &str) -> Option<&RateLimitPolicy> {
        self.policies.get(name)
    }

    /// Add or replace a named policy.
    pub fn insert(&mut self, name: &str, policy: RateLimitPolicy) {
        self.policies.insert(name.to_string(), policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.window, Duration::from_secs(60));
        assert_eq!(policy.max_requests, 100);
        assert_eq!(policy.key_prefix, "ratelimit");
    }

    #[test]
    fn test_preset_values() {
        assert_eq!(presets::api().window, Duration::from_secs(60));
        assert_eq!(presets::api().max_requests, 100);

        assert_eq!(presets::auth().window, Duration::from_secs(900));
        assert_eq!(presets::auth().max_requests, 5);

        assert_eq!(presets::calculations().window, Duration::from_secs(3600));
        assert_eq!(presets::calculations().max_requests, 50);

        assert_eq!(presets::upload().max_requests, 20);
        assert_eq!(presets::password_reset().max_requests, 3);
    }

    #[test]
    fn test_policy_set_from_yaml() {
        let yaml = r#"
policies:
  search:
    window_ms: 30000
    max_requests: 10
    key_prefix: search
  export:
    window_ms: 3600000
    max_requests: 2
"#;
        let set = PolicySet::from_yaml(yaml).unwrap();

        let search = set.get("search").unwrap();
        assert_eq!(search.window, Duration::from_secs(30));
        assert_eq!(search.max_requests, 10);
        assert_eq!(search.key_prefix, "search");

        // key_prefix falls back to the generic namespace
        let export = set.get("export").unwrap();
        assert_eq!(export.key_prefix, "ratelimit");
    }

    #[test]
    fn test_policy_set_rejects_bad_yaml() {
        assert!(PolicySet::from_yaml("policies: [not, a, map]").is_err());
    }

    #[test]
    fn test_builtin_set() {
        let set = PolicySet::builtin();
        assert_eq!(set.get("auth").unwrap().max_requests, 5);
        assert!(set.get("nonexistent").is_none());
    }

    #[test]
    fn test_policy_roundtrips_through_yaml() {
        let policy = presets::auth();
        let yaml = serde_yaml::to_string(&policy).unwrap();
        let parsed: RateLimitPolicy = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, policy);
    }
}
