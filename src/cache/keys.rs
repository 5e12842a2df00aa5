//! Cache key construction.
//!
//! Keys are plain strings joined with `:`. Every caller goes through
//! [`cache_key`] or the canonical builders below so unrelated features
//! cannot collide on a namespace.

/// Join the present parts with `:`, skipping absent ones and preserving
/// order.
///
/// `cache_key(&[Some("user"), None, Some("123"), None, Some("profile")])`
/// yields `"user:123:profile"`.
pub fn cache_key(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .filter_map(|part| *part)
        .collect::<Vec<_>>()
        .join(":")
}

/// Companies visible to a user.
pub fn user_companies(user_id: &str) -> String {
    format!("user:{}:companies", user_id)
}

/// A company's settings document.
pub fn company_settings(company_id: &str) -> String {
    format!("company:{}:settings", company_id)
}

/// A user's subscription record.
pub fn subscription(user_id: &str) -> String {
    format!("subscription:{}", user_id)
}

/// One page of a user's calculation listing.
pub fn calculations(user_id: &str, page: u32) -> String {
    format!("calculations:{}:{}", user_id, page)
}

/// A company's triage queue.
pub fn triage(company_id: &str) -> String {
    format!("triage:{}", company_id)
}

/// A company's job listing, by status.
pub fn jobs(company_id: &str, status: &str) -> String {
    format!("jobs:{}:{}", company_id, status)
}

/// A company's client listing.
pub fn clients(company_id: &str) -> String {
    format!("clients:{}", company_id)
}

/// Conventional TTLs for cached values.
pub mod ttl {
    use std::time::Duration;

    pub const SHORT: Duration = Duration::from_secs(60);
    pub const MEDIUM: Duration = Duration::from_secs(300);
    pub const LONG: Duration = Duration::from_secs(3600);
    pub const DAY: Duration = Duration::from_secs(86400);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_joins_parts() {
        assert_eq!(
            cache_key(&[Some("user"), Some("123"), Some("settings")]),
            "user:123:settings"
        );
    }

    #[test]
    fn test_cache_key_skips_absent_parts() {
        assert_eq!(
            cache_key(&[Some("user"), None, Some("123"), None, Some("profile")]),
            "user:123:profile"
        );
    }

    #[test]
    fn test_cache_key_with_numeric_parts() {
        let page = 1.to_string();
        let limit = 10.to_string();
        assert_eq!(
            cache_key(&[Some("page"), Some(&page), Some("limit"), Some(&limit)]),
            "page:1:limit:10"
        );
    }

    #[test]
    fn test_canonical_keys() {
        assert_eq!(user_companies("user-123"), "user:user-123:companies");
        assert_eq!(company_settings("company-456"), "company:company-456:settings");
        assert_eq!(subscription("user-789"), "subscription:user-789");
        assert_eq!(calculations("user-123", 2), "calculations:user-123:2");
        assert_eq!(triage("c1"), "triage:c1");
        assert_eq!(jobs("c1", "open"), "jobs:c1:open");
        assert_eq!(clients("c1"), "clients:c1");
    }

    #[test]
    fn test_ttl_values() {
        use std::time::Duration;

        assert_eq!(ttl::SHORT, Duration::from_secs(60));
        assert_eq!(ttl::MEDIUM, Duration::from_secs(300));
        assert_eq!(ttl::LONG, Duration::from_secs(3600));
        assert_eq!(ttl::DAY, Duration::from_secs(86400));
    }
}
