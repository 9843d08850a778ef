//! Server configuration

use trialscribe_core::filter::{DEFAULT_UPPER_BOUND, FilterPolicy, NarrowingStep};
use trialscribe_core::query::DEFAULT_PAGE_SIZE;

const DEFAULT_REGISTRY_BASE: &str = "https://clinicaltrials.gov/api/v2/studies";
const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;
const DEFAULT_MAX_SESSIONS: usize = 1000;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    /// Favorites are kept in memory when unset
    pub database_url: Option<String>,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: Option<String>,
    pub registry_base_url: String,
    pub registry_timeout_secs: u64,
    pub registry_page_size: u32,
    pub filter_upper_bound: usize,
    pub filter_narrowing: Vec<NarrowingStep>,
    pub filter_defer_terms: bool,
    /// Idle sessions older than this are evicted
    pub session_ttl_secs: u64,
    pub max_sessions: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = FilterPolicy::default();
        Self {
            bind_address: env_or("BIND_ADDRESS", "0.0.0.0:5001"),
            database_url: env_opt("DATABASE_URL"),
            cors_origins: env_or("CORS_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            rate_limit_rps: env_parse("RATE_LIMIT_RPS", 100),
            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            anthropic_model: env_opt("ANTHROPIC_MODEL"),
            registry_base_url: env_or("CLINICAL_TRIALS_API_BASE", DEFAULT_REGISTRY_BASE),
            registry_timeout_secs: env_parse("CLINICAL_TRIALS_TIMEOUT", 10),
            registry_page_size: env_parse("CLINICAL_TRIALS_PAGE_SIZE", DEFAULT_PAGE_SIZE),
            filter_upper_bound: env_parse("FILTER_UPPER_BOUND", DEFAULT_UPPER_BOUND),
            filter_narrowing: env_opt("FILTER_NARROWING")
                .map(|raw| parse_narrowing(&raw))
                .unwrap_or(defaults.narrowing),
            filter_defer_terms: env_parse("FILTER_DEFER_TERMS", false),
            session_ttl_secs: env_parse("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
            max_sessions: env_parse("MAX_SESSIONS", DEFAULT_MAX_SESSIONS),
        }
    }

    /// Progressive filtering policy described by this configuration
    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy {
            upper_bound: self.filter_upper_bound.max(1),
            narrowing: self.filter_narrowing.clone(),
            defer_optional_terms: self.filter_defer_terms,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5001".to_string(),
            database_url: None,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 100,
            anthropic_api_key: None,
            anthropic_model: None,
            registry_base_url: DEFAULT_REGISTRY_BASE.to_string(),
            registry_timeout_secs: 10,
            registry_page_size: DEFAULT_PAGE_SIZE,
            filter_upper_bound: DEFAULT_UPPER_BOUND,
            filter_narrowing: FilterPolicy::default().narrowing,
            filter_defer_terms: false,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

/// Parse a comma-separated narrowing order, skipping unknown names.
///
/// An empty list is valid and disables the tightening round.
fn parse_narrowing(raw: &str) -> Vec<NarrowingStep> {
    let mut steps = Vec::new();
    for name in raw.split(',').filter(|s| !s.trim().is_empty()) {
        match name.parse::<NarrowingStep>() {
            Ok(step) if !steps.contains(&step) => steps.push(step),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring FILTER_NARROWING entry"),
        }
    }
    steps
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrowing_order_is_parsed_and_deduped() {
        assert_eq!(
            parse_narrowing("add_location, recruiting_only,add_location"),
            vec![NarrowingStep::AddLocation, NarrowingStep::RecruitingOnly]
        );
        assert_eq!(
            parse_narrowing("bogus,add_eligibility"),
            vec![NarrowingStep::AddEligibility]
        );
        assert!(parse_narrowing("").is_empty());
    }

    #[test]
    fn policy_bound_is_at_least_one() {
        let config = Config {
            filter_upper_bound: 0,
            ..Config::default()
        };
        assert_eq!(config.filter_policy().upper_bound, 1);
    }

    #[test]
    fn deferral_flag_reaches_the_policy() {
        let config = Config {
            filter_defer_terms: true,
            ..Config::default()
        };
        assert!(config.filter_policy().defer_optional_terms);
        assert!(!Config::default().filter_policy().defer_optional_terms);
    }
}
