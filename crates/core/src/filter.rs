//! Progressive narrowing of oversized result sets
//!
//! A logical search runs at most three rounds:
//!
//! 1. **Initial**: the query as built. Done if the count is within bounds.
//! 2. **Tightened**: every applicable [`NarrowingStep`] is added and the
//!    query is re-issued once.
//! 3. **Capped**: the last result list is cut to the upper bound in registry
//!    order and flagged as truncated.
//!
//! Narrowing only ever adds filters; anything the caller set explicitly is
//! left alone. Upstream failures are propagated without retry.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MatchError;
use crate::normalize::normalize;
use crate::profile::{PatientProfile, RecruitmentStatus};
use crate::query::QuerySpec;
use crate::registry::TrialRegistry;
use crate::trial::{SearchPage, TrialRecord};

/// Result count above which a search is narrowed, unless configured
pub const DEFAULT_UPPER_BOUND: usize = 50;

/// Upper limit on registry calls for one logical search
pub const MAX_UPSTREAM_CALLS: u32 = 2;

/// One way of tightening a query that came back too broad
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NarrowingStep {
    /// Restrict a defaulted status set to `RECRUITING` only
    RecruitingOnly,
    /// Add the profile's effective location when the query has none
    AddLocation,
    /// Add the profile's age and gender when the query lacks them
    AddEligibility,
}

impl NarrowingStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrowingStep::RecruitingOnly => "recruiting_only",
            NarrowingStep::AddLocation => "add_location",
            NarrowingStep::AddEligibility => "add_eligibility",
        }
    }

    /// Remove what this step would add, so the initial query leaves it out.
    pub fn withhold(&self, query: &mut QuerySpec) {
        match self {
            NarrowingStep::RecruitingOnly => {}
            NarrowingStep::AddLocation => query.location = None,
            NarrowingStep::AddEligibility => {
                query.gender = None;
                query.age = None;
            }
        }
    }

    /// Apply this step to `query`; returns whether anything was added.
    pub fn apply(&self, query: &mut QuerySpec, profile: &PatientProfile) -> bool {
        match self {
            NarrowingStep::RecruitingOnly => {
                let recruiting_only = BTreeSet::from([RecruitmentStatus::Recruiting]);
                if query.status_explicit
                    || query.statuses == recruiting_only
                    || !query.statuses.contains(&RecruitmentStatus::Recruiting)
                {
                    return false;
                }
                query.statuses = recruiting_only;
                true
            }
            NarrowingStep::AddLocation => {
                if query.location.is_some() {
                    return false;
                }
                query.location = profile.location.effective();
                query.location.is_some()
            }
            NarrowingStep::AddEligibility => {
                let mut added = false;
                if query.gender.is_none() && profile.gender.is_some() {
                    query.gender = profile.gender;
                    added = true;
                }
                if query.age.is_none() && profile.age.is_some() {
                    query.age = profile.age;
                    added = true;
                }
                added
            }
        }
    }
}

impl fmt::Display for NarrowingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NarrowingStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "recruiting_only" => Ok(NarrowingStep::RecruitingOnly),
            "add_location" => Ok(NarrowingStep::AddLocation),
            "add_eligibility" => Ok(NarrowingStep::AddEligibility),
            other => Err(format!("Unknown narrowing step: {}", other)),
        }
    }
}

/// Threshold and narrowing order for progressive filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    pub upper_bound: usize,
    /// Steps tried in order during the tightening round
    pub narrowing: Vec<NarrowingStep>,
    /// Leave location and eligibility out of the initial query and add them
    /// only when tightening. Off by default: built queries carry them from
    /// the start and only `RecruitingOnly` can narrow.
    pub defer_optional_terms: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            upper_bound: DEFAULT_UPPER_BOUND,
            narrowing: vec![
                NarrowingStep::RecruitingOnly,
                NarrowingStep::AddLocation,
                NarrowingStep::AddEligibility,
            ],
            defer_optional_terms: false,
        }
    }
}

/// Results of one logical search
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub trials: Vec<TrialRecord>,
    /// Registry-reported total for the last query issued
    pub total_count: Option<u32>,
    /// Rounds entered: 1 initial, 2 tightened, 3 capped
    pub rounds_used: u32,
    pub upstream_calls: u32,
    pub truncated: bool,
    pub narrowing_applied: Vec<NarrowingStep>,
    /// The last query sent to the registry
    pub query: QuerySpec,
}

/// Issues a query and narrows it while the result set is too large
#[derive(Clone)]
pub struct ProgressiveFilterController {
    registry: Arc<dyn TrialRegistry>,
    policy: FilterPolicy,
}

impl ProgressiveFilterController {
    pub fn new(registry: Arc<dyn TrialRegistry>, policy: FilterPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Shape a freshly built query for round one, withholding deferred terms.
    pub fn initial_query(&self, mut query: QuerySpec) -> QuerySpec {
        if self.policy.defer_optional_terms {
            for step in &self.policy.narrowing {
                step.withhold(&mut query);
            }
        }
        query
    }

    /// Run `query`, narrowing with terms available in `profile` when needed.
    pub async fn search(
        &self,
        profile: &PatientProfile,
        query: QuerySpec,
    ) -> Result<SearchOutcome, MatchError> {
        let bound = self.policy.upper_bound;

        let page = self.registry.search(&query).await?;
        let mut upstream_calls = 1;
        tracing::debug!(count = page.count(), bound, "Initial search round");
        if page.count() <= bound {
            return Ok(finish(page, query, 1, upstream_calls, Vec::new(), bound));
        }

        let profile = normalize(profile);
        let mut narrowed = query.clone();
        let applied: Vec<NarrowingStep> = self
            .policy
            .narrowing
            .iter()
            .copied()
            .filter(|step| step.apply(&mut narrowed, &profile))
            .collect();

        let (page, query) = if applied.is_empty() {
            tracing::debug!("No narrowing step applies, capping results");
            (page, query)
        } else {
            narrowed.page_token = None;
            tracing::info!(
                steps = ?applied,
                previous_count = page.count(),
                "Result set too large, tightening query"
            );
            let tightened = self.registry.search(&narrowed).await?;
            upstream_calls += 1;
            if tightened.count() <= bound {
                return Ok(finish(tightened, narrowed, 2, upstream_calls, applied, bound));
            }
            (tightened, narrowed)
        };

        tracing::info!(
            count = page.count(),
            bound,
            "Result set still too large, truncating"
        );
        Ok(finish(page, query, 3, upstream_calls, applied, bound))
    }
}

fn finish(
    page: SearchPage,
    query: QuerySpec,
    rounds_used: u32,
    upstream_calls: u32,
    narrowing_applied: Vec<NarrowingStep>,
    bound: usize,
) -> SearchOutcome {
    let truncated = page.count() > bound;
    let mut trials = page.trials;
    trials.truncate(bound);
    SearchOutcome {
        trials,
        total_count: page.total_count,
        rounds_used,
        upstream_calls,
        truncated,
        narrowing_applied,
        query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Gender, Location};
    use crate::query::QueryBuilder;
    use crate::testing::FakeRegistry;

    fn profile() -> PatientProfile {
        PatientProfile {
            diagnosis: Some("melanoma".to_string()),
            age: Some(47),
            gender: Some(Gender::Male),
            location: Location {
                city: Some("Denver".to_string()),
                state: Some("CO".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn controller(registry: &Arc<FakeRegistry>) -> ProgressiveFilterController {
        ProgressiveFilterController::new(registry.clone(), FilterPolicy::default())
    }

    #[tokio::test]
    async fn small_result_set_returns_after_one_call() {
        let registry = Arc::new(FakeRegistry::with_count(12));
        let profile = profile();
        let query = QueryBuilder::default().build(&profile);

        let outcome = controller(&registry).search(&profile, query).await.unwrap();
        assert_eq!(outcome.trials.len(), 12);
        assert_eq!(outcome.rounds_used, 1);
        assert_eq!(outcome.upstream_calls, 1);
        assert!(!outcome.truncated);
        assert_eq!(registry.calls(), 1);
    }

    #[tokio::test]
    async fn always_oversized_registry_is_capped() {
        let registry = Arc::new(FakeRegistry::with_count(1000));
        let profile = profile();
        let query = QueryBuilder::new(1000).build(&profile);

        let outcome = controller(&registry).search(&profile, query).await.unwrap();
        assert_eq!(outcome.trials.len(), DEFAULT_UPPER_BOUND);
        assert!(outcome.truncated);
        assert_eq!(outcome.rounds_used, 3);
        assert!(registry.calls() <= 3);
        assert!(outcome.upstream_calls <= MAX_UPSTREAM_CALLS);
        assert_eq!(outcome.upstream_calls as usize, registry.calls());
        // registry order is preserved
        assert_eq!(outcome.trials[0].nct_id, "NCT00000000");
        assert_eq!(outcome.trials[49].nct_id, "NCT00000049");
    }

    #[tokio::test]
    async fn tightening_narrows_defaulted_status() {
        let registry = Arc::new(FakeRegistry::narrowing(200, 30));
        let profile = profile();
        let query = QueryBuilder::default().build(&profile);

        let outcome = controller(&registry).search(&profile, query).await.unwrap();
        assert_eq!(outcome.rounds_used, 2);
        assert_eq!(outcome.upstream_calls, 2);
        assert!(!outcome.truncated);
        assert_eq!(outcome.narrowing_applied, vec![NarrowingStep::RecruitingOnly]);

        let sent = registry.queries();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1].statuses,
            BTreeSet::from([RecruitmentStatus::Recruiting])
        );
        // everything from the first query is still present
        assert_eq!(sent[1].location, sent[0].location);
        assert_eq!(sent[1].terms, sent[0].terms);
    }

    #[tokio::test]
    async fn explicit_status_is_never_narrowed() {
        let registry = Arc::new(FakeRegistry::with_count(500));
        let mut profile = profile();
        profile.status_filter = Some(BTreeSet::from([
            RecruitmentStatus::Recruiting,
            RecruitmentStatus::ActiveNotRecruiting,
        ]));
        let query = QueryBuilder::default().build(&profile);

        let outcome = controller(&registry).search(&profile, query).await.unwrap();
        // location, age and gender were already applied: nothing left to add
        assert!(outcome.narrowing_applied.is_empty());
        assert_eq!(registry.calls(), 1);
        assert_eq!(outcome.rounds_used, 3);
        assert!(outcome.truncated);
        assert_eq!(outcome.query.statuses, profile.status_filter.clone().unwrap());
    }

    #[tokio::test]
    async fn missing_location_is_added_when_tightening() {
        let registry = Arc::new(FakeRegistry::narrowing(80, 10));
        let profile = profile();
        let mut query = QueryBuilder::default().build(&profile);
        query.location = None;
        query.status_explicit = true;

        let outcome = controller(&registry).search(&profile, query).await.unwrap();
        assert_eq!(outcome.narrowing_applied, vec![NarrowingStep::AddLocation]);
        assert_eq!(outcome.query.location.as_deref(), Some("Denver, CO"));
        assert_eq!(outcome.trials.len(), 10);
    }

    #[tokio::test]
    async fn deferred_terms_are_added_when_tightening() {
        let registry = Arc::new(FakeRegistry::narrowing(300, 20));
        let profile = profile();
        let controller = ProgressiveFilterController::new(
            registry.clone(),
            FilterPolicy {
                defer_optional_terms: true,
                ..FilterPolicy::default()
            },
        );
        let query = controller.initial_query(QueryBuilder::default().build(&profile));
        assert_eq!(query.location, None);
        assert_eq!(query.age, None);
        assert_eq!(query.gender, None);

        let outcome = controller.search(&profile, query).await.unwrap();
        assert_eq!(
            outcome.narrowing_applied,
            vec![
                NarrowingStep::RecruitingOnly,
                NarrowingStep::AddLocation,
                NarrowingStep::AddEligibility,
            ]
        );
        assert_eq!(outcome.rounds_used, 2);

        let sent = registry.queries();
        assert_eq!(sent[1].location.as_deref(), Some("Denver, CO"));
        assert_eq!(sent[1].age, Some(47));
        assert_eq!(sent[1].gender, Some(Gender::Male));
    }

    #[test]
    fn default_policy_keeps_built_terms() {
        let registry = Arc::new(FakeRegistry::with_count(1));
        let profile = profile();
        let built = QueryBuilder::default().build(&profile);
        assert_eq!(controller(&registry).initial_query(built.clone()), built);
    }

    #[tokio::test]
    async fn upstream_failure_is_propagated_without_retry() {
        let registry = Arc::new(FakeRegistry::failing());
        let profile = profile();
        let query = QueryBuilder::default().build(&profile);

        let err = controller(&registry)
            .search(&profile, query)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::UpstreamSearchFailure(_)));
        assert_eq!(registry.calls(), 1);
    }

    #[test]
    fn narrowing_steps_parse_from_config_names() {
        assert_eq!(
            "add-location".parse::<NarrowingStep>(),
            Ok(NarrowingStep::AddLocation)
        );
        assert_eq!(
            " RECRUITING_ONLY ".parse::<NarrowingStep>(),
            Ok(NarrowingStep::RecruitingOnly)
        );
        assert!("drop_status".parse::<NarrowingStep>().is_err());
    }
}
