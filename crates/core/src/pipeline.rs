//! Caller-facing matching operations
//!
//! Extraction seeds a [`RefinementSession`]; every later search builds from
//! the session's working copy without calling the extractor again.

use std::sync::Arc;

use crate::error::MatchError;
use crate::filter::{FilterPolicy, ProgressiveFilterController, SearchOutcome};
use crate::normalize::normalize;
use crate::profile::PatientProfile;
use crate::query::QueryBuilder;
use crate::registry::{PatientExtractor, TrialRegistry};
use crate::session::RefinementSession;
use crate::validation::{ValidationReport, validate};

/// Query building plus progressive filtering over one registry
#[derive(Clone)]
pub struct MatchingPipeline {
    builder: QueryBuilder,
    controller: ProgressiveFilterController,
}

impl MatchingPipeline {
    pub fn new(registry: Arc<dyn TrialRegistry>, builder: QueryBuilder, policy: FilterPolicy) -> Self {
        Self {
            builder,
            controller: ProgressiveFilterController::new(registry, policy),
        }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Extract a profile from `transcript` and open a session on it.
    pub async fn start_session(
        &self,
        extractor: &dyn PatientExtractor,
        transcript: &str,
    ) -> Result<(RefinementSession, ValidationReport), MatchError> {
        if transcript.trim().is_empty() {
            return Err(MatchError::InvalidInput("Transcript is required".to_string()));
        }

        let profile = extractor.extract(transcript).await?;
        let session = RefinementSession::start(profile);
        let report = validate(session.baseline());
        tracing::info!(
            complete = report.is_complete(),
            missing_recommended = report.missing_recommended.len(),
            "Patient profile extracted"
        );
        Ok((session, report))
    }

    /// Search with the session's current working copy.
    pub async fn search(&self, session: &RefinementSession) -> Result<SearchOutcome, MatchError> {
        self.run(session.working()).await
    }

    /// Search with an edited profile and adopt it as the working copy on success.
    ///
    /// With no candidate the current working copy is searched. On failure the
    /// session is left untouched so the user can correct and resubmit.
    pub async fn refine(
        &self,
        session: &mut RefinementSession,
        candidate: Option<PatientProfile>,
    ) -> Result<SearchOutcome, MatchError> {
        let candidate = normalize(candidate.as_ref().unwrap_or(session.working()));
        let outcome = self.run(&candidate).await?;
        session.commit(candidate);
        tracing::info!(
            changed_fields = ?session.changed_fields(),
            trials = outcome.trials.len(),
            "Refined search committed"
        );
        Ok(outcome)
    }

    /// Restore the baseline and search it again.
    pub async fn reset(&self, session: &mut RefinementSession) -> Result<SearchOutcome, MatchError> {
        let restored = session.reset();
        self.run(&restored).await
    }

    async fn run(&self, profile: &PatientProfile) -> Result<SearchOutcome, MatchError> {
        let report = validate(profile);
        if !report.is_complete() {
            return Err(MatchError::ValidationIncomplete {
                missing: report.missing_required,
            });
        }

        let query = self.controller.initial_query(self.builder.build(profile));
        let outcome = self.controller.search(profile, query).await?;
        tracing::info!(
            trials = outcome.trials.len(),
            total_count = ?outcome.total_count,
            rounds = outcome.rounds_used,
            upstream_calls = outcome.upstream_calls,
            truncated = outcome.truncated,
            "Trial search completed"
        );
        Ok(outcome)
    }
}
