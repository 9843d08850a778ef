//! Collaborator contracts: the extraction service and the trial registry

use async_trait::async_trait;

use crate::error::MatchError;
use crate::profile::PatientProfile;
use crate::query::QuerySpec;
use crate::trial::SearchPage;

/// Turns a free-text clinical conversation into a structured profile
#[async_trait]
pub trait PatientExtractor: Send + Sync {
    /// Fails with [`MatchError::ExtractionFailure`]; never returns a partial profile.
    async fn extract(&self, transcript: &str) -> Result<PatientProfile, MatchError>;
}

/// Paginated trial search against an external registry
#[async_trait]
pub trait TrialRegistry: Send + Sync {
    /// Run one query and return the first page it addresses.
    ///
    /// Transport errors, timeouts and non-success responses map to
    /// [`MatchError::UpstreamSearchFailure`], except a rejected custom
    /// expression, which maps to [`MatchError::MalformedCustomExpression`].
    async fn search(&self, query: &QuerySpec) -> Result<SearchPage, MatchError>;
}
