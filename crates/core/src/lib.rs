//! trialscribe-core: patient-criteria-to-trial-search pipeline
//!
//! Turns an extracted patient profile into clinical-trial registry queries,
//! narrows oversized result sets, and tracks user refinements against the
//! original extraction. Network collaborators are abstracted behind traits
//! so the server crate can plug in real clients.

pub mod error;
pub mod favorites;
pub mod filter;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod query;
pub mod registry;
pub mod session;
pub mod trial;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use error::MatchError;
pub use favorites::{FAVORITES_KEY, FavoritesStore, KeyValueStore, MemoryStore};
pub use filter::{FilterPolicy, NarrowingStep, ProgressiveFilterController, SearchOutcome};
pub use normalize::normalize;
pub use pipeline::MatchingPipeline;
pub use profile::{Gender, Location, PatientProfile, Phase, RecruitmentStatus, default_statuses};
pub use query::{QueryBuilder, QuerySpec, SearchTerms};
pub use registry::{PatientExtractor, TrialRegistry};
pub use session::RefinementSession;
pub use trial::{SearchPage, TrialRecord};
pub use validation::{ProfileField, ValidationReport, validate};
