//! Baseline/working profile pair for iterative search refinement

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::normalize::normalize;
use crate::profile::PatientProfile;
use crate::validation::ProfileField;

/// One search session: the extracted baseline and the user's edited copy.
///
/// The baseline is fixed at construction; only a new session replaces it.
#[derive(Debug, Clone, Serialize)]
pub struct RefinementSession {
    baseline: PatientProfile,
    working: PatientProfile,
    started_at: DateTime<Utc>,
    last_committed_at: Option<DateTime<Utc>>,
}

impl RefinementSession {
    /// Start a session; baseline and working copy are both the normalized profile.
    pub fn start(baseline: PatientProfile) -> Self {
        let baseline = normalize(&baseline);
        Self {
            working: baseline.clone(),
            baseline,
            started_at: Utc::now(),
            last_committed_at: None,
        }
    }

    pub fn baseline(&self) -> &PatientProfile {
        &self.baseline
    }

    pub fn working(&self) -> &PatientProfile {
        &self.working
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn last_committed_at(&self) -> Option<DateTime<Utc>> {
        self.last_committed_at
    }

    /// Apply a field-level change to the working copy.
    pub fn edit<F>(&mut self, mutator: F)
    where
        F: FnOnce(&mut PatientProfile),
    {
        mutator(&mut self.working);
    }

    /// In-scope fields whose normalized values differ from the baseline
    pub fn changed_fields(&self) -> Vec<ProfileField> {
        diff(&self.baseline, &self.working)
    }

    pub fn is_changed(&self) -> bool {
        !self.changed_fields().is_empty()
    }

    /// Restore the working copy to the baseline.
    ///
    /// Returns the restored profile, which the caller should search again.
    pub fn reset(&mut self) -> PatientProfile {
        self.working = self.baseline.clone();
        self.working.clone()
    }

    /// Record the profile a successful search actually used.
    pub fn commit(&mut self, searched: PatientProfile) {
        self.working = normalize(&searched);
        self.last_committed_at = Some(Utc::now());
    }
}

/// Compare the user-editable fields of two profiles after normalization.
///
/// Informational lists (symptoms, history, medications, exclusions) and age
/// are not editable in the refinement flow and never count as a change.
pub fn diff(before: &PatientProfile, after: &PatientProfile) -> Vec<ProfileField> {
    let (a, b) = (normalize(before), normalize(after));
    let checks = [
        (ProfileField::Diagnosis, a.diagnosis == b.diagnosis),
        (
            ProfileField::AdditionalConditions,
            a.additional_conditions == b.additional_conditions,
        ),
        (ProfileField::Intervention, a.intervention == b.intervention),
        (
            ProfileField::AdditionalInterventions,
            a.additional_interventions == b.additional_interventions,
        ),
        (
            ProfileField::CustomSearchExpression,
            a.custom_search_expression == b.custom_search_expression,
        ),
        (ProfileField::LocationCity, a.location.city == b.location.city),
        (ProfileField::LocationState, a.location.state == b.location.state),
        (
            ProfileField::LocationCountry,
            a.location.country == b.location.country,
        ),
        (
            ProfileField::LocationPostalCode,
            a.location.postal_code == b.location.postal_code,
        ),
        (ProfileField::StatusFilter, a.status_filter == b.status_filter),
        (ProfileField::PhaseFilter, a.phase_filter == b.phase_filter),
        (ProfileField::Gender, a.gender == b.gender),
    ];

    checks
        .into_iter()
        .filter(|(_, same)| !same)
        .map(|(field, _)| field)
        .collect()
}
