//! Required/recommended field checks on an extracted profile

use serde::{Deserialize, Serialize};

use crate::normalize::normalize;
use crate::profile::PatientProfile;

/// A named profile field, used in validation reports and change diffs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Diagnosis,
    AdditionalConditions,
    Intervention,
    AdditionalInterventions,
    CustomSearchExpression,
    Location,
    LocationCity,
    LocationState,
    LocationCountry,
    LocationPostalCode,
    Age,
    Gender,
    StatusFilter,
    PhaseFilter,
}

impl ProfileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Diagnosis => "diagnosis",
            ProfileField::AdditionalConditions => "additional_conditions",
            ProfileField::Intervention => "intervention",
            ProfileField::AdditionalInterventions => "additional_interventions",
            ProfileField::CustomSearchExpression => "custom_search_expression",
            ProfileField::Location => "location",
            ProfileField::LocationCity => "location_city",
            ProfileField::LocationState => "location_state",
            ProfileField::LocationCountry => "location_country",
            ProfileField::LocationPostalCode => "location_postal_code",
            ProfileField::Age => "age",
            ProfileField::Gender => "gender",
            ProfileField::StatusFilter => "status_filter",
            ProfileField::PhaseFilter => "phase_filter",
        }
    }
}

/// Outcome of checking a profile before querying
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub missing_required: Vec<ProfileField>,
    pub missing_recommended: Vec<ProfileField>,
}

impl ValidationReport {
    /// Whether the profile can be searched
    pub fn is_complete(&self) -> bool {
        self.missing_required.is_empty()
    }
}

/// Check a profile for the fields a useful search needs.
///
/// A diagnosis is required unless a custom search expression stands in for
/// it; age, gender and location are recommended.
pub fn validate(profile: &PatientProfile) -> ValidationReport {
    let profile = normalize(profile);
    let mut report = ValidationReport::default();

    if profile.diagnosis.is_none() && profile.active_expression().is_none() {
        report.missing_required.push(ProfileField::Diagnosis);
    }

    if profile.age.is_none() {
        report.missing_recommended.push(ProfileField::Age);
    }
    if profile.gender.is_none() {
        report.missing_recommended.push(ProfileField::Gender);
    }
    if profile.location.is_empty() {
        report.missing_recommended.push(ProfileField::Location);
    }

    report
}
