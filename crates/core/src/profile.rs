//! Patient profile model
//!
//! The structured shape produced by the extraction collaborator and edited by
//! the user during refinement. Absent values are `None`, never empty strings.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Patient gender as used for trial eligibility filtering
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gender {
    #[serde(alias = "male", alias = "MALE")]
    Male,
    #[serde(alias = "female", alias = "FEMALE")]
    Female,
    #[serde(alias = "other", alias = "OTHER")]
    Other,
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "man" => Ok(Gender::Male),
            "female" | "f" | "woman" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(format!("Unknown gender: {}", other)),
        }
    }
}

/// Overall recruitment status of a study, as named by the registry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecruitmentStatus {
    Recruiting,
    NotYetRecruiting,
    EnrollingByInvitation,
    ActiveNotRecruiting,
    Suspended,
    Terminated,
    Completed,
    Withdrawn,
    Available,
    NoLongerAvailable,
    TemporarilyNotAvailable,
    ApprovedForMarketing,
    Withheld,
    Unknown,
}

impl RecruitmentStatus {
    /// Registry wire name (e.g. `NOT_YET_RECRUITING`)
    pub fn as_str(&self) -> &'static str {
        match self {
            RecruitmentStatus::Recruiting => "RECRUITING",
            RecruitmentStatus::NotYetRecruiting => "NOT_YET_RECRUITING",
            RecruitmentStatus::EnrollingByInvitation => "ENROLLING_BY_INVITATION",
            RecruitmentStatus::ActiveNotRecruiting => "ACTIVE_NOT_RECRUITING",
            RecruitmentStatus::Suspended => "SUSPENDED",
            RecruitmentStatus::Terminated => "TERMINATED",
            RecruitmentStatus::Completed => "COMPLETED",
            RecruitmentStatus::Withdrawn => "WITHDRAWN",
            RecruitmentStatus::Available => "AVAILABLE",
            RecruitmentStatus::NoLongerAvailable => "NO_LONGER_AVAILABLE",
            RecruitmentStatus::TemporarilyNotAvailable => "TEMPORARILY_NOT_AVAILABLE",
            RecruitmentStatus::ApprovedForMarketing => "APPROVED_FOR_MARKETING",
            RecruitmentStatus::Withheld => "WITHHELD",
            RecruitmentStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RecruitmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecruitmentStatus {
    type Err = String;

    /// Accepts wire names as well as human spellings ("Not yet recruiting").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        let status = match key.as_str() {
            "RECRUITING" => RecruitmentStatus::Recruiting,
            "NOT_YET_RECRUITING" => RecruitmentStatus::NotYetRecruiting,
            "ENROLLING_BY_INVITATION" => RecruitmentStatus::EnrollingByInvitation,
            "ACTIVE_NOT_RECRUITING" | "ACTIVE,_NOT_RECRUITING" => {
                RecruitmentStatus::ActiveNotRecruiting
            }
            "SUSPENDED" => RecruitmentStatus::Suspended,
            "TERMINATED" => RecruitmentStatus::Terminated,
            "COMPLETED" => RecruitmentStatus::Completed,
            "WITHDRAWN" => RecruitmentStatus::Withdrawn,
            "AVAILABLE" => RecruitmentStatus::Available,
            "NO_LONGER_AVAILABLE" => RecruitmentStatus::NoLongerAvailable,
            "TEMPORARILY_NOT_AVAILABLE" => RecruitmentStatus::TemporarilyNotAvailable,
            "APPROVED_FOR_MARKETING" => RecruitmentStatus::ApprovedForMarketing,
            "WITHHELD" => RecruitmentStatus::Withheld,
            "UNKNOWN" => RecruitmentStatus::Unknown,
            _ => return Err(format!("Unknown recruitment status: {}", s.trim())),
        };
        Ok(status)
    }
}

/// Trial phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    #[serde(rename = "EARLY_PHASE1")]
    EarlyPhase1,
    #[serde(rename = "PHASE1")]
    Phase1,
    #[serde(rename = "PHASE2")]
    Phase2,
    #[serde(rename = "PHASE3")]
    Phase3,
    #[serde(rename = "PHASE4")]
    Phase4,
}

impl Phase {
    /// Registry wire name (e.g. `PHASE2`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::EarlyPhase1 => "EARLY_PHASE1",
            Phase::Phase1 => "PHASE1",
            Phase::Phase2 => "PHASE2",
            Phase::Phase3 => "PHASE3",
            Phase::Phase4 => "PHASE4",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    /// Accepts "PHASE2", "Phase 2", "phase-2", "Early Phase 1", "Phase II".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match key.as_str() {
            "EARLYPHASE1" | "EARLYPHASEI" | "PHASE0" => Ok(Phase::EarlyPhase1),
            "PHASE1" | "PHASEI" => Ok(Phase::Phase1),
            "PHASE2" | "PHASEII" => Ok(Phase::Phase2),
            "PHASE3" | "PHASEIII" => Ok(Phase::Phase3),
            "PHASE4" | "PHASEIV" => Ok(Phase::Phase4),
            _ => Err(format!("Unknown phase: {}", s.trim())),
        }
    }
}

/// Statuses searched when the profile carries no explicit status filter
pub fn default_statuses() -> BTreeSet<RecruitmentStatus> {
    BTreeSet::from([
        RecruitmentStatus::Recruiting,
        RecruitmentStatus::NotYetRecruiting,
    ])
}

/// Where the patient is located or prefers treatment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

impl Location {
    /// The single effective location unit.
    ///
    /// Precedence: postal code, then city (with state and country when
    /// present), then state (with country), then country alone.
    pub fn effective(&self) -> Option<String> {
        let part = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let (city, state, country) = (part(&self.city), part(&self.state), part(&self.country));

        if let Some(postal) = part(&self.postal_code) {
            return Some(postal);
        }
        let parts: Vec<String> = if city.is_some() {
            [city, state, country].into_iter().flatten().collect()
        } else if state.is_some() {
            [state, country].into_iter().flatten().collect()
        } else {
            country.into_iter().collect()
        };
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.effective().is_none()
    }
}

/// Structured patient data extracted from a clinical conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PatientProfile {
    pub diagnosis: Option<String>,
    pub additional_conditions: Vec<String>,
    pub intervention: Option<String>,
    pub additional_interventions: Vec<String>,
    /// Registry expression that replaces every structured condition and
    /// intervention term when non-empty.
    pub custom_search_expression: Option<String>,
    pub location: Location,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub symptoms: Vec<String>,
    pub medical_history: Vec<String>,
    pub current_medications: Vec<String>,
    pub exclusion_criteria: Vec<String>,
    pub treatment_plan: Option<String>,
    /// `None` means the default status set applies.
    pub status_filter: Option<BTreeSet<RecruitmentStatus>>,
    /// `None` means no phase restriction.
    pub phase_filter: Option<BTreeSet<Phase>>,
}

impl PatientProfile {
    /// Status set that a query built from this profile will use
    pub fn effective_statuses(&self) -> BTreeSet<RecruitmentStatus> {
        match &self.status_filter {
            Some(set) if !set.is_empty() => set.clone(),
            _ => default_statuses(),
        }
    }

    /// The custom expression, if it is set to something other than whitespace
    pub fn active_expression(&self) -> Option<&str> {
        self.custom_search_expression
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(city: &str, state: &str, country: &str, postal: &str) -> Location {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Location {
            city: opt(city),
            state: opt(state),
            country: opt(country),
            postal_code: opt(postal),
        }
    }

    #[test]
    fn postal_code_wins_over_every_other_unit() {
        let loc = location("Boston", "MA", "United States", "02115");
        assert_eq!(loc.effective().as_deref(), Some("02115"));
    }

    #[test]
    fn city_carries_state_and_country() {
        assert_eq!(
            location("San Francisco", "CA", "", "").effective().as_deref(),
            Some("San Francisco, CA")
        );
        assert_eq!(
            location("Lyon", "", "France", "").effective().as_deref(),
            Some("Lyon, France")
        );
        assert_eq!(
            location("Austin", "TX", "USA", "").effective().as_deref(),
            Some("Austin, TX, USA")
        );
    }

    #[test]
    fn state_then_country_then_none() {
        assert_eq!(
            location("", "Ontario", "Canada", "").effective().as_deref(),
            Some("Ontario, Canada")
        );
        assert_eq!(location("", "", "Japan", "").effective().as_deref(), Some("Japan"));
        assert_eq!(location("", "", "", "").effective(), None);
        assert!(location("  ", "", "", " ").is_empty());
    }

    #[test]
    fn lenient_phase_parsing() {
        assert_eq!("Phase 2".parse::<Phase>(), Ok(Phase::Phase2));
        assert_eq!("PHASE3".parse::<Phase>(), Ok(Phase::Phase3));
        assert_eq!("early phase 1".parse::<Phase>(), Ok(Phase::EarlyPhase1));
        assert_eq!("Phase IV".parse::<Phase>(), Ok(Phase::Phase4));
        assert!("NA".parse::<Phase>().is_err());
    }

    #[test]
    fn lenient_status_parsing() {
        assert_eq!(
            "Not yet recruiting".parse::<RecruitmentStatus>(),
            Ok(RecruitmentStatus::NotYetRecruiting)
        );
        assert_eq!(
            "RECRUITING".parse::<RecruitmentStatus>(),
            Ok(RecruitmentStatus::Recruiting)
        );
        assert!("open".parse::<RecruitmentStatus>().is_err());
    }

    #[test]
    fn status_defaults_when_unset_or_empty() {
        let mut profile = PatientProfile::default();
        assert_eq!(profile.effective_statuses(), default_statuses());

        profile.status_filter = Some(BTreeSet::new());
        assert_eq!(profile.effective_statuses(), default_statuses());

        profile.status_filter = Some(BTreeSet::from([RecruitmentStatus::Completed]));
        assert_eq!(
            profile.effective_statuses(),
            BTreeSet::from([RecruitmentStatus::Completed])
        );
    }

    #[test]
    fn profile_deserializes_with_missing_fields() {
        let profile: PatientProfile = serde_json::from_value(serde_json::json!({
            "diagnosis": "glioblastoma",
            "gender": "female",
            "phase_filter": ["PHASE2"]
        }))
        .unwrap();
        assert_eq!(profile.diagnosis.as_deref(), Some("glioblastoma"));
        assert_eq!(profile.gender, Some(Gender::Female));
        assert_eq!(profile.phase_filter, Some(BTreeSet::from([Phase::Phase2])));
        assert!(profile.status_filter.is_none());
        assert!(profile.location.is_empty());
    }
}
