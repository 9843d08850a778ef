//! Profile canonicalization
//!
//! Normalized profiles compare equal whenever they would produce the same
//! query, so equality checks (change detection, idempotent resets) are stable.

use crate::profile::{Location, PatientProfile};

/// Trim a string field; blank becomes `None`.
fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Trim every element, drop blanks, dedupe and sort.
fn list(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    out.sort();
    out.dedup();
    out
}

fn location(loc: &Location) -> Location {
    Location {
        city: text(&loc.city),
        state: text(&loc.state),
        country: text(&loc.country),
        postal_code: text(&loc.postal_code),
    }
}

/// Canonicalize a profile. Pure; never fails.
///
/// Empty status or phase sets collapse to `None`, which already means
/// "default statuses" and "no phase restriction" respectively.
pub fn normalize(profile: &PatientProfile) -> PatientProfile {
    PatientProfile {
        diagnosis: text(&profile.diagnosis),
        additional_conditions: list(&profile.additional_conditions),
        intervention: text(&profile.intervention),
        additional_interventions: list(&profile.additional_interventions),
        custom_search_expression: text(&profile.custom_search_expression),
        location: location(&profile.location),
        age: profile.age,
        gender: profile.gender,
        symptoms: list(&profile.symptoms),
        medical_history: list(&profile.medical_history),
        current_medications: list(&profile.current_medications),
        exclusion_criteria: list(&profile.exclusion_criteria),
        treatment_plan: text(&profile.treatment_plan),
        status_filter: profile.status_filter.clone().filter(|s| !s.is_empty()),
        phase_filter: profile.phase_filter.clone().filter(|s| !s.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Gender, Phase};
    use std::collections::BTreeSet;

    #[test]
    fn trims_and_nulls_blank_strings() {
        let profile = PatientProfile {
            diagnosis: Some("  glioblastoma ".to_string()),
            intervention: Some("   ".to_string()),
            custom_search_expression: Some(String::new()),
            location: Location {
                city: Some(" San Francisco".to_string()),
                state: Some("".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let normalized = normalize(&profile);
        assert_eq!(normalized.diagnosis.as_deref(), Some("glioblastoma"));
        assert_eq!(normalized.intervention, None);
        assert_eq!(normalized.custom_search_expression, None);
        assert_eq!(normalized.location.city.as_deref(), Some("San Francisco"));
        assert_eq!(normalized.location.state, None);
    }

    #[test]
    fn lists_are_trimmed_deduped_and_sorted() {
        let profile = PatientProfile {
            additional_conditions: vec![
                "seizures ".to_string(),
                "".to_string(),
                "headache".to_string(),
                " seizures".to_string(),
            ],
            symptoms: vec!["  ".to_string()],
            ..Default::default()
        };

        let normalized = normalize(&profile);
        assert_eq!(normalized.additional_conditions, vec!["headache", "seizures"]);
        assert!(normalized.symptoms.is_empty());
    }

    #[test]
    fn empty_filter_sets_collapse_to_none() {
        let profile = PatientProfile {
            status_filter: Some(BTreeSet::new()),
            phase_filter: Some(BTreeSet::new()),
            gender: Some(Gender::Other),
            ..Default::default()
        };
        let normalized = normalize(&profile);
        assert_eq!(normalized.status_filter, None);
        assert_eq!(normalized.phase_filter, None);
        assert_eq!(normalized.gender, Some(Gender::Other));

        let phased = PatientProfile {
            phase_filter: Some(BTreeSet::from([Phase::Phase3])),
            ..Default::default()
        };
        assert_eq!(normalize(&phased).phase_filter, phased.phase_filter);
    }
}
