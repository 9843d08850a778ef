//! Profile to registry query conversion

use std::collections::BTreeSet;

use serde::Serialize;

use crate::normalize::normalize;
use crate::profile::{Gender, PatientProfile, Phase, RecruitmentStatus};

/// Registry page size used when none is configured
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page the registry serves
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Condition/intervention part of a query
///
/// Exactly one of the structured terms or a custom expression is active.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchTerms {
    Structured {
        condition: Option<String>,
        intervention: Option<String>,
    },
    /// Passed to the registry verbatim
    Expression { expression: String },
}

impl SearchTerms {
    pub fn is_expression(&self) -> bool {
        matches!(self, SearchTerms::Expression { .. })
    }
}

/// Materialized parameters for one registry request
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuerySpec {
    pub terms: SearchTerms,
    pub location: Option<String>,
    pub statuses: BTreeSet<RecruitmentStatus>,
    /// False when `statuses` came from the default set
    pub status_explicit: bool,
    pub phases: Option<BTreeSet<Phase>>,
    pub gender: Option<Gender>,
    pub age: Option<u32>,
    pub page_size: u32,
    pub page_token: Option<String>,
}

/// Builds registry queries from patient profiles
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    page_size: u32,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl QueryBuilder {
    /// Page size is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Build the query for a profile. Absent fields are simply omitted.
    pub fn build(&self, profile: &PatientProfile) -> QuerySpec {
        let profile = normalize(profile);

        let terms = match profile.custom_search_expression.clone() {
            Some(expression) => SearchTerms::Expression { expression },
            None => SearchTerms::Structured {
                condition: or_expression(
                    profile.diagnosis.iter().chain(&profile.additional_conditions),
                ),
                intervention: or_expression(
                    profile
                        .intervention
                        .iter()
                        .chain(&profile.additional_interventions),
                ),
            },
        };

        QuerySpec {
            terms,
            location: profile.location.effective(),
            statuses: profile.effective_statuses(),
            status_explicit: profile.status_filter.is_some(),
            phases: profile.phase_filter.clone(),
            gender: profile.gender,
            age: profile.age,
            page_size: self.page_size,
            page_token: None,
        }
    }
}

/// Join terms with `OR`, keeping first-seen order and dropping repeats.
fn or_expression<'a>(terms: impl Iterator<Item = &'a String>) -> Option<String> {
    let mut seen: Vec<&str> = Vec::new();
    for term in terms {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(term)) {
            seen.push(term);
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.join(" OR "))
    }
}
