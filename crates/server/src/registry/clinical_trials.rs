//! ClinicalTrials.gov API v2 client
//!
//! Reference: https://clinicaltrials.gov/data-api/api

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use trialscribe_core::{
    Gender, MatchError, QuerySpec, SearchPage, SearchTerms, TrialRecord, TrialRegistry,
};

const STUDY_URL_BASE: &str = "https://clinicaltrials.gov/study/";

/// Locations kept per trial
const MAX_LOCATIONS_PER_TRIAL: usize = 5;

#[derive(Debug, Error)]
enum RegistryError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registry returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl RegistryError {
    /// A 400 against a custom expression is the user's to fix; everything
    /// else is an upstream failure.
    fn into_match_error(self, expression: bool) -> MatchError {
        match &self {
            RegistryError::Status { status, body }
                if expression && *status == reqwest::StatusCode::BAD_REQUEST =>
            {
                MatchError::MalformedCustomExpression(body.clone())
            }
            _ => MatchError::UpstreamSearchFailure(self.to_string()),
        }
    }
}

/// HTTP client for the public ClinicalTrials.gov registry
#[derive(Clone)]
pub struct ClinicalTrialsClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ClinicalTrialsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            timeout,
        }
    }

    async fn fetch(&self, query: &QuerySpec) -> Result<StudiesResponse, RegistryError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&query_params(query))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RegistryError::Timeout(self.timeout)
                } else {
                    RegistryError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Status { status, body });
        }

        Ok(response.json::<StudiesResponse>().await?)
    }
}

#[async_trait]
impl TrialRegistry for ClinicalTrialsClient {
    async fn search(&self, query: &QuerySpec) -> Result<SearchPage, MatchError> {
        tracing::debug!(params = ?query_params(query), "Querying ClinicalTrials.gov");
        metrics::counter!("trial_registry_requests_total").increment(1);

        let body = self
            .fetch(query)
            .await
            .map_err(|e| e.into_match_error(query.terms.is_expression()))?;

        let trials: Vec<TrialRecord> = body.studies.into_iter().filter_map(Study::into_record).collect();
        tracing::debug!(
            returned = trials.len(),
            total_count = ?body.total_count,
            "Registry page received"
        );
        Ok(SearchPage {
            trials,
            total_count: body.total_count,
            next_page_token: body.next_page_token,
        })
    }
}

/// Render a query as registry request parameters
pub fn query_params(query: &QuerySpec) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("format", "json".to_string()),
        ("countTotal", "true".to_string()),
        ("pageSize", query.page_size.to_string()),
    ];

    match &query.terms {
        SearchTerms::Expression { expression } => {
            params.push(("query.term", expression.clone()));
        }
        SearchTerms::Structured {
            condition,
            intervention,
        } => {
            if let Some(condition) = condition {
                params.push(("query.cond", condition.clone()));
            }
            if let Some(intervention) = intervention {
                params.push(("query.intr", intervention.clone()));
            }
        }
    }

    if let Some(location) = &query.location {
        params.push(("query.locn", location.clone()));
    }

    if !query.statuses.is_empty() {
        let statuses: Vec<&str> = query.statuses.iter().map(|s| s.as_str()).collect();
        params.push(("filter.overallStatus", statuses.join(",")));
    }

    let advanced = advanced_filter(query);
    if !advanced.is_empty() {
        params.push(("filter.advanced", advanced));
    }

    if let Some(token) = &query.page_token {
        params.push(("pageToken", token.clone()));
    }

    params
}

/// Phase, sex and age restrictions in registry `AREA[]` syntax
fn advanced_filter(query: &QuerySpec) -> String {
    let mut clauses = Vec::new();

    if let Some(phases) = query.phases.as_ref().filter(|p| !p.is_empty()) {
        let names: Vec<&str> = phases.iter().map(|p| p.as_str()).collect();
        clauses.push(format!("AREA[Phase]({})", names.join(" OR ")));
    }

    match query.gender {
        Some(Gender::Female) => clauses.push("AREA[Sex](FEMALE OR ALL)".to_string()),
        Some(Gender::Male) => clauses.push("AREA[Sex](MALE OR ALL)".to_string()),
        Some(Gender::Other) | None => {}
    }

    if let Some(age) = query.age {
        clauses.push(format!(
            "AREA[MinimumAge]RANGE[MIN, {age} years] AND AREA[MaximumAge]RANGE[{age} years, MAX]"
        ));
    }

    clauses.join(" AND ")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudiesResponse {
    #[serde(default)]
    studies: Vec<Study>,
    total_count: Option<u32>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Study {
    protocol_section: ProtocolSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ProtocolSection {
    identification_module: IdentificationModule,
    status_module: StatusModule,
    design_module: DesignModule,
    conditions_module: ConditionsModule,
    description_module: DescriptionModule,
    eligibility_module: EligibilityModule,
    contacts_locations_module: ContactsLocationsModule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IdentificationModule {
    nct_id: Option<String>,
    brief_title: Option<String>,
    official_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StatusModule {
    overall_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DesignModule {
    phases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConditionsModule {
    conditions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DescriptionModule {
    brief_summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct EligibilityModule {
    eligibility_criteria: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContactsLocationsModule {
    locations: Vec<StudyLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StudyLocation {
    facility: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl StudyLocation {
    fn label(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.facility, &self.city, &self.state, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

impl Study {
    /// Studies without an NCT id are skipped.
    fn into_record(self) -> Option<TrialRecord> {
        let section = self.protocol_section;
        let nct_id = section
            .identification_module
            .nct_id
            .filter(|id| !id.trim().is_empty())?;
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());

        Some(TrialRecord {
            url: format!("{}{}", STUDY_URL_BASE, nct_id),
            title: non_empty(section.identification_module.brief_title)
                .unwrap_or_else(|| "No title available".to_string()),
            official_title: non_empty(section.identification_module.official_title),
            status: section
                .status_module
                .overall_status
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            phase: section.design_module.phases,
            conditions: section.conditions_module.conditions,
            summary: non_empty(section.description_module.brief_summary),
            eligibility_criteria: non_empty(section.eligibility_module.eligibility_criteria),
            locations: section
                .contacts_locations_module
                .locations
                .iter()
                .filter_map(StudyLocation::label)
                .take(MAX_LOCATIONS_PER_TRIAL)
                .collect(),
            nct_id,
        })
    }
}
