//! Transcript to patient profile extraction via Claude

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use trialscribe_core::{
    Gender, Location, MatchError, PatientExtractor, PatientProfile, Phase, RecruitmentStatus,
};

use super::client::ClaudeClient;

const SYSTEM_PROMPT: &str = r#"You are a medical information extraction assistant. Analyze the patient-doctor conversation transcript and extract structured information about the patient's condition, demographics, and medical history. Only extract information that is explicitly mentioned or clearly implied. Use null for anything not mentioned.

Return ONLY a JSON object with these keys:
- "diagnosis": string (primary diagnosis or condition)
- "additional_conditions": array of strings (other conditions relevant to trial search)
- "intervention": string (treatment or therapy under discussion)
- "additional_interventions": array of strings
- "search_term": string (general keyword the clinician wants searched, if any)
- "location_city", "location_state", "location_country", "location_zip": strings (where the patient is or prefers treatment)
- "age": integer
- "gender": one of "Male", "Female", "Other"
- "symptoms", "medical_history", "current_medications", "exclusion_criteria": arrays of strings
- "treatment_plan": string
- "phase_preference": array of strings such as "Phase 1", "Phase 2"
- "status_preference": string or array of strings such as "RECRUITING"

Examples:
- "I'm 45, live in Boston, recently diagnosed with stage III melanoma" → {"diagnosis": "stage III melanoma", "age": 45, "location_city": "Boston", ...}

Return ONLY the JSON object, no other text."#;

/// Shape of the model's answer; everything optional and loosely typed
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExtraction {
    diagnosis: Option<String>,
    additional_conditions: Vec<String>,
    intervention: Option<String>,
    additional_interventions: Vec<String>,
    search_term: Option<String>,
    location_city: Option<String>,
    location_state: Option<String>,
    location_country: Option<String>,
    location_zip: Option<String>,
    age: Option<serde_json::Value>,
    gender: Option<String>,
    symptoms: Vec<String>,
    medical_history: Vec<String>,
    current_medications: Vec<String>,
    exclusion_criteria: Vec<String>,
    treatment_plan: Option<String>,
    phase_preference: Option<OneOrMany>,
    status_preference: Option<OneOrMany>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Parse each label, dropping ones that are not recognised.
fn parse_set<T: std::str::FromStr + Ord>(labels: Option<OneOrMany>) -> Option<BTreeSet<T>> {
    let set: BTreeSet<T> = labels
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .iter()
        .filter_map(|label| label.parse().ok())
        .collect();
    (!set.is_empty()).then_some(set)
}

/// Accept `45`, `"45"` or `"45 years"`.
fn parse_age(value: Option<serde_json::Value>) -> Option<u32> {
    match value? {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        serde_json::Value::String(s) => s
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok()),
        _ => None,
    }
}

impl From<RawExtraction> for PatientProfile {
    fn from(raw: RawExtraction) -> Self {
        // A literal "Unknown" diagnosis means the model found none.
        let diagnosis = raw
            .diagnosis
            .filter(|d| !d.trim().eq_ignore_ascii_case("unknown"));
        let mut additional_conditions = raw.additional_conditions;
        if let Some(term) = raw.search_term {
            additional_conditions.push(term);
        }

        PatientProfile {
            diagnosis,
            additional_conditions,
            intervention: raw.intervention,
            additional_interventions: raw.additional_interventions,
            custom_search_expression: None,
            location: Location {
                city: raw.location_city,
                state: raw.location_state,
                country: raw.location_country,
                postal_code: raw.location_zip,
            },
            age: parse_age(raw.age),
            gender: raw.gender.and_then(|g| g.parse::<Gender>().ok()),
            symptoms: raw.symptoms,
            medical_history: raw.medical_history,
            current_medications: raw.current_medications,
            exclusion_criteria: raw.exclusion_criteria,
            treatment_plan: raw.treatment_plan,
            status_filter: parse_set::<RecruitmentStatus>(raw.status_preference),
            phase_filter: parse_set::<Phase>(raw.phase_preference),
        }
    }
}

/// [`PatientExtractor`] backed by the Claude Messages API
#[derive(Clone)]
pub struct ClaudeExtractor {
    client: ClaudeClient,
}

impl ClaudeExtractor {
    pub fn new(client: ClaudeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PatientExtractor for ClaudeExtractor {
    async fn extract(&self, transcript: &str) -> Result<PatientProfile, MatchError> {
        tracing::info!(
            transcript_length = transcript.len(),
            model = self.client.model(),
            "Extracting patient data"
        );
        let user_message = format!("Transcript:\n{}", transcript);
        let response = self
            .client
            .message(Some(SYSTEM_PROMPT), &user_message)
            .await
            .map_err(MatchError::ExtractionFailure)?;

        parse_profile(&response)
    }
}

/// Parse the model's reply into a profile
pub fn parse_profile(response: &str) -> Result<PatientProfile, MatchError> {
    let json_str = extract_json(response).map_err(MatchError::ExtractionFailure)?;
    let raw: RawExtraction = serde_json::from_str(&json_str).map_err(|e| {
        MatchError::ExtractionFailure(format!("Failed to parse patient data: {}", e))
    })?;
    Ok(raw.into())
}

/// Extract a JSON object from text that might contain markdown code blocks
fn extract_json(text: &str) -> Result<String, String> {
    let trimmed = text.trim();

    // Direct JSON object
    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    // Wrapped in ```json ... ```
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return Ok(after[..end].trim().to_string());
        }
    }

    // Wrapped in ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return Ok(after[..end].trim().to_string());
        }
    }

    // Prose around a bare object
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return Ok(trimmed[start..=end].to_string());
        }
    }

    Err(format!("Could not extract JSON from response: {}", trimmed))
}
