//! Per-trial question answering grounded in a single trial's details

use trialscribe_core::TrialRecord;

use super::client::{ClaudeClient, Message};

const SYSTEM_PROMPT: &str = r#"You are a helpful medical assistant specializing in clinical trials. Answer questions about one specific clinical trial using only the trial information provided.

Rules:
1. Answer ONLY from the trial information in the context below.
2. If the answer is not in the context, say "This information is not available in the trial details".
3. Give clear, patient-friendly explanations and avoid medical advice beyond explaining the trial.
4. Encourage the patient to discuss medical decisions with their healthcare provider.
5. For eligibility questions, refer to the eligibility criteria; for location questions, refer to the listed locations.

Trial context:
"#;

/// Earlier turns kept when the history grows long
const MAX_HISTORY_MESSAGES: usize = 20;

/// Render the trial's details as plain text for the model
pub fn trial_context(trial: &TrialRecord) -> String {
    let mut parts = vec![
        format!("NCT ID: {}", trial.nct_id),
        format!("Title: {}", trial.title),
    ];
    if let Some(official) = &trial.official_title {
        parts.push(format!("Official Title: {}", official));
    }
    parts.push(format!("Status: {}", trial.status));
    if !trial.phase.is_empty() {
        parts.push(format!("Phase: {}", trial.phase.join(", ")));
    }
    if !trial.conditions.is_empty() {
        parts.push(format!("Conditions: {}", trial.conditions.join(", ")));
    }
    if let Some(summary) = &trial.summary {
        parts.push(format!("\nSummary:\n{}", summary));
    }
    if let Some(criteria) = &trial.eligibility_criteria {
        parts.push(format!("\nEligibility Criteria:\n{}", criteria));
    }
    if !trial.locations.is_empty() {
        let locations: Vec<String> = trial.locations.iter().map(|l| format!("- {}", l)).collect();
        parts.push(format!("\nLocations:\n{}", locations.join("\n")));
    }
    parts.push(format!("\nTrial URL: {}", trial.url));
    parts.join("\n")
}

/// Answer `question` about `trial`, continuing the given conversation.
pub async fn ask(
    client: &ClaudeClient,
    trial: &TrialRecord,
    history: &[Message],
    question: &str,
) -> Result<String, String> {
    let system = format!("{}{}", SYSTEM_PROMPT, trial_context(trial));

    let skip = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    let mut messages: Vec<Message> = history[skip..].to_vec();
    messages.push(Message::user(question));

    tracing::debug!(
        nct_id = %trial.nct_id,
        history = messages.len() - 1,
        "Trial chat request"
    );
    client.converse(Some(&system), &messages).await
}
