use serde::{Deserialize, Serialize};

/// A clinical trial as returned by the registry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrialRecord {
    /// Registry identifier (NCT number)
    pub nct_id: String,
    pub title: String,
    #[serde(default)]
    pub official_title: Option<String>,
    pub status: String,
    #[serde(default)]
    pub phase: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub eligibility_criteria: Option<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    pub url: String,
}

/// One page of registry results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub trials: Vec<TrialRecord>,
    /// Total matches across all pages, when the registry reports it
    pub total_count: Option<u32>,
    pub next_page_token: Option<String>,
}

impl SearchPage {
    /// Result count used for threshold decisions
    pub fn count(&self) -> usize {
        self.total_count
            .map(|n| n as usize)
            .unwrap_or(self.trials.len())
            .max(self.trials.len())
    }
}
