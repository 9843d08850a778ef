//! Test doubles for the collaborator traits

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::MatchError;
use crate::profile::PatientProfile;
use crate::query::QuerySpec;
use crate::registry::{PatientExtractor, TrialRegistry};
use crate::trial::{SearchPage, TrialRecord};

pub(crate) fn trial(n: usize) -> TrialRecord {
    let nct_id = format!("NCT{:08}", n);
    TrialRecord {
        url: format!("https://clinicaltrials.gov/study/{}", nct_id),
        nct_id,
        title: format!("Study {}", n),
        official_title: None,
        status: "RECRUITING".to_string(),
        phase: vec!["PHASE2".to_string()],
        conditions: vec!["Glioblastoma".to_string()],
        summary: None,
        eligibility_criteria: None,
        locations: Vec::new(),
    }
}

enum Mode {
    /// Total per call; the last entry repeats
    Counts(Vec<usize>),
    Unavailable,
    RejectExpression,
}

/// Registry returning synthetic pages and recording every query
pub(crate) struct FakeRegistry {
    mode: Mutex<Mode>,
    queries: Mutex<Vec<QuerySpec>>,
    calls: AtomicUsize,
}

impl FakeRegistry {
    fn new(mode: Mode) -> Self {
        Self {
            mode: Mutex::new(mode),
            queries: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_count(total: usize) -> Self {
        Self::new(Mode::Counts(vec![total]))
    }

    /// First call matches `first`, every later call `then`
    pub(crate) fn narrowing(first: usize, then: usize) -> Self {
        Self::new(Mode::Counts(vec![first, then]))
    }

    pub(crate) fn failing() -> Self {
        Self::new(Mode::Unavailable)
    }

    pub(crate) fn fail_with_malformed_expression(&self) {
        *self.mode.lock().unwrap() = Mode::RejectExpression;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn queries(&self) -> Vec<QuerySpec> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrialRegistry for FakeRegistry {
    async fn search(&self, query: &QuerySpec) -> Result<SearchPage, MatchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());

        let total = match &*self.mode.lock().unwrap() {
            Mode::Counts(counts) => counts[call.min(counts.len() - 1)],
            Mode::Unavailable => {
                return Err(MatchError::UpstreamSearchFailure(
                    "registry returned 503".to_string(),
                ));
            }
            Mode::RejectExpression => {
                return Err(MatchError::MalformedCustomExpression(
                    "unbalanced parenthesis".to_string(),
                ));
            }
        };

        let shown = total.min(query.page_size as usize);
        Ok(SearchPage {
            trials: (0..shown).map(trial).collect(),
            total_count: Some(total as u32),
            next_page_token: (shown < total).then(|| "next".to_string()),
        })
    }
}

/// Extractor returning a fixed profile
pub(crate) struct FakeExtractor {
    profile: Option<PatientProfile>,
    calls: AtomicUsize,
}

impl FakeExtractor {
    pub(crate) fn returning(profile: PatientProfile) -> Self {
        Self {
            profile: Some(profile),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            profile: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PatientExtractor for FakeExtractor {
    async fn extract(&self, _transcript: &str) -> Result<PatientProfile, MatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.profile
            .clone()
            .ok_or_else(|| MatchError::ExtractionFailure("model returned no JSON".to_string()))
    }
}
