//! Trial registry clients

pub mod clinical_trials;

pub use clinical_trials::ClinicalTrialsClient;
