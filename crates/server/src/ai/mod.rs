//! AI features powered by Claude API

pub mod chatbot;
pub mod client;
pub mod extractor;

pub use client::{ClaudeClient, Message};
pub use extractor::ClaudeExtractor;
