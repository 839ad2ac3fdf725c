//! Profile onboarding: conversational collection of a minimal user profile.

pub mod config;
pub mod error;
pub mod llm;
pub mod onboarding;
pub mod store;
