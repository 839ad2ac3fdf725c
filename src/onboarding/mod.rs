//! Onboarding system: conversational profile creation.
//!
//! A new user is walked through consent and four required fields (display
//! name, age, gender, bio) in free text. The resolver turns each utterance
//! into declarative actions; the manager applies them to the user's draft
//! and writes the finished profile exactly once.

pub mod action;
pub mod bio;
pub mod catalog;
pub mod extract;
pub mod manager;
pub mod model;
pub mod mood;
pub mod prompts;
pub mod resolver;
pub mod routes;
pub mod state;

pub use action::{Action, TurnRequest, TurnResponse};
pub use bio::{BioGenerator, BioInput, BioOutcome};
pub use catalog::{Catalog, Locale, MessageKey};
pub use manager::{BotMessage, OnboardingManager, OnboardingStatus, TurnOutcome};
pub use model::{Draft, DraftSummary, Field, FieldValue, Gender, UserProfile};
pub use resolver::TurnResolver;
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{MoodFeedState, Stage};
