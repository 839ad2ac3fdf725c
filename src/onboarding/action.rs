//! Turn request/response wire types and the closed `Action` union.

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

use super::model::{DraftSummary, Field, FieldValue, PendingConfirm};

/// A single declarative effect the resolver asks the orchestrator to apply.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    BotMessage {
        text: String,
        #[serde(default, rename = "quickReplies")]
        quick_replies: Vec<String>,
    },
    SetConsent {
        value: bool,
    },
    SetField(FieldValue),
    Finalize,
}

impl Action {
    /// A bot message without chips.
    pub fn say(text: impl Into<String>) -> Self {
        Self::BotMessage {
            text: text.into(),
            quick_replies: Vec::new(),
        }
    }

    pub fn say_with(text: impl Into<String>, quick_replies: Vec<String>) -> Self {
        Self::BotMessage {
            text: text.into(),
            quick_replies,
        }
    }

    pub fn is_finalize(&self) -> bool {
        matches!(self, Self::Finalize)
    }
}

/// Orchestrator → resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub consented: bool,
    #[serde(default)]
    pub draft_summary: DraftSummary,
    #[serde(default)]
    pub missing_fields: Vec<Field>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub locale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_confirm: Option<PendingConfirm>,
}

impl TurnRequest {
    /// Content of the most recent user message, if any.
    pub fn latest_utterance(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::llm::Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Resolver → orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_confirm: Option<PendingConfirm>,
}

impl TurnResponse {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            pending_confirm: None,
        }
    }

    /// Chips of the last bot message in the response.
    pub fn quick_replies(&self) -> &[String] {
        self.actions
            .iter()
            .rev()
            .find_map(|a| match a {
                Action::BotMessage { quick_replies, .. } => Some(quick_replies.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            Action::BotMessage { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
