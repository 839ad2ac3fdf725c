//! Biography generator: keywords plus profile context in, a short
//! first-person bio out.
//!
//! Uses the generation service when one is configured and falls back to one
//! of four localized templates otherwise. Output never exceeds `max_chars`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::reasoning::ReasoningContext;
use crate::llm::{ChatMessage, LlmProvider, Reasoning, RespondResult};

use super::catalog::{Catalog, Locale, MessageKey};
use super::model::Gender;
use super::prompts::{
    MODERATION_SENTINEL, TOOL_WRITE_BIO, bio_system_prompt, bio_tool, bio_user_prompt,
};

pub const MAX_KEYWORDS: usize = 6;
pub const DEFAULT_TONE: &str = "playful";

/// Split raw keyword input on commas/semicolons/newlines, or on whitespace
/// when given as one blob. Deduplicated case-insensitively, capped.
pub fn split_keywords(raw: &str) -> Vec<String> {
    let delimited = raw.contains([',', ';', '\n', '、', '，']);
    let pieces: Vec<&str> = if delimited {
        raw.split([',', ';', '\n', '、', '，']).collect()
    } else {
        raw.split_whitespace().collect()
    };
    normalize_keywords(pieces)
}

/// Trim, drop empties, dedupe case-insensitively and cap.
pub fn normalize_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    keywords
        .into_iter()
        .map(|k| {
            k.as_ref()
                .trim()
                .trim_matches(|c: char| matches!(c, '.' | '!' | '?' | '"' | '\''))
                .trim()
                .to_string()
        })
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .take(MAX_KEYWORDS)
        .collect()
}

/// Whether a bio-step utterance is a keyword list rather than a finished
/// bio: it has list separators, or is at most three words without
/// sentence punctuation.
pub fn looks_like_keywords(text: &str) -> bool {
    let text = text.trim();
    if text.contains([',', ';', '、', '，']) {
        return true;
    }
    let sentence = text.contains(['.', '!', '?', '。', '！', '？']);
    !sentence && text.split_whitespace().count() <= 3
}

/// Cut `text` to at most `max_chars` characters, preferring a word break.
pub fn truncate_bio(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let cut: String = text.chars().take(max_chars - 1).collect();
    let cut = match cut.rfind(char::is_whitespace) {
        Some(i) if cut[..i].chars().count() > max_chars / 2 => cut[..i].to_string(),
        _ => cut,
    };
    let cut = cut.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'));
    format!("{cut}…")
}

/// Input to one generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BioInput {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender_id: Option<Gender>,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum BioOutcome {
    /// Written by the generation service.
    Generated(String),
    /// Filled from a localized template.
    Template(String),
    /// The service refused the keywords; carries the localized notice.
    Moderated(String),
}

impl BioOutcome {
    /// The bio to store, if this outcome produced one.
    pub fn bio(&self) -> Option<&str> {
        match self {
            Self::Generated(s) | Self::Template(s) => Some(s),
            Self::Moderated(_) => None,
        }
    }
}

pub struct BioGenerator {
    llm: Option<Arc<dyn LlmProvider>>,
    catalog: Catalog,
    max_chars: usize,
    timeout: Duration,
}

impl BioGenerator {
    pub fn new(
        llm: Option<Arc<dyn LlmProvider>>,
        catalog: Catalog,
        max_chars: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            catalog,
            max_chars,
            timeout,
        }
    }

    pub async fn generate(&self, input: &BioInput) -> BioOutcome {
        let keywords = normalize_keywords(&input.keywords);
        let Some(llm) = self.llm.as_ref() else {
            return BioOutcome::Template(self.from_template(input, &keywords));
        };

        match self.call_service(Arc::clone(llm), input, &keywords).await {
            Ok(raw) if raw.contains(MODERATION_SENTINEL) => {
                debug!(locale = %input.locale, "Bio keywords moderated");
                BioOutcome::Moderated(
                    self.catalog.text(input.locale, MessageKey::BioModerated).to_string(),
                )
            }
            Ok(raw) => {
                let cleaned = clean_generated(&raw);
                if cleaned.is_empty() {
                    BioOutcome::Template(self.from_template(input, &keywords))
                } else {
                    BioOutcome::Generated(truncate_bio(&cleaned, self.max_chars))
                }
            }
            Err(e) => {
                warn!(locale = %input.locale, "Bio generation failed, using template: {e}");
                BioOutcome::Template(self.from_template(input, &keywords))
            }
        }
    }

    async fn call_service(
        &self,
        llm: Arc<dyn LlmProvider>,
        input: &BioInput,
        keywords: &[String],
    ) -> Result<String, LlmError> {
        let provider = llm.model_name().to_string();
        let tone = input.tone.as_deref().unwrap_or(DEFAULT_TONE);
        let gender_label = input
            .gender_id
            .map(|g| self.catalog.gender_label(input.locale, g));
        let reasoning = Reasoning::new(llm, self.timeout)
            .with_system_prompt(bio_system_prompt(input.locale, self.max_chars, tone));
        let context = ReasoningContext::new()
            .with_messages(vec![ChatMessage::user(bio_user_prompt(
                input.display_name.as_deref(),
                input.age,
                gender_label,
                keywords,
            ))])
            .with_tools(vec![bio_tool()])
            .with_metadata("purpose", "bio");

        let output = reasoning.respond_with_tools(&context).await?;
        match output.result {
            RespondResult::Text(text) => Ok(text),
            RespondResult::ToolCalls {
                tool_calls,
                content,
            } => tool_calls
                .iter()
                .find(|c| c.name == TOOL_WRITE_BIO)
                .and_then(|c| c.arguments.get("bio"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or(content)
                .ok_or_else(|| LlmError::InvalidResponse {
                    provider,
                    reason: "no bio in tool call".to_string(),
                }),
        }
    }

    /// Fill one of the four localized templates. Templates needing a name or
    /// age are skipped when that value is unknown.
    pub fn from_template(&self, input: &BioInput, keywords: &[String]) -> String {
        let locale = input.locale;
        let joined = if keywords.is_empty() {
            self.catalog.text(locale, MessageKey::BioDefaultInterests).to_string()
        } else {
            keywords.join(locale.list_separator())
        };
        let name = input.display_name.as_deref().unwrap_or_default();
        let age = input.age.map(|a| a.to_string()).unwrap_or_default();

        let usable: Vec<MessageKey> = MessageKey::BIO_TEMPLATES
            .into_iter()
            .filter(|key| {
                let template = self.catalog.text(locale, *key);
                (!template.contains("{name}") || !name.is_empty())
                    && (!template.contains("{age}") || !age.is_empty())
            })
            .collect();
        let key = if usable.is_empty() {
            MessageKey::BioTemplate3
        } else {
            usable[rand::thread_rng().gen_range(0..usable.len())]
        };

        let text = self.catalog.render(
            locale,
            key,
            &[("name", name), ("age", age.as_str()), ("keywords", joined.as_str())],
        );
        truncate_bio(&text, self.max_chars)
    }
}

/// Flatten to one line and strip wrapping quotes.
fn clean_generated(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| matches!(c, '"' | '“' | '”' | '«' | '»'))
        .trim()
        .to_string()
}
