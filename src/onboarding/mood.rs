//! Mood feed: the optional status prompt that follows a finalized profile.
//!
//! Flow: prompt for a one-line status, confirm it, publish on "yes". A "no"
//! goes back to the prompt and counts an attempt; skip words or hitting the
//! attempt cap end the flow without publishing.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::store::Database;

use super::action::Action;
use super::catalog::{Catalog, Locale, MessageKey};
use super::model::MoodPost;
use super::state::MoodFeedState;

pub const MOOD_MAX_CHARS: usize = 140;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodFeed {
    pub state: MoodFeedState,
    #[serde(default)]
    pub attempts: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
}

/// Result of feeding one utterance to the mood flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoodStep {
    pub reply: Action,
    /// Text to publish, set only on a confirmed "yes".
    pub publish: Option<String>,
}

impl MoodStep {
    fn reply(reply: Action) -> Self {
        Self {
            reply,
            publish: None,
        }
    }
}

/// 1–140 characters on a single line.
pub fn validate_mood(text: &str) -> Option<String> {
    let text = text.trim();
    let len = text.chars().count();
    if len == 0 || len > MOOD_MAX_CHARS || text.contains('\n') {
        return None;
    }
    Some(text.to_string())
}

impl MoodFeed {
    /// Enter the prompt state and return the opening question. `None` once
    /// the flow has left idle.
    pub fn start(&mut self, catalog: &Catalog, locale: Locale) -> Option<Action> {
        if !self.advance(MoodFeedState::Prompt) {
            return None;
        }
        self.attempts = 0;
        self.candidate = None;
        Some(Action::say(catalog.text(locale, MessageKey::MoodPrompt)))
    }

    pub fn is_active(&self) -> bool {
        self.state != MoodFeedState::Idle && !self.state.is_terminal()
    }

    /// Move to `target` if the mood machine allows it.
    fn advance(&mut self, target: MoodFeedState) -> bool {
        if !self.state.can_transition_to(target) {
            debug!(from = %self.state, to = %target, "Ignoring invalid mood transition");
            return false;
        }
        self.state = target;
        true
    }

    fn finish_skipped(&mut self, catalog: &Catalog, locale: Locale) -> MoodStep {
        self.advance(MoodFeedState::Done);
        self.candidate = None;
        MoodStep::reply(Action::say(catalog.text(locale, MessageKey::MoodSkipped)))
    }

    /// Count a failed attempt; true when the cap is reached.
    fn spend_attempt(&mut self, max_attempts: u8) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts >= max_attempts
    }

    /// Advance the flow with one utterance. `None` when the flow is not
    /// waiting for input.
    pub fn handle(
        &mut self,
        catalog: &Catalog,
        locale: Locale,
        text: &str,
        max_attempts: u8,
    ) -> Option<MoodStep> {
        match self.state {
            MoodFeedState::Idle | MoodFeedState::Done => None,
            MoodFeedState::Prompt => {
                if catalog.is_skip_intent(locale, text) {
                    return Some(self.finish_skipped(catalog, locale));
                }
                match validate_mood(text) {
                    Some(candidate) => {
                        let reply = Action::say_with(
                            catalog.render(locale, MessageKey::MoodConfirm, &[("text", &candidate)]),
                            catalog.yes_no_chips(locale),
                        );
                        self.candidate = Some(candidate);
                        self.advance(MoodFeedState::Confirm);
                        Some(MoodStep::reply(reply))
                    }
                    None if self.spend_attempt(max_attempts) => {
                        Some(self.finish_skipped(catalog, locale))
                    }
                    None => Some(MoodStep::reply(Action::say(
                        catalog.text(locale, MessageKey::MoodInvalid),
                    ))),
                }
            }
            MoodFeedState::Confirm => match catalog.yes_no(text) {
                Some(true) => {
                    self.advance(MoodFeedState::Done);
                    let publish = self.candidate.take();
                    Some(MoodStep {
                        reply: Action::say(catalog.text(locale, MessageKey::MoodPublished)),
                        publish,
                    })
                }
                Some(false) => {
                    self.candidate = None;
                    if self.spend_attempt(max_attempts) {
                        return Some(self.finish_skipped(catalog, locale));
                    }
                    self.advance(MoodFeedState::Prompt);
                    Some(MoodStep::reply(Action::say(
                        catalog.text(locale, MessageKey::MoodPrompt),
                    )))
                }
                None if catalog.is_skip_intent(locale, text) => {
                    Some(self.finish_skipped(catalog, locale))
                }
                None => {
                    let candidate = self.candidate.clone().unwrap_or_default();
                    Some(MoodStep::reply(Action::say_with(
                        catalog.render(locale, MessageKey::MoodConfirm, &[("text", &candidate)]),
                        catalog.yes_no_chips(locale),
                    )))
                }
            },
        }
    }
}

/// Translate a published post into every other locale and store the results.
///
/// Best-effort: meant to be spawned and never awaited by a turn. Every
/// failure is logged at debug and dropped.
pub async fn translate_post(db: Arc<dyn Database>, llm: Arc<dyn LlmProvider>, post: MoodPost) {
    let targets: Vec<Locale> = Locale::ALL
        .into_iter()
        .filter(|l| *l != post.locale)
        .collect();

    let calls = targets.iter().map(|target| {
        let llm = Arc::clone(&llm);
        let text = post.text.clone();
        let target = *target;
        async move {
            let request = CompletionRequest::new(vec![
                ChatMessage::system(format!(
                    "Translate the user's short status into {}. Reply with the translation only.",
                    target.language_name()
                )),
                ChatMessage::user(text),
            ])
            .with_max_tokens(200)
            .with_temperature(0.0);
            (target, llm.complete(request).await)
        }
    });

    for (target, result) in join_all(calls).await {
        match result {
            Ok(resp) if !resp.content.trim().is_empty() => {
                if let Err(e) = db
                    .save_mood_translation(post.id, target, resp.content.trim())
                    .await
                {
                    debug!(post_id = %post.id, locale = %target, "Dropping mood translation: {e}");
                }
            }
            Ok(_) => debug!(post_id = %post.id, locale = %target, "Empty mood translation"),
            Err(e) => debug!(post_id = %post.id, locale = %target, "Mood translation failed: {e}"),
        }
    }
}
