//! OnboardingManager: owns each user's draft, applies resolver actions to
//! it and runs finalize exactly once.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::OnboardingError;
use crate::llm::{ChatMessage, LlmProvider};
use crate::store::Database;

use super::action::{Action, TurnRequest};
use super::catalog::{Catalog, Locale, MessageKey};
use super::model::{Draft, DraftSummary, Field, MoodPost, UserProfile, settings_keys};
use super::mood::{MoodFeed, translate_post};
use super::resolver::TurnResolver;
use super::state::{MoodFeedState, Stage};

/// One bot message as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotMessage {
    pub text: String,
    pub quick_replies: Vec<String>,
}

/// Result of one applied turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub messages: Vec<BotMessage>,
    pub stage: Stage,
    pub consented: bool,
    pub draft: DraftSummary,
    pub missing_fields: Vec<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_feed: Option<MoodFeedState>,
}

/// Session snapshot returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingStatus {
    pub user_id: String,
    pub stage: Stage,
    pub consented: bool,
    pub locale: Locale,
    pub draft: DraftSummary,
    pub missing_fields: Vec<Field>,
    pub transcript: Vec<ChatMessage>,
}

struct Session {
    draft: Draft,
    /// Ephemeral conversation; never persisted.
    transcript: Vec<ChatMessage>,
    client_ip: Option<String>,
}

impl Session {
    fn outcome(&self, messages: Vec<BotMessage>) -> TurnOutcome {
        TurnOutcome {
            messages,
            stage: self.draft.stage,
            consented: self.draft.consented,
            draft: self.draft.summary(),
            missing_fields: self.draft.missing_fields(),
            mood_feed: self.draft.mood_feed.as_ref().map(|f| f.state),
        }
    }

    /// Move to `target` if the stage machine allows it.
    fn advance(&mut self, target: Stage) -> bool {
        if self.draft.stage == target {
            return true;
        }
        if !self.draft.stage.can_transition_to(target) {
            debug!(from = %self.draft.stage, to = %target, "Ignoring invalid stage transition");
            return false;
        }
        debug!(from = %self.draft.stage, to = %target, "Stage transition");
        self.draft.stage = target;
        true
    }

    /// Collecting becomes confirm as soon as nothing is missing.
    fn sync_stage(&mut self) {
        if self.draft.stage == Stage::Collecting && self.draft.is_complete() {
            self.advance(Stage::Confirm);
        }
    }
}

/// A session plus its finalize latch. The latch sits outside the mutex so a
/// second finalize can bail out without waiting for the first.
struct SessionHandle {
    finalizing: AtomicBool,
    session: Mutex<Session>,
}

impl SessionHandle {
    fn new(draft: Draft) -> Self {
        Self {
            finalizing: AtomicBool::new(false),
            session: Mutex::new(Session {
                draft,
                transcript: Vec::new(),
                client_ip: None,
            }),
        }
    }
}

/// Coordinates onboarding sessions: draft ownership, action application,
/// draft persistence and the post-finalize mood feed.
pub struct OnboardingManager {
    db: Arc<dyn Database>,
    llm: Option<Arc<dyn LlmProvider>>,
    resolver: Arc<TurnResolver>,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    mood_max_attempts: u8,
}

impl OnboardingManager {
    pub fn new(
        db: Arc<dyn Database>,
        llm: Option<Arc<dyn LlmProvider>>,
        resolver: Arc<TurnResolver>,
        mood_max_attempts: u8,
    ) -> Self {
        Self {
            db,
            llm,
            resolver,
            sessions: RwLock::new(HashMap::new()),
            mood_max_attempts,
        }
    }

    pub fn resolver(&self) -> &Arc<TurnResolver> {
        &self.resolver
    }

    fn catalog(&self) -> &Catalog {
        self.resolver.catalog()
    }

    /// Begin a session, or resume one. Re-greets and repeats the current
    /// question without mutating the draft.
    pub async fn start(
        &self,
        user_id: &str,
        locale: Option<Locale>,
        client_ip: Option<String>,
    ) -> TurnOutcome {
        let handle = self.session(user_id).await;
        let mut session = handle.session.lock().await;
        if client_ip.is_some() {
            session.client_ip = client_ip;
        }

        if session.draft.stage == Stage::Idle {
            if let Some(locale) = locale {
                session.draft.locale = locale;
            }
            session.advance(Stage::Consent);
            info!(user_id = %user_id, locale = %session.draft.locale, "Onboarding session started");
        }

        if session.draft.stage.is_terminal() {
            let name = session.draft.display_name.clone().unwrap_or_default();
            let text = self
                .catalog()
                .render(session.draft.locale, MessageKey::Welcome, &[("name", name.as_str())]);
            let mut messages = Vec::new();
            record(&mut session, &mut messages, text, Vec::new());
            return session.outcome(messages);
        }

        let request = turn_request(&session, true);
        let response = self.resolver.resolve(&request, Some(user_id)).await;
        session.draft.pending_confirm = response.pending_confirm;
        let messages = self
            .apply_actions(user_id, &handle, &mut session, response.actions)
            .await;
        self.persist(user_id, &session.draft).await;
        session.outcome(messages)
    }

    /// Apply one user utterance.
    pub async fn handle_message(
        &self,
        user_id: &str,
        text: &str,
        client_ip: Option<String>,
    ) -> TurnOutcome {
        let handle = self.session(user_id).await;
        let mut session = handle.session.lock().await;
        if client_ip.is_some() {
            session.client_ip = client_ip;
        }
        if session.draft.stage == Stage::Idle {
            session.advance(Stage::Consent);
        }
        session.transcript.push(ChatMessage::user(text));

        if session.draft.stage.is_terminal() {
            let messages = self.handle_mood(user_id, &mut session, text).await;
            return session.outcome(messages);
        }

        if session.draft.stage == Stage::Confirm {
            if let Some(field) = self.catalog().change_request(text) {
                let messages = self.change_locked(&mut session, field);
                self.persist(user_id, &session.draft).await;
                return session.outcome(messages);
            }
        }

        let request = turn_request(&session, false);
        let response = self.resolver.resolve(&request, Some(user_id)).await;
        session.draft.pending_confirm = response.pending_confirm;
        let messages = self
            .apply_actions(user_id, &handle, &mut session, response.actions)
            .await;
        self.persist(user_id, &session.draft).await;
        session.outcome(messages)
    }

    /// Apply a resolver action list in order. Every action kind is handled
    /// here; `Finalize` runs after the batch so the recap is shown first.
    async fn apply_actions(
        &self,
        user_id: &str,
        handle: &SessionHandle,
        session: &mut Session,
        actions: Vec<Action>,
    ) -> Vec<BotMessage> {
        let mut messages = Vec::new();
        let mut finalize = false;
        for action in actions {
            match action {
                Action::BotMessage {
                    text,
                    quick_replies,
                } => record(session, &mut messages, text, quick_replies),
                Action::SetConsent { value } => {
                    session.draft.consented = value;
                    if value {
                        session.advance(Stage::Collecting);
                        info!(user_id = %user_id, "Consent given");
                    }
                }
                Action::SetField(value) => {
                    let field = value.field();
                    match session.draft.set(value) {
                        Ok(()) => {
                            debug!(user_id = %user_id, field = %field, "Field set");
                            if session.draft.pending_confirm.is_some_and(|p| p.field == field) {
                                session.draft.pending_confirm = None;
                            }
                            session.sync_stage();
                        }
                        Err(e) => warn!(user_id = %user_id, "Refusing field: {e}"),
                    }
                }
                Action::Finalize => finalize = true,
            }
        }
        if finalize {
            messages.extend(self.finalize_locked(user_id, handle, session).await);
        }
        messages
    }

    /// Explicit finalize. A no-op while another finalize is running or once
    /// the session is done.
    pub async fn finalize(&self, user_id: &str) -> TurnOutcome {
        let handle = self.session(user_id).await;
        if handle.finalizing.load(Ordering::Acquire) {
            debug!(user_id = %user_id, "Finalize already in flight");
            let session = handle.session.lock().await;
            return session.outcome(Vec::new());
        }
        let mut session = handle.session.lock().await;
        let messages = self.finalize_locked(user_id, &handle, &mut session).await;
        self.persist(user_id, &session.draft).await;
        session.outcome(messages)
    }

    async fn finalize_locked(
        &self,
        user_id: &str,
        handle: &SessionHandle,
        session: &mut Session,
    ) -> Vec<BotMessage> {
        let mut messages = Vec::new();
        if session.draft.stage.blocks_finalize() {
            debug!(user_id = %user_id, stage = %session.draft.stage, "Finalize ignored");
            return messages;
        }
        if handle
            .finalizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(user_id = %user_id, "Finalize latch already closed");
            return messages;
        }

        session.sync_stage();
        let locale = session.draft.locale;
        let profile = UserProfile::from_draft(user_id, &session.draft, session.client_ip.clone());
        let profile = match profile {
            Some(p) if session.advance(Stage::Finalizing) => p,
            _ => {
                handle.finalizing.store(false, Ordering::Release);
                debug!(user_id = %user_id, "Finalize before the draft is complete");
                let summary = session.draft.summary();
                if let Some(next) = summary.next_missing() {
                    if let Action::BotMessage {
                        text,
                        quick_replies,
                    } = self.resolver.ask(locale, next, &summary)
                    {
                        record(session, &mut messages, text, quick_replies);
                    }
                }
                return messages;
            }
        };

        match self.db.upsert_profile(&profile).await {
            Ok(()) => {
                session.advance(Stage::Done);
                info!(user_id = %user_id, "Profile finalized");
                if let Err(e) = self
                    .db
                    .delete_setting(user_id, settings_keys::ONBOARDING_DRAFT)
                    .await
                {
                    warn!(user_id = %user_id, "Failed to delete onboarding draft: {e}");
                }
                let welcome = self.catalog().render(
                    locale,
                    MessageKey::Welcome,
                    &[("name", profile.display_name.as_str())],
                );
                record(session, &mut messages, welcome, Vec::new());

                if self.mood_max_attempts > 0 {
                    let mut feed = MoodFeed::default();
                    if let Some(Action::BotMessage {
                        text,
                        quick_replies,
                    }) = feed.start(self.catalog(), locale)
                    {
                        record(session, &mut messages, text, quick_replies);
                    }
                    session.draft.mood_feed = Some(feed);
                }
            }
            Err(e) => {
                handle.finalizing.store(false, Ordering::Release);
                let e = OnboardingError::from(e);
                warn!(user_id = %user_id, "Finalize failed: {e}");
                session.advance(Stage::Collecting);
                match e {
                    OnboardingError::Persistence(ref db) if db.is_display_name_conflict() => {
                        let name = session.draft.display_name.take().unwrap_or_default();
                        let text = self.catalog().render(
                            locale,
                            MessageKey::NameTaken,
                            &[("name", name.as_str())],
                        );
                        record(session, &mut messages, text, Vec::new());
                    }
                    _ => {
                        let text = self.catalog().text(locale, MessageKey::FinalizeFailed);
                        record(
                            session,
                            &mut messages,
                            text.to_string(),
                            self.catalog().finish_chips(locale),
                        );
                    }
                }
            }
        }
        messages
    }

    /// Clear `field` and go back to collecting it.
    pub async fn request_change(&self, user_id: &str, field: Field) -> TurnOutcome {
        let handle = self.session(user_id).await;
        let mut session = handle.session.lock().await;
        let messages = self.change_locked(&mut session, field);
        self.persist(user_id, &session.draft).await;
        session.outcome(messages)
    }

    fn change_locked(&self, session: &mut Session, field: Field) -> Vec<BotMessage> {
        let mut messages = Vec::new();
        if !matches!(session.draft.stage, Stage::Confirm | Stage::Collecting) {
            debug!(stage = %session.draft.stage, field = %field, "Change ignored");
            return messages;
        }
        session.draft.clear(field);
        session.draft.pending_confirm = None;
        session.advance(Stage::Collecting);

        let locale = session.draft.locale;
        record(
            session,
            &mut messages,
            self.catalog().text(locale, MessageKey::ChangeAck).to_string(),
            Vec::new(),
        );
        let summary = session.draft.summary();
        if let Some(next) = summary.next_missing() {
            if let Action::BotMessage {
                text,
                quick_replies,
            } = self.resolver.ask(locale, next, &summary)
            {
                record(session, &mut messages, text, quick_replies);
            }
        }
        messages
    }

    /// Destroy the draft, in memory and in storage.
    pub async fn reset(&self, user_id: &str) -> bool {
        let removed = self.sessions.write().await.remove(user_id).is_some();
        let deleted = match self
            .db
            .delete_setting(user_id, settings_keys::ONBOARDING_DRAFT)
            .await
        {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(user_id = %user_id, "Failed to delete onboarding draft: {e}");
                false
            }
        };
        info!(user_id = %user_id, "Onboarding session reset");
        removed || deleted
    }

    pub async fn status(&self, user_id: &str) -> Result<OnboardingStatus, OnboardingError> {
        let handle = match self.sessions.read().await.get(user_id) {
            Some(h) => Arc::clone(h),
            None => return Err(OnboardingError::SessionNotFound(user_id.to_string())),
        };
        let session = handle.session.lock().await;
        Ok(OnboardingStatus {
            user_id: user_id.to_string(),
            stage: session.draft.stage,
            consented: session.draft.consented,
            locale: session.draft.locale,
            draft: session.draft.summary(),
            missing_fields: session.draft.missing_fields(),
            transcript: session.transcript.clone(),
        })
    }

    // ── Mood feed ───────────────────────────────────────────────────

    async fn handle_mood(&self, user_id: &str, session: &mut Session, text: &str) -> Vec<BotMessage> {
        let mut messages = Vec::new();
        let locale = session.draft.locale;
        let step = match session.draft.mood_feed.as_mut() {
            Some(feed) => feed.handle(self.catalog(), locale, text, self.mood_max_attempts),
            None => None,
        };
        let Some(step) = step else {
            return messages;
        };

        if let Action::BotMessage {
            text,
            quick_replies,
        } = step.reply
        {
            record(session, &mut messages, text, quick_replies);
        }

        if let Some(status) = step.publish {
            let post = MoodPost::new(user_id, status, locale);
            match self.db.publish_mood(&post).await {
                Ok(()) => {
                    info!(user_id = %user_id, post_id = %post.id, "Mood published");
                    if let Some(llm) = self.llm.as_ref() {
                        tokio::spawn(translate_post(Arc::clone(&self.db), Arc::clone(llm), post));
                    }
                }
                Err(e) => warn!(user_id = %user_id, "Failed to publish mood: {e}"),
            }
        }

        if session.draft.mood_feed.as_ref().is_some_and(|f| !f.is_active()) {
            session.draft.mood_feed = None;
        }
        messages
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Session from memory, then from stored draft, then from an existing
    /// profile, else a fresh draft in the default locale.
    async fn session(&self, user_id: &str) -> Arc<SessionHandle> {
        if let Some(handle) = self.sessions.read().await.get(user_id) {
            return Arc::clone(handle);
        }
        let draft = self.load_draft(user_id).await;
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(SessionHandle::new(draft))),
        )
    }

    async fn load_draft(&self, user_id: &str) -> Draft {
        match self
            .db
            .get_setting(user_id, settings_keys::ONBOARDING_DRAFT)
            .await
        {
            Ok(Some(value)) => match serde_json::from_value::<Draft>(value) {
                Ok(draft) => {
                    debug!(user_id = %user_id, stage = %draft.stage, "Loaded onboarding draft");
                    return draft;
                }
                Err(e) => warn!(user_id = %user_id, "Discarding unreadable onboarding draft: {e}"),
            },
            Ok(None) => {}
            Err(e) => warn!(user_id = %user_id, "Failed to load onboarding draft: {e}"),
        }

        match self.db.get_profile(user_id).await {
            Ok(Some(profile)) => Draft {
                display_name: Some(profile.display_name),
                age: Some(profile.age),
                gender_id: Some(profile.gender_id),
                bio: Some(profile.bio),
                consented: true,
                stage: Stage::Done,
                locale: profile.locale,
                ..Default::default()
            },
            Ok(None) => Draft::new(self.catalog().default_locale()),
            Err(e) => {
                warn!(user_id = %user_id, "Failed to look up profile: {e}");
                Draft::new(self.catalog().default_locale())
            }
        }
    }

    /// Store the draft so it survives a reload. Finished drafts are gone.
    async fn persist(&self, user_id: &str, draft: &Draft) {
        if draft.stage.is_terminal() {
            return;
        }
        let value = match serde_json::to_value(draft) {
            Ok(v) => v,
            Err(e) => {
                warn!(user_id = %user_id, "Failed to serialize onboarding draft: {e}");
                return;
            }
        };
        if let Err(e) = self
            .db
            .set_setting(user_id, settings_keys::ONBOARDING_DRAFT, &value)
            .await
        {
            warn!(user_id = %user_id, "Failed to persist onboarding draft: {e}");
        }
    }
}

fn turn_request(session: &Session, resume: bool) -> TurnRequest {
    let draft = &session.draft;
    TurnRequest {
        messages: session.transcript.clone(),
        resume,
        consented: draft.consented,
        draft_summary: draft.summary(),
        missing_fields: draft.missing_fields(),
        is_complete: draft.is_complete(),
        locale: draft.locale.code().to_string(),
        pending_confirm: draft.pending_confirm,
    }
}

/// Add a bot message to both the transcript and the outgoing batch.
fn record(session: &mut Session, out: &mut Vec<BotMessage>, text: String, quick_replies: Vec<String>) {
    session.transcript.push(ChatMessage::assistant(text.clone()));
    out.push(BotMessage {
        text,
        quick_replies,
    });
}
