//! Turn Resolver: decides what happens next for one user utterance.
//!
//! Stateless: everything it needs arrives in a [`TurnRequest`] and every
//! effect leaves as an [`Action`] in the [`TurnResponse`]. The deterministic
//! extractors run first; the generation service is consulted at most once per
//! turn, only when the answer has the wrong shape for the current field, and
//! everything it returns is validated again before it becomes an action.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::OnboardingError;
use crate::llm::reasoning::ReasoningContext;
use crate::llm::{LlmProvider, Reasoning, RespondResult, Role};
use crate::store::Database;

use super::action::{Action, TurnRequest, TurnResponse};
use super::bio::{BioGenerator, BioInput, BioOutcome, looks_like_keywords, split_keywords};
use super::catalog::{Catalog, Locale, MessageKey};
use super::extract::{
    Confidence, RejectReason, coerce_gender_label, extract_age, extract_bio,
    extract_display_name, extract_gender, gate_display_name,
};
use super::model::{DraftSummary, Field, FieldValue, Gender, PendingConfirm};
use super::prompts::{ModelCall, parse_tool_calls, resolver_system_prompt, resolver_tools};

/// What the deterministic path made of an utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    Commit(FieldValue),
    /// Moderate-confidence gender guess awaiting yes/no.
    Confirm(Gender),
    /// The bio generator refused the keywords; carries the notice.
    Moderated(String),
}

pub struct TurnResolver {
    db: Arc<dyn Database>,
    llm: Option<Arc<dyn LlmProvider>>,
    catalog: Catalog,
    bio: Arc<BioGenerator>,
    llm_timeout: Duration,
    require_confirmation: bool,
}

impl TurnResolver {
    pub fn new(
        db: Arc<dyn Database>,
        llm: Option<Arc<dyn LlmProvider>>,
        catalog: Catalog,
        bio: Arc<BioGenerator>,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            db,
            llm,
            catalog,
            bio,
            llm_timeout,
            require_confirmation: false,
        }
    }

    /// Wait in `confirm` for an explicit finish intent instead of appending
    /// `Finalize` as soon as the last field is set.
    pub fn with_require_confirmation(mut self, require: bool) -> Self {
        self.require_confirmation = require;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Resolve a request's locale tag, falling back to the default locale.
    pub fn locale_of(&self, request: &TurnRequest) -> Locale {
        Locale::parse(&request.locale).unwrap_or(self.catalog.default_locale())
    }

    /// Resolve one turn. `user_id` scopes the display-name uniqueness check
    /// so a user never collides with their own stored profile.
    pub async fn resolve(&self, request: &TurnRequest, user_id: Option<&str>) -> TurnResponse {
        let locale = self.locale_of(request);
        let draft = &request.draft_summary;
        let utterance = request.latest_utterance().unwrap_or_default().trim();

        if !request.consented {
            return self.consent_gate(locale, utterance, request.resume);
        }

        // A pending guess only applies while its field is still open.
        let pending = request.pending_confirm.filter(|p| !draft.has(p.field));

        if request.resume || utterance.is_empty() {
            return self.resume(locale, draft, pending);
        }

        if let Some(pending) = pending {
            // A clear gender answer wins over a yes/no reading of its first
            // word ("non binaire", "no binario").
            if let Some(gender) = coerce_gender_label(utterance) {
                debug!(field = %pending.field, "Pending guess replaced by a fresh answer");
                return self.after_commit(locale, draft, vec![FieldValue::GenderId(gender)]);
            }
            match self.catalog.yes_no(utterance) {
                Some(true) => {
                    debug!(field = %pending.field, "Pending guess accepted");
                    return self.after_commit(locale, draft, vec![FieldValue::GenderId(pending.value)]);
                }
                Some(false) => {
                    debug!(field = %pending.field, "Pending guess rejected");
                    return TurnResponse::new(vec![self.ask(locale, Field::GenderId, draft)]);
                }
                // Anything else is a fresh answer for the same field.
                None => {}
            }
        }

        match draft.next_missing() {
            None => self.confirm_stage(locale, draft, utterance),
            Some(field) => self.collect(locale, field, request, utterance, user_id).await,
        }
    }

    // ── Stages ──────────────────────────────────────────────────────

    fn consent_gate(&self, locale: Locale, utterance: &str, resume: bool) -> TurnResponse {
        let chips = self.catalog.yes_no_chips(locale);
        if resume || utterance.is_empty() {
            return TurnResponse::new(vec![
                Action::say(self.catalog.text(locale, MessageKey::Greeting)),
                Action::say_with(self.catalog.text(locale, MessageKey::ConsentAsk), chips),
            ]);
        }
        match self.catalog.yes_no(utterance) {
            Some(true) => TurnResponse::new(vec![
                Action::SetConsent { value: true },
                Action::say(self.catalog.text(locale, MessageKey::ConsentThanks)),
                Action::say(self.catalog.text(locale, MessageKey::AskDisplayName)),
            ]),
            Some(false) => TurnResponse::new(vec![Action::say_with(
                self.catalog.text(locale, MessageKey::ConsentDeclined),
                chips,
            )]),
            None => TurnResponse::new(vec![Action::say_with(
                self.catalog.text(locale, MessageKey::ConsentReask),
                chips,
            )]),
        }
    }

    fn resume(
        &self,
        locale: Locale,
        draft: &DraftSummary,
        pending: Option<PendingConfirm>,
    ) -> TurnResponse {
        let greeting = Action::say(self.catalog.text(locale, MessageKey::ResumeGreeting));
        if let Some(pending) = pending {
            let mut response =
                TurnResponse::new(vec![greeting, self.gender_confirm(locale, pending.value)]);
            response.pending_confirm = Some(pending);
            return response;
        }
        let question = match draft.next_missing() {
            Some(field) => self.ask(locale, field, draft),
            None => self.recap(locale, draft),
        };
        TurnResponse::new(vec![greeting, question])
    }

    fn confirm_stage(&self, locale: Locale, draft: &DraftSummary, utterance: &str) -> TurnResponse {
        if self.catalog.is_finish_intent(locale, utterance) {
            debug!("Finish intent at confirm");
            return TurnResponse::new(vec![Action::Finalize]);
        }
        TurnResponse::new(vec![self.recap(locale, draft)])
    }

    async fn collect(
        &self,
        locale: Locale,
        field: Field,
        request: &TurnRequest,
        utterance: &str,
        user_id: Option<&str>,
    ) -> TurnResponse {
        let draft = &request.draft_summary;
        match self.extract_field(locale, field, draft, utterance, user_id).await {
            Ok(Resolved::Commit(value)) => self.after_commit(locale, draft, vec![value]),
            Ok(Resolved::Confirm(guess)) => {
                debug!(gender = guess.id(), "Moderate gender guess, asking to confirm");
                let mut response = TurnResponse::new(vec![self.gender_confirm(locale, guess)]);
                response.pending_confirm = Some(PendingConfirm::gender(guess));
                response
            }
            Ok(Resolved::Moderated(notice)) => TurnResponse::new(vec![Action::say(notice)]),
            Err(err) => {
                debug!(field = %field, "Deterministic path rejected: {err}");
                match (&err, self.llm.as_ref()) {
                    (
                        OnboardingError::Validation {
                            reason: RejectReason::Format | RejectReason::Ambiguous,
                            ..
                        },
                        Some(llm),
                    ) => {
                        self.generative_turn(Arc::clone(llm), locale, field, request, user_id, &err)
                            .await
                    }
                    _ => TurnResponse::new(vec![self.corrective(locale, field, draft, &err)]),
                }
            }
        }
    }

    // ── Deterministic path ──────────────────────────────────────────

    async fn extract_field(
        &self,
        locale: Locale,
        field: Field,
        draft: &DraftSummary,
        utterance: &str,
        user_id: Option<&str>,
    ) -> Result<Resolved, OnboardingError> {
        let invalid = |reason| OnboardingError::Validation { field, reason };
        match field {
            Field::DisplayName => {
                let name = extract_display_name(utterance).map_err(invalid)?;
                let name = self.accept_name(&name, user_id).await?;
                Ok(Resolved::Commit(FieldValue::DisplayName(name)))
            }
            Field::Age => extract_age(utterance)
                .map(|age| Resolved::Commit(FieldValue::Age(age)))
                .map_err(invalid),
            Field::GenderId => match extract_gender(utterance).map_err(invalid)? {
                (gender, Confidence::Full) => Ok(Resolved::Commit(FieldValue::GenderId(gender))),
                (gender, Confidence::Moderate) => Ok(Resolved::Confirm(gender)),
            },
            Field::Bio => {
                let text = extract_bio(utterance).map_err(invalid)?;
                if !looks_like_keywords(&text) {
                    return Ok(Resolved::Commit(FieldValue::Bio(text)));
                }
                let input = BioInput {
                    display_name: draft.display_name.clone(),
                    age: draft.age,
                    gender_id: draft.gender_id,
                    locale,
                    keywords: split_keywords(&text),
                    tone: None,
                };
                match self.bio.generate(&input).await {
                    BioOutcome::Generated(bio) | BioOutcome::Template(bio) => {
                        Ok(Resolved::Commit(FieldValue::Bio(bio)))
                    }
                    BioOutcome::Moderated(notice) => Ok(Resolved::Moderated(notice)),
                }
            }
        }
    }

    /// Validation gate plus the advisory uniqueness lookup. The store's
    /// unique index stays the real authority at finalize.
    async fn accept_name(&self, name: &str, user_id: Option<&str>) -> Result<String, OnboardingError> {
        let name = gate_display_name(name).map_err(|reason| OnboardingError::Validation {
            field: Field::DisplayName,
            reason,
        })?;
        match self.db.display_name_exists(&name, user_id).await {
            Ok(true) => Err(OnboardingError::UniquenessConflict(name)),
            Ok(false) => Ok(name),
            Err(e) => {
                warn!("Display name lookup failed, continuing: {e}");
                Ok(name)
            }
        }
    }

    // ── Generative fallback ─────────────────────────────────────────

    async fn generative_turn(
        &self,
        llm: Arc<dyn LlmProvider>,
        locale: Locale,
        field: Field,
        request: &TurnRequest,
        user_id: Option<&str>,
        rejection: &OnboardingError,
    ) -> TurnResponse {
        let draft = &request.draft_summary;
        let reasoning = Reasoning::new(llm, self.llm_timeout)
            .with_system_prompt(resolver_system_prompt(locale, field, draft));
        let context = ReasoningContext::new()
            .with_messages(
                request
                    .messages
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .cloned()
                    .collect(),
            )
            .with_tools(resolver_tools())
            .with_metadata("field", field.as_str())
            .with_metadata("locale", locale.code());

        let calls = match reasoning.respond_with_tools(&context).await {
            Ok(output) => match output.result {
                RespondResult::ToolCalls { tool_calls, .. } => parse_tool_calls(&tool_calls),
                RespondResult::Text(text) if !text.trim().is_empty() => {
                    vec![ModelCall::Message(text.trim().to_string())]
                }
                RespondResult::Text(_) => Vec::new(),
            },
            Err(e) => {
                let e = OnboardingError::from(e);
                warn!(field = %field, "Generative fallback failed: {e}");
                return TurnResponse::new(vec![self.corrective(locale, field, draft, rejection)]);
            }
        };

        let mut working = draft.clone();
        let mut committed = Vec::new();
        let mut message = None;
        let mut gender_dropped = false;
        for call in calls {
            match call {
                ModelCall::Message(text) => {
                    if message.is_none() {
                        message = Some(text);
                    }
                }
                ModelCall::SetField { key, value } => {
                    let target = match key.parse::<Field>() {
                        Ok(f) => f,
                        Err(e) => {
                            warn!("Dropping model field: {e}");
                            continue;
                        }
                    };
                    if working.has(target) {
                        debug!(field = %target, "Model tried to overwrite a committed field");
                        continue;
                    }
                    match self.revalidate(target, &value, user_id).await {
                        Ok(v) => {
                            working.apply(v.clone());
                            committed.push(v);
                        }
                        Err(e) => {
                            warn!(field = %target, "Dropping model field: {e}");
                            gender_dropped |= target == Field::GenderId;
                        }
                    }
                }
                // Completion is judged from the draft, not from the model.
                ModelCall::Finalize => debug!("Model requested finalize"),
            }
        }

        if !committed.is_empty() {
            return self.after_commit(locale, draft, committed);
        }
        if gender_dropped {
            return TurnResponse::new(vec![self.corrective(locale, field, draft, rejection)]);
        }
        match message {
            Some(text) => TurnResponse::new(vec![Action::say_with(text, self.chips_for(locale, field))]),
            None => TurnResponse::new(vec![self.corrective(locale, field, draft, rejection)]),
        }
    }

    /// Run a model-proposed value through the same rules as typed input.
    async fn revalidate(
        &self,
        field: Field,
        value: &Value,
        user_id: Option<&str>,
    ) -> Result<FieldValue, OnboardingError> {
        let invalid = |reason| OnboardingError::Validation { field, reason };
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return Err(invalid(RejectReason::Format)),
        };
        match field {
            Field::DisplayName => {
                let name = extract_display_name(&text).map_err(invalid)?;
                self.accept_name(&name, user_id).await.map(FieldValue::DisplayName)
            }
            Field::Age => extract_age(&text).map(FieldValue::Age).map_err(invalid),
            Field::GenderId => text
                .parse::<u8>()
                .ok()
                .and_then(Gender::from_id)
                .or_else(|| coerce_gender_label(&text))
                .map(FieldValue::GenderId)
                .ok_or(invalid(RejectReason::Ambiguous)),
            Field::Bio => extract_bio(&text).map(FieldValue::Bio).map_err(invalid),
        }
    }

    // ── Messages ────────────────────────────────────────────────────

    /// `SetField` for each value, then either the next question or the
    /// completion recap (plus `Finalize` unless confirmation is required).
    fn after_commit(&self, locale: Locale, draft: &DraftSummary, values: Vec<FieldValue>) -> TurnResponse {
        let mut working = draft.clone();
        let mut actions = Vec::with_capacity(values.len() + 2);
        for value in values {
            working.apply(value.clone());
            actions.push(Action::SetField(value));
        }
        match working.next_missing() {
            Some(next) => actions.push(self.ask(locale, next, &working)),
            None => {
                actions.push(self.recap(locale, &working));
                if !self.require_confirmation {
                    actions.push(Action::Finalize);
                }
            }
        }
        TurnResponse::new(actions)
    }

    /// Gender chips while gender is the active field, none otherwise.
    fn chips_for(&self, locale: Locale, field: Field) -> Vec<String> {
        match field {
            Field::GenderId => self.catalog.gender_chips(locale),
            _ => Vec::new(),
        }
    }

    pub fn ask(&self, locale: Locale, field: Field, draft: &DraftSummary) -> Action {
        let name = draft.display_name.as_deref().unwrap_or_default();
        Action::say_with(
            self.catalog.render(locale, MessageKey::ask(field), &[("name", name)]),
            self.chips_for(locale, field),
        )
    }

    fn gender_confirm(&self, locale: Locale, guess: Gender) -> Action {
        Action::say_with(
            self.catalog.render(
                locale,
                MessageKey::GenderConfirm,
                &[("gender", self.catalog.gender_label(locale, guess))],
            ),
            self.catalog.gender_chips(locale),
        )
    }

    /// Filled-in recap with the single finish chip.
    pub fn recap(&self, locale: Locale, draft: &DraftSummary) -> Action {
        let age = draft.age.map(|a| a.to_string()).unwrap_or_default();
        let gender = draft
            .gender_id
            .map(|g| self.catalog.gender_label(locale, g))
            .unwrap_or_default();
        let mut text = self.catalog.render(
            locale,
            MessageKey::Recap,
            &[
                ("name", draft.display_name.as_deref().unwrap_or_default()),
                ("age", age.as_str()),
                ("gender", gender),
                ("bio", draft.bio.as_deref().unwrap_or_default()),
            ],
        );
        if self.require_confirmation {
            text.push_str("\n\n");
            text.push_str(self.catalog.text(locale, MessageKey::ConfirmPrompt));
        }
        Action::say_with(text, self.catalog.finish_chips(locale))
    }

    /// The localized message for a rejected answer. Never mutates.
    pub fn corrective(
        &self,
        locale: Locale,
        field: Field,
        draft: &DraftSummary,
        err: &OnboardingError,
    ) -> Action {
        let reason = match err {
            OnboardingError::UniquenessConflict(name) => {
                return Action::say(self.catalog.render(locale, MessageKey::NameTaken, &[("name", name.as_str())]));
            }
            OnboardingError::Validation { reason, .. } => *reason,
            _ => return self.ask(locale, field, draft),
        };
        let key = match (field, reason) {
            (Field::DisplayName, RejectReason::Length) => MessageKey::NameLength,
            (Field::DisplayName, _) => MessageKey::NameInvalid,
            (Field::Age, RejectReason::Length) => MessageKey::AgeOutOfRange,
            (Field::Age, _) => MessageKey::AgeInvalid,
            (Field::GenderId, _) => MessageKey::GenderUnclear,
            (Field::Bio, RejectReason::Length) => MessageKey::BioTooLong,
            (Field::Bio, _) => MessageKey::BioInvalid,
        };
        Action::say_with(self.catalog.text(locale, key), self.chips_for(locale, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{
        ChatMessage, CompletionRequest, CompletionResponse, FinishReason, ToolCall,
        ToolCompletionRequest, ToolCompletionResponse,
    };
    use crate::onboarding::model::{Draft, UserProfile};
    use crate::onboarding::prompts::{MODERATION_SENTINEL, TOOL_WRITE_BIO};
    use crate::store::LibSqlBackend;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;

    /// Replies with a fixed set of tool calls.
    struct ScriptedLlm(Vec<ToolCall>);

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }
        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }
        async fn complete(&self, _r: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::Disabled)
        }
        async fn complete_with_tools(
            &self,
            request: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            assert!(request.messages[0].content.contains("Write every message in"));
            Ok(ToolCompletionResponse {
                content: None,
                tool_calls: self.0.clone(),
                input_tokens: 10,
                output_tokens: 5,
                finish_reason: FinishReason::ToolUse,
            })
        }
    }

    struct HangingLlm;

    #[async_trait]
    impl LlmProvider for HangingLlm {
        fn model_name(&self) -> &str {
            "hanging"
        }
        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }
        async fn complete(&self, _r: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::Disabled)
        }
        async fn complete_with_tools(
            &self,
            _r: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(LlmError::Disabled)
        }
    }

    /// Answers every bio request with the given text.
    struct BioWriterLlm(&'static str);

    #[async_trait]
    impl LlmProvider for BioWriterLlm {
        fn model_name(&self) -> &str {
            "bio-writer"
        }
        fn cost_per_token(&self) -> (Decimal, Decimal) {
            (Decimal::ZERO, Decimal::ZERO)
        }
        async fn complete(&self, _r: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::Disabled)
        }
        async fn complete_with_tools(
            &self,
            _r: ToolCompletionRequest,
        ) -> Result<ToolCompletionResponse, LlmError> {
            Ok(ToolCompletionResponse {
                content: None,
                tool_calls: vec![call(TOOL_WRITE_BIO, json!({"bio": self.0}))],
                input_tokens: 1,
                output_tokens: 1,
                finish_reason: FinishReason::ToolUse,
            })
        }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments,
        }
    }

    async fn resolver_with(llm: Option<Arc<dyn LlmProvider>>) -> (TurnResolver, Arc<dyn Database>) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let catalog = Catalog::default();
        let bio = Arc::new(BioGenerator::new(None, catalog, 220, Duration::from_secs(1)));
        let resolver = TurnResolver::new(Arc::clone(&db), llm, catalog, bio, Duration::from_millis(200));
        (resolver, db)
    }

    fn request(draft: &Draft, text: &str) -> TurnRequest {
        TurnRequest {
            messages: vec![ChatMessage::user(text)],
            resume: false,
            consented: draft.consented,
            draft_summary: draft.summary(),
            missing_fields: draft.missing_fields(),
            is_complete: draft.is_complete(),
            locale: draft.locale.code().to_string(),
            pending_confirm: draft.pending_confirm,
        }
    }

    fn consented(locale: Locale) -> Draft {
        Draft {
            consented: true,
            ..Draft::new(locale)
        }
    }

    fn set_fields(response: &TurnResponse) -> Vec<FieldValue> {
        response
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::SetField(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Apply a response the way the orchestrator would.
    fn apply(draft: &mut Draft, response: &TurnResponse) {
        for action in &response.actions {
            match action {
                Action::SetConsent { value } => draft.consented = *value,
                Action::SetField(v) => draft.set(v.clone()).unwrap(),
                Action::BotMessage { .. } | Action::Finalize => {}
            }
        }
        draft.pending_confirm = response.pending_confirm;
    }

    #[tokio::test]
    async fn consent_gate() {
        let (resolver, _) = resolver_with(None).await;
        let draft = Draft::new(Locale::Fr);

        let yes = resolver.resolve(&request(&draft, "oui"), None).await;
        assert_eq!(yes.actions[0], Action::SetConsent { value: true });
        assert_eq!(yes.messages().count(), 2);
        assert_eq!(
            yes.messages().last(),
            Some("Quel nom veux-tu afficher sur ton profil ?")
        );

        let no = resolver.resolve(&request(&draft, "non"), None).await;
        assert!(!no.actions.iter().any(|a| matches!(a, Action::SetConsent { .. })));

        let other = resolver.resolve(&request(&draft, "Zoé"), None).await;
        assert_eq!(other.actions.len(), 1);
        assert!(set_fields(&other).is_empty());
    }

    #[tokio::test]
    async fn french_end_to_end_without_service() {
        let (resolver, _) = resolver_with(None).await;
        let mut draft = Draft::new(Locale::Fr);

        for (text, expected) in [
            ("oui", None),
            ("Zoé", Some(FieldValue::DisplayName("Zoé".into()))),
            ("27", Some(FieldValue::Age(27))),
            ("femme", Some(FieldValue::GenderId(Gender::Female))),
        ] {
            let response = resolver.resolve(&request(&draft, text), Some("u1")).await;
            assert_eq!(set_fields(&response).first(), expected.as_ref(), "{text}");
            apply(&mut draft, &response);
        }
        assert!(draft.consented);

        let last = resolver
            .resolve(&request(&draft, "chats, café, rando"), Some("u1"))
            .await;
        let fields = set_fields(&last);
        let [FieldValue::Bio(bio)] = fields.as_slice() else {
            panic!("expected a bio, got {last:?}");
        };
        assert!(bio.chars().count() <= 220);
        assert!(last.actions.last().is_some_and(Action::is_finalize));
        assert_eq!(last.quick_replies(), ["Terminer le profil"]);
    }

    #[tokio::test]
    async fn gender_locale_synonyms_agree() {
        let (resolver, _) = resolver_with(None).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());
        draft.age = Some(30);
        for word in ["male", "m", "homme", "муж", "男", "he/him"] {
            let response = resolver.resolve(&request(&draft, word), None).await;
            assert_eq!(set_fields(&response), vec![FieldValue::GenderId(Gender::Male)], "{word}");
        }
    }

    #[tokio::test]
    async fn rejections_never_mutate() {
        let (resolver, _) = resolver_with(None).await;
        let mut draft = consented(Locale::En);
        for text in ["!!", "12345", "x"] {
            let response = resolver.resolve(&request(&draft, text), None).await;
            assert!(set_fields(&response).is_empty(), "{text}");
            assert!(response.quick_replies().is_empty());
        }

        draft.display_name = Some("Sam".into());
        for text in ["15", "200", "twenty three", "abc"] {
            let response = resolver.resolve(&request(&draft, text), None).await;
            assert!(set_fields(&response).is_empty(), "{text}");
            assert!(response.quick_replies().is_empty());
        }
        let ok = resolver.resolve(&request(&draft, "I'm 23"), None).await;
        assert_eq!(set_fields(&ok), vec![FieldValue::Age(23)]);
    }

    #[tokio::test]
    async fn quick_replies_only_for_gender() {
        let (resolver, _) = resolver_with(None).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());

        let asked_gender = resolver.resolve(&request(&draft, "30"), None).await;
        assert_eq!(asked_gender.quick_replies(), ["Male", "Female", "Other"]);

        draft.age = Some(30);
        let unclear = resolver.resolve(&request(&draft, "banana"), None).await;
        assert_eq!(unclear.quick_replies(), ["Male", "Female", "Other"]);

        let asked_bio = resolver.resolve(&request(&draft, "female"), None).await;
        assert!(asked_bio.quick_replies().is_empty());
    }

    #[tokio::test]
    async fn taken_name_uses_distinct_message() {
        let (resolver, db) = resolver_with(None).await;
        let mut owner = consented(Locale::En);
        owner.display_name = Some("Zoe".into());
        owner.age = Some(25);
        owner.gender_id = Some(Gender::Female);
        owner.bio = Some("hi".into());
        db.upsert_profile(&UserProfile::from_draft("owner", &owner, None).unwrap())
            .await
            .unwrap();

        let draft = consented(Locale::En);
        let taken = resolver.resolve(&request(&draft, "zoe"), Some("u2")).await;
        assert!(set_fields(&taken).is_empty());
        let text = taken.messages().next().unwrap();
        assert!(text.contains("already taken"), "{text}");

        let short = resolver.resolve(&request(&draft, "Jo"), Some("u2")).await;
        assert_ne!(short.messages().next(), Some(text));

        let own = resolver.resolve(&request(&draft, "Zoe"), Some("owner")).await;
        assert_eq!(set_fields(&own), vec![FieldValue::DisplayName("Zoe".into())]);
    }

    #[tokio::test]
    async fn gender_disambiguation_round_trip() {
        let (resolver, _) = resolver_with(None).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());
        draft.age = Some(30);

        let guess = resolver.resolve(&request(&draft, "maale"), None).await;
        assert!(set_fields(&guess).is_empty());
        assert_eq!(guess.pending_confirm, Some(PendingConfirm::gender(Gender::Male)));
        apply(&mut draft, &guess);

        let yes = resolver.resolve(&request(&draft, "yes"), None).await;
        assert_eq!(set_fields(&yes), vec![FieldValue::GenderId(Gender::Male)]);
        assert_eq!(yes.pending_confirm, None);

        let no = resolver.resolve(&request(&draft, "no"), None).await;
        assert!(set_fields(&no).is_empty());
        assert_eq!(no.pending_confirm, None);
        assert_eq!(no.quick_replies(), ["Male", "Female", "Other"]);

        let fresh = resolver.resolve(&request(&draft, "female"), None).await;
        assert_eq!(set_fields(&fresh), vec![FieldValue::GenderId(Gender::Female)]);
    }

    #[tokio::test]
    async fn negated_gender_word_is_a_fresh_answer_while_guess_pending() {
        let (resolver, _) = resolver_with(None).await;
        for (locale, typo, answer) in [
            (Locale::Fr, "nonbinaire", "non binaire"),
            (Locale::Es, "nobinario", "no binario"),
        ] {
            let mut draft = consented(locale);
            draft.display_name = Some("Alex".into());
            draft.age = Some(30);

            let guess = resolver.resolve(&request(&draft, typo), None).await;
            assert_eq!(guess.pending_confirm, Some(PendingConfirm::gender(Gender::Other)), "{typo}");
            apply(&mut draft, &guess);

            let answered = resolver.resolve(&request(&draft, answer), None).await;
            assert_eq!(
                set_fields(&answered),
                vec![FieldValue::GenderId(Gender::Other)],
                "{answer}"
            );
            assert_eq!(answered.pending_confirm, None);

            let declined = resolver.resolve(&request(&draft, "non"), None).await;
            assert!(set_fields(&declined).is_empty());
        }
    }

    #[tokio::test]
    async fn moderated_keywords_are_never_stored() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let catalog = Catalog::default();
        let bio = Arc::new(BioGenerator::new(
            Some(Arc::new(BioWriterLlm(MODERATION_SENTINEL))),
            catalog,
            220,
            Duration::from_secs(1),
        ));
        let resolver = TurnResolver::new(db, None, catalog, bio, Duration::from_millis(200));

        let mut draft = consented(Locale::Fr);
        draft.display_name = Some("Zoé".into());
        draft.age = Some(27);
        draft.gender_id = Some(Gender::Female);

        let response = resolver.resolve(&request(&draft, "a, b, c"), Some("u1")).await;
        assert!(set_fields(&response).is_empty());
        assert!(!response.actions.iter().any(Action::is_finalize));
        assert_eq!(
            response.messages().collect::<Vec<_>>(),
            vec![catalog.text(Locale::Fr, MessageKey::BioModerated)]
        );
        assert!(response.quick_replies().is_empty());
    }

    #[tokio::test]
    async fn confirm_stage_waits_for_finish_intent() {
        let (resolver, _) = resolver_with(None).await;
        let resolver = resolver.with_require_confirmation(true);
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());
        draft.age = Some(30);
        draft.gender_id = Some(Gender::Other);

        let done = resolver.resolve(&request(&draft, "I love long walks."), None).await;
        assert!(!done.actions.iter().any(Action::is_finalize));
        assert_eq!(done.quick_replies(), ["Finish profile"]);
        apply(&mut draft, &done);

        let chatter = resolver.resolve(&request(&draft, "hmm"), None).await;
        assert!(!chatter.actions.iter().any(Action::is_finalize));
        assert_eq!(chatter.quick_replies(), ["Finish profile"]);

        let finish = resolver.resolve(&request(&draft, "Finish profile"), None).await;
        assert_eq!(finish.actions, vec![Action::Finalize]);
    }

    #[tokio::test]
    async fn resume_repeats_current_question() {
        let (resolver, _) = resolver_with(None).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());
        let mut req = request(&draft, "");
        req.resume = true;
        let response = resolver.resolve(&req, None).await;
        assert!(set_fields(&response).is_empty());
        assert_eq!(response.messages().last(), Some("Nice to meet you, Sam! How old are you?"));
    }

    #[tokio::test]
    async fn model_fields_are_revalidated() {
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm(vec![
            call("set_field", json!({"key": "age", "value": 23})),
            call("set_field", json!({"key": "displayName", "value": "Hijacked"})),
            call("set_field", json!({"key": "genderId", "value": "woman"})),
            call("send_message", json!({"text": "Thanks!"})),
        ]));
        let (resolver, _) = resolver_with(Some(llm)).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());

        let response = resolver.resolve(&request(&draft, "twenty three"), None).await;
        assert_eq!(
            set_fields(&response),
            vec![FieldValue::Age(23), FieldValue::GenderId(Gender::Female)]
        );
        assert_eq!(response.messages().last(), Some("Last step: give me a few things you love (like cats, coffee, hiking) and I'll write a short bio, or write one yourself."));
    }

    #[tokio::test]
    async fn model_out_of_range_value_is_dropped() {
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm(vec![call(
            "set_field",
            json!({"key": "age", "value": 15}),
        )]));
        let (resolver, _) = resolver_with(Some(llm)).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());

        let response = resolver.resolve(&request(&draft, "fifteen"), None).await;
        assert!(set_fields(&response).is_empty());
        assert_eq!(response.messages().next(), Some("Please tell me your age as a number."));
    }

    #[tokio::test]
    async fn model_completion_appends_finalize() {
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm(vec![call(
            "set_field",
            json!({"key": "genderId", "value": 3}),
        )]));
        let (resolver, _) = resolver_with(Some(llm)).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());
        draft.age = Some(30);
        draft.bio = Some("Coffee first.".into());

        let response = resolver
            .resolve(&request(&draft, "I'd rather describe it myself"), None)
            .await;
        assert_eq!(set_fields(&response), vec![FieldValue::GenderId(Gender::Other)]);
        assert!(response.actions.last().is_some_and(Action::is_finalize));
    }

    #[tokio::test]
    async fn model_gender_label_that_cannot_be_coerced_is_reasked() {
        let llm: Arc<dyn LlmProvider> = Arc::new(ScriptedLlm(vec![call(
            "set_field",
            json!({"key": "genderId", "value": "banana"}),
        )]));
        let (resolver, _) = resolver_with(Some(llm)).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());
        draft.age = Some(30);

        let response = resolver.resolve(&request(&draft, "hmm well"), None).await;
        assert!(set_fields(&response).is_empty());
        assert_eq!(response.quick_replies(), ["Male", "Female", "Other"]);
    }

    #[tokio::test]
    async fn service_timeout_degrades_to_deterministic_question() {
        let (resolver, _) = resolver_with(Some(Arc::new(HangingLlm))).await;
        let mut draft = consented(Locale::En);
        draft.display_name = Some("Sam".into());

        let response = resolver.resolve(&request(&draft, "old enough"), None).await;
        assert!(set_fields(&response).is_empty());
        assert_eq!(response.messages().next(), Some("Please tell me your age as a number."));
    }

    #[tokio::test]
    async fn unknown_locale_uses_default() {
        let (resolver, _) = resolver_with(None).await;
        let draft = Draft::new(Locale::En);
        let mut req = request(&draft, "");
        req.locale = "xx-YY".into();
        assert_eq!(resolver.locale_of(&req), Locale::En);
    }
}
