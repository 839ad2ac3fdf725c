//! System instructions, tool definitions and tool-call parsing for the
//! generative fallback and the biography generator.

use serde_json::{Value, json};

use crate::llm::{ToolCall, ToolDefinition};

use super::catalog::Locale;
use super::model::{DraftSummary, Field};

/// Emitted by the model instead of a biography when the keywords are not
/// acceptable.
pub const MODERATION_SENTINEL: &str = "[[MODERATED]]";

pub const TOOL_SEND_MESSAGE: &str = "send_message";
pub const TOOL_SET_FIELD: &str = "set_field";
pub const TOOL_FINALIZE: &str = "finalize";
pub const TOOL_WRITE_BIO: &str = "write_bio";

/// Build the system instructions for one generative fallback turn.
///
/// The model sees only the field being collected and what is already
/// known; it never gets numeric bounds to repeat or gender options to list.
pub fn resolver_system_prompt(locale: Locale, next_field: Field, draft: &DraftSummary) -> String {
    let language = locale.language_name();
    let field_hint = match next_field {
        Field::DisplayName => "the name the user wants shown on their profile",
        Field::Age => "the user's age in years, as a number",
        Field::GenderId => {
            "the user's gender: set genderId to 1 (male), 2 (female) or 3 (other) only when the user clearly said it"
        }
        Field::Bio => "a short one-line description of the user, in their own words",
    };

    let mut known = Vec::new();
    if let Some(ref name) = draft.display_name {
        known.push(format!("- displayName: {name}"));
    }
    if let Some(age) = draft.age {
        known.push(format!("- age: {age}"));
    }
    if let Some(g) = draft.gender_id {
        known.push(format!("- genderId: {}", g.id()));
    }
    if let Some(ref bio) = draft.bio {
        known.push(format!("- bio: {bio}"));
    }
    let known = if known.is_empty() {
        "Nothing yet.".to_string()
    } else {
        known.join("\n")
    };

    format!(
        "\
You help a new user fill in their profile in a short, friendly chat.

Rules:
- Write every message in {language}, whatever language the user writes in.
- This turn is only about `{field}`: {field_hint}. Never ask about more than one field in a message.
- If the latest message contains a clear value for `{field}`, call `{set_field}` with it. Never guess.
- Never restate numeric limits or rules (no minimum ages, no character counts).
- Never list gender options in your text; the app shows buttons for that.
- If the answer is unclear, call `{send_message}` with one short question about `{field}`.
- Call `{finalize}` only when every field below is filled.
- Keep messages to one or two sentences.

Already known:
{known}",
        field = next_field.as_str(),
        set_field = TOOL_SET_FIELD,
        send_message = TOOL_SEND_MESSAGE,
        finalize = TOOL_FINALIZE,
    )
}

/// The three operations the fallback turn may call.
pub fn resolver_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: TOOL_SEND_MESSAGE.to_string(),
            description: "Send one short message to the user.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        },
        ToolDefinition {
            name: TOOL_SET_FIELD.to_string(),
            description: "Record one profile field the user clearly provided.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string", "enum": Field::ORDER.map(|f| f.as_str())},
                    "value": {"type": ["string", "integer"]}
                },
                "required": ["key", "value"]
            }),
        },
        ToolDefinition {
            name: TOOL_FINALIZE.to_string(),
            description: "Finish onboarding once every field is filled.".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        },
    ]
}

/// A model tool call after shape checking. Values are still unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCall {
    Message(String),
    SetField { key: String, value: Value },
    Finalize,
}

/// Map raw tool calls to [`ModelCall`]s, dropping malformed or unknown ones.
pub fn parse_tool_calls(calls: &[ToolCall]) -> Vec<ModelCall> {
    calls
        .iter()
        .filter_map(|call| match call.name.as_str() {
            TOOL_SEND_MESSAGE => call
                .arguments
                .get("text")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| ModelCall::Message(t.to_string())),
            TOOL_SET_FIELD => {
                let key = call.arguments.get("key")?.as_str()?.to_string();
                let value = call.arguments.get("value")?.clone();
                Some(ModelCall::SetField { key, value })
            }
            TOOL_FINALIZE => Some(ModelCall::Finalize),
            other => {
                tracing::debug!(tool = other, "Ignoring unknown tool call");
                None
            }
        })
        .collect()
}

/// System instructions for the biography generator.
pub fn bio_system_prompt(locale: Locale, max_chars: usize, tone: &str) -> String {
    format!(
        "\
You write short dating-app style profile bios.

Rules:
- Write in {language}, in the first person, with a {tone} tone.
- At most {max_chars} characters, one paragraph, no hashtags, no emoji lists.
- Build it from the keywords; do not invent facts beyond them.
- If the keywords are hateful, sexual or otherwise unsafe, reply with exactly {sentinel} and nothing else.
- Call `{tool}` with the bio.",
        language = locale.language_name(),
        sentinel = MODERATION_SENTINEL,
        tool = TOOL_WRITE_BIO,
    )
}

/// User message for the biography generator.
pub fn bio_user_prompt(
    display_name: Option<&str>,
    age: Option<u8>,
    gender_label: Option<&str>,
    keywords: &[String],
) -> String {
    let mut lines = Vec::new();
    if let Some(name) = display_name {
        lines.push(format!("Name: {name}"));
    }
    if let Some(age) = age {
        lines.push(format!("Age: {age}"));
    }
    if let Some(gender) = gender_label {
        lines.push(format!("Gender: {gender}"));
    }
    lines.push(format!("Keywords: {}", keywords.join(", ")));
    lines.join("\n")
}

pub fn bio_tool() -> ToolDefinition {
    ToolDefinition {
        name: TOOL_WRITE_BIO.to_string(),
        description: "Return the finished bio.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {"bio": {"type": "string"}},
            "required": ["bio"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::Gender;

    #[test]
    fn resolver_prompt_fixes_language_and_field() {
        let prompt = resolver_system_prompt(Locale::Fr, Field::Age, &DraftSummary::default());
        assert!(prompt.contains("Write every message in French"));
        assert!(prompt.contains("only about `age`"));
        assert!(prompt.contains("Never restate numeric limits"));
        assert!(prompt.contains("Never list gender options"));
        assert!(prompt.contains("Nothing yet."));
        assert!(!prompt.contains("18"));
    }

    #[test]
    fn resolver_prompt_lists_known_fields() {
        let draft = DraftSummary {
            display_name: Some("Zoé".into()),
            age: Some(27),
            gender_id: Some(Gender::Female),
            bio: None,
        };
        let prompt = resolver_system_prompt(Locale::En, Field::Bio, &draft);
        assert!(prompt.contains("- displayName: Zoé"));
        assert!(prompt.contains("- age: 27"));
        assert!(prompt.contains("- genderId: 2"));
        assert!(!prompt.contains("- bio:"));
    }

    #[test]
    fn exactly_three_resolver_tools() {
        let names: Vec<String> = resolver_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["send_message", "set_field", "finalize"]);
    }

    #[test]
    fn parse_tool_calls_drops_malformed() {
        let calls = vec![
            ToolCall {
                id: "1".into(),
                name: "send_message".into(),
                arguments: json!({"text": "  Quel âge as-tu ?  "}),
            },
            ToolCall {
                id: "2".into(),
                name: "send_message".into(),
                arguments: json!({"text": ""}),
            },
            ToolCall {
                id: "3".into(),
                name: "set_field".into(),
                arguments: json!({"key": "age", "value": 23}),
            },
            ToolCall {
                id: "4".into(),
                name: "set_field".into(),
                arguments: json!({"value": 23}),
            },
            ToolCall {
                id: "5".into(),
                name: "delete_user".into(),
                arguments: json!({}),
            },
            ToolCall {
                id: "6".into(),
                name: "finalize".into(),
                arguments: json!({}),
            },
        ];
        assert_eq!(
            parse_tool_calls(&calls),
            vec![
                ModelCall::Message("Quel âge as-tu ?".into()),
                ModelCall::SetField {
                    key: "age".into(),
                    value: json!(23)
                },
                ModelCall::Finalize,
            ]
        );
    }

    #[test]
    fn bio_prompts() {
        let system = bio_system_prompt(Locale::Es, 220, "playful");
        assert!(system.contains("Spanish"));
        assert!(system.contains("220 characters"));
        assert!(system.contains(MODERATION_SENTINEL));

        let user = bio_user_prompt(Some("Zoé"), Some(27), None, &["chats".into(), "café".into()]);
        assert_eq!(user, "Name: Zoé\nAge: 27\nKeywords: chats, café");
    }
}
