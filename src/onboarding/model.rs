//! Draft and profile data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::OnboardingError;

use super::catalog::Locale;
use super::mood::MoodFeed;
use super::state::Stage;

/// One of the four required profile fields.
///
/// This is the allow-list of settable keys: anything that does not parse
/// into a `Field` is rejected at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    DisplayName,
    Age,
    GenderId,
    Bio,
}

impl Field {
    /// Fixed resolution order.
    pub const ORDER: [Field; 4] = [Field::DisplayName, Field::Age, Field::GenderId, Field::Bio];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisplayName => "displayName",
            Self::Age => "age",
            Self::GenderId => "genderId",
            Self::Bio => "bio",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Field {
    type Err = OnboardingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ORDER
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| OnboardingError::UnknownField(s.to_string()))
    }
}

/// Gender identifier. Serialized as its numeric id (1, 2 or 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male = 1,
    Female = 2,
    Other = 3,
}

impl Gender {
    /// Chip order: `[male, female, other]`.
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Other];

    pub fn id(&self) -> u8 {
        *self as u8
    }

    pub fn from_id(id: u8) -> Option<Gender> {
        match id {
            1 => Some(Self::Male),
            2 => Some(Self::Female),
            3 => Some(Self::Other),
            _ => None,
        }
    }
}

impl Serialize for Gender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.id())
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = u8::deserialize(deserializer)?;
        Gender::from_id(id)
            .ok_or_else(|| serde::de::Error::custom(format!("genderId must be 1, 2 or 3, got {id}")))
    }
}

/// A typed value for exactly one field. Serializes as `{"key": .., "value": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    DisplayName(String),
    Age(u8),
    GenderId(Gender),
    Bio(String),
}

impl FieldValue {
    pub fn field(&self) -> Field {
        match self {
            Self::DisplayName(_) => Field::DisplayName,
            Self::Age(_) => Field::Age,
            Self::GenderId(_) => Field::GenderId,
            Self::Bio(_) => Field::Bio,
        }
    }
}

/// The four fields as seen by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender_id: Option<Gender>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl DraftSummary {
    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::DisplayName => self.display_name.is_some(),
            Field::Age => self.age.is_some(),
            Field::GenderId => self.gender_id.is_some(),
            Field::Bio => self.bio.is_some(),
        }
    }

    /// Missing fields, in resolution order.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ORDER.into_iter().filter(|f| !self.has(*f)).collect()
    }

    pub fn next_missing(&self) -> Option<Field> {
        Field::ORDER.into_iter().find(|f| !self.has(*f))
    }

    pub fn is_complete(&self) -> bool {
        self.next_missing().is_none()
    }

    /// Apply a value without any consent check. Used by the resolver to
    /// simulate a turn's effects; the orchestrator goes through [`Draft::set`].
    pub fn apply(&mut self, value: FieldValue) {
        match value {
            FieldValue::DisplayName(v) => self.display_name = Some(v),
            FieldValue::Age(v) => self.age = Some(v),
            FieldValue::GenderId(v) => self.gender_id = Some(v),
            FieldValue::Bio(v) => self.bio = Some(v),
        }
    }
}

/// A low-confidence gender guess awaiting a yes/no. Lives one round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirm {
    pub field: Field,
    pub value: Gender,
}

impl PendingConfirm {
    pub fn gender(value: Gender) -> Self {
        Self {
            field: Field::GenderId,
            value,
        }
    }
}

/// In-progress profile owned by one onboarding session.
///
/// Stored in the `settings` table as JSON under key `"onboarding_draft"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender_id: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub consented: bool,
    #[serde(default)]
    pub stage: Stage,
    #[serde(default)]
    pub locale: Locale,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_confirm: Option<PendingConfirm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood_feed: Option<MoodFeed>,
}

impl Draft {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            ..Default::default()
        }
    }

    pub fn summary(&self) -> DraftSummary {
        DraftSummary {
            display_name: self.display_name.clone(),
            age: self.age,
            gender_id: self.gender_id,
            bio: self.bio.clone(),
        }
    }

    pub fn missing_fields(&self) -> Vec<Field> {
        self.summary().missing_fields()
    }

    pub fn next_missing(&self) -> Option<Field> {
        self.summary().next_missing()
    }

    pub fn is_complete(&self) -> bool {
        self.summary().is_complete()
    }

    /// Set one required field. Refused while consent has not been given.
    pub fn set(&mut self, value: FieldValue) -> Result<(), OnboardingError> {
        if !self.consented {
            return Err(OnboardingError::ConsentRequired(value.field()));
        }
        match value {
            FieldValue::DisplayName(v) => self.display_name = Some(v),
            FieldValue::Age(v) => self.age = Some(v),
            FieldValue::GenderId(v) => self.gender_id = Some(v),
            FieldValue::Bio(v) => self.bio = Some(v),
        }
        Ok(())
    }

    pub fn clear(&mut self, field: Field) {
        match field {
            Field::DisplayName => self.display_name = None,
            Field::Age => self.age = None,
            Field::GenderId => self.gender_id = None,
            Field::Bio => self.bio = None,
        }
    }
}

/// A committed profile, written to the store exactly once per draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
    pub age: u8,
    pub gender_id: Gender,
    pub bio: String,
    pub locale: Locale,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Build a profile from a complete draft. `None` if any field is missing.
    pub fn from_draft(user_id: &str, draft: &Draft, client_ip: Option<String>) -> Option<Self> {
        let now = Utc::now();
        Some(Self {
            user_id: user_id.to_string(),
            display_name: draft.display_name.clone()?,
            age: draft.age?,
            gender_id: draft.gender_id?,
            bio: draft.bio.clone()?,
            locale: draft.locale,
            client_ip,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A published mood-feed status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodPost {
    pub id: Uuid,
    pub user_id: String,
    pub text: String,
    pub locale: Locale,
    pub created_at: DateTime<Utc>,
}

impl MoodPost {
    pub fn new(user_id: &str, text: impl Into<String>, locale: Locale) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            text: text.into(),
            locale,
            created_at: Utc::now(),
        }
    }
}

/// Settings keys used for onboarding persistence.
pub mod settings_keys {
    /// Key for the Draft JSON blob in the settings table.
    pub const ONBOARDING_DRAFT: &str = "onboarding_draft";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_keys_are_an_allow_list() {
        assert_eq!("displayName".parse::<Field>().unwrap(), Field::DisplayName);
        assert_eq!("genderId".parse::<Field>().unwrap(), Field::GenderId);
        assert!(matches!(
            "nickname".parse::<Field>(),
            Err(OnboardingError::UnknownField(k)) if k == "nickname"
        ));
        assert!(serde_json::from_str::<FieldValue>(r#"{"key":"email","value":"a@b"}"#).is_err());
    }

    #[test]
    fn field_value_wire_shape() {
        let json = serde_json::to_value(FieldValue::GenderId(Gender::Female)).unwrap();
        assert_eq!(json, serde_json::json!({"key": "genderId", "value": 2}));

        let parsed: FieldValue =
            serde_json::from_str(r#"{"key":"displayName","value":"Zoé"}"#).unwrap();
        assert_eq!(parsed, FieldValue::DisplayName("Zoé".into()));
    }

    #[test]
    fn gender_id_out_of_range_is_rejected() {
        assert!(serde_json::from_str::<Gender>("4").is_err());
        assert!(serde_json::from_str::<Gender>("0").is_err());
        assert_eq!(serde_json::from_str::<Gender>("3").unwrap(), Gender::Other);
    }

    #[test]
    fn missing_fields_follow_fixed_order() {
        let mut draft = Draft::new(Locale::En);
        draft.consented = true;
        assert_eq!(draft.next_missing(), Some(Field::DisplayName));

        draft.set(FieldValue::Age(30)).unwrap();
        assert_eq!(
            draft.missing_fields(),
            vec![Field::DisplayName, Field::GenderId, Field::Bio]
        );
        assert_eq!(draft.next_missing(), Some(Field::DisplayName));
    }

    #[test]
    fn set_refused_without_consent() {
        let mut draft = Draft::new(Locale::Fr);
        let err = draft.set(FieldValue::DisplayName("Zoé".into())).unwrap_err();
        assert!(matches!(err, OnboardingError::ConsentRequired(Field::DisplayName)));
        assert!(draft.display_name.is_none());
    }

    #[test]
    fn profile_requires_complete_draft() {
        let mut draft = Draft::new(Locale::Fr);
        draft.consented = true;
        draft.set(FieldValue::DisplayName("Zoé".into())).unwrap();
        draft.set(FieldValue::Age(27)).unwrap();
        draft.set(FieldValue::GenderId(Gender::Female)).unwrap();
        assert!(UserProfile::from_draft("u1", &draft, None).is_none());

        draft.set(FieldValue::Bio("J'aime les chats.".into())).unwrap();
        let profile = UserProfile::from_draft("u1", &draft, Some("10.0.0.1".into())).unwrap();
        assert_eq!(profile.display_name, "Zoé");
        assert_eq!(profile.gender_id, Gender::Female);
        assert_eq!(profile.locale, Locale::Fr);
    }

    #[test]
    fn draft_json_survives_reload() {
        let mut draft = Draft::new(Locale::De);
        draft.consented = true;
        draft.stage = Stage::Collecting;
        draft.pending_confirm = Some(PendingConfirm::gender(Gender::Male));
        draft.set(FieldValue::DisplayName("Jonas".into())).unwrap();

        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["displayName"], "Jonas");
        assert_eq!(json["pendingConfirm"]["field"], "genderId");

        let back: Draft = serde_json::from_value(json).unwrap();
        assert_eq!(back.stage, Stage::Collecting);
        assert_eq!(back.locale, Locale::De);
        assert_eq!(back.pending_confirm, Some(PendingConfirm::gender(Gender::Male)));
    }
}
