//! `Database` trait: single async interface for all persistence.
//!
//! Covers the profile store, per-user settings (where onboarding drafts live
//! between turns) and the mood feed.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::catalog::Locale;
use crate::onboarding::model::{MoodPost, UserProfile};

/// Key used for case-insensitive display-name comparison.
pub fn display_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Insert or update the profile for `profile.user_id`.
    ///
    /// A display name already held by another user is reported as
    /// `DatabaseError::Constraint` (see [`DatabaseError::is_display_name_conflict`]).
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), DatabaseError>;

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError>;

    /// Case-insensitive existence lookup, ignoring `exclude_user`'s own row.
    async fn display_name_exists(
        &self,
        name: &str,
        exclude_user: Option<&str>,
    ) -> Result<bool, DatabaseError>;

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError>;

    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError>;

    /// Returns whether a row was deleted.
    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError>;

    // ── Mood feed ───────────────────────────────────────────────────

    async fn publish_mood(&self, post: &MoodPost) -> Result<(), DatabaseError>;

    async fn list_mood_posts(&self, user_id: &str) -> Result<Vec<MoodPost>, DatabaseError>;

    async fn save_mood_translation(
        &self,
        post_id: Uuid,
        locale: Locale,
        text: &str,
    ) -> Result<(), DatabaseError>;

    async fn list_mood_translations(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<(Locale, String)>, DatabaseError>;
}
