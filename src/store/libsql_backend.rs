//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::catalog::Locale;
use crate::onboarding::model::{Gender, MoodPost, UserProfile};
use crate::store::migrations;
use crate::store::traits::{Database, display_name_key};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_locale(s: &str) -> Locale {
    Locale::parse(s).unwrap_or_default()
}

/// Map a write error, classifying unique-index violations as constraints.
fn write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{op}: {msg}"))
    } else {
        DatabaseError::Query(format!("{op}: {msg}"))
    }
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const PROFILE_COLUMNS: &str =
    "user_id, display_name, age, gender_id, bio, locale, client_ip, created_at, updated_at";

/// Map a libsql Row to a UserProfile. Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<UserProfile, DatabaseError> {
    let map = |e: libsql::Error| DatabaseError::Serialization(format!("profile row: {e}"));
    let gender_raw: i64 = row.get(3).map_err(map)?;
    let gender_id = u8::try_from(gender_raw)
        .ok()
        .and_then(Gender::from_id)
        .ok_or_else(|| DatabaseError::Serialization(format!("invalid gender_id {gender_raw}")))?;
    let age_raw: i64 = row.get(2).map_err(map)?;
    let age = u8::try_from(age_raw)
        .map_err(|_| DatabaseError::Serialization(format!("invalid age {age_raw}")))?;
    let locale: String = row.get(5).map_err(map)?;
    let created: String = row.get(7).map_err(map)?;
    let updated: String = row.get(8).map_err(map)?;

    Ok(UserProfile {
        user_id: row.get(0).map_err(map)?,
        display_name: row.get(1).map_err(map)?,
        age,
        gender_id,
        bio: row.get(4).map_err(map)?,
        locale: parse_locale(&locale),
        client_ip: row.get(6).ok(),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO profiles (user_id, display_name, display_name_key, age, gender_id, bio, locale, client_ip, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (user_id) DO UPDATE SET
                display_name = ?2, display_name_key = ?3, age = ?4, gender_id = ?5,
                bio = ?6, locale = ?7, client_ip = ?8, updated_at = ?10",
            params![
                profile.user_id.as_str(),
                profile.display_name.as_str(),
                display_name_key(&profile.display_name),
                i64::from(profile.age),
                i64::from(profile.gender_id.id()),
                profile.bio.as_str(),
                profile.locale.code(),
                opt_text(profile.client_ip.as_deref()),
                profile.created_at.to_rfc3339(),
                profile.updated_at.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| write_error("upsert_profile", e))?;

        debug!(user_id = %profile.user_id, "Profile upserted");
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn display_name_exists(
        &self,
        name: &str,
        exclude_user: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM profiles WHERE display_name_key = ?1 AND user_id != ?2",
                params![display_name_key(name), exclude_user.unwrap_or("")],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("display_name_exists: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) > 0),
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("display_name_exists: {e}"))),
        }
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(
        &self,
        user_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT value FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row.get(0).unwrap_or_else(|_| "null".to_string());
                let value: serde_json::Value =
                    serde_json::from_str(&value_str).unwrap_or(serde_json::Value::Null);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting(
        &self,
        user_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO settings (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
            params![user_id, key, value_str, now],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("set_setting: {e}")))?;

        Ok(())
    }

    async fn delete_setting(&self, user_id: &str, key: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count = conn
            .execute(
                "DELETE FROM settings WHERE user_id = ?1 AND key = ?2",
                params![user_id, key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_setting: {e}")))?;
        Ok(count > 0)
    }

    // ── Mood feed ───────────────────────────────────────────────────

    async fn publish_mood(&self, post: &MoodPost) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO mood_posts (id, user_id, text, locale, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                post.id.to_string(),
                post.user_id.as_str(),
                post.text.as_str(),
                post.locale.code(),
                post.created_at.to_rfc3339()
            ],
        )
        .await
        .map_err(|e| write_error("publish_mood", e))?;
        Ok(())
    }

    async fn list_mood_posts(&self, user_id: &str) -> Result<Vec<MoodPost>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT id, user_id, text, locale, created_at FROM mood_posts
                 WHERE user_id = ?1 ORDER BY created_at DESC",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_mood_posts: {e}")))?;

        let mut posts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            let locale: String = row.get(3).unwrap_or_default();
            let created: String = row.get(4).unwrap_or_default();
            posts.push(MoodPost {
                id: Uuid::parse_str(&id_str).unwrap_or_default(),
                user_id: row.get(1).unwrap_or_default(),
                text: row.get(2).unwrap_or_default(),
                locale: parse_locale(&locale),
                created_at: parse_datetime(&created),
            });
        }
        Ok(posts)
    }

    async fn save_mood_translation(
        &self,
        post_id: Uuid,
        locale: Locale,
        text: &str,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO mood_translations (post_id, locale, text) VALUES (?1, ?2, ?3)
             ON CONFLICT (post_id, locale) DO UPDATE SET text = ?3",
            params![post_id.to_string(), locale.code(), text],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("save_mood_translation: {e}")))?;
        Ok(())
    }

    async fn list_mood_translations(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<(Locale, String)>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT locale, text FROM mood_translations WHERE post_id = ?1 ORDER BY locale",
                params![post_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_mood_translations: {e}")))?;

        let mut out = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let locale: String = row.get(0).unwrap_or_default();
            let text: String = row.get(1).unwrap_or_default();
            out.push((parse_locale(&locale), text));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn make_profile(user_id: &str, name: &str) -> UserProfile {
        let now = Utc::now();
        UserProfile {
            user_id: user_id.to_string(),
            display_name: name.to_string(),
            age: 27,
            gender_id: Gender::Female,
            bio: "Chats, café et randonnée.".to_string(),
            locale: Locale::Fr,
            client_ip: Some("203.0.113.7".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn profile_upsert_and_get() {
        let db = test_db().await;
        db.upsert_profile(&make_profile("u1", "Zoé")).await.unwrap();

        let fetched = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(fetched.display_name, "Zoé");
        assert_eq!(fetched.age, 27);
        assert_eq!(fetched.gender_id, Gender::Female);
        assert_eq!(fetched.locale, Locale::Fr);
        assert_eq!(fetched.client_ip.as_deref(), Some("203.0.113.7"));

        // Same user may rewrite their own name.
        let mut updated = make_profile("u1", "ZOÉ");
        updated.age = 28;
        db.upsert_profile(&updated).await.unwrap();
        let fetched = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(fetched.age, 28);
        assert_eq!(fetched.display_name, "ZOÉ");

        assert!(db.get_profile("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn display_name_lookup_is_case_insensitive() {
        let db = test_db().await;
        db.upsert_profile(&make_profile("u1", "Zoé")).await.unwrap();

        assert!(db.display_name_exists("zoé", None).await.unwrap());
        assert!(db.display_name_exists(" ZOÉ ", Some("u2")).await.unwrap());
        assert!(!db.display_name_exists("Zoé", Some("u1")).await.unwrap());
        assert!(!db.display_name_exists("Chloé", None).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_display_name_is_a_constraint_error() {
        let db = test_db().await;
        db.upsert_profile(&make_profile("u1", "Alex")).await.unwrap();

        let err = db
            .upsert_profile(&make_profile("u2", "alex"))
            .await
            .unwrap_err();
        assert!(err.is_display_name_conflict(), "unexpected error: {err}");
        assert!(db.get_profile("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settings_crud() {
        let db = test_db().await;
        let value = serde_json::json!({"stage": "collecting", "consented": true});

        db.set_setting("user1", "onboarding_draft", &value)
            .await
            .unwrap();
        let fetched = db
            .get_setting("user1", "onboarding_draft")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched["stage"], "collecting");

        let updated = serde_json::json!({"stage": "confirm"});
        db.set_setting("user1", "onboarding_draft", &updated)
            .await
            .unwrap();
        let fetched = db
            .get_setting("user1", "onboarding_draft")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched["stage"], "confirm");

        assert!(db.delete_setting("user1", "onboarding_draft").await.unwrap());
        assert!(db.get_setting("user1", "onboarding_draft").await.unwrap().is_none());
        assert!(!db.delete_setting("user1", "onboarding_draft").await.unwrap());
    }

    #[tokio::test]
    async fn settings_user_isolation() {
        let db = test_db().await;
        db.set_setting("user1", "key", &serde_json::json!("val1"))
            .await
            .unwrap();
        db.set_setting("user2", "key", &serde_json::json!("val2"))
            .await
            .unwrap();

        let v1 = db.get_setting("user1", "key").await.unwrap().unwrap();
        let v2 = db.get_setting("user2", "key").await.unwrap().unwrap();
        assert_eq!(v1, "val1");
        assert_eq!(v2, "val2");
    }

    #[tokio::test]
    async fn mood_posts_and_translations() {
        let db = test_db().await;
        let post = MoodPost::new("u1", "Heureuse aujourd'hui", Locale::Fr);
        db.publish_mood(&post).await.unwrap();

        db.save_mood_translation(post.id, Locale::En, "Happy today")
            .await
            .unwrap();
        db.save_mood_translation(post.id, Locale::En, "Happy today!")
            .await
            .unwrap();
        db.save_mood_translation(post.id, Locale::De, "Heute glücklich")
            .await
            .unwrap();

        let posts = db.list_mood_posts("u1").await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, post.id);
        assert_eq!(posts[0].locale, Locale::Fr);

        let translations = db.list_mood_translations(post.id).await.unwrap();
        assert_eq!(
            translations,
            vec![
                (Locale::De, "Heute glücklich".to_string()),
                (Locale::En, "Happy today!".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("onboarding.db");
        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.upsert_profile(&make_profile("u1", "Zoé")).await.unwrap();
        }
        let db = LibSqlBackend::new_local(&path).await.unwrap();
        assert!(db.get_profile("u1").await.unwrap().is_some());
    }
}
