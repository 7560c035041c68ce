//! Conversation store backed by SQLite.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Datelike, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::export::{self, ExportFormat};
use crate::models::{
    Conversation, ConversationPatch, ConversationWithTurns, DEFAULT_PROFILE_ID, DEFAULT_TITLE,
    NewConversation, NewTurn, ProfilePatch, Turn, TurnRole, TurnSource, UserProfile,
};
use crate::schema::{SCHEMA, SCHEMA_VERSION};

/// Handle owning the connection pool for one conversation database.
///
/// The store is opened explicitly and released with [`ConversationStore::close`];
/// there is no process-wide connection.
pub struct ConversationStore {
    pool: SqlitePool,
    default_title: String,
}

impl ConversationStore {
    /// Open or create a store at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            default_title: DEFAULT_TITLE.to_string(),
        };
        store.init().await?;
        tracing::info!("Opened conversation store at {}", path.display());
        Ok(store)
    }

    /// Use a different title for conversations created without one.
    #[must_use]
    pub fn with_default_title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    /// Initialize schema.
    async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        sqlx::query(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)
             ON CONFLICT(version) DO NOTHING",
        )
        .bind(SCHEMA_VERSION)
        .bind("initial")
        .bind(encode_ts(&now())?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the store, waiting for open connections to finish.
    pub async fn close(self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Conversations
    // =========================================================================

    /// Create a conversation, filling in id, timestamps and title when absent.
    pub async fn create_conversation(&self, new: NewConversation) -> Result<Conversation> {
        let created_at = new.created_at.map_or_else(now, |dt| dt.trunc_subsecs(6));
        let conv = Conversation {
            id: new.id.unwrap_or_else(new_id),
            created_at,
            updated_at: created_at,
            title: new.title.unwrap_or_else(|| self.default_title.clone()),
            personality_id: new.personality_id,
            voice_name: new.voice_name,
            summary: new.summary,
        };

        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, personality_id, voice_name, summary, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&conv.id)
        .bind(&conv.title)
        .bind(&conv.personality_id)
        .bind(&conv.voice_name)
        .bind(&conv.summary)
        .bind(encode_ts(&conv.created_at)?)
        .bind(encode_ts(&conv.updated_at)?)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Created conversation {}", conv.id);
        Ok(conv)
    }

    /// Insert or overwrite a conversation by id.
    pub async fn upsert_conversation(&self, conv: &Conversation) -> Result<()> {
        // ON CONFLICT DO UPDATE keeps the row, so its turns are not cascaded away.
        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, personality_id, voice_name, summary, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                personality_id = excluded.personality_id,
                voice_name = excluded.voice_name,
                summary = excluded.summary,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&conv.id)
        .bind(&conv.title)
        .bind(&conv.personality_id)
        .bind(&conv.voice_name)
        .bind(&conv.summary)
        .bind(encode_ts(&conv.created_at)?)
        .bind(encode_ts(&conv.updated_at)?)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Upserted conversation {}", conv.id);
        Ok(())
    }

    /// Apply a patch and refresh `updated_at`. Returns `None` for an unknown id.
    pub async fn update_conversation(
        &self,
        id: &str,
        patch: ConversationPatch,
    ) -> Result<Option<Conversation>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE conversations SET
                title = COALESCE(?, title),
                personality_id = COALESCE(?, personality_id),
                voice_name = COALESCE(?, voice_name),
                summary = COALESCE(?, summary),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(patch.title)
        .bind(patch.personality_id)
        .bind(patch.voice_name)
        .bind(patch.summary)
        .bind(encode_ts(&now())?)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let conv = fetch_conversation(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::debug!("Updated conversation {id}");
        Ok(conv)
    }

    /// List conversations, newest first, at most `limit` of them.
    pub async fn list_conversations(&self, limit: i64) -> Result<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT * FROM conversations ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(conversation_from_row).collect()
    }

    /// Get a conversation together with its turns.
    ///
    /// Both reads share one transaction, so the result is never a mix of two
    /// database states. Turns without a conversation row yield `None`.
    pub async fn get_conversation(&self, id: &str) -> Result<Option<ConversationWithTurns>> {
        let mut tx = self.pool.begin().await?;

        let Some(meta) = fetch_conversation(&mut *tx, id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        let turns = fetch_turns(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(Some(ConversationWithTurns { meta, turns }))
    }

    /// Delete a conversation and every turn referencing it.
    ///
    /// Returns whether a conversation row was removed.
    pub async fn delete_conversation(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let turns = sqlx::query("DELETE FROM turns WHERE conversation_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let deleted = result.rows_affected() > 0;
        tracing::debug!(
            "Deleted conversation {id} (found: {deleted}, turns: {})",
            turns.rows_affected()
        );
        Ok(deleted)
    }

    /// Get conversation count.
    pub async fn count_conversations(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    // =========================================================================
    // Turns
    // =========================================================================

    /// Append a turn and bump the parent's `updated_at` in one transaction.
    ///
    /// Fails with [`Error::NotFound`] when the conversation does not exist,
    /// including when it was deleted while this call was in flight.
    pub async fn add_turn(&self, new: NewTurn) -> Result<Turn> {
        let turn = Turn {
            id: new.id.unwrap_or_else(new_id),
            conversation_id: new.conversation_id,
            role: new.role,
            text: new.text,
            created_at: new.created_at.map_or_else(now, |dt| dt.trunc_subsecs(6)),
            source: new.source,
            is_final: new.is_final,
        };
        let created_at = encode_ts(&turn.created_at)?;
        let bumped_at = encode_ts(&turn.created_at.max(now()))?;

        let mut tx = self.pool.begin().await?;

        // Write first: the parent update takes the write lock before any read.
        let parent = sqlx::query(
            "UPDATE conversations SET updated_at = MAX(updated_at, ?) WHERE id = ?",
        )
        .bind(bumped_at)
        .bind(&turn.conversation_id)
        .execute(&mut *tx)
        .await?;

        if parent.rows_affected() == 0 {
            tx.rollback().await?;
            tracing::warn!(
                "Rejected turn for missing conversation {}",
                turn.conversation_id
            );
            return Err(Error::NotFound(format!(
                "conversation '{}'",
                turn.conversation_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO turns (id, conversation_id, role, text, source, is_final, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&turn.id)
        .bind(&turn.conversation_id)
        .bind(turn.role.as_str())
        .bind(&turn.text)
        .bind(turn.source.map(TurnSource::as_str))
        .bind(turn.is_final)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("Added {} turn to {}", turn.role, turn.conversation_id);
        Ok(turn)
    }

    /// Get turns for a conversation, oldest first.
    pub async fn get_turns(&self, conversation_id: &str) -> Result<Vec<Turn>> {
        fetch_turns(&self.pool, conversation_id).await
    }

    /// Get turn count.
    pub async fn count_turns(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM turns")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Delete turns whose conversation no longer exists.
    ///
    /// Only databases written without foreign key enforcement can contain
    /// such rows. Returns the number of turns removed.
    pub async fn prune_orphan_turns(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM turns WHERE conversation_id NOT IN (SELECT id FROM conversations)",
        )
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            tracing::warn!("Pruned {removed} orphaned turns");
        }
        Ok(removed)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Return the user profile, creating the default record on first use.
    ///
    /// Creation is an atomic insert-if-absent, so concurrent first calls all
    /// observe the same persisted row.
    pub async fn get_or_create_profile(&self) -> Result<UserProfile> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO profile (id, updated_at) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
            .bind(DEFAULT_PROFILE_ID)
            .bind(encode_ts(&now())?)
            .execute(&mut *tx)
            .await?;

        let profile = fetch_profile(&mut *tx).await?;
        tx.commit().await?;
        Ok(profile)
    }

    /// Merge a patch over the stored profile and refresh `updated_at`.
    pub async fn upsert_user_profile(&self, patch: ProfilePatch) -> Result<UserProfile> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO profile (id, display_name, timezone, preferences, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, profile.display_name),
                timezone = COALESCE(excluded.timezone, profile.timezone),
                preferences = COALESCE(excluded.preferences, profile.preferences),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(DEFAULT_PROFILE_ID)
        .bind(patch.display_name)
        .bind(patch.timezone)
        .bind(patch.preferences)
        .bind(encode_ts(&now())?)
        .execute(&mut *tx)
        .await?;

        let profile = fetch_profile(&mut *tx).await?;
        tx.commit().await?;

        tracing::debug!("Updated user profile");
        Ok(profile)
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Write a conversation export into `dir`, using local time for markdown
    /// headings. Returns `None` when the conversation does not exist.
    pub async fn export_conversation(
        &self,
        id: &str,
        format: ExportFormat,
        dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(full) = self.get_conversation(id).await? else {
            return Ok(None);
        };

        let contents = export::render(&full, format, &chrono::Local)?;
        let path = export::write_export(dir, id, format, &contents)?;
        tracing::info!("Exported conversation {id} to {}", path.display());
        Ok(Some(path))
    }
}

async fn fetch_conversation<'e, E>(executor: E, id: &str) -> Result<Option<Conversation>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM conversations WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(conversation_from_row).transpose()
}

async fn fetch_turns<'e, E>(executor: E, conversation_id: &str) -> Result<Vec<Turn>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT * FROM turns WHERE conversation_id = ? ORDER BY created_at ASC, rowid ASC",
    )
    .bind(conversation_id)
    .fetch_all(executor)
    .await?;

    rows.iter().map(turn_from_row).collect()
}

async fn fetch_profile<'e, E>(executor: E) -> Result<UserProfile>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query("SELECT * FROM profile WHERE id = ?")
        .bind(DEFAULT_PROFILE_ID)
        .fetch_one(executor)
        .await?;

    Ok(UserProfile {
        id: row.try_get("id")?,
        display_name: row.try_get("display_name")?,
        timezone: row.try_get("timezone")?,
        preferences: row.try_get("preferences")?,
        updated_at: decode_ts(row.try_get("updated_at")?)?,
    })
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation> {
    Ok(Conversation {
        id: row.try_get("id")?,
        created_at: decode_ts(row.try_get("created_at")?)?,
        updated_at: decode_ts(row.try_get("updated_at")?)?,
        title: row.try_get("title")?,
        personality_id: row.try_get("personality_id")?,
        voice_name: row.try_get("voice_name")?,
        summary: row.try_get("summary")?,
    })
}

fn turn_from_row(row: &SqliteRow) -> Result<Turn> {
    let role: &str = row.try_get("role")?;
    let role =
        TurnRole::parse(role).ok_or_else(|| Error::InvalidData(format!("turn role '{role}'")))?;

    let source = match row.try_get::<Option<&str>, _>("source")? {
        Some(raw) => Some(
            TurnSource::parse(raw)
                .ok_or_else(|| Error::InvalidData(format!("turn source '{raw}'")))?,
        ),
        None => None,
    };

    Ok(Turn {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        role,
        text: row.try_get("text")?,
        created_at: decode_ts(row.try_get("created_at")?)?,
        source,
        is_final: row.try_get("is_final")?,
    })
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time at the precision timestamps are stored with.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Encode a timestamp as fixed-width RFC 3339 text.
///
/// Years outside 0000-9999 would be written with a sign and extra digits,
/// which neither sorts nor parses back, so they are rejected.
fn encode_ts(dt: &DateTime<Utc>) -> Result<String> {
    if !(0..=9999).contains(&dt.year()) {
        return Err(Error::InvalidData(format!(
            "timestamp {dt} is outside years 0000-9999"
        )));
    }
    Ok(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("timestamp '{raw}': {e}")))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
