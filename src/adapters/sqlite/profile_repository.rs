//! SQLite-backed credential profile store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{parse_json_or_default, parse_uuid};
use crate::domain::errors::DomainResult;
use crate::domain::models::CredentialProfile;
use crate::domain::ports::ProfileStore;

/// SQLite credential profiles.
#[derive(Clone)]
pub struct SqliteProfileRepository {
    pool: SqlitePool,
}

impl SqliteProfileRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a profile.
    pub async fn insert(&self, profile: &CredentialProfile) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO credential_profiles (id, account_id, name, is_default, config, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(profile.profile_id.to_string())
        .bind(profile.account_id.to_string())
        .bind(&profile.name)
        .bind(profile.is_default as i32)
        .bind(serde_json::to_string(&profile.config)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: String,
    account_id: String,
    name: String,
    is_default: i32,
    config: Option<String>,
}

#[async_trait]
impl ProfileStore for SqliteProfileRepository {
    async fn get_default_profile(&self, account_id: Uuid, name: &str) -> DomainResult<Option<CredentialProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"SELECT id, account_id, name, is_default, config FROM credential_profiles
               WHERE account_id = ? AND name = ? AND is_default = 1
               ORDER BY created_at DESC LIMIT 1"#,
        )
        .bind(account_id.to_string())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(CredentialProfile {
                profile_id: parse_uuid(&row.id)?,
                account_id: parse_uuid(&row.account_id)?,
                name: row.name,
                is_default: row.is_default != 0,
                config: parse_json_or_default(row.config)?,
            })
        })
        .transpose()
    }
}
