//! Database repository for password reset tokens.
//!
//! Only the Argon2 hash of a token ever touches the database; the raw token
//! travels once, inside the reset email.

use crate::types::{abbrev_uuid, UserId};
use crate::{
    auth::password,
    config::Config,
    db::{
        errors::{DbError, Result},
        models::password_reset_tokens::PasswordResetTokenDBResponse,
    },
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct PasswordResetTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PasswordResetTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a reset token for a user. Returns the raw token (for the email)
    /// alongside the stored row.
    #[instrument(skip(self, config), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn create_for_user(
        &mut self,
        user_id: UserId,
        config: &Config,
    ) -> Result<(String, PasswordResetTokenDBResponse)> {
        let raw_token = password::generate_reset_token();
        let token_hash = password::hash_string(&raw_token)
            .map_err(|e| DbError::Other(anyhow::anyhow!("hash reset token: {e}")))?;

        let expiry = chrono::Duration::from_std(config.auth.native.password_reset_expiry)
            .map_err(|e| DbError::Other(anyhow::anyhow!("reset expiry out of range: {e}")))?;
        let expires_at = chrono::Utc::now() + expiry;

        let token = sqlx::query_as::<_, PasswordResetTokenDBResponse>(
            r#"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok((raw_token, token))
    }

    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<PasswordResetTokenDBResponse>> {
        let token =
            sqlx::query_as::<_, PasswordResetTokenDBResponse>("SELECT * FROM password_reset_tokens WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.db)
                .await?;
        Ok(token)
    }

    /// Single-use: marking succeeds only the first time.
    pub async fn mark_used(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE id = $1 AND used_at IS NULL")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
