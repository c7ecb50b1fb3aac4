use anyhow::Result;

use crate::{Database, OptionalExt, now_ts};

impl Database {
    // -- Password resets --

    /// Stores a reset token hash. Older unused tokens for the same user are
    /// invalidated so only the latest emailed link works.
    pub fn create_password_reset(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE password_resets SET used_at = ?2 WHERE user_id = ?1 AND used_at IS NULL",
                rusqlite::params![user_id, now_ts()],
            )?;
            tx.execute(
                "INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![token_hash, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    /// Consumes a token and swaps the password hash in one transaction.
    /// Returns `false` for unknown, used or expired tokens.
    pub fn consume_password_reset(&self, token_hash: &str, password_hash: &str) -> Result<bool> {
        self.with_tx(|tx| {
            let now = now_ts();
            let user_id: Option<String> = tx
                .query_row(
                    "SELECT user_id FROM password_resets
                     WHERE token_hash = ?1 AND used_at IS NULL AND expires_at > ?2",
                    rusqlite::params![token_hash, now],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(user_id) = user_id else {
                return Ok(false);
            };

            tx.execute(
                "UPDATE password_resets SET used_at = ?2 WHERE token_hash = ?1",
                rusqlite::params![token_hash, now],
            )?;
            tx.execute(
                "UPDATE users SET password = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![user_id, password_hash, now],
            )?;
            Ok(true)
        })
    }
}
