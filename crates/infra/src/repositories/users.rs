use sqlx::FromRow;
use tracing::{Span, instrument};

use gavel_auction::User;
use gavel_core::{Entity, UserId};

use crate::db::Session;
use crate::error::{RepositoryError, map_sqlx_error, require_id};

use super::rows::{USER_COLUMNS, UserRow};

/// Reads and writes `users` rows through a borrowed session.
pub struct UserRepository<'s> {
    session: &'s mut Session,
}

impl<'s> UserRepository<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Insert `user` and record the store-assigned id on it.
    #[instrument(skip(self, user), fields(name = %user.name(), user_id = tracing::field::Empty), err)]
    pub async fn save(&mut self, user: &mut User) -> Result<UserId, RepositoryError> {
        if let Some(id) = user.id() {
            return Err(RepositoryError::AlreadyPersisted {
                kind: User::KIND,
                id: id.as_i64(),
            });
        }

        let result = sqlx::query("INSERT INTO users (name, email) VALUES (?, ?)")
            .bind(user.name())
            .bind(user.email())
            .execute(self.session.connection())
            .await
            .map_err(|e| map_sqlx_error("save_user", e))?;

        let id = UserId::from_i64(result.last_insert_rowid());
        user.assign_id(id);
        Span::current().record("user_id", id.as_i64());
        Ok(id)
    }

    /// Overwrite name and email of a persisted user.
    #[instrument(skip(self, user), fields(user_id = ?user.id()), err)]
    pub async fn update(&mut self, user: &User) -> Result<(), RepositoryError> {
        let id = require_id(user, User::KIND)?;

        let result = sqlx::query("UPDATE users SET name = ?, email = ? WHERE id = ?")
            .bind(user.name())
            .bind(user.email())
            .bind(id.as_i64())
            .execute(self.session.connection())
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                kind: User::KIND,
                id: id.as_i64(),
            });
        }
        Ok(())
    }

    /// Remove a persisted user.
    ///
    /// Fails with `StillReferenced` while the user owns auctions or has bids.
    #[instrument(skip(self, user), fields(user_id = ?user.id()), err)]
    pub async fn delete(&mut self, user: &User) -> Result<(), RepositoryError> {
        let id = require_id(user, User::KIND)?;

        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.as_i64())
            .execute(self.session.connection())
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                kind: User::KIND,
                id: id.as_i64(),
            });
        }
        Ok(())
    }

    /// Exact match on both name and email; `None` when nothing matches.
    #[instrument(skip(self), fields(found = tracing::field::Empty), err)]
    pub async fn find_by_name_and_email(
        &mut self,
        name: &str,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.name = ? AND u.email = ? ORDER BY u.id LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(name)
            .bind(email)
            .fetch_optional(self.session.connection())
            .await
            .map_err(|e| map_sqlx_error("find_user_by_name_and_email", e))?;

        let user = row
            .map(|row| UserRow::from_row(&row))
            .transpose()
            .map_err(|e| map_sqlx_error("decode_user", e))?
            .map(User::from);

        Span::current().record("found", user.is_some());
        Ok(user)
    }

    #[instrument(skip(self), err)]
    pub async fn find_by_id(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(self.session.connection())
            .await
            .map_err(|e| map_sqlx_error("find_user_by_id", e))?;

        Ok(row
            .map(|row| UserRow::from_row(&row))
            .transpose()
            .map_err(|e| map_sqlx_error("decode_user", e))?
            .map(User::from))
    }
}
