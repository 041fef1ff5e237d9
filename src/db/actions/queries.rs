//! Action repository queries.

use super::models::{ActionColumn, ActionRow, ActionUpdate, IncrementOutcome, NewAction, RowTuple};
use crate::action::ActionRecord;
use crate::db::DbError;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// `SELECT` over every action column, in [`RowTuple`] order.
macro_rules! select_actions {
    ($tail:literal) => {
        concat!(
            "SELECT id, password_hash, name, callback, args, invocation_limit, ",
            "invocation_count, expiration, created_at, persistent FROM secure_actions",
            $tail
        )
    };
}

/// Repository for secure action operations.
pub struct ActionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ActionRepository<'a> {
    /// Create a new action repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new record and return its id.
    pub async fn create(&self, action: &NewAction) -> Result<i64, DbError> {
        let args = serde_json::to_string(&action.callback.args).map_err(DbError::Encode)?;

        let result = sqlx::query(
            r#"
            INSERT INTO secure_actions
                (password_hash, name, callback, args, invocation_limit, invocation_count,
                 expiration, created_at, persistent)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&action.password_hash)
        .bind(&action.name)
        .bind(&action.callback.handler)
        .bind(&args)
        .bind(action.limit)
        .bind(action.expiration)
        .bind(action.created_at)
        .bind(action.persistent)
        .execute(self.pool)
        .await
        .map_err(|e| name_conflict(e, &action.name))?;

        Ok(result.last_insert_rowid())
    }

    /// Load a record by id.
    pub async fn find_by_id(&self, id: i64) -> Result<ActionRecord, DbError> {
        let row = sqlx::query_as::<_, RowTuple>(select_actions!(" WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) => ActionRow::from(row).into_record(),
            None => Err(DbError::ActionNotFound(id)),
        }
    }

    /// Load the first record (lowest id) whose `column` equals `value`.
    pub async fn find_by(&self, column: ActionColumn, value: &str) -> Result<ActionRecord, DbError> {
        let sql = format!(
            "{} WHERE {} = ? ORDER BY id LIMIT 1",
            select_actions!(""),
            column.as_sql()
        );

        let row = sqlx::query_as::<_, RowTuple>(&sql)
            .bind(value)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) => ActionRow::from(row).into_record(),
            None => Err(DbError::NoMatch {
                column: column.as_sql(),
                value: value.to_string(),
            }),
        }
    }

    /// Apply a partial update.
    ///
    /// An empty update only checks that the record exists.
    pub async fn update(&self, id: i64, update: &ActionUpdate) -> Result<(), DbError> {
        if update.is_empty() {
            return if self.exists(id).await? {
                Ok(())
            } else {
                Err(DbError::ActionNotFound(id))
            };
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE secure_actions SET ");
        let mut set = qb.separated(", ");
        if let Some(hash) = &update.password_hash {
            set.push("password_hash = ").push_bind_unseparated(hash.clone());
        }
        if let Some(name) = &update.name {
            set.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(callback) = &update.callback {
            let args = serde_json::to_string(&callback.args).map_err(DbError::Encode)?;
            set.push("callback = ")
                .push_bind_unseparated(callback.handler.clone());
            set.push("args = ").push_bind_unseparated(args);
        }
        if let Some(limit) = update.limit {
            set.push("invocation_limit = ").push_bind_unseparated(limit);
        }
        if let Some(expiration) = update.expiration {
            set.push("expiration = ").push_bind_unseparated(expiration);
        }
        if let Some(persistent) = update.persistent {
            set.push("persistent = ").push_bind_unseparated(persistent);
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb
            .build()
            .execute(self.pool)
            .await
            .map_err(|e| match &update.name {
                Some(name) => name_conflict(e, name),
                None => DbError::from(e),
            })?;

        if result.rows_affected() == 0 {
            return Err(DbError::ActionNotFound(id));
        }
        Ok(())
    }

    /// Advance the invocation counter by one.
    ///
    /// With `strict` the write is conditional on the limit not having been
    /// reached, evaluated inside the single `UPDATE`, so concurrent callers
    /// can never push the counter past the limit.
    pub async fn increment_count(&self, id: i64, strict: bool) -> Result<IncrementOutcome, DbError> {
        let sql = if strict {
            r#"
            UPDATE secure_actions
            SET invocation_count = invocation_count + 1
            WHERE id = ?
              AND (invocation_limit = -1 OR invocation_count < invocation_limit)
            RETURNING invocation_count
            "#
        } else {
            r#"
            UPDATE secure_actions
            SET invocation_count = invocation_count + 1
            WHERE id = ?
            RETURNING invocation_count
            "#
        };

        let count = sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        if let Some(count) = count {
            return Ok(IncrementOutcome::Incremented(count));
        }

        if self.exists(id).await? {
            Ok(IncrementOutcome::LimitReached)
        } else {
            Ok(IncrementOutcome::Missing)
        }
    }

    /// Delete a record. Returns whether a row was removed; absent ids are not an error.
    pub async fn delete(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM secure_actions WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a record only if it is not persistent.
    ///
    /// Used by the sweep so a record flagged persistent after it was listed
    /// survives.
    pub async fn delete_evictable(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM secure_actions WHERE id = ? AND persistent = 0")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether a record with this id exists.
    pub async fn exists(&self, id: i64) -> Result<bool, DbError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM secure_actions WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await?;

        Ok(found > 0)
    }

    /// Total number of records.
    pub async fn len(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM secure_actions")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }

    /// Stream every row in id order without loading the table into memory.
    ///
    /// The stream holds a pooled connection until it is dropped.
    pub fn stream_all(&self) -> BoxStream<'a, Result<ActionRow, DbError>> {
        sqlx::query_as::<_, RowTuple>(select_actions!(" ORDER BY id"))
            .fetch(self.pool)
            .map_ok(ActionRow::from)
            .map_err(DbError::from)
            .boxed()
    }

    /// Stream up to `limit` rows with an id greater than `after_id`, in id
    /// order. Paging by the last id seen stays correct while earlier pages
    /// are being deleted.
    ///
    /// The stream holds a pooled connection until it is dropped.
    pub fn stream_page(
        &self,
        after_id: i64,
        limit: i64,
    ) -> BoxStream<'a, Result<ActionRow, DbError>> {
        sqlx::query_as::<_, RowTuple>(select_actions!(" WHERE id > ? ORDER BY id LIMIT ?"))
            .bind(after_id)
            .bind(limit)
            .fetch(self.pool)
            .map_ok(ActionRow::from)
            .map_err(DbError::from)
            .boxed()
    }
}

/// Map a UNIQUE violation on `name` to [`DbError::NameExists`].
fn name_conflict(e: sqlx::Error, name: &str) -> DbError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return DbError::NameExists(name.to_string());
    }
    DbError::from(e)
}
