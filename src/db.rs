// src/db.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::instrument;

use crate::models::{Choice, ChoiceId, NewChoice, NewPoll, Poll, PollId};
use crate::store::{PollStore, StoreError, StoreResult, LATEST_POLL_LIMIT};

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Postgres-backed [`PollStore`] over the `poll` and `choice` tables.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        Ok(Self::new(create_pool(database_url, max_connections).await?))
    }

    /// Applies the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl PollStore for PgStore {
    #[instrument(skip(self))]
    async fn list_published(&self, now: DateTime<Utc>) -> StoreResult<Vec<Poll>> {
        let polls = sqlx::query_as::<_, Poll>(
            r#"
            SELECT id, question, pub_date
            FROM poll
            WHERE pub_date <= $1
            ORDER BY pub_date DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(LATEST_POLL_LIMIT as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(polls)
    }

    #[instrument(skip(self))]
    async fn get_visible(&self, id: PollId, now: DateTime<Utc>) -> StoreResult<Poll> {
        sqlx::query_as::<_, Poll>(
            "SELECT id, question, pub_date FROM poll WHERE id = $1 AND pub_date <= $2",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: PollId) -> StoreResult<Poll> {
        sqlx::query_as::<_, Poll>("SELECT id, question, pub_date FROM poll WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self))]
    async fn choices(&self, poll_id: PollId) -> StoreResult<Vec<Choice>> {
        let choices = sqlx::query_as::<_, Choice>(
            r#"
            SELECT id, poll_id, choice_text, votes
            FROM choice
            WHERE poll_id = $1
            ORDER BY id
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(choices)
    }

    #[instrument(skip(self))]
    async fn increment_votes(
        &self,
        poll_id: PollId,
        choice_id: ChoiceId,
    ) -> StoreResult<Option<Choice>> {
        // single statement, so concurrent votes serialize on the row lock
        let updated = sqlx::query_as::<_, Choice>(
            r#"
            UPDATE choice
            SET votes = votes + 1
            WHERE id = $1 AND poll_id = $2
            RETURNING id, poll_id, choice_text, votes
            "#,
        )
        .bind(choice_id)
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn create_poll(&self, poll: NewPoll) -> StoreResult<Poll> {
        poll.validate().map_err(StoreError::Invalid)?;

        let created = sqlx::query_as::<_, Poll>(
            r#"
            INSERT INTO poll (question, pub_date)
            VALUES ($1, $2)
            RETURNING id, question, pub_date
            "#,
        )
        .bind(&poll.question)
        .bind(poll.pub_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn create_choice(&self, poll_id: PollId, choice: NewChoice) -> StoreResult<Choice> {
        choice.validate().map_err(StoreError::Invalid)?;

        let result = sqlx::query_as::<_, Choice>(
            r#"
            INSERT INTO choice (poll_id, choice_text)
            VALUES ($1, $2)
            RETURNING id, poll_id, choice_text, votes
            "#,
        )
        .bind(poll_id)
        .bind(&choice.choice_text)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(StoreError::NotFound)
            }
            Err(e) => {
                tracing::error!(error = ?e, "failure during choice insertion");
                Err(e.into())
            }
        }
    }
}
