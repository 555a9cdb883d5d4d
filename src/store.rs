//! Data access for polls and their choices.
//!
//! [`PollStore`] is the only way handlers reach persisted data. Two backends
//! implement it: [`crate::db::PgStore`] for Postgres and [`MemoryStore`] for
//! tests and database-less runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::models::{Choice, ChoiceId, NewChoice, NewPoll, Poll, PollId};

/// Number of polls shown on the index page.
pub const LATEST_POLL_LIMIT: usize = 5;

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait PollStore: Send + Sync {
    /// Most recent polls with `pub_date <= now`, newest first, at most
    /// [`LATEST_POLL_LIMIT`].
    async fn list_published(&self, now: DateTime<Utc>) -> StoreResult<Vec<Poll>>;

    /// The poll with `id`, treated as missing while its `pub_date` is ahead of `now`.
    async fn get_visible(&self, id: PollId, now: DateTime<Utc>) -> StoreResult<Poll>;

    /// The poll with `id`, whatever its publish date.
    async fn get(&self, id: PollId) -> StoreResult<Poll>;

    /// Choices created under `poll_id`, in id order.
    async fn choices(&self, poll_id: PollId) -> StoreResult<Vec<Choice>>;

    /// Adds one vote to `choice_id` if it belongs to `poll_id`.
    ///
    /// Returns `None` without touching anything when the pair does not match.
    /// The increment must be applied by the backend in one step.
    async fn increment_votes(
        &self,
        poll_id: PollId,
        choice_id: ChoiceId,
    ) -> StoreResult<Option<Choice>>;

    async fn create_poll(&self, poll: NewPoll) -> StoreResult<Poll>;

    /// Fails with [`StoreError::NotFound`] when `poll_id` does not exist.
    async fn create_choice(&self, poll_id: PollId, choice: NewChoice) -> StoreResult<Choice>;
}

#[derive(Debug, Default)]
struct Tables {
    polls: BTreeMap<PollId, Poll>,
    choices: BTreeMap<ChoiceId, Choice>,
    last_poll_id: PollId,
    last_choice_id: ChoiceId,
}

/// Process-local store. Data lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    #[instrument(skip(self))]
    async fn list_published(&self, now: DateTime<Utc>) -> StoreResult<Vec<Poll>> {
        let tables = self.tables.read().await;
        let mut polls: Vec<Poll> = tables
            .polls
            .values()
            .filter(|p| p.is_published(now))
            .cloned()
            .collect();

        // ties keep the newest id first, matching the SQL ordering
        polls.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        polls.truncate(LATEST_POLL_LIMIT);
        Ok(polls)
    }

    #[instrument(skip(self))]
    async fn get_visible(&self, id: PollId, now: DateTime<Utc>) -> StoreResult<Poll> {
        let poll = self.get(id).await?;
        if poll.is_published(now) {
            Ok(poll)
        } else {
            Err(StoreError::NotFound)
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, id: PollId) -> StoreResult<Poll> {
        self.tables
            .read()
            .await
            .polls
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    #[instrument(skip(self))]
    async fn choices(&self, poll_id: PollId) -> StoreResult<Vec<Choice>> {
        Ok(self
            .tables
            .read()
            .await
            .choices
            .values()
            .filter(|c| c.poll_id == poll_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn increment_votes(
        &self,
        poll_id: PollId,
        choice_id: ChoiceId,
    ) -> StoreResult<Option<Choice>> {
        let mut tables = self.tables.write().await;
        match tables.choices.get_mut(&choice_id) {
            Some(choice) if choice.poll_id == poll_id => {
                choice.votes = choice.votes.checked_add(1).ok_or_else(|| {
                    StoreError::Invalid(format!("vote count of choice {choice_id} is at its limit"))
                })?;
                Ok(Some(choice.clone()))
            }
            _ => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn create_poll(&self, poll: NewPoll) -> StoreResult<Poll> {
        poll.validate().map_err(StoreError::Invalid)?;

        let mut tables = self.tables.write().await;
        tables.last_poll_id += 1;
        let created = Poll {
            id: tables.last_poll_id,
            question: poll.question,
            pub_date: poll.pub_date,
        };
        tables.polls.insert(created.id, created.clone());
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn create_choice(&self, poll_id: PollId, choice: NewChoice) -> StoreResult<Choice> {
        choice.validate().map_err(StoreError::Invalid)?;

        let mut tables = self.tables.write().await;
        if !tables.polls.contains_key(&poll_id) {
            return Err(StoreError::NotFound);
        }

        tables.last_choice_id += 1;
        let created = Choice {
            id: tables.last_choice_id,
            poll_id,
            choice_text: choice.choice_text,
            votes: 0,
        };
        tables.choices.insert(created.id, created.clone());
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;

    async fn poll_at(store: &MemoryStore, question: &str, pub_date: DateTime<Utc>) -> Poll {
        store
            .create_poll(NewPoll {
                question: question.into(),
                pub_date,
            })
            .await
            .unwrap()
    }

    async fn choice(store: &MemoryStore, poll_id: PollId, text: &str) -> Choice {
        store
            .create_choice(poll_id, NewChoice { choice_text: text.into() })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn list_published_is_empty_without_polls() {
        let store = MemoryStore::new();
        assert!(store.list_published(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_published_orders_limits_and_hides_future() {
        let store = MemoryStore::new();
        let now = Utc::now();

        for days in 1..=7 {
            poll_at(&store, &format!("past {days}"), now - Duration::days(days)).await;
        }
        poll_at(&store, "future", now + Duration::days(1)).await;

        let listed = store.list_published(now).await.unwrap();
        let questions: Vec<&str> = listed.iter().map(|p| p.question.as_str()).collect();
        assert_eq!(questions, ["past 1", "past 2", "past 3", "past 4", "past 5"]);
        assert!(listed.windows(2).all(|w| w[0].pub_date >= w[1].pub_date));
    }

    #[tokio::test]
    async fn poll_dated_exactly_now_is_published() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let poll = poll_at(&store, "right now", now).await;

        assert_eq!(store.list_published(now).await.unwrap(), vec![poll.clone()]);
        assert_eq!(store.get_visible(poll.id, now).await.unwrap(), poll);
    }

    #[tokio::test]
    async fn future_poll_hidden_from_get_visible_only() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let poll = poll_at(&store, "later", now + Duration::days(5)).await;

        assert!(matches!(
            store.get_visible(poll.id, now).await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(store.get(poll.id).await.unwrap(), poll);
    }

    #[tokio::test]
    async fn unknown_poll_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.get(42).await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.get_visible(42, Utc::now()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn choices_stay_with_their_poll() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = poll_at(&store, "first", now).await;
        let second = poll_at(&store, "second", now).await;

        let red = choice(&store, first.id, "Red").await;
        let _other = choice(&store, second.id, "Other").await;
        let blue = choice(&store, first.id, "Blue").await;

        assert_eq!(store.choices(first.id).await.unwrap(), vec![red, blue]);
        assert!(store.choices(99).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_choice_requires_existing_poll() {
        let store = MemoryStore::new();
        let result = store
            .create_choice(7, NewChoice { choice_text: "orphan".into() })
            .await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn create_rejects_blank_text() {
        let store = MemoryStore::new();
        let result = store
            .create_poll(NewPoll {
                question: "".into(),
                pub_date: Utc::now(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn increment_checks_ownership() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = poll_at(&store, "first", now).await;
        let second = poll_at(&store, "second", now).await;
        let red = choice(&store, first.id, "Red").await;

        assert!(store.increment_votes(second.id, red.id).await.unwrap().is_none());
        assert!(store.increment_votes(first.id, 999).await.unwrap().is_none());

        let bumped = store.increment_votes(first.id, red.id).await.unwrap().unwrap();
        assert_eq!(bumped.votes, 1);
    }

    #[tokio::test]
    async fn increment_at_limit_fails_without_change() {
        let store = MemoryStore::new();
        let poll = poll_at(&store, "popular", Utc::now()).await;
        let red = choice(&store, poll.id, "Red").await;
        store.tables.write().await.choices.get_mut(&red.id).unwrap().votes = i32::MAX;

        let result = store.increment_votes(poll.id, red.id).await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
        assert_eq!(store.choices(poll.id).await.unwrap()[0].votes, i32::MAX);
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let poll = poll_at(&store, "busy", Utc::now()).await;
        let red = choice(&store, poll.id, "Red").await;
        let (poll_id, choice_id) = (poll.id, red.id);

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_votes(poll_id, choice_id).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.choices(poll.id).await.unwrap()[0].votes, 50);
    }
}
