// src/poll.rs
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use crate::models::{ChoiceId, Poll, PollDetail, PollId};
use crate::store::{PollStore, StoreError, StoreResult};

/// Shown on the detail page when a vote names no valid choice.
pub const NO_CHOICE_MESSAGE: &str = "You didn't select a choice.";

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("poll not found")]
    NotFound,

    #[error("{}", NO_CHOICE_MESSAGE)]
    InvalidSelection,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for VoteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => VoteError::NotFound,
            other => VoteError::Store(other),
        }
    }
}

pub async fn index(store: &dyn PollStore, now: DateTime<Utc>) -> StoreResult<Vec<Poll>> {
    store.list_published(now).await
}

/// A published poll with its choices; unpublished polls are not found.
pub async fn detail(
    store: &dyn PollStore,
    poll_id: PollId,
    now: DateTime<Utc>,
) -> StoreResult<PollDetail> {
    let poll = store.get_visible(poll_id, now).await?;
    with_choices(store, poll).await
}

/// Any poll with its tallies. Unlike [`detail`] this ignores the publish date.
pub async fn results(store: &dyn PollStore, poll_id: PollId) -> StoreResult<PollDetail> {
    let poll = store.get(poll_id).await?;
    with_choices(store, poll).await
}

async fn with_choices(store: &dyn PollStore, poll: Poll) -> StoreResult<PollDetail> {
    let choices = store.choices(poll.id).await?;
    Ok(PollDetail { poll, choices })
}

/// Records one vote for `choice_id` on `poll_id`.
///
/// Nothing is written unless the choice exists and belongs to the poll.
#[instrument(skip(store))]
pub async fn cast_vote(
    store: &dyn PollStore,
    poll_id: PollId,
    choice_id: Option<ChoiceId>,
) -> Result<PollId, VoteError> {
    let poll = store.get(poll_id).await?;
    let choice_id = choice_id.ok_or(VoteError::InvalidSelection)?;

    match store.increment_votes(poll.id, choice_id).await? {
        Some(choice) => {
            tracing::debug!(choice_id = choice.id, votes = choice.votes, "vote recorded");
            Ok(poll.id)
        }
        None => Err(VoteError::InvalidSelection),
    }
}
