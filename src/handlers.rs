// handlers.rs
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use chrono::Utc;
use tera::Context;
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::models::{PollDetail, PollId, VoteForm};
use crate::poll::{self, VoteError};
use crate::AppState;

/// Up to five published polls, newest first.
#[instrument(skip(state))]
pub async fn index(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let polls = poll::index(state.store.as_ref(), Utc::now()).await?;

    let mut context = Context::new();
    context.insert("latest_poll_list", &polls);
    Ok(state.templates.render("index.html", &context)?)
}

/// Voting form for a published poll.
#[instrument(skip(state))]
pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> AppResult<Html<String>> {
    let poll_id = parse_poll_id(&poll_id)?;
    let detail = poll::detail(state.store.as_ref(), poll_id, Utc::now()).await?;

    render_detail(&state, &detail, None)
}

/// Tallies for any poll by id, published or not.
#[instrument(skip(state))]
pub async fn results(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
) -> AppResult<Html<String>> {
    let poll_id = parse_poll_id(&poll_id)?;
    let detail = poll::results(state.store.as_ref(), poll_id).await?;

    let mut context = Context::new();
    context.insert("poll", &detail.poll);
    context.insert("choices", &detail.choices);
    context.insert("total_votes", &detail.total_votes());
    Ok(state.templates.render("results.html", &context)?)
}

/// Records a vote and redirects to the results, or redisplays the form.
///
/// An unreadable body counts as a vote without a choice, so the poll lookup
/// alone decides between a 404 and the redisplayed form.
#[instrument(skip(state, body))]
pub async fn vote(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<String>,
    body: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> AppResult<Response> {
    let poll_id = parse_poll_id(&poll_id)?;
    let form = match body {
        Ok(Form(pairs)) => VoteForm::from_pairs(pairs),
        Err(rejection) => {
            tracing::debug!(%rejection, "unreadable vote form");
            VoteForm::default()
        }
    };

    match poll::cast_vote(state.store.as_ref(), poll_id, form.choice_id()).await {
        Ok(poll_id) => Ok(Redirect::to(&format!("/polls/{poll_id}/results/")).into_response()),
        Err(VoteError::InvalidSelection) => {
            tracing::debug!(poll_id, choice = ?form.choice, "vote without a valid choice");
            let detail = poll::results(state.store.as_ref(), poll_id).await?;
            Ok(render_detail(&state, &detail, Some(poll::NO_CHOICE_MESSAGE))?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn not_found() -> AppError {
    AppError::NotFound
}

fn render_detail(
    state: &AppState,
    detail: &PollDetail,
    error_message: Option<&str>,
) -> AppResult<Html<String>> {
    let mut context = Context::new();
    context.insert("poll", &detail.poll);
    context.insert("choices", &detail.choices);
    if let Some(message) = error_message {
        context.insert("error_message", message);
    }
    Ok(state.templates.render("detail.html", &context)?)
}

/// Ids that are not integers can never name a poll.
fn parse_poll_id(raw: &str) -> AppResult<PollId> {
    raw.parse().map_err(|_| AppError::NotFound)
}
