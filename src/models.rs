// models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted `question` / `choice_text`, mirrors the column width.
pub const MAX_TEXT_LEN: usize = 200;

pub type PollId = i64;
pub type ChoiceId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub pub_date: DateTime<Utc>,
}

impl Poll {
    /// True when `pub_date` falls no earlier than one day before `now`.
    ///
    /// Future dates also count; hiding unpublished polls is the job of the
    /// store's visibility filter, not this predicate.
    pub fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        self.pub_date >= now - Duration::days(1)
    }

    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        self.pub_date <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Choice {
    pub id: ChoiceId,
    pub poll_id: PollId,
    pub choice_text: String,
    pub votes: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
    pub question: String,
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChoice {
    pub choice_text: String,
}

impl NewPoll {
    pub fn validate(&self) -> Result<(), String> {
        validate_text("question", &self.question)
    }
}

impl NewChoice {
    pub fn validate(&self) -> Result<(), String> {
        validate_text("choice_text", &self.choice_text)
    }
}

fn validate_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(format!("{field} exceeds {MAX_TEXT_LEN} characters"));
    }
    Ok(())
}

/// A poll together with the choices created under it.
#[derive(Debug, Clone, Serialize)]
pub struct PollDetail {
    pub poll: Poll,
    pub choices: Vec<Choice>,
}

impl PollDetail {
    pub fn total_votes(&self) -> i64 {
        self.choices.iter().map(|c| i64::from(c.votes)).sum()
    }
}

/// Body of `POST /polls/{id}/vote`.
///
/// `choice` stays a raw string so a missing or garbled field can be reported
/// as a bad selection instead of a form rejection.
#[derive(Debug, Default)]
pub struct VoteForm {
    pub choice: Option<String>,
}

impl VoteForm {
    /// Builds the form from decoded urlencoded pairs. A repeated `choice`
    /// keeps its last value.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let choice = pairs
            .into_iter()
            .filter(|(key, _)| key == "choice")
            .map(|(_, value)| value)
            .last();

        Self { choice }
    }

    pub fn choice_id(&self) -> Option<ChoiceId> {
        self.choice.as_deref().and_then(|raw| raw.trim().parse().ok())
    }
}
