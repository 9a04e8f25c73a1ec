//! Mailing campaigns and their delivery attempt log.
//!
//! A mailing pairs a single [`Message`](crate::Message) with a set of
//! recipients and a dispatch window. Its lifecycle is
//! `created -> running -> completed`, with `disabled` reachable from any
//! status through administrative override.

use chrono::{DateTime, Utc};

use crate::db::{Collectable, CollectableAt, Id, Identifiable};
use crate::message::MessageId;
use crate::recipient::RecipientId;
use crate::user::UserId;
use crate::{ErrorKind, Result};

pub type MailingId = Id;
pub type AttemptId = Id;

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MailingStatus {
    #[default]
    Created,
    Running,
    Completed,
    Disabled,
}

impl MailingStatus {
    /// Only these statuses are picked up by the automatic window scan.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Created | Self::Running)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Mailing {
    pub id: MailingId,
    pub owner: UserId,
    pub message: MessageId,
    /// Unique recipient ids, kept in the order they were attached.
    pub recipients: Vec<RecipientId>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: MailingStatus,
}

impl Mailing {
    pub fn new(
        owner: UserId,
        message: MessageId,
        recipients: impl IntoIterator<Item = RecipientId>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let mut mailing = Self {
            id: 0,
            owner,
            message,
            recipients: vec![],
            start_time,
            end_time,
            status: MailingStatus::Created,
        };
        for recipient in recipients {
            mailing.add_recipient(recipient);
        }
        mailing
    }

    /// Attaches a recipient, ignoring ones that are already attached.
    pub fn add_recipient(&mut self, recipient: RecipientId) {
        if !self.recipients.contains(&recipient) {
            self.recipients.push(recipient);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.end_time < self.start_time {
            return Err(ErrorKind::InvalidSchedule.into());
        }
        Ok(())
    }

    /// Checks whether `now` falls within the dispatch window, both ends
    /// inclusive.
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && self.end_time >= now
    }

    /// Default selection rule of the scheduled scan.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status.is_dispatchable() && self.in_window(now)
    }
}

impl Collectable for Mailing {
    fn get_collection_name() -> &'static str {
        "mailing"
    }
}

impl Identifiable for Mailing {
    fn get_id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }
}

/// Selection of mailings for a dispatch pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailingFilter {
    /// Dispatchable status and `start_time <= now <= end_time`.
    Window,
    /// Exact id, any status, no window check.
    Id(MailingId),
    /// Exact id, still subject to the window rule.
    IdInWindow(MailingId),
}

impl MailingFilter {
    pub fn matches(&self, mailing: &Mailing, now: DateTime<Utc>) -> bool {
        match self {
            Self::Window => mailing.is_eligible(now),
            Self::Id(id) => mailing.id == *id,
            Self::IdInWindow(id) => mailing.id == *id && mailing.is_eligible(now),
        }
    }

    /// Explicit id carried by the filter, if any.
    pub fn target(&self) -> Option<MailingId> {
        match self {
            Self::Window => None,
            Self::Id(id) | Self::IdInWindow(id) => Some(*id),
        }
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failed,
}

/// Immutable record of a single delivery try. Attempts are only ever
/// appended, and go away together with their mailing.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MailingAttempt {
    pub id: AttemptId,
    pub mailing: MailingId,
    pub time: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    /// Server response or error description, truncated before storage.
    pub response: String,
    /// Address the attempt was made for.
    pub recipient: String,
}

impl MailingAttempt {
    pub fn new(
        mailing: MailingId,
        outcome: AttemptOutcome,
        response: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            mailing,
            time: Utc::now(),
            outcome,
            response: response.into(),
            recipient: recipient.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

impl CollectableAt for MailingAttempt {
    fn get_collection_name_at(mailing: Id) -> String {
        format!("mailing_attempt:{}", mailing)
    }
}

impl Identifiable for MailingAttempt {
    fn get_id(&self) -> Id {
        self.id
    }

    fn set_id(&mut self, id: Id) {
        self.id = id;
    }
}

/// Cuts the text down to at most `limit` characters, never splitting a
/// multi-byte character.
pub fn truncate_response(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
