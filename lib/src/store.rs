//! Repository interface consumed by the dispatch engine.
//!
//! The engine never talks to a concrete database. Everything it needs,
//! from mailing selection to attempt logging and per-mailing claims, goes
//! through [`Store`].

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::mailing::{Mailing, MailingAttempt, MailingFilter, MailingId, MailingStatus};
use crate::message::{Message, MessageId};
use crate::recipient::Recipient;
use crate::user::{User, UserId};
use crate::Result;

/// Exclusive dispatch lease on a single mailing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claim {
    /// Identifies the dispatch pass holding the lease.
    pub holder: Uuid,
    pub expires: DateTime<Utc>,
}

impl Claim {
    pub fn new(lease: Duration) -> Self {
        Self {
            holder: Uuid::new_v4(),
            expires: Utc::now() + lease,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

pub trait Store: Send + Sync {
    /// Mailings matching the filter, in store order. Empty when nothing
    /// matches.
    fn find_mailings(&self, filter: &MailingFilter, now: DateTime<Utc>) -> Result<Vec<Mailing>>;
    /// Fails with `MailingNotFound` for unknown ids.
    fn get_mailing(&self, id: MailingId) -> Result<Mailing>;
    fn mailings(&self) -> Result<Vec<Mailing>>;
    fn set_status(&self, id: MailingId, status: MailingStatus) -> Result<()>;

    fn get_message(&self, id: MessageId) -> Result<Message>;

    /// Snapshot of the mailing's recipients at call time.
    fn recipients_of(&self, mailing: &Mailing) -> Result<Vec<Recipient>>;
    fn recipients(&self) -> Result<Vec<Recipient>>;

    fn get_user(&self, id: UserId) -> Result<User>;
    /// Sets the user's blocked flag and returns the updated user.
    fn set_user_blocked(&self, id: UserId, blocked: bool) -> Result<User>;

    /// Appends an attempt to the mailing's log, assigning its id.
    fn add_attempt(&self, attempt: MailingAttempt) -> Result<MailingAttempt>;
    /// Attempts of the mailing in the order they were recorded.
    fn attempts_of(&self, mailing: MailingId) -> Result<Vec<MailingAttempt>>;

    /// Atomically takes the dispatch lease for the mailing. Returns `false`
    /// if a live lease is held by someone else.
    fn claim(&self, mailing: MailingId, claim: &Claim) -> Result<bool>;
    /// Drops the lease if it's still held by `holder`.
    fn release(&self, mailing: MailingId, holder: Uuid) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_expiry() {
        let claim = Claim::new(Duration::seconds(30));
        assert!(!claim.is_expired(Utc::now()));
        assert!(claim.is_expired(Utc::now() + Duration::seconds(31)));
    }
}
