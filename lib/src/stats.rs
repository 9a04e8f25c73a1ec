//! Read-side rollups over the attempt log.

use fnv::FnvHashSet;

use crate::mailing::{Mailing, MailingAttempt, MailingId, MailingStatus};
use crate::permission::{has_capability, Capability};
use crate::store::Store;
use crate::user::User;
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MailingStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    /// Percentage of successful attempts, 0 when there are none.
    pub success_rate: f64,
}

impl MailingStats {
    /// Success rate rounded to two decimal places, for display.
    pub fn rounded_rate(&self) -> f64 {
        (self.success_rate * 100.0).round() / 100.0
    }
}

pub fn aggregate(attempts: &[MailingAttempt]) -> MailingStats {
    let total = attempts.len();
    let success = attempts.iter().filter(|a| a.is_success()).count();
    let success_rate = if total > 0 {
        success as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    MailingStats {
        total,
        success,
        failed: total - success,
        success_rate,
    }
}

pub fn for_mailing<S: Store + ?Sized>(store: &S, id: MailingId) -> Result<MailingStats> {
    store.get_mailing(id)?;
    Ok(aggregate(&store.attempts_of(id)?))
}

/// Statistics for every mailing in the store.
pub fn all_statistics<S: Store + ?Sized>(store: &S) -> Result<Vec<(Mailing, MailingStats)>> {
    let mut out = Vec::new();
    for mailing in store.mailings()? {
        let stats = aggregate(&store.attempts_of(mailing.id)?);
        out.push((mailing, stats));
    }
    Ok(out)
}

/// Headline counters shown to a user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Overview {
    pub total_mailings: usize,
    pub running_mailings: usize,
    pub unique_recipients: usize,
}

/// Counts what the user is allowed to see: everything for those who can view
/// all mailings and recipients, only their own records otherwise. Anonymous
/// callers get zeros.
pub fn overview<S: Store + ?Sized>(store: &S, user: Option<&User>) -> Result<Overview> {
    let user = match user {
        Some(user) => user,
        None => return Ok(Overview::default()),
    };

    let all_mailings = has_capability(user, Capability::ViewAllMailings);
    let mailings = store
        .mailings()?
        .into_iter()
        .filter(|m| all_mailings || m.owner == user.id)
        .collect::<Vec<_>>();

    let all_recipients = has_capability(user, Capability::ViewAllRecipients);
    let recipients = store
        .recipients()?
        .into_iter()
        .filter(|r| all_recipients || r.owner == user.id)
        .map(|r| r.email.to_lowercase())
        .collect::<FnvHashSet<_>>();

    Ok(Overview {
        total_mailings: mailings.len(),
        running_mailings: mailings
            .iter()
            .filter(|m| m.status == MailingStatus::Running)
            .count(),
        unique_recipients: recipients.len(),
    })
}
