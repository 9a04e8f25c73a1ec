//! Entry points that start dispatch passes.
//!
//! There are three ways in: the scheduled scan run by a periodic job, the
//! targeted scan for one explicit mailing, and the manual start performed by
//! a mailing's owner. Administrative disabling of mailings and blocking of
//! users live here as well since they go through the same capability check.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::dispatch::{Admission, Dispatcher, Mode, RunReport, ScanSummary};
use crate::email::Gateway;
use crate::mailing::{MailingFilter, MailingId, MailingStatus};
use crate::permission::{has_capability, Capability, CapabilityCheck};
use crate::store::Store;
use crate::user::{User, UserId};
use crate::{Error, ErrorKind, Result};

/// Result of a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No mailing qualified.
    Idle,
    /// The explicitly requested mailing doesn't exist.
    NotFound(MailingId),
    Dispatched(ScanSummary),
}

pub struct Trigger<S, G> {
    dispatcher: Dispatcher<S, G>,
    check: CapabilityCheck,
}

impl<S: Store, G: Gateway> Trigger<S, G> {
    pub fn new(dispatcher: Dispatcher<S, G>) -> Self {
        Self {
            dispatcher,
            check: has_capability,
        }
    }

    /// Replaces the default role-based capability check.
    pub fn with_capability_check(mut self, check: CapabilityCheck) -> Self {
        self.check = check;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<S, G> {
        &self.dispatcher
    }

    /// Runs all mailings that are due at `now`, sending for real.
    pub async fn scheduled_scan(&self, now: DateTime<Utc>) -> Result<ScanOutcome> {
        let filter = MailingFilter::Window;
        let mailings = self.dispatcher.select_eligible(now, &filter)?;
        if mailings.is_empty() {
            return Ok(ScanOutcome::Idle);
        }
        let summary = self
            .dispatcher
            .run_all(mailings, Mode::Live, Admission::Matching(filter, now))
            .await?;
        Ok(ScanOutcome::Dispatched(summary))
    }

    /// Runs one explicit mailing.
    ///
    /// Without `force` the mailing still has to be due. With `force` it runs
    /// whatever its status and schedule. `simulate` makes it a dry run.
    pub async fn targeted_scan(
        &self,
        id: MailingId,
        force: bool,
        simulate: bool,
        now: DateTime<Utc>,
    ) -> Result<ScanOutcome> {
        match self.dispatcher.store().get_mailing(id) {
            Ok(_) => (),
            Err(e) if e.is_not_found() => return Ok(ScanOutcome::NotFound(id)),
            Err(e) => return Err(e),
        }

        let filter = if force {
            MailingFilter::Id(id)
        } else {
            MailingFilter::IdInWindow(id)
        };
        let mailings = self.dispatcher.select_eligible(now, &filter)?;
        if mailings.is_empty() {
            return Ok(ScanOutcome::Idle);
        }

        let mode = if simulate { Mode::Simulate } else { Mode::Live };
        let summary = self
            .dispatcher
            .run_all(mailings, mode, Admission::Matching(filter, now))
            .await?;
        Ok(ScanOutcome::Dispatched(summary))
    }

    /// Runs a mailing on its owner's request, right away and regardless of
    /// its schedule.
    pub async fn manual_start(&self, user: &User, id: MailingId) -> Result<RunReport> {
        if !(self.check)(user, Capability::StartMailing) {
            return Err(Error::new_with(
                ErrorKind::Forbidden("user is not allowed to start mailings".to_string()),
                Some(id),
                Some(user.id),
            ));
        }

        let mailing = self.dispatcher.store().get_mailing(id)?;
        if mailing.owner != user.id {
            return Err(Error::new_with(
                ErrorKind::Forbidden("only the owner can start a mailing".to_string()),
                Some(id),
                Some(user.id),
            ));
        }
        if mailing.status == MailingStatus::Disabled {
            return Err(Error::new_with(
                ErrorKind::MailingDisabled(id),
                Some(id),
                Some(user.id),
            ));
        }

        info!(mailing = id, user = user.id, "manual mailing start");
        // Checked again under the claim in case of a concurrent toggle.
        self.dispatcher
            .run_admitted(&mailing, Mode::Live, Admission::Enabled)
            .await
            .map_err(|mut e| {
                e.user = Some(user.id);
                e
            })
    }

    /// Disables a mailing, or re-enables a disabled one by putting it back
    /// to `created`. Returns the new status.
    pub fn toggle_disabled(&self, user: &User, id: MailingId) -> Result<MailingStatus> {
        if !(self.check)(user, Capability::ToggleMailing) {
            return Err(Error::new_with(
                ErrorKind::Forbidden("user is not allowed to toggle mailings".to_string()),
                Some(id),
                Some(user.id),
            ));
        }

        let store = self.dispatcher.store();
        let mailing = store.get_mailing(id)?;
        let status = match mailing.status {
            MailingStatus::Disabled => MailingStatus::Created,
            _ => MailingStatus::Disabled,
        };
        store.set_status(id, status)?;

        info!(mailing = id, user = user.id, %status, "mailing status toggled");
        Ok(status)
    }

    /// Blocks a user, or unblocks a blocked one. Returns the updated user.
    pub fn toggle_user_block(&self, actor: &User, id: UserId) -> Result<User> {
        if !(self.check)(actor, Capability::BlockUsers) {
            return Err(Error::new_with(
                ErrorKind::Forbidden("user is not allowed to block users".to_string()),
                None,
                Some(actor.id),
            ));
        }

        let store = self.dispatcher.store();
        let user = store.get_user(id)?;
        let user = store.set_user_blocked(id, !user.is_blocked)?;

        info!(user = id, actor = actor.id, blocked = user.is_blocked, "user block toggled");
        Ok(user)
    }

    /// Performs the scheduled scan every `interval` until cancelled.
    ///
    /// Each tick is an independent invocation: a failing scan is logged and
    /// the loop carries on with the next tick.
    pub async fn watch(&self, interval: Duration, cancel: CancellationToken) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?interval, "watching for due mailings");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.scheduled_scan(Utc::now()).await {
                        Ok(ScanOutcome::Dispatched(summary)) => info!(
                            processed = summary.processed,
                            sent = summary.sent,
                            failed = summary.failed,
                            busy = summary.busy.len(),
                            stale = summary.stale.len(),
                            "scheduled scan finished"
                        ),
                        Ok(_) => debug!("no mailings due"),
                        Err(e) => error!("scheduled scan failed: {}", e),
                    }
                }
            }
        }
        info!("stopped watching");

        Ok(())
    }
}
