//! Mailing dispatch engine.
//!
//! A dispatch pass selects mailings, then runs each one: the mailing is
//! claimed, moved from `created` to `running`, every recipient gets one send
//! attempt, and the mailing is marked `completed` only when at least one send
//! went through and none failed. Anything else leaves it `running`, so the
//! next pass picks it up again.
//!
//! Gateway errors are contained per recipient and end up in the attempt log.
//! Store errors abort the pass, since the attempt log is the audit trail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fnv::FnvHashSet;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config;
use crate::email::{Envelope, Gateway};
use crate::mailing::{
    truncate_response, AttemptOutcome, Mailing, MailingAttempt, MailingFilter, MailingId,
    MailingStatus,
};
use crate::store::{Claim, Store};
use crate::template;
use crate::{Config, Error, ErrorKind, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    #[default]
    Live,
    /// Dry run: nothing is sent and no attempts are recorded.
    Simulate,
}

/// Condition the stored mailing has to meet once its claim is taken.
///
/// Selection happens before claiming, and a pass may work through earlier
/// mailings for a long time before reaching a later one. The rule is checked
/// again against the freshly read mailing so changes made in between are
/// honored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Run whatever the stored state.
    Unconditional,
    /// The mailing must still match the selection filter at the given time.
    Matching(MailingFilter, DateTime<Utc>),
    /// The mailing must not be disabled.
    Enabled,
}

impl Admission {
    fn check(&self, mailing: &Mailing) -> Result<()> {
        let admitted = match self {
            Self::Unconditional => true,
            Self::Matching(filter, now) => filter.matches(mailing, *now),
            Self::Enabled => mailing.status != MailingStatus::Disabled,
        };
        if admitted {
            return Ok(());
        }
        let kind = match self {
            Self::Enabled => ErrorKind::MailingDisabled(mailing.id),
            _ => ErrorKind::MailingIneligible(mailing.id),
        };
        Err(Error::new_with(kind, Some(mailing.id), None))
    }
}

/// Outcome of running a single mailing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunReport {
    pub mailing: MailingId,
    pub sent: usize,
    pub failed: usize,
    /// Recipients left out because they were already reached earlier.
    pub skipped: usize,
    /// Status the mailing was left in.
    pub status: MailingStatus,
}

/// Totals over all mailings processed in one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScanSummary {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    /// Mailings skipped because another pass held their claim.
    pub busy: Vec<MailingId>,
    /// Mailings that no longer qualified once claimed.
    pub stale: Vec<MailingId>,
    pub reports: Vec<RunReport>,
}

impl ScanSummary {
    fn record(&mut self, report: RunReport) {
        self.processed += 1;
        self.sent += report.sent;
        self.failed += report.failed;
        self.reports.push(report);
    }
}

pub struct Dispatcher<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
    settings: config::Dispatch,
    sender: String,
    success_response: String,
}

impl<S: Store, G: Gateway> Dispatcher<S, G> {
    pub fn new(store: Arc<S>, gateway: Arc<G>, config: &Config) -> Self {
        Self {
            store,
            gateway,
            settings: config.dispatch.clone(),
            sender: config.email.sender(),
            success_response: config.email.success_response.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mailings matching the filter at `now`. An empty result is a normal
    /// "nothing to do" outcome.
    pub fn select_eligible(&self, now: DateTime<Utc>, filter: &MailingFilter) -> Result<Vec<Mailing>> {
        self.store.find_mailings(filter, now)
    }

    /// Runs every given mailing in turn, each under `admission`. Mailings
    /// claimed by another pass or no longer admitted are skipped and listed in
    /// the summary.
    pub async fn run_all(
        &self,
        mailings: Vec<Mailing>,
        mode: Mode,
        admission: Admission,
    ) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        for mailing in mailings {
            match self.run_admitted(&mailing, mode, admission).await {
                Ok(report) => summary.record(report),
                Err(e) => match e.kind {
                    ErrorKind::MailingBusy(id) => {
                        warn!(mailing = id, "mailing is being dispatched elsewhere, skipping");
                        summary.busy.push(id);
                    }
                    ErrorKind::MailingIneligible(id) | ErrorKind::MailingDisabled(id) => {
                        info!(mailing = id, "mailing no longer qualifies, skipping");
                        summary.stale.push(id);
                    }
                    _ => return Err(e),
                },
            }
        }
        Ok(summary)
    }

    /// Runs a single mailing under an exclusive claim, whatever its status
    /// and schedule.
    pub async fn run(&self, mailing: &Mailing, mode: Mode) -> Result<RunReport> {
        self.run_admitted(mailing, mode, Admission::Unconditional)
            .await
    }

    /// Runs a single mailing under an exclusive claim, provided the stored
    /// mailing still satisfies `admission`.
    ///
    /// Fails with `MailingBusy` without touching anything if the claim is
    /// held by another pass, and with `MailingIneligible` or
    /// `MailingDisabled` if the mailing no longer qualifies.
    pub async fn run_admitted(
        &self,
        mailing: &Mailing,
        mode: Mode,
        admission: Admission,
    ) -> Result<RunReport> {
        let claim = Claim::new(self.settings.claim_lease());
        if !self.store.claim(mailing.id, &claim)? {
            return Err(Error::new_with(
                ErrorKind::MailingBusy(mailing.id),
                Some(mailing.id),
                None,
            ));
        }

        let span = info_span!("mailing", id = mailing.id, %mode, gateway = self.gateway.name());
        let result = self
            .run_claimed(mailing.id, mode, admission)
            .instrument(span)
            .await;

        // Release regardless of the outcome, but report the run error first.
        let released = self.store.release(mailing.id, claim.holder);
        let report = result?;
        released?;

        Ok(report)
    }

    async fn run_claimed(
        &self,
        id: MailingId,
        mode: Mode,
        admission: Admission,
    ) -> Result<RunReport> {
        // Work from the stored state, the caller's copy may be stale.
        let mut mailing = self.store.get_mailing(id)?;
        admission.check(&mailing)?;

        if mailing.status == MailingStatus::Created {
            self.store.set_status(id, MailingStatus::Running)?;
            mailing.status = MailingStatus::Running;
            info!("mailing started");
        }

        let message = self.store.get_message(mailing.message)?;
        let recipients = self.store.recipients_of(&mailing)?;

        let delivered = if self.settings.skip_delivered && mode == Mode::Live {
            self.delivered_to(id)?
        } else {
            FnvHashSet::default()
        };

        info!(recipients = recipients.len(), "dispatching");

        let mut report = RunReport {
            mailing: id,
            status: mailing.status,
            ..Default::default()
        };

        for recipient in &recipients {
            if delivered.contains(&recipient.email) {
                debug!(recipient = %recipient.email, "already delivered, skipping");
                report.skipped += 1;
                continue;
            }

            let envelope = Envelope {
                subject: message.subject.clone(),
                body: template::render(&message.body, recipient),
                sender: self.sender.clone(),
                recipient: recipient.email.clone(),
            };

            if mode == Mode::Simulate {
                info!(recipient = %recipient.email, name = %recipient.full_name, "simulated send");
                report.sent += 1;
                continue;
            }

            let attempt = match self.deliver(&envelope).await {
                Ok(()) => {
                    debug!(recipient = %recipient.email, "sent");
                    report.sent += 1;
                    MailingAttempt::new(
                        id,
                        AttemptOutcome::Success,
                        self.success_response.clone(),
                        &recipient.email,
                    )
                }
                Err(e) => {
                    let response =
                        truncate_response(&e.kind.to_string(), self.settings.response_limit);
                    warn!(recipient = %recipient.email, error = %response, "send failed");
                    report.failed += 1;
                    MailingAttempt::new(id, AttemptOutcome::Failed, response, &recipient.email)
                }
            };
            self.store.add_attempt(attempt)?;
        }

        let reached = report.sent + report.skipped;
        if mode == Mode::Live && reached > 0 && report.failed == 0 {
            self.store.set_status(id, MailingStatus::Completed)?;
            report.status = MailingStatus::Completed;
        }

        info!(
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            status = %report.status,
            "mailing pass finished"
        );

        Ok(report)
    }

    /// Sends through the gateway, bounded by the configured timeout.
    async fn deliver(&self, envelope: &Envelope) -> Result<()> {
        let limit = self.settings.send_timeout();
        match tokio::time::timeout(limit, self.gateway.send(envelope)).await {
            Ok(result) => result,
            Err(_) => Err(ErrorKind::GatewayTimeout(limit).into()),
        }
    }

    /// Addresses with at least one successful attempt for the mailing.
    fn delivered_to(&self, id: MailingId) -> Result<FnvHashSet<String>> {
        Ok(self
            .store
            .attempts_of(id)?
            .into_iter()
            .filter(|a| a.is_success())
            .map(|a| a.recipient)
            .collect())
    }
}
