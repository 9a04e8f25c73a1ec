mod common;

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use common::Fixture;
use courier::dispatch::Admission;
use courier::mailing::MailingFilter;
use courier::permission::Capability;
use courier::stats;
use courier::store::Claim;
use courier::user::Role;
use courier::{ErrorKind, MailingStatus, Mode, ScanOutcome, Store, User};

fn dispatched(outcome: ScanOutcome) -> courier::ScanSummary {
    match outcome {
        ScanOutcome::Dispatched(summary) => summary,
        other => panic!("expected a dispatched scan, got {:?}", other),
    }
}

#[tokio::test]
async fn scheduled_scan_reports_partial_failure() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com", "b@example.com", "c@example.com"]);
    fx.gateway.fail_for("c@example.com", "SMTP timeout").await;

    let summary = dispatched(fx.trigger().scheduled_scan(Utc::now()).await.unwrap());

    assert_eq!(summary.processed, 1);
    assert_eq!((summary.sent, summary.failed), (2, 1));
    assert_eq!(fx.db.attempts_of(mailing.id).unwrap().len(), 3);
    assert_eq!(fx.status(&mailing), MailingStatus::Running);
}

#[tokio::test]
async fn scheduled_scan_respects_window_and_status() {
    let fx = Fixture::new();
    let now = Utc::now();
    let due = fx.mailing_between(&["a@example.com"], now - Duration::hours(1), now + Duration::hours(1));
    let past = fx.mailing_between(&["b@example.com"], now - Duration::days(2), now - Duration::days(1));
    let future = fx.mailing_between(&["c@example.com"], now + Duration::days(1), now + Duration::days(2));
    let running = fx.mailing_between(&["d@example.com"], now - Duration::hours(1), now + Duration::hours(1));
    let running = fx.with_status(&running, MailingStatus::Running);
    let done = fx.mailing_between(&["e@example.com"], now - Duration::hours(1), now + Duration::hours(1));
    let done = fx.with_status(&done, MailingStatus::Completed);

    // Selection is a pure function of store state and `now`.
    let dispatcher = fx.dispatcher();
    let first = dispatcher.select_eligible(now, &MailingFilter::Window).unwrap();
    let second = dispatcher.select_eligible(now, &MailingFilter::Window).unwrap();
    let ids = first.iter().map(|m| m.id).collect::<Vec<_>>();
    assert_eq!(ids, [due.id, running.id]);
    assert_eq!(ids, second.iter().map(|m| m.id).collect::<Vec<_>>());

    let summary = dispatched(fx.trigger().scheduled_scan(now).await.unwrap());

    assert_eq!(summary.processed, 2);
    assert!(fx.gateway.was_sent_to("a@example.com").await);
    assert!(fx.gateway.was_sent_to("d@example.com").await);
    assert_eq!(fx.gateway.sent_count().await, 2);
    assert_eq!(fx.status(&past), MailingStatus::Created);
    assert_eq!(fx.status(&future), MailingStatus::Created);
    assert_eq!(fx.status(&done), MailingStatus::Completed);
}

#[tokio::test]
async fn window_bounds_are_inclusive() {
    let fx = Fixture::new();
    let start = Utc::now();
    let end = start + Duration::minutes(10);
    let mailing = fx.mailing_between(&["a@example.com"], start, end);
    let dispatcher = fx.dispatcher();

    for now in [start, end] {
        let found = dispatcher.select_eligible(now, &MailingFilter::Window).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, mailing.id);
    }
    let after = dispatcher
        .select_eligible(end + Duration::seconds(1), &MailingFilter::Window)
        .unwrap();
    assert!(after.is_empty());
}

#[tokio::test]
async fn scheduled_scan_with_nothing_due_is_idle() {
    let fx = Fixture::new();
    let now = Utc::now();
    fx.mailing_between(&["a@example.com"], now + Duration::days(1), now + Duration::days(2));

    let outcome = fx.trigger().scheduled_scan(now).await.unwrap();

    assert_eq!(outcome, ScanOutcome::Idle);
    assert_eq!(fx.gateway.sent_count().await, 0);
}

#[tokio::test]
async fn scan_skips_mailings_claimed_elsewhere() {
    let fx = Fixture::new();
    let taken = fx.mailing(&["a@example.com"]);
    let free = fx.mailing(&["b@example.com"]);
    assert!(fx.db.claim(taken.id, &Claim::new(Duration::minutes(5))).unwrap());

    let summary = dispatched(fx.trigger().scheduled_scan(Utc::now()).await.unwrap());

    assert_eq!(summary.busy, [taken.id]);
    assert_eq!(summary.processed, 1);
    assert_eq!(fx.status(&taken), MailingStatus::Created);
    assert_eq!(fx.status(&free), MailingStatus::Completed);
}

#[tokio::test]
async fn mailing_disabled_after_selection_is_left_alone() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com", "b@example.com"]);
    let manager = fx.user("manager@example.com", Role::Manager);
    let trigger = fx.trigger();
    let now = Utc::now();

    let selected = trigger
        .dispatcher()
        .select_eligible(now, &MailingFilter::Window)
        .unwrap();
    trigger.toggle_disabled(&manager, mailing.id).unwrap();

    let summary = trigger
        .dispatcher()
        .run_all(selected, Mode::Live, Admission::Matching(MailingFilter::Window, now))
        .await
        .unwrap();

    assert_eq!(summary.stale, [mailing.id]);
    assert_eq!(summary.processed, 0);
    assert_eq!(fx.gateway.sent_count().await, 0);
    assert!(fx.db.attempts_of(mailing.id).unwrap().is_empty());
    assert_eq!(fx.status(&mailing), MailingStatus::Disabled);
}

#[tokio::test]
async fn mailing_completed_by_an_earlier_pass_is_not_resent() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com", "b@example.com"]);
    let dispatcher = fx.dispatcher();
    let now = Utc::now();
    let admission = Admission::Matching(MailingFilter::Window, now);

    let first = dispatcher.select_eligible(now, &MailingFilter::Window).unwrap();
    let second = first.clone();

    let summary = dispatcher.run_all(first, Mode::Live, admission).await.unwrap();
    assert_eq!(summary.sent, 2);
    assert_eq!(fx.status(&mailing), MailingStatus::Completed);

    let summary = dispatcher.run_all(second, Mode::Live, admission).await.unwrap();
    assert_eq!(summary.stale, [mailing.id]);
    assert_eq!(summary.sent, 0);
    assert_eq!(fx.gateway.sent_count().await, 2);
    assert_eq!(fx.db.attempts_of(mailing.id).unwrap().len(), 2);
}

#[tokio::test]
async fn enabled_admission_rechecks_stored_status() {
    let fx = Fixture::new();
    let stale = fx.mailing(&["a@example.com"]);
    fx.with_status(&stale, MailingStatus::Disabled);

    let err = fx
        .dispatcher()
        .run_admitted(&stale, Mode::Live, Admission::Enabled)
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::MailingDisabled(id) if id == stale.id));
    assert_eq!(fx.gateway.sent_count().await, 0);
    assert_eq!(fx.status(&stale), MailingStatus::Disabled);

    // The claim is released for later runs.
    let claim = Claim::new(Duration::minutes(1));
    assert!(fx.db.claim(stale.id, &claim).unwrap());
}

#[tokio::test]
async fn targeted_scan_of_unknown_mailing() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com"]);

    let outcome = fx
        .trigger()
        .targeted_scan(999, false, false, Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome, ScanOutcome::NotFound(999));
    assert_eq!(fx.gateway.sent_count().await, 0);
    assert_eq!(fx.status(&mailing), MailingStatus::Created);
}

#[tokio::test]
async fn targeted_scan_runs_only_the_requested_mailing() {
    let fx = Fixture::new();
    let wanted = fx.mailing(&["a@example.com"]);
    let other = fx.mailing(&["b@example.com"]);

    let summary = dispatched(
        fx.trigger()
            .targeted_scan(wanted.id, false, false, Utc::now())
            .await
            .unwrap(),
    );

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.reports[0].mailing, wanted.id);
    assert_eq!(fx.status(&wanted), MailingStatus::Completed);
    assert_eq!(fx.status(&other), MailingStatus::Created);
}

#[tokio::test]
async fn force_bypasses_window_and_status() {
    let fx = Fixture::new();
    let now = Utc::now();
    let mailing = fx.mailing_between(&["a@example.com"], now + Duration::days(1), now + Duration::days(2));
    let trigger = fx.trigger();

    let outcome = trigger.targeted_scan(mailing.id, false, false, now).await.unwrap();
    assert_eq!(outcome, ScanOutcome::Idle);

    let summary = dispatched(trigger.targeted_scan(mailing.id, true, false, now).await.unwrap());
    assert_eq!(summary.sent, 1);
    assert_eq!(fx.status(&mailing), MailingStatus::Completed);

    // Completed mailings can be re-sent when forced.
    let summary = dispatched(trigger.targeted_scan(mailing.id, true, false, now).await.unwrap());
    assert_eq!(summary.sent, 1);
    assert_eq!(fx.gateway.sent_count().await, 2);
}

#[tokio::test]
async fn targeted_simulation_sends_nothing() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com", "b@example.com"]);

    let summary = dispatched(
        fx.trigger()
            .targeted_scan(mailing.id, false, true, Utc::now())
            .await
            .unwrap(),
    );

    assert_eq!((summary.sent, summary.failed), (2, 0));
    assert_eq!(fx.gateway.sent_count().await, 0);
    assert!(fx.db.attempts_of(mailing.id).unwrap().is_empty());
    assert_eq!(fx.status(&mailing), MailingStatus::Running);
}

#[tokio::test]
async fn owner_can_start_mailing_outside_its_window() {
    let fx = Fixture::new();
    let now = Utc::now();
    let mailing = fx.mailing_between(&["a@example.com"], now + Duration::days(1), now + Duration::days(2));

    let report = fx.trigger().manual_start(&fx.owner, mailing.id).await.unwrap();

    assert_eq!(report.sent, 1);
    assert_eq!(report.status, MailingStatus::Completed);
    assert_eq!(fx.status(&mailing), MailingStatus::Completed);
}

#[tokio::test]
async fn manual_start_refuses_non_owners() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com"]);
    let stranger = fx.user("stranger@example.com", Role::User);
    let manager = fx.user("manager@example.com", Role::Manager);
    let mut blocked = fx.owner.clone();
    blocked.is_blocked = true;
    let trigger = fx.trigger();

    for user in [&stranger, &manager, &blocked] {
        let err = trigger.manual_start(user, mailing.id).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Forbidden(_)), "{}", user.email);
        assert_eq!(err.user, Some(user.id));
    }

    assert_eq!(fx.gateway.sent_count().await, 0);
    assert_eq!(fx.status(&mailing), MailingStatus::Created);
}

#[tokio::test]
async fn manual_start_of_disabled_mailing() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com"]);
    fx.with_status(&mailing, MailingStatus::Disabled);

    let err = fx
        .trigger()
        .manual_start(&fx.owner, mailing.id)
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::MailingDisabled(id) if id == mailing.id));
    assert_eq!(fx.gateway.sent_count().await, 0);
}

#[tokio::test]
async fn manual_start_of_unknown_mailing() {
    let fx = Fixture::new();

    let err = fx.trigger().manual_start(&fx.owner, 42).await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn custom_capability_check_is_honored() {
    fn nobody(_: &User, _: Capability) -> bool {
        false
    }

    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com"]);
    let trigger = fx.trigger().with_capability_check(nobody);

    let err = trigger.manual_start(&fx.owner, mailing.id).await.unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Forbidden(_)));
}

#[tokio::test]
async fn manager_toggles_disabled_state() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com"]);
    let manager = fx.user("manager@example.com", Role::Manager);
    let trigger = fx.trigger();

    let status = trigger.toggle_disabled(&manager, mailing.id).unwrap();
    assert_eq!(status, MailingStatus::Disabled);
    assert_eq!(fx.status(&mailing), MailingStatus::Disabled);

    // Disabled mailings are left out of scheduled scans.
    let outcome = trigger.scheduled_scan(Utc::now()).await.unwrap();
    assert_eq!(outcome, ScanOutcome::Idle);

    let status = trigger.toggle_disabled(&manager, mailing.id).unwrap();
    assert_eq!(status, MailingStatus::Created);

    let summary = dispatched(trigger.scheduled_scan(Utc::now()).await.unwrap());
    assert_eq!(summary.sent, 1);
}

#[tokio::test]
async fn regular_users_cannot_toggle() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com"]);

    let err = fx
        .trigger()
        .toggle_disabled(&fx.owner, mailing.id)
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Forbidden(_)));
    assert_eq!(fx.status(&mailing), MailingStatus::Created);
}

#[tokio::test]
async fn manager_blocks_and_unblocks_users() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com"]);
    let manager = fx.user("manager@example.com", Role::Manager);
    let trigger = fx.trigger();

    let blocked = trigger.toggle_user_block(&manager, fx.owner.id).unwrap();
    assert!(blocked.is_blocked);
    assert!(fx.db.get_user(fx.owner.id).unwrap().is_blocked);

    let err = trigger.manual_start(&blocked, mailing.id).await.unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Forbidden(_)));

    let unblocked = trigger.toggle_user_block(&manager, fx.owner.id).unwrap();
    assert!(!unblocked.is_blocked);
    let report = trigger.manual_start(&unblocked, mailing.id).await.unwrap();
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn regular_users_cannot_block() {
    let fx = Fixture::new();
    let other = fx.user("other@example.com", Role::User);

    let err = fx
        .trigger()
        .toggle_user_block(&fx.owner, other.id)
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Forbidden(_)));
    assert!(!fx.db.get_user(other.id).unwrap().is_blocked);
}

#[tokio::test]
async fn blocking_unknown_user() {
    let fx = Fixture::new();
    let manager = fx.user("manager@example.com", Role::Manager);

    let err = fx.trigger().toggle_user_block(&manager, 999).unwrap_err();

    assert!(matches!(err.kind, ErrorKind::UserNotFound(999)));
}

#[tokio::test]
async fn overview_depends_on_role() {
    let fx = Fixture::new();
    let mine = fx.mailing(&["a@example.com", "b@example.com"]);
    fx.with_status(&mine, MailingStatus::Running);
    let manager = fx.user("manager@example.com", Role::Manager);
    let other = fx.user("other@example.com", Role::User);

    let own = stats::overview(fx.db.as_ref(), Some(&fx.owner)).unwrap();
    assert_eq!(own.total_mailings, 1);
    assert_eq!(own.running_mailings, 1);
    assert_eq!(own.unique_recipients, 2);

    let all = stats::overview(fx.db.as_ref(), Some(&manager)).unwrap();
    assert_eq!(all, own);

    let none = stats::overview(fx.db.as_ref(), Some(&other)).unwrap();
    assert_eq!(none.total_mailings, 0);
    assert_eq!(none.unique_recipients, 0);

    let anonymous = stats::overview(fx.db.as_ref(), None).unwrap();
    assert_eq!(anonymous, stats::Overview::default());
}

#[tokio::test(start_paused = true)]
async fn watch_scans_until_cancelled() {
    let fx = Fixture::new();
    let mailing = fx.mailing(&["a@example.com"]);
    let trigger = fx.trigger();
    let cancel = CancellationToken::new();

    let stop = async {
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        cancel.cancel();
    };
    let (watched, ()) = tokio::join!(
        trigger.watch(StdDuration::from_secs(60), cancel.clone()),
        stop
    );

    watched.unwrap();
    assert_eq!(fx.gateway.sent_count().await, 1);
    assert_eq!(fx.status(&mailing), MailingStatus::Completed);
}
