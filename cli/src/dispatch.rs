use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tokio_util::sync::CancellationToken;

use courier::dispatch::Admission;
use courier::mailing::MailingFilter;
use courier::{Config, Mode, ScanOutcome, ScanSummary};

use crate::util;

pub fn cmd() -> Command {
    Command::new("run-dispatch")
        .display_order(10)
        .about("Dispatch mailings that are due, or one explicit mailing")
        .arg(
            Arg::new("mailing-id")
                .long("mailing-id")
                .value_name("ID")
                .value_parser(value_parser!(u64))
                .help("Only process the mailing with this id"),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .action(ArgAction::SetTrue)
                .requires("mailing-id")
                .help("Ignore the mailing's status and schedule"),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .action(ArgAction::SetTrue)
                .help("Go through the motions without sending anything"),
        )
}

pub fn watch_cmd() -> Command {
    Command::new("watch")
        .display_order(11)
        .about("Keep dispatching due mailings periodically")
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .help("Seconds between scans, defaults to the configured interval"),
        )
}

pub async fn run(matches: &ArgMatches, config: &Config) -> Result<()> {
    let trigger = util::trigger(config)?;
    let simulate = matches.get_flag("simulate");
    let now = Utc::now();

    let outcome = match matches.get_one::<u64>("mailing-id") {
        Some(id) => {
            trigger
                .targeted_scan(*id, matches.get_flag("force"), simulate, now)
                .await?
        }
        None if simulate => {
            let dispatcher = trigger.dispatcher();
            let filter = MailingFilter::Window;
            let mailings = dispatcher.select_eligible(now, &filter)?;
            if mailings.is_empty() {
                ScanOutcome::Idle
            } else {
                let admission = Admission::Matching(filter, now);
                ScanOutcome::Dispatched(
                    dispatcher
                        .run_all(mailings, Mode::Simulate, admission)
                        .await?,
                )
            }
        }
        None => trigger.scheduled_scan(now).await?,
    };

    match outcome {
        ScanOutcome::Idle => println!("No mailings to process."),
        ScanOutcome::NotFound(id) => println!("Mailing with id {} not found.", id),
        ScanOutcome::Dispatched(summary) => print_summary(&summary, simulate),
    }

    Ok(())
}

pub async fn watch(matches: &ArgMatches, config: &Config, cancel: CancellationToken) -> Result<()> {
    let interval = match matches.get_one::<u64>("interval") {
        Some(secs) => Duration::from_secs(*secs),
        None => config.dispatch.scan_interval(),
    };
    let trigger = util::trigger(config)?;
    trigger.watch(interval, cancel).await?;
    Ok(())
}

fn print_summary(summary: &ScanSummary, simulate: bool) {
    for report in &summary.reports {
        println!(
            "Mailing {}: {} sent, {} failed, {} skipped, now {}",
            report.mailing, report.sent, report.failed, report.skipped, report.status
        );
    }
    for id in &summary.busy {
        println!("Mailing {}: being dispatched elsewhere, left alone", id);
    }
    for id in &summary.stale {
        println!("Mailing {}: no longer due, left alone", id);
    }
    println!(
        "Processed {} mailing(s): {} sent, {} failed{}",
        summary.processed,
        summary.sent,
        summary.failed,
        if simulate { " (simulated)" } else { "" }
    );
}
