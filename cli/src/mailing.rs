use anyhow::Result;
use clap::{value_parser, Arg, ArgMatches, Command};

use courier::mailing::MailingId;
use courier::user::UserId;
use courier::{Config, Store};

use crate::util;

pub fn start_cmd() -> Command {
    Command::new("start")
        .display_order(20)
        .about("Start a mailing right away on behalf of its owner")
        .arg(mailing_arg())
        .arg(user_arg())
}

pub fn toggle_cmd() -> Command {
    Command::new("toggle")
        .display_order(21)
        .about("Disable a mailing, or re-enable a disabled one")
        .arg(mailing_arg())
        .arg(user_arg())
}

pub fn block_cmd() -> Command {
    Command::new("block")
        .display_order(22)
        .about("Block a user from starting mailings, or unblock a blocked one")
        .arg(
            Arg::new("user-id")
                .value_name("USER_ID")
                .required(true)
                .value_parser(value_parser!(u64)),
        )
        .arg(user_arg())
}

fn mailing_arg() -> Arg {
    Arg::new("mailing-id")
        .value_name("MAILING_ID")
        .required(true)
        .value_parser(value_parser!(u64))
}

fn user_arg() -> Arg {
    Arg::new("user")
        .long("user")
        .short('u')
        .value_name("USER_ID")
        .required(true)
        .value_parser(value_parser!(u64))
        .help("Id of the user performing the action")
}

fn ids(matches: &ArgMatches) -> (MailingId, UserId) {
    (
        *matches.get_one::<u64>("mailing-id").unwrap_or(&0),
        *matches.get_one::<u64>("user").unwrap_or(&0),
    )
}

pub async fn start(matches: &ArgMatches, config: &Config) -> Result<()> {
    let (id, user) = ids(matches);
    let trigger = util::trigger(config)?;
    let user = trigger.dispatcher().store().get_user(user)?;

    match trigger.manual_start(&user, id).await {
        Ok(report) => println!(
            "Mailing {}: {} sent, {} failed, now {}",
            report.mailing, report.sent, report.failed, report.status
        ),
        Err(e) if e.is_not_found() => println!("Mailing with id {} not found.", id),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

pub fn toggle(matches: &ArgMatches, config: &Config) -> Result<()> {
    let (id, user) = ids(matches);
    let trigger = util::trigger(config)?;
    let user = trigger.dispatcher().store().get_user(user)?;

    match trigger.toggle_disabled(&user, id) {
        Ok(status) => println!("Mailing {} is now {}", id, status),
        Err(e) if e.is_not_found() => println!("Mailing with id {} not found.", id),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

pub fn block(matches: &ArgMatches, config: &Config) -> Result<()> {
    let target = *matches.get_one::<u64>("user-id").unwrap_or(&0);
    let actor = *matches.get_one::<u64>("user").unwrap_or(&0);
    let trigger = util::trigger(config)?;
    let actor = trigger.dispatcher().store().get_user(actor)?;

    let user = trigger.toggle_user_block(&actor, target)?;
    let state = if user.is_blocked { "blocked" } else { "unblocked" };
    println!("User {} ({}) is now {}", user.id, user.email, state);

    Ok(())
}
