use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::json;

use courier::stats::{self, MailingStats};
use courier::{Config, Mailing, Store};

use crate::util;

pub fn cmd() -> Command {
    Command::new("stats")
        .display_order(30)
        .about("Show delivery statistics")
        .arg(
            Arg::new("mailing-id")
                .long("mailing-id")
                .value_name("ID")
                .value_parser(value_parser!(u64))
                .help("Only show the mailing with this id"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print as json"),
        )
}

pub fn run(matches: &ArgMatches, config: &Config) -> Result<()> {
    let db = util::database(config)?;

    let rows = match matches.get_one::<u64>("mailing-id") {
        Some(id) => match db.get_mailing(*id) {
            Ok(mailing) => {
                let stats = stats::for_mailing(db.as_ref(), mailing.id)?;
                vec![(mailing, stats)]
            }
            Err(e) if e.is_not_found() => {
                println!("Mailing with id {} not found.", id);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        },
        None => stats::all_statistics(db.as_ref())?,
    };

    if matches.get_flag("json") {
        let rows = rows
            .iter()
            .map(|(mailing, stats)| json!({ "mailing": mailing, "stats": stats }))
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No mailings.");
    }
    for (mailing, stats) in &rows {
        print_row(mailing, stats);
    }

    Ok(())
}

fn print_row(mailing: &Mailing, stats: &MailingStats) {
    println!(
        "Mailing {} [{}]: {} attempts, {} sent, {} failed, {:.2}% success",
        mailing.id,
        mailing.status,
        stats.total,
        stats.success,
        stats.failed,
        stats.rounded_rate()
    );
}
