use anyhow::Result;
use clap::Command;

use courier::{Config, ErrorKind};

use crate::util;

pub fn cmd() -> Command {
    Command::new("seed")
        .display_order(40)
        .about("Populate the database with demo data")
}

pub fn run(config: &Config) -> Result<()> {
    let db = util::database(config)?;

    let demo = match courier::mock::generate(&db) {
        Ok(demo) => demo,
        Err(e) if matches!(e.kind, ErrorKind::BadInput(_)) => {
            println!("Demo data is already present.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    db.flush()?;

    println!("Owner: {} (id {})", demo.owner.email, demo.owner.id);
    println!("Manager: {} (id {})", demo.manager.email, demo.manager.id);
    println!(
        "Mailing {} with {} recipient(s), due until {}",
        demo.mailing.id,
        demo.recipients.len(),
        demo.mailing.end_time
    );

    Ok(())
}
