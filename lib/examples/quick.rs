//! Shortest path to a dispatch pass: a throwaway database with demo data, a
//! gateway that only pretends to send, and one scheduled scan.

use std::sync::Arc;

use chrono::Utc;

use courier::email::MockGateway;
use courier::{Config, Database, Dispatcher, ScanOutcome, Trigger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::default();
    let _guard = courier::tracing::init(&config)?;

    let db = Database::temporary()?;
    let demo = courier::mock::generate(&db)?;

    let gateway = Arc::new(MockGateway::new());
    gateway
        .fail_for(demo.recipients[2].email.clone(), "550 mailbox unavailable")
        .await;

    let trigger = Trigger::new(Dispatcher::new(Arc::new(db), gateway.clone(), &config));
    match trigger.scheduled_scan(Utc::now()).await? {
        ScanOutcome::Dispatched(summary) => {
            println!("sent {}, failed {}", summary.sent, summary.failed)
        }
        outcome => println!("nothing dispatched: {:?}", outcome),
    }

    for envelope in gateway.sent().await {
        println!("--- to {}\n{}", envelope.recipient, envelope.body);
    }

    Ok(())
}
