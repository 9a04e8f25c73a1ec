use std::sync::Arc;

use anyhow::Result;
use courier::email::SmtpGateway;
use courier::{Config, Database, Dispatcher, Trigger, User};

pub type CliTrigger = Trigger<Database, SmtpGateway>;

/// Opens the configured database. In dev mode with mocking enabled an empty
/// database is populated with demo data first.
pub fn database(config: &Config) -> Result<Arc<Database>> {
    let db = Database::new(&config.db)?;
    if config.dev.enabled && config.dev.mock && db.len::<User>()? == 0 {
        courier::mock::generate(&db)?;
    }
    Ok(Arc::new(db))
}

/// Builds a trigger sending through the configured smtp server.
pub fn trigger(config: &Config) -> Result<CliTrigger> {
    let db = database(config)?;
    let gateway = Arc::new(SmtpGateway::new(&config.email)?);
    Ok(Trigger::new(Dispatcher::new(db, gateway, config)))
}
