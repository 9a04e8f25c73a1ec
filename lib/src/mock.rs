//! Module tasked with generating demo data to populate the database.

use chrono::{Duration, Utc};

use crate::db::Database;
use crate::user::Role;
use crate::{ErrorKind, Mailing, Message, Recipient, Result, User};

const OWNER_EMAIL: &str = "owner@example.com";

/// Everything created by [`generate`].
#[derive(Clone, Debug)]
pub struct Demo {
    pub owner: User,
    pub manager: User,
    pub message: Message,
    pub recipients: Vec<Recipient>,
    pub mailing: Mailing,
}

/// Creates a regular user and a manager, a message with placeholders, a few
/// recipients and a mailing that is due right now.
pub fn generate(db: &Database) -> Result<Demo> {
    // does the demo owner already exist
    if db
        .get_collection::<User>()?
        .iter()
        .any(|u| u.email == OWNER_EMAIL)
    {
        return Err(ErrorKind::BadInput("demo data already present".to_string()).into());
    }

    let owner = db.add_user(User::new(OWNER_EMAIL, Role::User))?;
    let manager = db.add_user(User::new("manager@example.com", Role::Manager))?;

    let message = db.add_message(Message::new(
        owner.id,
        "Spring newsletter",
        "Hello {full_name},\n\n\
        this issue goes out to {email}. Thanks for staying with us!",
    ))?;

    let mut recipients = vec![];
    for (email, name) in [
        ("anna@example.com", "Anna Petrova"),
        ("boris@example.com", "Boris Ivanov"),
        ("clara@example.com", "Clara Schmidt"),
    ] {
        let mut recipient = Recipient::new(owner.id, email, name);
        recipient.comment = "demo".to_string();
        recipients.push(db.add_recipient(recipient)?);
    }

    let now = Utc::now();
    let mailing = db.add_mailing(Mailing::new(
        owner.id,
        message.id,
        recipients.iter().map(|r| r.id),
        now - Duration::minutes(5),
        now + Duration::days(1),
    ))?;

    tracing::info!(mailing = mailing.id, "demo data generated");

    Ok(Demo {
        owner,
        manager,
        message,
        recipients,
        mailing,
    })
}
