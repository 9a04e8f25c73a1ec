#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use courier::config::Dispatch;
use courier::email::MockGateway;
use courier::user::Role;
use courier::{
    Config, Database, Dispatcher, Mailing, MailingStatus, Message, Recipient, Store, Trigger, User,
};

pub struct Fixture {
    pub db: Arc<Database>,
    pub gateway: Arc<MockGateway>,
    pub owner: User,
    pub message: Message,
}

pub fn config() -> Config {
    Config {
        dispatch: Dispatch {
            send_timeout_secs: 1,
            ..Default::default()
        },
        ..Default::default()
    }
}

impl Fixture {
    pub fn new() -> Self {
        let db = Database::temporary().unwrap();
        let owner = db
            .add_user(User::new("owner@example.com", Role::User))
            .unwrap();
        let message = db
            .add_message(Message::new(
                owner.id,
                "News",
                "Hello {full_name} <{email}>",
            ))
            .unwrap();
        Self {
            db: Arc::new(db),
            gateway: Arc::new(MockGateway::new()),
            owner,
            message,
        }
    }

    pub fn user(&self, email: &str, role: Role) -> User {
        self.db.add_user(User::new(email, role)).unwrap()
    }

    /// Mailing due right now with one recipient per address.
    pub fn mailing(&self, emails: &[&str]) -> Mailing {
        let now = Utc::now();
        self.mailing_between(emails, now - Duration::hours(1), now + Duration::hours(1))
    }

    pub fn mailing_between(
        &self,
        emails: &[&str],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Mailing {
        let recipients = emails
            .iter()
            .map(|email| {
                let name = email.split('@').next().unwrap().to_uppercase();
                self.db
                    .add_recipient(Recipient::new(self.owner.id, *email, name))
                    .unwrap()
                    .id
            })
            .collect::<Vec<_>>();
        self.db
            .add_mailing(Mailing::new(
                self.owner.id,
                self.message.id,
                recipients,
                start,
                end,
            ))
            .unwrap()
    }

    pub fn with_status(&self, mailing: &Mailing, status: MailingStatus) -> Mailing {
        self.db.set_status(mailing.id, status).unwrap();
        self.db.get_mailing(mailing.id).unwrap()
    }

    pub fn dispatcher(&self) -> Dispatcher<Database, MockGateway> {
        self.dispatcher_with(config())
    }

    pub fn dispatcher_with(&self, config: Config) -> Dispatcher<Database, MockGateway> {
        Dispatcher::new(self.db.clone(), self.gateway.clone(), &config)
    }

    pub fn trigger(&self) -> Trigger<Database, MockGateway> {
        Trigger::new(self.dispatcher())
    }

    pub fn status(&self, mailing: &Mailing) -> MailingStatus {
        self.db.get_mailing(mailing.id).unwrap().status
    }
}
