//! Bulk mailing dispatch.
//!
//! Mailings pair a message with a set of recipients and a dispatch window.
//! The [`dispatch`] engine sends them out recipient by recipient, records
//! every delivery attempt and moves mailings through their lifecycle, while
//! [`trigger`] exposes the scheduled, targeted and manual ways of starting
//! a pass.

#[macro_use]
extern crate serde_derive;

pub mod config;
pub mod db;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod mailing;
pub mod message;
pub mod mock;
pub mod permission;
pub mod recipient;
pub mod stats;
pub mod store;
pub mod template;
pub mod tracing;
pub mod trigger;
pub mod user;

pub use config::Config;
pub use db::Database;
pub use dispatch::{Dispatcher, Mode, RunReport, ScanSummary};
pub use error::{Error, ErrorKind, Result};
pub use mailing::{Mailing, MailingAttempt, MailingStatus};
pub use message::Message;
pub use recipient::Recipient;
pub use store::Store;
pub use trigger::{ScanOutcome, Trigger};
pub use user::User;
