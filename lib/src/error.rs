use std::backtrace::Backtrace;
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::mailing::MailingId;
use crate::user::UserId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub backtrace: Backtrace,
    pub mailing: Option<MailingId>,
    pub user: Option<UserId>,
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
            mailing: None,
            user: None,
        }
    }

    pub fn new_with(kind: ErrorKind, mailing: Option<MailingId>, user: Option<UserId>) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
            mailing,
            user,
        }
    }

    /// Whether the error signals a missing mailing, which callers report as a
    /// distinct "nothing happened" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::MailingNotFound(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(mailing) = self.mailing {
            write!(f, ", mailing: {}", mailing)?;
        }
        if let Some(user) = self.user {
            write!(f, ", user: {}", user)?;
        }
        if self.backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            write!(f, ", {}", self.backtrace)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    #[error("unexpected error")]
    StdIoError(#[from] std::io::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),

    #[error("config error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("lettre email error: {0}")]
    LettreEmailError(#[from] lettre::error::Error),
    #[error("lettre smtp error: {0}")]
    LettreSmtpError(#[from] lettre::transport::smtp::Error),
    #[error("failed parsing email address: {0}")]
    EmailParseError(String),

    #[error("{0}")]
    GatewaySend(String),
    #[error("gateway send timed out after {0:?}")]
    GatewayTimeout(Duration),

    #[error("mailing with id {0} not found")]
    MailingNotFound(MailingId),
    #[error("mailing {0} is disabled")]
    MailingDisabled(MailingId),
    #[error("mailing {0} no longer qualifies for this run")]
    MailingIneligible(MailingId),
    #[error("mailing {0} is being dispatched by another pass")]
    MailingBusy(MailingId),
    #[error("invalid mailing schedule: end time precedes start time")]
    InvalidSchedule,

    #[error("recipient with this email already exists: {0}")]
    RecipientExists(String),
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("db error: {0}")]
    DbError(String),

    #[cfg(feature = "sled")]
    #[error("sled db error: {0}")]
    SledError(#[from] sled::Error),

    #[error("pot decode error: {0}")]
    PotError(#[from] pot::Error),

    #[error("infallible?")]
    Infallible(#[from] Infallible),
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Self::new(ErrorKind::Unexpected(e))
    }
}

#[cfg(feature = "sled")]
impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Self::new(ErrorKind::SledError(e))
    }
}

impl From<pot::Error> for Error {
    fn from(e: pot::Error) -> Self {
        Self::new(ErrorKind::PotError(e))
    }
}

impl From<lettre::error::Error> for Error {
    fn from(e: lettre::error::Error) -> Self {
        Self::new(ErrorKind::LettreEmailError(e))
    }
}

impl From<lettre::transport::smtp::Error> for Error {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        Self::new(ErrorKind::LettreSmtpError(e))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Self::new(ErrorKind::ConfigError(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::StdIoError(e))
    }
}

impl From<Infallible> for Error {
    fn from(e: Infallible) -> Self {
        Self::new(ErrorKind::Infallible(e))
    }
}

impl From<ErrorKind> for Error {
    fn from(k: ErrorKind) -> Self {
        Self::new(k)
    }
}
