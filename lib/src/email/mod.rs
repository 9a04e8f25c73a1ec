//! Delivery gateway.
//!
//! The dispatch engine hands each rendered message to a [`Gateway`] and only
//! cares whether the send succeeded. Transport concerns such as connection
//! handling and authentication live behind the trait.

pub mod mock;
pub mod smtp;

pub use mock::MockGateway;
pub use smtp::SmtpGateway;

use async_trait::async_trait;

use crate::Result;

/// A single outgoing email, already rendered for its recipient.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Envelope {
    pub subject: String,
    pub body: String,
    /// Sender identity, e.g. `Courier <news@example.com>`.
    pub sender: String,
    pub recipient: String,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Sends one email. Any error is reported back as a failed delivery for
    /// that recipient only.
    async fn send(&self, envelope: &Envelope) -> Result<()>;

    fn name(&self) -> &'static str;
}
