use async_trait::async_trait;
use lettre::{
    address::AddressError,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{Error, ErrorKind, Result};

use super::{Envelope, Gateway};

/// Gateway delivering through an SMTP relay.
pub struct SmtpGateway {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpGateway {
    pub fn new(config: &crate::config::Email) -> Result<Self> {
        let transport = if config.smtp_user.is_empty() {
            // Unauthenticated plain connection, meant for local catch-all
            // servers during development.
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_server)
                .port(config.smtp_port)
                .build()
        } else {
            let creds = Credentials::new(config.smtp_user.clone(), config.smtp_password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        };
        Ok(Self { transport })
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e: AddressError| Error::new(ErrorKind::EmailParseError(e.to_string())))
}

#[async_trait]
impl Gateway for SmtpGateway {
    async fn send(&self, envelope: &Envelope) -> Result<()> {
        let message = Message::builder()
            .from(mailbox(&envelope.sender)?)
            .to(mailbox(&envelope.recipient)?)
            .subject(envelope.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(envelope.body.clone())?;

        let response = self.transport.send(message).await?;
        if response.is_positive() {
            Ok(())
        } else {
            Err(ErrorKind::GatewaySend(format!(
                "smtp server responded with {}",
                response.code()
            ))
            .into())
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
