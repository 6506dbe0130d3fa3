use async_trait::async_trait;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    address::AddressError,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid mail address {address:?}: {source}")]
    Address {
        address: String,
        source: AddressError,
    },
    #[error("Mail could not be built: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP transport failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    let address = address.parse::<Address>().map_err(|source| MailError::Address {
        address: address.to_owned(),
        source,
    })?;

    Ok(Mailbox::new(None, address))
}

/// A plain text mail ready to be handed to a [`Mailer`].
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub(crate) fn to_message(&self) -> Result<Message, MailError> {
        let message = Message::builder()
            .from(mailbox(&self.from)?)
            .to(mailbox(&self.to)?)
            .subject(&self.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())?;

        Ok(message)
    }
}

/// Fire-and-forget delivery. Failures are reported, never retried.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// STARTTLS relay on `host:port`, authenticating when `credentials` are given.
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
    ) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = mail.to_message()?;
        self.transport.send(message).await?;

        info!(to = %mail.to, subject = %mail.subject, "Sent mail");
        Ok(())
    }
}

/// Development mailer that only logs what would have been sent.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        mail.to_message()?;

        info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "No SMTP host configured, not sending mail"
        );
        Ok(())
    }
}
