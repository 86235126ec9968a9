use crate::domain::ports::{Mailer, OutboundMail};
use crate::error::{Result, StudioError};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub sender: String,
    /// Plain-text SMTP without TLS, for local relays.
    pub insecure: bool,
}

/// Sends fulfillment mail through an SMTP relay.
pub struct SmtpMailer {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let sender: Mailbox = settings.sender.parse().map_err(|e| {
            StudioError::Misconfiguration(format!("invalid sender '{}': {}", settings.sender, e))
        })?;

        let builder = if settings.insecure {
            SmtpTransport::builder_dangerous(&settings.host)
        } else {
            SmtpTransport::relay(&settings.host).map_err(|e| {
                StudioError::Misconfiguration(format!("invalid SMTP relay '{}': {}", settings.host, e))
            })?
        };
        let mut builder = builder.port(settings.port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

fn build_message(sender: Mailbox, mail: OutboundMail) -> Result<Message> {
    let to: Mailbox = mail
        .to
        .parse()
        .map_err(|e| StudioError::DeliveryError(format!("invalid recipient '{}': {}", mail.to, e)))?;
    let content_type = ContentType::parse(&mail.attachment.content_type).map_err(|e| {
        StudioError::DeliveryError(format!(
            "invalid attachment type '{}': {}",
            mail.attachment.content_type, e
        ))
    })?;
    let attachment = Attachment::new(mail.attachment.filename).body(mail.attachment.bytes, content_type);

    Message::builder()
        .from(sender)
        .to(to)
        .subject(mail.subject)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(mail.body))
                .singlepart(attachment),
        )
        .map_err(|e| StudioError::DeliveryError(format!("could not build message: {}", e)))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutboundMail) -> Result<()> {
        let message = build_message(self.sender.clone(), mail)?;
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await?
            .map_err(|e| StudioError::DeliveryError(e.to_string()))?;
        Ok(())
    }
}
