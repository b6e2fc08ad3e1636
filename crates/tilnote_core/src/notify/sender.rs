//! Outbound email seam.

use log::info;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
#[error("email delivery failed: {0}")]
pub struct SendError(pub String);

/// Transport used by the worker. Implementations may block.
pub trait EmailSender {
    fn send(&self, message: &EmailMessage) -> Result<(), SendError>;
}

/// Sender that records deliveries in the log instead of talking to SMTP.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        let domain = message
            .to
            .rsplit_once('@')
            .map_or("-", |(_, domain)| domain);
        info!(
            "event=email_send module=notify status=ok transport=log recipient_domain={} subject_len={}",
            domain,
            message.subject.chars().count()
        );
        Ok(())
    }
}
