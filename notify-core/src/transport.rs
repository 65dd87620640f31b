//! Mail transport seam: the external collaborator that actually sends email.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::job::EmailMessage;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("send error: {0}")]
    SendFailed(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl TransportError {
    /// Transient failures are retried by the dispatcher; permanent ones are
    /// not (a bad address will not get better).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Connection(_)
                | TransportError::SendFailed(_)
                | TransportError::Timeout(_)
        )
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), TransportError>;
}

/// SMTP mail transport over lettre's async STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                TransportError::Configuration(format!("failed to create SMTP relay: {}", e))
            })?
            .port(config.port)
            .credentials(creds)
            .timeout(Some(config.timeout))
            .build();

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| TransportError::Configuration(format!("invalid from address: {}", e)))?;

        tracing::info!(host = %config.host, port = config.port, "SMTP mail transport initialized");

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| TransportError::InvalidRecipient(format!("{}: {}", message.to, e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject);

        let email = match &message.body_html {
            Some(html) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(message.body_text.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html.clone()),
                        ),
                )
                .map_err(|e| TransportError::SendFailed(format!("failed to build message: {}", e)))?,
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.body_text.clone())
                .map_err(|e| TransportError::SendFailed(format!("failed to build message: {}", e)))?,
        };

        self.transport
            .send(email)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        tracing::info!(to = %message.to, subject = %message.subject, "email sent");

        Ok(())
    }
}

/// Mock mail transport for tests: counts attempts, records deliveries, and
/// fails on a configurable script.
pub struct MockMailTransport {
    fail_first: u32,
    always_fail: bool,
    reject_recipient: bool,
    delay: Option<Duration>,
    attempts: AtomicU32,
    sent: std::sync::Mutex<Vec<EmailMessage>>,
}

impl MockMailTransport {
    pub fn succeeding() -> Self {
        Self::with_script(0, false, false)
    }

    /// Fail the first `n` attempts with a transient error, then succeed.
    pub fn failing_first(n: u32) -> Self {
        Self::with_script(n, false, false)
    }

    pub fn always_failing() -> Self {
        Self::with_script(0, true, false)
    }

    /// Reject every recipient with a permanent error.
    pub fn rejecting() -> Self {
        Self::with_script(0, false, true)
    }

    fn with_script(fail_first: u32, always_fail: bool, reject_recipient: bool) -> Self {
        Self {
            fail_first,
            always_fail,
            reject_recipient,
            delay: None,
            attempts: AtomicU32::new(0),
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering each attempt, to let tests observe in-flight
    /// state deterministically.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if self.reject_recipient {
            return Err(TransportError::InvalidRecipient(message.to.clone()));
        }
        if self.always_fail || attempt <= self.fail_first {
            return Err(TransportError::Connection(
                "simulated connection failure".to_string(),
            ));
        }

        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message.clone());

        tracing::info!(to = %message.to, subject = %message.subject, "[MOCK] email would be sent");

        Ok(())
    }
}
