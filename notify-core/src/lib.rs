//! Asynchronous notification dispatch.
//!
//! Jobs are enqueued fire-and-forget and delivered off the request path by a
//! bounded worker pool with exponential-backoff retries. A failed delivery is
//! recorded and logged; it never propagates to the caller that enqueued it.

pub mod config;
pub mod dispatch;
pub mod job;
pub mod transport;

pub use config::{DispatchConfig, SmtpConfig};
pub use dispatch::Dispatcher;
pub use job::{EmailMessage, JobState, JobStatus, NotificationJob};
pub use transport::{MailTransport, MockMailTransport, SmtpMailer, TransportError};
