//! Notification job model - a queued unit of asynchronous delivery work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default attempt budget per job.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// A rendered email ready for handoff to a mail transport.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Delivery status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Delivered,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Delivered => write!(f, "delivered"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Observable state of an enqueued job.
#[derive(Debug, Clone)]
pub struct JobState {
    pub status: JobStatus,
    pub attempts: u32,
    pub error: Option<String>,
}

impl JobState {
    pub(crate) fn queued() -> Self {
        Self {
            status: JobStatus::Queued,
            attempts: 0,
            error: None,
        }
    }
}

/// A unit of asynchronous delivery work. Once enqueued it is owned by the
/// dispatcher until terminally delivered or exhausted.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub job_id: Uuid,
    pub message: EmailMessage,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_utc: DateTime<Utc>,
}

impl NotificationJob {
    pub fn new(message: EmailMessage) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            message,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_utc: Utc::now(),
        }
    }

    /// Set the maximum attempt count.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Welcome email sent once an account becomes active.
    pub fn welcome(to: &str, first_name: &str) -> Self {
        let body_text = format!(
            "Hi {first_name},\n\n\
             Your account is ready. Sign in to create your first project, \
             invite teammates, and start tracking work.\n\n\
             If you did not create this account, please contact support.",
        );
        let body_html = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
    <h2>Welcome aboard, {first_name}!</h2>
    <p>Your account is ready. Sign in to create your first project, invite teammates, and start tracking work.</p>
    <p style="color: #666; font-size: 12px;">If you did not create this account, please contact support.</p>
</body></html>"#,
        );
        Self::new(EmailMessage {
            to: to.to_string(),
            subject: "Welcome aboard!".to_string(),
            body_text,
            body_html: Some(body_html),
        })
    }

    /// Verification code email sent on registration and resend.
    pub fn verification_code(to: &str, first_name: &str, code: &str, valid_minutes: i64) -> Self {
        let body_text = format!(
            "Hi {first_name},\n\n\
             Your verification code is: {code}\n\n\
             The code expires in {valid_minutes} minutes. \
             If you didn't request this, please ignore this email.",
        );
        let body_html = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
    <h2>Verify your email address</h2>
    <p>Hi {first_name}, use the code below to verify your email address:</p>
    <p style="font-size: 28px; font-weight: bold; letter-spacing: 4px;">{code}</p>
    <p style="color: #666; font-size: 12px;">The code expires in {valid_minutes} minutes. If you didn't request this, please ignore this email.</p>
</body></html>"#,
        );
        Self::new(EmailMessage {
            to: to.to_string(),
            subject: "Verify your email address".to_string(),
            body_text,
            body_html: Some(body_html),
        })
    }

    /// Password reset code email.
    pub fn password_reset_code(to: &str, first_name: &str, code: &str, valid_minutes: i64) -> Self {
        let body_text = format!(
            "Hi {first_name},\n\n\
             We received a request to reset your password. \
             Your reset code is: {code}\n\n\
             The code expires in {valid_minutes} minutes. \
             If you didn't request this, please ignore this email.",
        );
        let body_html = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
    <h2>Password reset request</h2>
    <p>Hi {first_name}, use the code below to set a new password:</p>
    <p style="font-size: 28px; font-weight: bold; letter-spacing: 4px;">{code}</p>
    <p style="color: #666; font-size: 12px;">The code expires in {valid_minutes} minutes. If you didn't request this, please ignore this email.</p>
</body></html>"#,
        );
        Self::new(EmailMessage {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            body_text,
            body_html: Some(body_html),
        })
    }

    /// Sent to an assignee when a task lands on their plate.
    pub fn task_assigned(to: &str, first_name: &str, task_title: &str, project_name: &str) -> Self {
        let body_text = format!(
            "Hi {first_name},\n\n\
             You have been assigned the task \"{task_title}\" \
             in project \"{project_name}\".",
        );
        let body_html = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
    <h2>New task assigned to you</h2>
    <p>Hi {first_name}, you have been assigned <strong>{task_title}</strong> in project <strong>{project_name}</strong>.</p>
</body></html>"#,
        );
        Self::new(EmailMessage {
            to: to.to_string(),
            subject: format!("New task: {task_title}"),
            body_text,
            body_html: Some(body_html),
        })
    }

    /// Sent to an assignee when one of their tasks changes status.
    pub fn task_status_changed(
        to: &str,
        first_name: &str,
        task_title: &str,
        from_status: &str,
        to_status: &str,
    ) -> Self {
        let body_text = format!(
            "Hi {first_name},\n\n\
             The task \"{task_title}\" moved from \"{from_status}\" to \"{to_status}\".",
        );
        let body_html = format!(
            r#"<html><body style="font-family: Arial, sans-serif;">
    <h2>Task status updated</h2>
    <p>Hi {first_name}, <strong>{task_title}</strong> moved from <em>{from_status}</em> to <em>{to_status}</em>.</p>
</body></html>"#,
        );
        Self::new(EmailMessage {
            to: to.to_string(),
            subject: format!("Task update: {task_title}"),
            body_text,
            body_html: Some(body_html),
        })
    }
}
