mod common;

use auth_core::error::AuthError;
use auth_core::models::LoginRequest;
use chrono::{Duration, Utc};
use common::harness;

async fn request_reset(h: &common::TestHarness, email: &str) -> String {
    // Clear of whatever send happened during setup.
    let mut stored = h.stored_user(email).await;
    stored.last_code_sent_at = Some(Utc::now() - Duration::seconds(61));
    h.put_user(&stored).await;

    h.auth
        .forgot_password(email)
        .await
        .expect("forgot-password failed");
    h.stored_code(email).await
}

#[tokio::test]
async fn test_reset_replaces_the_secret_and_consumes_the_code() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;

    let code = request_reset(&h, "ada@example.com").await;
    h.auth
        .reset_password("ada@example.com", &code, "N3w!passw0rd")
        .await
        .expect("reset failed");

    // Old password no longer works, new one does.
    let result = h
        .auth
        .login(LoginRequest {
            email: "ada@example.com".to_string(),
            password: "Str0ng!pw".to_string(),
        })
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));

    h.auth
        .login(LoginRequest {
            email: "ada@example.com".to_string(),
            password: "N3w!passw0rd".to_string(),
        })
        .await
        .expect("login with new password failed");

    // Replaying the consumed code fails.
    let result = h
        .auth
        .reset_password("ada@example.com", &code, "An0ther!pw")
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCode)));
}

#[tokio::test]
async fn test_reset_code_expires() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;
    let code = request_reset(&h, "ada@example.com").await;

    let mut stored = h.stored_user("ada@example.com").await;
    stored.otp_expires_at = Some(Utc::now() - Duration::seconds(1));
    h.put_user(&stored).await;

    let result = h
        .auth
        .reset_password("ada@example.com", &code, "N3w!passw0rd")
        .await;
    assert!(matches!(result, Err(AuthError::Expired)));
}

#[tokio::test]
async fn test_reset_failure_kinds() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;
    let code = request_reset(&h, "ada@example.com").await;
    let wrong = if code == "000000" { "000001" } else { "000000" };

    let result = h
        .auth
        .reset_password("nobody@example.com", &code, "N3w!passw0rd")
        .await;
    assert!(matches!(result, Err(AuthError::NotFound)));

    let result = h
        .auth
        .reset_password("ada@example.com", wrong, "N3w!passw0rd")
        .await;
    assert!(matches!(result, Err(AuthError::InvalidCode)));

    // A weak replacement secret is rejected before any code check.
    let result = h
        .auth
        .reset_password("ada@example.com", &code, "short")
        .await;
    assert!(matches!(result, Err(AuthError::InvalidInput(_))));
}

#[tokio::test]
async fn test_forgot_password_emails_the_reset_code() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;
    let code = request_reset(&h, "ada@example.com").await;

    h.dispatcher.shutdown().await;

    let sent = h.transport.sent();
    let reset_mail = sent
        .iter()
        .find(|m| m.subject == "Reset your password")
        .expect("no reset email sent");
    assert!(reset_mail.body_text.contains(&code));
    assert!(reset_mail.body_text.contains("10 minutes"));
}
