mod common;

use auth_core::error::AuthError;
use auth_core::models::LoginRequest;
use chrono::{Duration, Utc};
use common::harness;

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_unknown_email_and_wrong_password_are_invalid_credentials() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;

    let result = h.auth.login(login("nobody@example.com", "Str0ng!pw")).await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));

    let result = h.auth.login(login("ada@example.com", "wrong-password")).await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_successful_login_returns_token_and_resets_counter() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;

    for _ in 0..3 {
        let _ = h.auth.login(login("ada@example.com", "wrong-password")).await;
    }
    assert_eq!(h.stored_user("ada@example.com").await.failed_logins, 3);

    let response = h
        .auth
        .login(login("ada@example.com", "Str0ng!pw"))
        .await
        .expect("login failed");
    assert!(!response.access_token.is_empty());
    assert_eq!(response.token_type, "Bearer");
    assert_eq!(response.expires_in, 600 * 60);

    assert_eq!(h.stored_user("ada@example.com").await.failed_logins, 0);
}

#[tokio::test]
async fn test_six_failures_lock_the_account_even_for_the_correct_password() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;

    for _ in 0..6 {
        let result = h.auth.login(login("ada@example.com", "wrong-password")).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    let stored = h.stored_user("ada@example.com").await;
    assert_eq!(stored.failed_logins, 6);
    assert!(stored.locked_until.is_some());

    let result = h.auth.login(login("ada@example.com", "Str0ng!pw")).await;
    assert!(matches!(result, Err(AuthError::AccountLocked)));
}

#[tokio::test]
async fn test_elapsed_lockout_window_unlocks_and_resets() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;

    for _ in 0..6 {
        let _ = h.auth.login(login("ada@example.com", "wrong-password")).await;
    }

    // Rewind the lockout stamp as if the window had elapsed.
    let mut stored = h.stored_user("ada@example.com").await;
    stored.locked_until = Some(Utc::now() - Duration::seconds(1));
    h.put_user(&stored).await;

    let response = h
        .auth
        .login(login("ada@example.com", "Str0ng!pw"))
        .await
        .expect("login after lockout expiry failed");
    assert_eq!(response.user.email, "ada@example.com");
    assert_eq!(h.stored_user("ada@example.com").await.failed_logins, 0);
}

#[tokio::test]
async fn test_unverified_user_with_correct_password_is_email_not_verified() {
    let h = harness();
    h.auth
        .register(common::register_request("ada@example.com", "Str0ng!pw"))
        .await
        .expect("registration failed");

    let result = h.auth.login(login("ada@example.com", "Str0ng!pw")).await;
    assert!(matches!(result, Err(AuthError::EmailNotVerified)));

    // A wrong password still reads as bad credentials, not as unverified.
    let result = h.auth.login(login("ada@example.com", "wrong-password")).await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_login_accepts_differently_cased_email() {
    let h = harness();
    h.register_and_verify("ada@example.com", "Str0ng!pw").await;

    h.auth
        .login(login("Ada@Example.COM", "Str0ng!pw"))
        .await
        .expect("login with differently cased email failed");
}
