//! Auth orchestrator: composes the credential store, password hasher, token
//! issuer, OTP manager, and notification dispatcher into the register /
//! verify / login / resend / forgot / reset flows.
//!
//! Notification enqueue is fire-and-forget throughout: a notification that
//! never sends must not roll back the business operation that triggered it.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

use notify_core::{Dispatcher, NotificationJob};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{LoginRequest, LoginResponse, RegisterRequest, Role, SanitizedUser, User};
use crate::services::{OtpManager, PolicyService, TokenService};
use crate::store::{StoreError, UserStore};
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Which code-carrying email a flow sends.
enum CodeDelivery {
    Verification,
    PasswordReset,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    dispatcher: Dispatcher,
    jwt: TokenService,
    otp: OtpManager,
    config: AuthConfig,
    /// Serializes code issuance per identity within this process. A
    /// multi-instance deployment additionally needs store-level conditional
    /// writes for the OTP counters.
    issuance_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        dispatcher: Dispatcher,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        config.validate()?;
        let jwt = TokenService::new(&config.token)?;
        let otp = OtpManager::new(config.otp.clone());

        Ok(Self {
            store,
            dispatcher,
            jwt,
            otp,
            config,
            issuance_locks: Arc::new(DashMap::new()),
        })
    }

    /// Register a new identity. In the verification-required configuration
    /// the account starts unverified with a code already issued; otherwise
    /// it is active immediately and a welcome email goes out.
    #[tracing::instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterRequest) -> Result<SanitizedUser, AuthError> {
        req.validate()?;
        PolicyService::validate_password(&req.password, self.config.password_min_length)?;

        let email = normalize_email(&req.email);

        if self.store_read(|| self.store.find_by_email(&email)).await?.is_some() {
            tracing::warn!("registration failed, email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash_password(&Password::new(req.password))?;
        let mut user = User::new(
            email,
            req.first_name,
            req.last_name,
            password_hash.into_string(),
        );

        if self.config.require_verified_email {
            let now = Utc::now();
            let validity = Duration::minutes(self.config.otp.verify_ttl_minutes);
            let code = self.otp.issue(&mut user, validity, now)?;
            self.store_call(self.store.insert(&user)).await?;
            self.dispatcher.enqueue(NotificationJob::verification_code(
                &user.email,
                &user.first_name,
                &code,
                self.config.otp.verify_ttl_minutes,
            ));
        } else {
            user.verified = true;
            self.store_call(self.store.insert(&user)).await?;
            self.dispatcher
                .enqueue(NotificationJob::welcome(&user.email, &user.first_name));
        }

        tracing::info!(user_id = %user.user_id, "user registered");
        Ok(user.sanitized())
    }

    /// Verify an emailed code and mark the identity verified. Verifying an
    /// already-verified identity succeeds without touching the code.
    #[tracing::instrument(skip(self, email, code), fields(email = %email))]
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<SanitizedUser, AuthError> {
        let email = normalize_email(email);
        let mut user = self
            .store_read(|| self.store.find_by_email(&email))
            .await?
            .ok_or(AuthError::NotFound)?;

        if user.verified {
            tracing::info!(user_id = %user.user_id, "verification skipped, already verified");
            return Ok(user.sanitized());
        }

        self.otp.verify(&user, code, Utc::now())?;

        // Flag flip and code clear land in one update: the code is single-use.
        user.verified = true;
        user.clear_code();
        user.updated_utc = Utc::now();
        self.store_call(self.store.update(&user)).await?;

        self.dispatcher
            .enqueue(NotificationJob::welcome(&user.email, &user.first_name));

        tracing::info!(user_id = %user.user_id, "email verified");
        Ok(user.sanitized())
    }

    /// Authenticate with email and password, returning the identity and a
    /// session token.
    #[tracing::instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AuthError> {
        req.validate()?;
        let email = normalize_email(&req.email);

        let mut user = match self.store_read(|| self.store.find_by_email(&email)).await? {
            Some(user) => user,
            None => {
                tracing::warn!("login failed, unknown email");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let now = Utc::now();

        if user.failed_logins > self.config.lockout.max_failed_logins {
            match user.locked_until {
                Some(until) if until <= now => {
                    // Lockout window elapsed; the counter starts fresh.
                    user.failed_logins = 0;
                    user.locked_until = None;
                    user.updated_utc = now;
                    self.store_call(self.store.update(&user)).await?;
                }
                _ => {
                    tracing::warn!(user_id = %user.user_id, "login rejected, account locked");
                    return Err(AuthError::AccountLocked);
                }
            }
        }

        let supplied = Password::new(req.password);
        let stored = PasswordHashString::new(user.password_hash.clone());
        if !verify_password(&supplied, &stored) {
            user.failed_logins += 1;
            if user.failed_logins > self.config.lockout.max_failed_logins {
                user.locked_until =
                    Some(now + Duration::minutes(self.config.lockout.lockout_minutes));
            }
            user.updated_utc = now;
            self.store_call(self.store.update(&user)).await?;
            tracing::warn!(
                user_id = %user.user_id,
                failed_logins = user.failed_logins,
                "login failed, wrong password"
            );
            return Err(AuthError::InvalidCredentials);
        }

        if self.config.require_verified_email && !user.verified {
            tracing::warn!(user_id = %user.user_id, "login rejected, email not verified");
            return Err(AuthError::EmailNotVerified);
        }

        if user.failed_logins != 0 || user.locked_until.is_some() {
            user.failed_logins = 0;
            user.locked_until = None;
            user.updated_utc = now;
            self.store_call(self.store.update(&user)).await?;
        }

        let access_token = self.jwt.issue_session(user.user_id)?;

        tracing::info!(user_id = %user.user_id, "login successful");
        Ok(LoginResponse {
            user: user.sanitized(),
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.session_ttl_seconds(),
        })
    }

    /// Resend the email-verification code. Succeeds without issuing when the
    /// identity is already verified.
    #[tracing::instrument(skip(self, email), fields(email = %email))]
    pub async fn resend_code(&self, email: &str) -> Result<(), AuthError> {
        self.issue_code(email, CodeDelivery::Verification).await
    }

    /// Start the password-reset flow by emailing a reset code.
    #[tracing::instrument(skip(self, email), fields(email = %email))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.issue_code(email, CodeDelivery::PasswordReset).await
    }

    /// Complete the password-reset flow: validate the code, replace the
    /// secret, and consume the code in the same update.
    #[tracing::instrument(skip(self, email, code, new_password), fields(email = %email))]
    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        PolicyService::validate_password(new_password, self.config.password_min_length)?;

        let email = normalize_email(email);
        let mut user = self
            .store_read(|| self.store.find_by_email(&email))
            .await?
            .ok_or(AuthError::NotFound)?;

        self.otp.verify(&user, code, Utc::now())?;

        let password_hash = hash_password(&Password::new(new_password.to_string()))?;
        user.password_hash = password_hash.into_string();
        user.clear_code();
        user.updated_utc = Utc::now();
        self.store_call(self.store.update(&user)).await?;

        tracing::info!(user_id = %user.user_id, "password reset successful");
        Ok(())
    }

    /// Resolve a bearer token to its identity. Any token or lookup failure
    /// collapses to `Unauthorized`; role checks are a separate, later step.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let subject = match self.jwt.validate(token) {
            Ok(subject) => subject,
            Err(_) => return Err(AuthError::Unauthorized),
        };

        self.store_read(|| self.store.find_by_id(subject))
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    /// Authenticate, then require one of `allowed_roles`. The guard that
    /// runs ahead of protected handlers.
    pub async fn authorize(&self, token: &str, allowed_roles: &[Role]) -> Result<User, AuthError> {
        let user = self.authenticate(token).await?;
        if let Err(err) = PolicyService::authorize(user.role, allowed_roles) {
            tracing::warn!(
                user_id = %user.user_id,
                role = user.role.as_str(),
                "access denied, insufficient role"
            );
            return Err(err);
        }
        Ok(user)
    }

    /// Shared shape of resend-code and forgot-password: rate-limit, issue,
    /// persist, notify. Issuance for one identity is serialized so two
    /// concurrent requests cannot both pass the rate check.
    async fn issue_code(&self, email: &str, delivery: CodeDelivery) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let lock = self.issuance_lock(&email);
        let _guard = lock.lock().await;

        let mut user = self
            .store_read(|| self.store.find_by_email(&email))
            .await?
            .ok_or(AuthError::NotFound)?;

        if matches!(delivery, CodeDelivery::Verification) && user.verified {
            tracing::info!(user_id = %user.user_id, "resend skipped, already verified");
            return Ok(());
        }

        let ttl_minutes = match delivery {
            CodeDelivery::Verification => self.config.otp.verify_ttl_minutes,
            CodeDelivery::PasswordReset => self.config.otp.reset_ttl_minutes,
        };

        let now = Utc::now();
        let code = self.otp.issue(&mut user, Duration::minutes(ttl_minutes), now)?;
        user.updated_utc = now;
        self.store_call(self.store.update(&user)).await?;

        let job = match delivery {
            CodeDelivery::Verification => NotificationJob::verification_code(
                &user.email,
                &user.first_name,
                &code,
                ttl_minutes,
            ),
            CodeDelivery::PasswordReset => NotificationJob::password_reset_code(
                &user.email,
                &user.first_name,
                &code,
                ttl_minutes,
            ),
        };
        self.dispatcher.enqueue(job);

        tracing::info!(user_id = %user.user_id, "code issued and queued for delivery");
        Ok(())
    }

    fn issuance_lock(&self, email: &str) -> Arc<Mutex<()>> {
        let entry = self.issuance_locks.entry(email.to_string()).or_default();
        entry.value().clone()
    }

    /// Run a store call under the configured timeout; a timeout surfaces as
    /// a retryable infrastructure fault.
    async fn store_call<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => Err(AuthError::StoreUnavailable(
                "store call timed out".to_string(),
            )),
        }
    }

    /// Idempotent reads get one internal retry on an infrastructure fault
    /// before the fault is surfaced. Writes are never retried here.
    async fn store_read<T, F, Fut>(&self, op: F) -> Result<T, AuthError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match self.store_call(op()).await {
            Err(AuthError::StoreUnavailable(msg)) => {
                tracing::warn!(error = %msg, "store read failed, retrying once");
                self.store_call(op()).await
            }
            result => result,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
