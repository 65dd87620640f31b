use std::env;
use std::time::Duration;

use crate::error::AuthError;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token: TokenConfig,
    pub otp: OtpConfig,
    pub lockout: LockoutConfig,
    /// When true, login requires a verified email address.
    pub require_verified_email: bool,
    pub password_min_length: usize,
    /// Budget for a single credential-store call; an elapsed timeout is
    /// surfaced as a retryable infrastructure fault.
    pub store_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Process-wide signing secret for bearer tokens.
    pub secret: String,
    /// Session window, in minutes. Hours-long for this internal tool.
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// Minimum spacing between code issuances for one identity.
    pub min_resend_seconds: i64,
    /// Rolling window over which issuances are counted; the counter resets
    /// after this much inactivity.
    pub window_seconds: i64,
    /// Hard cap on issuances within one window.
    pub max_per_window: i32,
    /// Validity of email-verification codes.
    pub verify_ttl_minutes: i64,
    /// Validity of password-reset codes.
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Failed-login count above which the account locks.
    pub max_failed_logins: i32,
    /// How long a lockout lasts before the counter resets.
    pub lockout_minutes: i64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AuthError> {
        let config = AuthConfig {
            token: TokenConfig {
                secret: get_env("TOKEN_SECRET", None)?,
                ttl_minutes: parse_env("TOKEN_TTL_MINUTES", "600")?,
            },
            otp: OtpConfig {
                min_resend_seconds: parse_env("OTP_MIN_RESEND_SECONDS", "60")?,
                window_seconds: parse_env("OTP_WINDOW_SECONDS", "3600")?,
                max_per_window: parse_env("OTP_MAX_PER_WINDOW", "5")?,
                verify_ttl_minutes: parse_env("OTP_VERIFY_TTL_MINUTES", "5")?,
                reset_ttl_minutes: parse_env("OTP_RESET_TTL_MINUTES", "10")?,
            },
            lockout: LockoutConfig {
                max_failed_logins: parse_env("MAX_FAILED_LOGINS", "5")?,
                lockout_minutes: parse_env("LOCKOUT_MINUTES", "15")?,
            },
            require_verified_email: parse_env("REQUIRE_VERIFIED_EMAIL", "true")?,
            password_min_length: parse_env("PASSWORD_MIN_LENGTH", "8")?,
            store_timeout: Duration::from_secs(parse_env("STORE_TIMEOUT_SECONDS", "5")?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.token.secret.len() < 16 {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "TOKEN_SECRET must be at least 16 characters"
            )));
        }
        if self.token.ttl_minutes <= 0 {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "TOKEN_TTL_MINUTES must be positive"
            )));
        }
        if self.otp.min_resend_seconds <= 0 || self.otp.window_seconds < self.otp.min_resend_seconds
        {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "OTP_WINDOW_SECONDS must be at least OTP_MIN_RESEND_SECONDS, both positive"
            )));
        }
        if self.otp.max_per_window <= 0 {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "OTP_MAX_PER_WINDOW must be positive"
            )));
        }
        if self.otp.verify_ttl_minutes <= 0 || self.otp.reset_ttl_minutes <= 0 {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "OTP code validity windows must be positive"
            )));
        }
        if self.lockout.max_failed_logins <= 0 {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "MAX_FAILED_LOGINS must be positive"
            )));
        }
        if self.password_min_length == 0 {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "PASSWORD_MIN_LENGTH must be positive"
            )));
        }
        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>) -> Result<String, AuthError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AuthError::Internal(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AuthError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default))?.parse().map_err(|e| {
        AuthError::Internal(anyhow::anyhow!("invalid value for {}: {}", key, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AuthConfig {
        AuthConfig {
            token: TokenConfig {
                secret: "a-test-secret-of-decent-length".to_string(),
                ttl_minutes: 600,
            },
            otp: OtpConfig {
                min_resend_seconds: 60,
                window_seconds: 3600,
                max_per_window: 5,
                verify_ttl_minutes: 5,
                reset_ttl_minutes: 10,
            },
            lockout: LockoutConfig {
                max_failed_logins: 5,
                lockout_minutes: 15,
            },
            require_verified_email: true,
            password_min_length: 8,
            store_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = valid_config();
        config.token.secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_shorter_than_spacing_rejected() {
        let mut config = valid_config();
        config.otp.window_seconds = 30;
        assert!(config.validate().is_err());
    }
}
