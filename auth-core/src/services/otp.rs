//! One-time code lifecycle: generation, issuance under rate limits, and
//! verification. Codes are single-use; the caller clears the code in the
//! same store update as the state change it authorizes, otherwise a replay
//! is possible.
//!
//! Every time-dependent path takes `now` as a parameter; production callers
//! pass `Utc::now()`.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::config::OtpConfig;
use crate::error::AuthError;
use crate::models::User;

const OTP_LENGTH: u32 = 6;

#[derive(Clone)]
pub struct OtpManager {
    config: OtpConfig,
}

impl OtpManager {
    pub fn new(config: OtpConfig) -> Self {
        Self { config }
    }

    /// Generate a uniform numeric code, fixed width with leading zeros.
    pub fn generate_code() -> String {
        let bound = 10u32.pow(OTP_LENGTH);
        let code = rand::thread_rng().gen_range(0..bound);
        format!("{:0width$}", code, width = OTP_LENGTH as usize)
    }

    /// Check the issuance rate policy for an identity: minimum spacing
    /// between sends, and a hard cap per rolling window.
    pub fn check_rate_limit(&self, user: &User, now: DateTime<Utc>) -> Result<(), AuthError> {
        let last = match user.last_code_sent_at {
            Some(last) => last,
            None => return Ok(()),
        };

        let elapsed = (now - last).num_seconds();

        if elapsed < self.config.min_resend_seconds {
            return Err(AuthError::RateLimited {
                retry_after_secs: (self.config.min_resend_seconds - elapsed).max(1) as u64,
            });
        }

        // Inside the rolling window the counter still stands; past it the
        // next issuance starts a fresh window.
        if elapsed < self.config.window_seconds && user.codes_sent >= self.config.max_per_window {
            return Err(AuthError::RateLimited {
                retry_after_secs: (self.config.window_seconds - elapsed).max(1) as u64,
            });
        }

        Ok(())
    }

    /// Issue a new code for `user` valid for `validity`, enforcing the rate
    /// policy and updating the identity's send counters. The caller persists
    /// the mutated record.
    pub fn issue(
        &self,
        user: &mut User,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        self.check_rate_limit(user, now)?;

        if let Some(last) = user.last_code_sent_at {
            if (now - last).num_seconds() >= self.config.window_seconds {
                user.codes_sent = 0;
            }
        }

        let code = Self::generate_code();
        user.set_code(code.clone(), now + validity);
        user.codes_sent += 1;
        user.last_code_sent_at = Some(now);

        Ok(code)
    }

    /// Verify a supplied code against the identity's active code. Exact
    /// string match, then expiry. On success the caller clears the code.
    pub fn verify(&self, user: &User, supplied: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let (code, expires_at) = match (&user.otp_code, user.otp_expires_at) {
            (Some(code), Some(expires_at)) => (code, expires_at),
            _ => return Err(AuthError::InvalidCode),
        };

        if code != supplied {
            return Err(AuthError::InvalidCode);
        }

        if expires_at < now {
            return Err(AuthError::Expired);
        }

        Ok(())
    }
}
