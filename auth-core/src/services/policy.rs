//! Access policy evaluation: role checks, ownership rules, and password
//! strength requirements.

use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{Role, User};

pub struct PolicyService;

impl PolicyService {
    /// Allow when the identity's role is in the allowed set. Pure and total;
    /// called after authentication has already succeeded, so the only
    /// failure here is `Forbidden`.
    pub fn authorize(role: Role, allowed: &[Role]) -> Result<(), AuthError> {
        if allowed.contains(&role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// Ownership rule layered over the role check: the resource owner or an
    /// admin may proceed.
    pub fn owner_or_admin(owner_id: Uuid, user: &User) -> Result<(), AuthError> {
        if user.user_id == owner_id || user.role == Role::Admin {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }

    /// Minimum password requirements, surfaced as client input errors.
    pub fn validate_password(password: &str, min_length: usize) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }
        if password.chars().count() < min_length {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {} characters",
                min_length
            )));
        }
        Ok(())
    }
}
