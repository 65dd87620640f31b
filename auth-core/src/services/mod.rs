pub mod auth;
pub mod jwt;
pub mod otp;
pub mod policy;

pub use auth::AuthService;
pub use jwt::{SessionClaims, TokenService};
pub use otp::OtpManager;
pub use policy::PolicyService;
