pub mod user;

pub use user::{
    LoginRequest, LoginResponse, RegisterRequest, Role, SanitizedUser, User,
};
